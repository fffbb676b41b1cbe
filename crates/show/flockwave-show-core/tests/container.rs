use std::io::Cursor;

use flockwave_show_core::{
    BlockType, ErrorKind, FileFeatures, RthPlan, RthPlanEntry, ShowConfig, ShowError,
    ShowFileBuilder, ShowFileReader, TrajectoryPlayer, TrajectorySpecification, Waypoint,
    YawSetpoint, YawSetpointList,
};

fn fixture(name: &str) -> Vec<u8> {
    flockwave_test_fixtures::shows::bytes(name).expect("load show fixture")
}

fn approx_point(actual: [f64; 3], expected: [f64; 3], eps: f64) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() <= eps, "left={actual:?} right={expected:?} eps={eps}");
    }
}

#[test]
fn reads_v1_fixture() {
    let data = fixture("simple-v1");
    assert!(!flockwave_test_fixtures::shows::has_checksum("simple-v1").unwrap());

    let reader = ShowFileReader::from_bytes(&data).expect("open v1 show");
    assert_eq!(reader.version(), 1);
    assert_eq!(reader.features(), FileFeatures::empty());

    let blocks = reader.read_all_blocks().expect("read v1 blocks");
    let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(kinds, [BlockType::Trajectory, BlockType::Comment]);
    assert_eq!(blocks[1].text().unwrap(), "this is a test file");

    let trajectory = blocks[0].trajectory().expect("decode trajectory block");
    assert_eq!(trajectory.waypoints().len(), 6);
    assert_eq!(trajectory.waypoints()[3].position, [10.0, 10.0, 10.0]);
}

#[test]
fn reads_v2_fixture_from_memory_and_stream() {
    let data = fixture("simple-v2");
    assert!(flockwave_test_fixtures::shows::has_checksum("simple-v2").unwrap());

    let in_memory = ShowFileReader::from_bytes(&data)
        .expect("open v2 show")
        .read_all_blocks()
        .expect("read v2 blocks");

    let reader = ShowFileReader::from_reader(Cursor::new(data.clone())).expect("open v2 stream");
    assert_eq!(reader.version(), 2);
    assert!(reader.features().contains(FileFeatures::CRC32));
    let streamed = reader
        .blocks()
        .collect::<Result<Vec<_>, _>>()
        .expect("stream v2 blocks");

    assert_eq!(in_memory, streamed);
    let kinds: Vec<_> = streamed.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        [BlockType::Trajectory, BlockType::Comment, BlockType::YawControl]
    );
    assert_eq!(streamed[2].payload, [0x01, 0x08, 0x02]);

    let yaw = streamed[2].yaw_setpoints().expect("decode yaw control block");
    assert!(yaw.auto_yaw());
    assert_eq!(yaw.yaw_offset(), 52.0);
    assert_eq!(
        streamed[0].yaw_setpoints().unwrap_err().kind(),
        ErrorKind::Type
    );
}

#[test]
fn detects_corruption_in_checksummed_fixture() {
    let mut data = fixture("simple-v2");
    let last = data.len() - 1;
    data[last] ^= 0xff;

    let err = ShowFileReader::from_bytes(&data).err().expect("corrupt file must not open");
    assert!(matches!(err, ShowError::ChecksumMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Format);

    // Streams only know the checksum once they reach the end.
    let results: Vec<_> = ShowFileReader::from_reader(Cursor::new(data.clone()))
        .expect("stream opens before the checksum is known")
        .blocks()
        .collect();
    assert!(matches!(
        results.last(),
        Some(Err(ShowError::ChecksumMismatch { .. }))
    ));

    let config = ShowConfig {
        validate_checksum: false,
        ..ShowConfig::default()
    };
    let blocks = ShowFileReader::from_bytes_with_config(&data, &config)
        .expect("validation disabled")
        .read_all_blocks()
        .expect("blocks are still readable");
    assert_eq!(blocks.len(), 3);
}

#[test]
fn rebuilding_fixture_blocks_reproduces_the_file() {
    for (name, config) in [
        ("simple-v1", ShowConfig::legacy()),
        ("simple-v2", ShowConfig::default()),
    ] {
        let data = fixture(name);
        let blocks = ShowFileReader::from_bytes(&data)
            .unwrap()
            .read_all_blocks()
            .unwrap();

        let mut builder = ShowFileBuilder::with_config(&config).unwrap();
        for block in &blocks {
            builder.add_raw_block(block).unwrap();
        }
        assert_eq!(builder.block_count(), blocks.len());
        assert_eq!(builder.into_bytes(), data, "rebuilt {name}");
    }
}

#[test]
fn trajectories_survive_a_trip_through_a_show_file() {
    for name in ["linear", "bezier"] {
        let json = flockwave_test_fixtures::trajectories::json(name).unwrap();
        let written = TrajectorySpecification::from_json_str(&json).unwrap();

        let mut builder = ShowFileBuilder::new(2).unwrap();
        builder.add_comment(name).unwrap();
        builder.add_trajectory(&written).unwrap();
        let bytes = builder.into_bytes();

        let blocks = ShowFileReader::from_bytes(&bytes)
            .unwrap()
            .read_all_blocks()
            .unwrap();
        assert_eq!(blocks[0].text().unwrap(), name);
        let decoded = blocks[1].trajectory().unwrap();
        assert_eq!(decoded.takeoff_time(), 0.0);

        let expected = TrajectoryPlayer::new(written);
        let actual = TrajectoryPlayer::new(decoded);
        assert_eq!(actual.end_time(), expected.end_time());
        for step in 0..300 {
            let t = f64::from(step) * 0.1;
            approx_point(actual.position_at(t), expected.position_at(t), 2e-3);
        }
    }
}

#[test]
fn long_takeoff_delay_survives_a_trip_through_a_show_file() {
    let written = TrajectorySpecification::new(
        1,
        vec![
            Waypoint::new(0.0, [0.0, 0.0, 0.0]),
            Waypoint::new(10.0, [0.0, 0.0, 5.0]),
        ],
        100.0,
    )
    .unwrap();

    let mut builder = ShowFileBuilder::new(2).unwrap();
    builder.add_trajectory(&written).expect("hold longer than one segment");
    let bytes = builder.into_bytes();
    let decoded = ShowFileReader::from_bytes(&bytes)
        .unwrap()
        .read_all_blocks()
        .unwrap()[0]
        .trajectory()
        .unwrap();
    assert_eq!(decoded.waypoints()[0].position, [0.0, 0.0, 0.0]);
    assert_eq!(decoded.waypoints().len(), 4);

    let expected = TrajectoryPlayer::new(written);
    let actual = TrajectoryPlayer::new(decoded);
    assert_eq!(actual.end_time(), 110.0);
    for step in 0..=120 {
        let t = f64::from(step);
        approx_point(actual.position_at(t), expected.position_at(t), 2e-3);
    }
    approx_point(actual.position_at(105.0), [0.0, 0.0, 2.5], 2e-3);
}

#[test]
fn rth_plan_and_yaw_control_blocks_round_trip() {
    let mut plan = RthPlan::new();
    plan.add_entry(RthPlanEntry::land(0)).unwrap();
    plan.add_entry(RthPlanEntry::go_to(30, [12.5, -40.0], 20).with_post_delay(5))
        .unwrap();
    plan.add_entry(RthPlanEntry::go_to(60, [12.5, -40.0], 20).with_post_delay(5))
        .unwrap();
    plan.add_entry(RthPlanEntry::go_to(90, [-3.25, 8.0], 25)).unwrap();

    let yaw = YawSetpointList::new(
        [
            YawSetpoint::new(0.0, 0.0),
            YawSetpoint::new(10.0, 90.0),
            YawSetpoint::new(30.0, 45.5),
        ],
        false,
        0.0,
    )
    .unwrap();

    let mut builder = ShowFileBuilder::new(2).unwrap();
    builder.add_rth_plan(&plan).unwrap();
    builder.add_yaw_setpoints(&yaw).unwrap();
    let bytes = builder.into_bytes();

    let blocks = ShowFileReader::from_bytes(&bytes)
        .unwrap()
        .read_all_blocks()
        .unwrap();
    let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(kinds, [BlockType::RthPlan, BlockType::YawControl]);

    // Scale 2 for the 40 m target, then a table of two distinct targets.
    assert_eq!(&blocks[0].payload[..3], b"\x02\x02\x00");
    assert_eq!(blocks[0].rth_plan().unwrap(), plan);
    assert_eq!(blocks[1].yaw_setpoints().unwrap(), yaw);
    assert_eq!(blocks[1].rth_plan().unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn empty_trajectory_is_stored_as_scale_byte() {
    let json = flockwave_test_fixtures::trajectories::json("empty").unwrap();
    let empty = TrajectorySpecification::from_json_str(&json).unwrap();

    let mut builder = ShowFileBuilder::new(1).unwrap();
    builder.add_trajectory(&empty).unwrap();
    assert_eq!(builder.into_bytes(), b"skyb\x01\x01\x01\x00\x01");
}

#[test]
fn rejects_foreign_files() {
    let inputs: [&[u8]; 4] = [b"", b"skyb", b"SKYB\x01", b"{\"version\": 1}"];
    for data in inputs {
        let err = ShowFileReader::from_bytes(data).err().expect("not a show file");
        assert_eq!(err.kind(), ErrorKind::Format, "input {data:?}");
    }

    let err = ShowFileReader::from_bytes(b"skyb\x07").err().unwrap();
    assert_eq!(err, ShowError::UnsupportedVersion { found: 7 });
}
