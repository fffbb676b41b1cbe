//! Shared show and trajectory fixtures for the workspace tests.
//!
//! Every fixture is listed in `fixtures/manifest.json` under a short name;
//! tests refer to fixtures by that name only.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

/// Section of the manifest a fixture is listed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Trajectory,
    Show,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Trajectory => "trajectory",
            Kind::Show => "show",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    trajectories: BTreeMap<String, PathBuf>,
    shows: BTreeMap<String, ShowEntry>,
}

/// A show fixture is either a bare path (JSON show specifications) or a
/// path plus what the binary file header declares.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ShowEntry {
    Spec(PathBuf),
    File {
        path: PathBuf,
        #[serde(default)]
        checksum: bool,
    },
}

impl ShowEntry {
    fn path(&self) -> &Path {
        match self {
            ShowEntry::Spec(path) | ShowEntry::File { path, .. } => path,
        }
    }
}

/// A manifest entry resolved to a file on disk.
struct Fixture<'a> {
    kind: Kind,
    name: &'a str,
    path: PathBuf,
}

impl Fixture<'_> {
    fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| {
            format!(
                "{} fixture '{}' is listed but {} cannot be read",
                self.kind,
                self.name,
                self.path.display()
            )
        })
    }

    fn read_text(&self) -> Result<String> {
        let bytes = self.read()?;
        String::from_utf8(bytes)
            .with_context(|| format!("{} fixture '{}' is not UTF-8 text", self.kind, self.name))
    }
}

impl Manifest {
    fn root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
    }

    fn names(&self, kind: Kind) -> Vec<&str> {
        match kind {
            Kind::Trajectory => self.trajectories.keys().map(String::as_str).collect(),
            Kind::Show => self.shows.keys().map(String::as_str).collect(),
        }
    }

    fn unknown(&self, kind: Kind, name: &str) -> anyhow::Error {
        anyhow::anyhow!(
            "no {kind} fixture named '{name}' in the manifest (known: {})",
            self.names(kind).join(", ")
        )
    }

    fn trajectory<'a>(&self, name: &'a str) -> Result<Fixture<'a>> {
        let rel = self
            .trajectories
            .get(name)
            .ok_or_else(|| self.unknown(Kind::Trajectory, name))?;
        Ok(Fixture {
            kind: Kind::Trajectory,
            name,
            path: Self::root().join(rel),
        })
    }

    fn show_entry(&self, name: &str) -> Result<&ShowEntry> {
        self.shows
            .get(name)
            .ok_or_else(|| self.unknown(Kind::Show, name))
    }

    fn show<'a>(&self, name: &'a str) -> Result<Fixture<'a>> {
        let entry = self.show_entry(name)?;
        Ok(Fixture {
            kind: Kind::Show,
            name,
            path: Self::root().join(entry.path()),
        })
    }
}

pub mod trajectories {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST
            .names(Kind::Trajectory)
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// JSON text of a trajectory specification.
    pub fn json(name: &str) -> Result<String> {
        MANIFEST.trajectory(name)?.read_text()
    }
}

pub mod shows {
    use super::*;

    /// Raw contents of a binary show file or a JSON show specification.
    pub fn bytes(name: &str) -> Result<Vec<u8>> {
        MANIFEST.show(name)?.read()
    }

    pub fn json(name: &str) -> Result<String> {
        let fixture = MANIFEST.show(name)?;
        if matches!(MANIFEST.show_entry(name)?, ShowEntry::File { .. }) {
            bail!("show fixture '{name}' is a binary show file, not a JSON specification");
        }
        fixture.read_text()
    }

    /// Whether the fixture is a show file with a CRC32 in its header.
    pub fn has_checksum(name: &str) -> Result<bool> {
        match MANIFEST.show_entry(name)? {
            ShowEntry::File { checksum, .. } => Ok(*checksum),
            ShowEntry::Spec(_) => {
                bail!("show fixture '{name}' is a JSON specification without a file header")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_fixture_exists() {
        for name in MANIFEST.names(Kind::Trajectory) {
            assert!(MANIFEST.trajectory(name).unwrap().path.is_file(), "{name}");
        }
        for name in MANIFEST.names(Kind::Show) {
            assert!(MANIFEST.show(name).unwrap().path.is_file(), "{name}");
        }
    }

    #[test]
    fn unknown_names_list_the_known_ones() {
        let err = trajectories::json("spiral").unwrap_err().to_string();
        assert!(err.contains("no trajectory fixture named 'spiral'"), "{err}");
        assert!(err.contains("bezier, empty, linear"), "{err}");

        let err = shows::bytes("missing").unwrap_err().to_string();
        assert!(err.starts_with("no show fixture"), "{err}");
    }

    #[test]
    fn show_entries_know_their_shape() {
        assert!(shows::has_checksum("simple-v2").unwrap());
        assert!(!shows::has_checksum("simple-v1").unwrap());
        assert!(shows::has_checksum("drone").is_err());
        assert!(shows::json("simple-v1").is_err());
        assert!(shows::json("drone").unwrap().contains("trajectory"));
    }
}
