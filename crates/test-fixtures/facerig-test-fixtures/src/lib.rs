//! Face scenes and rig configs shared by the facerig tests and benches.
//!
//! Files sit under `fixtures/` at the workspace root; `fixtures/manifest.json`
//! maps a short key to each file, per kind. Loading is generic over
//! `DeserializeOwned`, so the core crate's types never leak in here.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The manifest is compiled in so a missing or renamed entry fails at the
/// call site, not on first filesystem access.
static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../fixtures/manifest.json"))
        .map_err(|e| format!("fixtures/manifest.json: {e}"))
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Scene,
    Config,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Scene => "scene",
            Kind::Config => "config",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    scenes: BTreeMap<String, Entry>,
    #[serde(default)]
    configs: BTreeMap<String, Entry>,
}

impl Manifest {
    fn section(&self, kind: Kind) -> &BTreeMap<String, Entry> {
        match kind {
            Kind::Scene => &self.scenes,
            Kind::Config => &self.configs,
        }
    }
}

/// A manifest entry: either a bare relative path or `{ path, description }`.
#[derive(Debug, Deserialize)]
#[serde(from = "RawEntry")]
struct Entry {
    path: String,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Bare(String),
    Described {
        path: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RawEntry> for Entry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Bare(path) => Entry {
                path,
                description: None,
            },
            RawEntry::Described { path, description } => Entry { path, description },
        }
    }
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST.as_ref().map_err(|e| anyhow!("{e}"))
}

fn entry(kind: Kind, key: &str) -> Result<&'static Entry> {
    manifest()?
        .section(kind)
        .get(key)
        .ok_or_else(|| anyhow!("no {kind} fixture named '{key}'"))
}

fn root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn keys(kind: Kind) -> Vec<String> {
    manifest()
        .map(|m| m.section(kind).keys().cloned().collect())
        .unwrap_or_default()
}

fn path(kind: Kind, key: &str) -> Result<PathBuf> {
    let path = root().join(&entry(kind, key)?.path);
    if !path.is_file() {
        bail!("{kind} fixture '{key}' points at {}, which is not a file", path.display());
    }
    Ok(path)
}

fn text(kind: Kind, key: &str) -> Result<String> {
    let path = path(kind, key)?;
    fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
}

fn parse<T: DeserializeOwned>(kind: Kind, key: &str) -> Result<T> {
    let raw = text(kind, key)?;
    serde_json::from_str(&raw).with_context(|| format!("{kind} fixture '{key}' does not parse"))
}

fn description(kind: Kind, key: &str) -> Result<Option<&'static str>> {
    Ok(entry(kind, key)?.description.as_deref())
}

/// Face scenes, loadable as `MemoryScene`.
pub mod scenes {
    use super::*;

    /// Scene keys in sorted order.
    pub fn keys() -> Vec<String> {
        super::keys(Kind::Scene)
    }

    pub fn json(key: &str) -> Result<String> {
        text(Kind::Scene, key)
    }

    pub fn load<T: DeserializeOwned>(key: &str) -> Result<T> {
        parse(Kind::Scene, key)
    }

    pub fn path(key: &str) -> Result<PathBuf> {
        super::path(Kind::Scene, key)
    }

    pub fn description(key: &str) -> Result<Option<&'static str>> {
        super::description(Kind::Scene, key)
    }
}

/// Rig configs, loadable as `RigConfig`.
pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        super::keys(Kind::Config)
    }

    pub fn json(key: &str) -> Result<String> {
        text(Kind::Config, key)
    }

    pub fn load<T: DeserializeOwned>(key: &str) -> Result<T> {
        parse(Kind::Config, key)
    }

    pub fn description(key: &str) -> Result<Option<&'static str>> {
        super::description(Kind::Config, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_is_valid_json() {
        for key in scenes::keys() {
            let _: serde_json::Value = scenes::load(&key).unwrap();
        }
        for key in configs::keys() {
            let _: serde_json::Value = configs::load(&key).unwrap();
        }
        assert_eq!(scenes::keys(), ["arkit_face", "deformer_stacks"]);
    }

    #[test]
    fn bare_and_described_entries_both_parse() {
        assert_eq!(configs::description("default").unwrap(), None);
        assert!(configs::description("studio").unwrap().is_some());
        assert!(scenes::path("arkit_face").unwrap().ends_with("scenes/arkit_face.json"));
    }

    #[test]
    fn unknown_key_names_the_kind() {
        let err = scenes::json("does-not-exist").unwrap_err();
        assert_eq!(err.to_string(), "no scene fixture named 'does-not-exist'");
        assert!(configs::load::<serde_json::Value>("arkit_face").is_err());
    }
}
