//! Per-entry metadata resolution
//!
//! Owner, group and mode of a source entry come from the entry itself,
//! overlaid with up to two sidecar override files:
//!
//! - files and symlinks: `.#_globparams` in the parent directory, then
//!   `.#<name>_params` next to the entry
//! - directories: `.#_params` inside the directory
//!
//! Later layers win field by field, and only for fields they set.

use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use keeper_fs::constants::file_params_name;
use keeper_fs::{ConfigFormat, ConfigStore, KeeperPath, io};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::accounts::{AccountDb, FALLBACK_ACCOUNT};
use crate::entry::{EntryKind, SourceEntry};
use crate::mode::Perms;
use crate::{Error, Result};

/// One override layer as written in a sidecar file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParameterOverride {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Extended permission value (rwx plus special bits)
    #[serde(default, deserialize_with = "deserialize_perms")]
    pub perms: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPerms {
    Number(u32),
    Text(String),
}

/// Integers are taken as-is (write `0o644` in YAML); strings are octal.
fn deserialize_perms<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<RawPerms>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawPerms::Number(n)) => n,
        Some(RawPerms::Text(text)) => parse_octal(&text).ok_or_else(|| {
            de::Error::custom(format!("invalid perms {text:?}, expected an octal value"))
        })?,
    };

    if value > 0o7777 {
        return Err(de::Error::custom(format!(
            "perms {value:o} out of range, expected at most 7777"
        )));
    }
    Ok(Some(value))
}

fn parse_octal(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text.strip_prefix("0o").unwrap_or(text);
    u32::from_str_radix(digits, 8).ok()
}

/// Owner, group and mode before name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryParams {
    pub owner: String,
    pub group: String,
    pub mode: u32,
}

impl EntryParams {
    /// Defaults for an entry with the given native mode: owned by root.
    pub fn native(mode: u32) -> Self {
        Self {
            owner: FALLBACK_ACCOUNT.to_string(),
            group: FALLBACK_ACCOUNT.to_string(),
            mode,
        }
    }

    /// Overlay override layers in order.
    ///
    /// Owner and group apply whenever set. Perms apply when set, except on
    /// symlinks whose mode is meaningless.
    pub fn merge<'a, I>(mut self, layers: I, kind: EntryKind) -> Self
    where
        I: IntoIterator<Item = &'a ParameterOverride>,
    {
        for layer in layers {
            if let Some(owner) = &layer.owner {
                self.owner.clone_from(owner);
            }
            if let Some(group) = &layer.group {
                self.group.clone_from(group);
            }
            if let Some(perms) = layer.perms
                && kind != EntryKind::Symlink
            {
                self.mode = Perms::decode(perms).apply_to(self.mode);
            }
        }
        self
    }
}

/// A source entry with concrete ownership and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub entry: SourceEntry,
    pub owner: String,
    pub group: String,
    pub uid: u32,
    pub gid: u32,
    /// Full `st_mode`: file type, rwx and special bits
    pub mode: u32,
}

impl ResolvedEntry {
    pub fn kind(&self) -> EntryKind {
        self.entry.kind
    }

    pub fn source(&self) -> &Path {
        &self.entry.source
    }

    pub fn target(&self) -> &Path {
        &self.entry.target
    }

    pub fn is_template(&self) -> bool {
        self.entry.is_template
    }
}

/// Resolves [`ResolvedEntry`] values from source entries and sidecars.
pub struct MetadataResolver<'a> {
    accounts: &'a dyn AccountDb,
    store: ConfigStore,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(accounts: &'a dyn AccountDb) -> Self {
        Self {
            accounts,
            store: ConfigStore::new(),
        }
    }

    /// Resolve ownership and mode for `entry`, whose `lstat` result is
    /// `meta`.
    ///
    /// # Errors
    ///
    /// Fails only if an override file exists but cannot be read or parsed.
    /// Unknown owner or group names fall back to `root`.
    pub fn resolve(&self, entry: SourceEntry, meta: &Metadata) -> Result<ResolvedEntry> {
        let mut layers = Vec::with_capacity(2);
        for path in override_paths(&entry) {
            if let Some(layer) = self.load_override(&path)? {
                debug!(path = %path.display(), ?layer, "applying override");
                layers.push(layer);
            }
        }

        let params = EntryParams::native(meta.mode()).merge(&layers, entry.kind);

        let (owner, uid) = self.lookup(&params.owner, |name| self.accounts.user_id(name), "owner");
        let (group, gid) = self.lookup(&params.group, |name| self.accounts.group_id(name), "group");

        Ok(ResolvedEntry {
            entry,
            owner,
            group,
            uid,
            gid,
            mode: params.mode,
        })
    }

    /// Read one override file. A missing or empty file sets nothing.
    pub fn load_override(&self, path: &Path) -> Result<Option<ParameterOverride>> {
        let Some(content) = io::read_text_optional(path).map_err(Error::Params)? else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            return Ok(Some(ParameterOverride::default()));
        }
        self.store
            .parse(path, &content, ConfigFormat::Yaml)
            .map(Some)
            .map_err(Error::Params)
    }

    fn lookup(
        &self,
        name: &str,
        find: impl Fn(&str) -> Option<u32>,
        field: &str,
    ) -> (String, u32) {
        if let Some(id) = find(name) {
            return (name.to_string(), id);
        }
        warn!(%name, field, "unknown account, falling back to {FALLBACK_ACCOUNT}");
        (FALLBACK_ACCOUNT.to_string(), find(FALLBACK_ACCOUNT).unwrap_or(0))
    }
}

/// Override files that apply to `entry`, lowest priority first.
pub fn override_paths(entry: &SourceEntry) -> Vec<PathBuf> {
    match entry.kind {
        EntryKind::Directory => vec![entry.source.join(KeeperPath::DirParams)],
        EntryKind::File | EntryKind::Symlink => {
            let dir = entry.source.parent().unwrap_or(Path::new("/"));
            vec![
                dir.join(KeeperPath::GlobalParams),
                dir.join(file_params_name(entry.target_name())),
            ]
        }
    }
}
