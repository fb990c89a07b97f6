use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{StoreError, StoreResult},
    tag::CommandTag,
};

pub const COMMANDS_FILE: &str = "commands.json";
pub const ALIASES_FILE: &str = "aliases.json";

/// Alias name -> canonical command name.
pub type AliasMap = BTreeMap<String, String>;

/// Everything the store holds, in the order tags were created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tags: Vec<CommandTag>,
    pub aliases: AliasMap,
}

/// Durable mirror of the registry's tags and aliases. Saves are wholesale.
pub trait TagStore: Send {
    /// # Errors
    ///
    /// Fails when the backing storage cannot be read or does not parse.
    fn load(&self) -> StoreResult<Snapshot>;

    /// # Errors
    ///
    /// Fails when the backing storage cannot be written.
    fn save(&self, tags: &[CommandTag], aliases: &AliasMap) -> StoreResult<()>;
}

/// Two JSON documents in one directory: `commands.json` and `aliases.json`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn commands_path(&self) -> PathBuf {
        self.dir.join(COMMANDS_FILE)
    }

    fn aliases_path(&self) -> PathBuf {
        self.dir.join(ALIASES_FILE)
    }
}

impl TagStore for JsonStore {
    fn load(&self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            tags: read_document(&self.commands_path())?.unwrap_or_default(),
            aliases: read_document(&self.aliases_path())?.unwrap_or_default(),
        })
    }

    fn save(&self, tags: &[CommandTag], aliases: &AliasMap) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        write_document(&self.commands_path(), tags)?;
        write_document(&self.aliases_path(), aliases)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_owned(),
            source,
        })
}

// Written beside the target and renamed over it, so readers never see a half-written file.
fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let data = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_owned(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| StoreError::Io {
        path: path.to_owned(),
        source,
    };
    fs::write(&tmp, data).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
