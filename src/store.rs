//! File-backed key-value store standing in for the abstract persistence
//! collaborator the specification leaves external (§5 "out of scope").
//!
//! One file per key, written in full on every `put`. This is adequate for
//! the account volumes this server is built for and keeps the module free
//! of any database dependency.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Name reserved for the monotonically increasing user id counter.
pub const USER_PK_KEY: &str = "USER_PK";

/// A minimal get/put byte store, keyed by name.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// A [`KeyValueStore`] backed by one regular file per key under `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize(key))
    }

    /// Read and parse the `USER_PK` counter, defaulting to 0 if unset.
    pub fn read_user_pk(&self) -> Result<u32> {
        match self.get(USER_PK_KEY)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).context("USER_PK is not valid UTF-8")?;
                text.trim()
                    .parse()
                    .context("USER_PK does not hold a valid integer")
            }
            None => Ok(0),
        }
    }

    /// Persist the `USER_PK` counter.
    pub fn write_user_pk(&self, value: u32) -> Result<()> {
        self.put(USER_PK_KEY, value.to_string().as_bytes())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading key {key}")),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).with_context(|| format!("writing key {key}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("persisting key {key}"))
    }
}

/// Keys are used as bare filenames; this keeps stray path separators from
/// escaping the store directory.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c == '/' || c == '\\' || c == '.' { '_' } else { c })
        .collect()
}
