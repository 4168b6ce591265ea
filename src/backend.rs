//! Engine contract
//!
//! The driver talks to storage only through [`StorageEngine`]. The crate's
//! own [`Engine`](crate::engine::Engine) implements it; tests plug in fakes.

use std::path::Path;

use crate::config::EngineOptions;
use crate::error::Result;

/// A key-value engine the harness can load and measure
pub trait StorageEngine: Sized {
    /// Name of the statistics property printed after each measurement
    const STATS_PROPERTY: &'static str;

    /// Open (creating if needed) the database at `path`
    fn open(options: EngineOptions, path: &Path) -> Result<Self>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// `Ok(None)` for absent keys
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Engine-defined textual property, `None` if unknown
    fn property(&self, name: &str) -> Option<String>;

    fn close(self) -> Result<()>;

    /// Remove every file of the database at `path`. Absent path is fine.
    fn destroy(path: &Path) -> Result<()>;
}
