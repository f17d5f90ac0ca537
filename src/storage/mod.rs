mod http;
mod local;

pub use http::*;
pub use local::*;

use async_trait::async_trait;

use crate::Result;

/// Authenticated read access to a managed remote file store
///
/// The tiler only ever reads through this handle, so one instance can be shared
/// across any number of tiling calls.
#[async_trait]
pub trait StorageAccess: Send + Sync {
    /// Get the storage type identifier (e.g. "local", "http")
    fn storage_type(&self) -> &'static str;

    /// Fetch the full content of a file addressed relative to the store root
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Check whether the store can be reached
    async fn test_availability(&self) -> Result<()>;
}
