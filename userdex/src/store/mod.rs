//! The search-engine capability the gateway delegates to

pub mod memory;

pub use memory::MemoryUserStore;

use crate::model::User;
use crate::Result;
use async_trait::async_trait;

/// Whether `name` can address a collection. Empty names and the dot
/// segments `.` and `..` cannot be expressed as a URL path segment.
pub fn is_valid_index_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..")
}

/// Document operations on the configured user collection.
///
/// Implementations own the connection to the backing engine. They are built
/// once at startup and shared across requests behind an `Arc`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the named collection unless it already exists.
    async fn create_index(&self, name: &str) -> Result<()>;

    /// Insert or fully replace the document stored under `user.key`.
    async fn upsert(&self, user: &User) -> Result<()>;

    /// Fetch a document by key. `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<User>>;

    /// Fetch every document in the collection.
    async fn get_all(&self) -> Result<Vec<User>>;

    /// Delete a document by key. Returns `false` when nothing was deleted.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every document in the collection and return how many were removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Check that the backing engine is reachable.
    async fn ping(&self) -> Result<()>;

    /// Human-readable backend name
    fn backend_name(&self) -> &str;
}
