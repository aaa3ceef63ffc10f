//! userdex: HTTP gateway for user documents kept in a search engine
//!
//! The gateway holds no state of its own. Every request is forwarded to a
//! [`UserStore`] and the outcome is mapped to an HTTP status.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{User, UserKey};
pub use store::{MemoryUserStore, UserStore};
