//! userdex-es: Elasticsearch adapter for userdex
//!
//! [`ElasticsearchClient`] speaks the engine's REST API over a pooled
//! `reqwest` client. [`ElasticsearchUserStore`] implements
//! [`userdex::UserStore`] on top of it for a single index.
//!
//! Supported engines: Elasticsearch 7.x/8.x and REST-compatible forks.

pub mod client;
pub mod error;
mod metrics;
pub mod store;

pub use client::{AuthMethod, ClusterInfo, ElasticsearchClient};
pub use error::{EsError, Result};
pub use store::ElasticsearchUserStore;
