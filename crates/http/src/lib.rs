//! Medicat HTTP client
//!
//! Authenticated REST client for the medicine catalog backend. Requests carry
//! the stored access credential, expired credentials are refreshed once and
//! the request replayed, and an unrecoverable session is cleared.

pub mod client;
pub mod types;

pub use client::{CatalogClient, CatalogClientBuilder, ClientError, Navigator};
