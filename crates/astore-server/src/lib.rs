//! HTTP server for the artifact store.
//!
//! Exposes the engine operations as JSON endpoints, the browser friendly
//! download and listing paths, and a blob gateway for the in-memory blob
//! store. Callers are identified by a header set by a trusted proxy.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{Identity, IdentityProvider, TrustedHeaderIdentity};
pub use config::ServerConfig;
pub use error::{ErrorBody, ServerError, ServerResult};
pub use handler::{AppState, DownloadParams};
pub use server::AstoreServer;
