//! # Hash Server Library
//!
//! A small HTTP service that accepts a secret, hands back a numeric id, and
//! after a fixed delay serves the SHA-512 digest of that secret by id. It also
//! reports aggregate timing over every accepted submission.
//!
//! ## Architecture
//!
//! - [`error`] - Error type shared by the store, handlers and server
//! - [`store`] - In-memory record store with id allocation and the age gate
//! - [`stats`] - Running submission count and cumulative handling time
//! - [`crypto`] - The fixed digest (SHA-512, URL-safe padded base64)
//! - [`server`] - Hyper-based HTTP transport, configuration and handlers
//!
//! ## Endpoints
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | POST | `/hash` | form field `password`, returns the new id |
//! | GET | `/hash/{id}` | digest once the record is at least 5 seconds old |
//! | GET | `/stats` | `{"total": N, "average": micros}` |
//! | POST | `/shutdown` | graceful shutdown |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hash_server::{start_server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".parse()?,
//!         ..ServerConfig::default()
//!     };
//!
//!     start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! [`RecordStore`] and [`StatsAccumulator`] are shared between connection
//! tasks through `Arc` and each guard their state with a single lock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod crypto;
pub mod error;
pub mod server;
pub mod stats;
pub mod store;

pub use error::{HashServerError, Result};
pub use server::{start_server, HashServer, ServerConfig, ShutdownHandle};
pub use stats::{StatsAccumulator, StatsSnapshot};
pub use store::{Clock, ManualClock, Record, RecordStore, SystemClock};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address for the server
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Maximum request body size in bytes (1MB)
///
/// Secrets are short form values; anything larger is rejected with 413.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Timeout for individual request processing in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Minimum age in seconds before a record's digest is served
///
/// Fixed policy, not configurable. Retrievals of younger records are refused
/// with [`HashServerError::NotReady`].
pub const MIN_RECORD_AGE_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_reasonable() {
        assert!(MAX_PAYLOAD_SIZE >= 1024);
        assert!(MAX_PAYLOAD_SIZE < 100 * 1024 * 1024);
        assert!(REQUEST_TIMEOUT_MS > 1000);
        assert!(REQUEST_TIMEOUT_MS < 300_000);
        assert_eq!(MIN_RECORD_AGE_SECS, 5);
        assert_eq!(DEFAULT_PORT, 8080);
    }

    #[test]
    fn test_version_is_valid() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
