//! Seedload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the seedload workspace.
//!
//! - **Error Handling**: common error type and result alias
//! - **Checksums**: SHA3-256 content digests used to detect changed source files
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` environment variables
//!
//! # Example
//!
//! ```no_run
//! use seedload_common::checksum::sha3_hex;
//!
//! let digest = sha3_hex(b"code,name\nMSK,Maersk\n");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
