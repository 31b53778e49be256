//! # Anas Telemetry
//!
//! Structured logging for the live voice call client.
//!
//! ## Features
//! - Structured logging with `tracing`
//! - `RUST_LOG` driven filtering
//! - Human readable or JSON output
//! - Span helpers for calls, transport handshakes and teardown
//!
//! ## Usage
//!
//! ```rust
//! use anas_telemetry::{init_telemetry, info};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("anas")?;
//!     info!("ready to place a call");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{init_json_telemetry, init_telemetry};
pub use spans::*;
