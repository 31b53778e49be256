//! Terminal front-end for live voice calls.
//!
//! `anas call` opens the default microphone and speaker, connects to the live
//! endpoint and shows the call status until it ends. Typed lines are sent as
//! text turns.

pub mod cli;
pub mod config;
pub mod console;
