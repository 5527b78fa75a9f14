//! An out-of-the-box agent that answers with the help of web search, a
//! text-generation proxy and a JavaScript sandbox.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring agent functionality into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod session;
pub mod tools;

pub use config::{ConfigError, Settings};
pub use session::{SYSTEM_PROMPT, Session, SessionBuilder};

/// Re-exports of [`relay_agent_core`] crate.
pub mod core {
    pub use relay_agent_core::*;
}
