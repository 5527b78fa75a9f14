//! Core logic including the agent loop, tool dispatch and conversation
//! state.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT,
    RunError, RunSummary, StopReason,
};
