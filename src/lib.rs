//! Taskpilot - a command-line agent that works through goals with a shell,
//! a browser and a language model.
//!
//! The core is the plan-execution loop in [`planner`]: the model proposes one
//! action at a time, the action runs, and its result is fed back until the
//! goal is reached or the step budget is spent.

pub mod browser;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod planner;
pub mod session;
pub mod text;

pub use error::{PilotError, Result};
pub use session::AgentSession;
