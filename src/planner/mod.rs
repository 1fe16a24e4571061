//! Plan-execution loop
//!
//! Turns a natural-language goal into a sequence of shell commands and
//! browser steps, feeding each result back to the model until the goal is
//! reached or the step budget runs out.

pub mod action;
pub mod completion;
pub mod context;
pub mod outcome;
pub mod prompt;
pub mod runner;

pub use action::{Action, parse_action, parse_actions};
pub use completion::{CompletionCheck, KeywordCompletionCheck, ModelCompletionCheck, Verdict, parse_verdict};
pub use context::{ActionKind, ActionRecord, ContextStore};
pub use outcome::{LoopResult, LoopStatus};
pub use runner::{PlanRunner, dispatch};
