//! Agent runtime: the orchestration loop that turns a conversation into protocol actions.
//!
//! Each turn the loop consults a [`DecisionOracle`], dispatches the selected action through the
//! [`ActionCatalog`], appends the resulting step to the conversation and asks the continuation
//! predicate whether the order is complete. Per-action failures are folded into the conversation
//! as error observations; only an unavailable oracle (or the turn limit) ends a run as a failure.
//!
//! # Key Types
//!
//! - `OrchestrationLoop` - blocking and streaming runs (see `runtime`)
//! - `ActionCatalog` - name to handler lookup bound to a gateway (see `catalog`)
//! - `DecisionOracle` - pluggable decision source; `ChatCompletionsOracle` talks to
//!   OpenAI-compatible endpoints, `ScriptedOracle` replays a fixed script

pub mod catalog;
pub mod llm;
pub mod runtime;
pub mod scripted;
pub mod testing;

pub use catalog::{ActionCatalog, ActionDefinition, ActionHandler};
pub use llm::{ChatCompletionsOracle, Decision, DecisionOracle};
pub use runtime::{OrchestrationLoop, RunOutcome, TurnUpdate, DEFAULT_MAX_TURNS};
pub use scripted::ScriptedOracle;
