//! An LLM-driven coding agent built on a small node-graph engine.
//!
//! A run starts at the planner, which asks the LLM to pick one tool per step.
//! Each tool node acts on the working directory and appends one history entry;
//! the planner sees that history on its next turn. `edit_file` is itself a
//! three-node sub-flow that plans line-range replacements and applies them
//! bottom-up. When the planner chooses `finish`, or a fatal error ends the run,
//! the response node summarizes what happened.
//!
//! - **[`core`]**: Pure logic (the flow engine, decision and plan parsing,
//!   history rendering). No I/O.
//! - **[`io`]**: Filesystem access, the LLM subprocess, config, and prompts.
//! - **[`nodes`]**: The graph's nodes, which combine the two.
//! - **[`run`]**: Builds the main graph and runs a request.

pub mod context;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod nodes;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
