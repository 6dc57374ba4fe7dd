//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They parse planner replies,
//! validate and apply change sets in memory, render history and directory
//! listings, and drive the node graph. Everything here is testable without a
//! filesystem or an LLM.

pub mod change_set;
pub mod decision;
pub mod flow;
pub mod history;
pub mod listing;
pub mod tools;
pub mod types;
mod yaml;
