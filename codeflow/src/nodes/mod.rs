//! Nodes of the main agent flow.
//!
//! Each node follows prepare / execute / record inside [`Node::step`]: it reads
//! what it needs from the [`SharedContext`], does its work, writes the outcome
//! back, and returns a [`Transition`].
//!
//! [`Node::step`]: crate::core::flow::Node::step
//! [`SharedContext`]: crate::context::SharedContext

pub mod actions;
pub mod decision;
pub mod edit;
pub mod response;

use crate::core::tools::ToolName;

/// Labels on main-flow edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// The planner selected a tool.
    Tool(ToolName),
    /// The planner selected `finish`.
    Finish,
    /// An action node recorded its result.
    Continue,
    /// The response is written; the run is over.
    Done,
}
