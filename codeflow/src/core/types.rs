//! Shared data types for the agent history.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::core::tools::ToolName;

/// Tool parameters exactly as the planner supplied them.
pub type Params = serde_yaml::Mapping;

/// One line matched by `grep_search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrepMatch {
    /// Path relative to the search root, `/`-separated.
    pub file: String,
    /// 1-indexed line number.
    pub line: usize,
    pub content: String,
}

/// Outcome of one tool invocation (or of one rejected planner reply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResult {
    ReadFile {
        success: bool,
        content: String,
        error: Option<String>,
    },
    EditFile {
        success: bool,
        /// Number of line-range replacements persisted to disk.
        operations: usize,
        reasoning: String,
        error: Option<String>,
    },
    DeleteFile {
        success: bool,
        error: Option<String>,
    },
    GrepSearch {
        success: bool,
        matches: Vec<GrepMatch>,
        error: Option<String>,
    },
    ListDir {
        success: bool,
        tree_visualization: String,
        error: Option<String>,
    },
    /// A planner reply that could not be turned into a tool call.
    DecisionRejected { error: String },
}

impl ToolResult {
    pub fn success(&self) -> bool {
        match self {
            ToolResult::ReadFile { success, .. }
            | ToolResult::EditFile { success, .. }
            | ToolResult::DeleteFile { success, .. }
            | ToolResult::GrepSearch { success, .. }
            | ToolResult::ListDir { success, .. } => *success,
            ToolResult::DecisionRejected { .. } => false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolResult::ReadFile { error, .. }
            | ToolResult::EditFile { error, .. }
            | ToolResult::DeleteFile { error, .. }
            | ToolResult::GrepSearch { error, .. }
            | ToolResult::ListDir { error, .. } => error.as_deref(),
            ToolResult::DecisionRejected { error } => Some(error),
        }
    }

    /// A failed result of the right shape for `tool`.
    pub fn failed(tool: ToolName, error: impl Into<String>) -> Self {
        let error = Some(error.into());
        match tool {
            ToolName::ReadFile => ToolResult::ReadFile {
                success: false,
                content: String::new(),
                error,
            },
            ToolName::EditFile => ToolResult::EditFile {
                success: false,
                operations: 0,
                reasoning: String::new(),
                error,
            },
            ToolName::DeleteFile => ToolResult::DeleteFile {
                success: false,
                error,
            },
            ToolName::GrepSearch => ToolResult::GrepSearch {
                success: false,
                matches: Vec::new(),
                error,
            },
            ToolName::ListDir => ToolResult::ListDir {
                success: false,
                tree_visualization: String::new(),
                error,
            },
        }
    }
}

/// What a history entry records: a tool invocation or a rejected planner reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryTool {
    Tool(ToolName),
    RejectedDecision,
}

impl HistoryTool {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryTool::Tool(tool) => tool.as_str(),
            HistoryTool::RejectedDecision => "invalid_decision",
        }
    }
}

impl fmt::Display for HistoryTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HistoryTool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One step of the run. Appended exactly once per attempted tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub tool: HistoryTool,
    pub reason: String,
    pub params: Params,
    pub result: ToolResult,
    /// RFC 3339, UTC, second precision.
    pub timestamp: String,
}
