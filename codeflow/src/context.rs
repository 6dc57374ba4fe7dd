//! Per-run state shared by the main-flow nodes.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use chrono::{SecondsFormat, Utc};

use crate::core::tools::{ToolCall, ToolName};
use crate::core::types::{HistoryEntry, HistoryTool, Params, ToolResult};

/// The planner's routed decision, waiting for its action node.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub call: ToolCall,
    pub reason: String,
    pub params: Params,
}

/// State for one run.
///
/// The query and working directory are fixed at creation. History only grows, and
/// the response is written once.
#[derive(Debug)]
pub struct SharedContext {
    user_query: String,
    working_dir: PathBuf,
    history: Vec<HistoryEntry>,
    pending: Option<PendingCall>,
    finish_reason: Option<String>,
    failure: Option<String>,
    response: Option<String>,
}

impl SharedContext {
    pub fn new(user_query: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_query: user_query.into(),
            working_dir: working_dir.into(),
            history: Vec::new(),
            pending: None,
            finish_reason: None,
            failure: None,
            response: None,
        }
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Append the outcome of a tool invocation.
    pub fn record_tool(&mut self, tool: ToolName, reason: String, params: Params, result: ToolResult) {
        self.record(HistoryEntry {
            tool: HistoryTool::Tool(tool),
            reason,
            params,
            result,
            timestamp: now_timestamp(),
        });
    }

    pub fn set_pending(&mut self, pending: PendingCall) {
        self.pending = Some(pending);
    }

    /// Take the pending call, which must be for `tool`.
    pub fn take_pending(&mut self, tool: ToolName) -> Result<PendingCall> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("no pending call for {tool}"))?;
        let routed = pending.call.tool();
        if routed != tool {
            bail!("pending call is for {routed}, not {tool}");
        }
        Ok(pending)
    }

    pub fn set_finish_reason(&mut self, reason: String) {
        self.finish_reason = Some(reason);
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn set_failure(&mut self, reason: String) {
        self.failure = Some(reason);
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn set_response(&mut self, response: String) -> Result<()> {
        if self.response.is_some() {
            bail!("response already set");
        }
        self.response = Some(response);
        Ok(())
    }

    pub fn into_parts(self) -> (Option<String>, Vec<HistoryEntry>) {
        (self.response, self.history)
    }
}

/// Current UTC time as RFC 3339 with second precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
