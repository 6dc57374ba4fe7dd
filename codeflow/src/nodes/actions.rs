//! Action nodes: run the pending tool call and record exactly one history entry.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{info, instrument};

use crate::context::SharedContext;
use crate::core::flow::Node;
use crate::core::tools::{
    DeleteFileParams, GrepSearchParams, ListDirParams, ReadFileParams, ToolCall, ToolName,
};
use crate::core::types::ToolResult;
use crate::io::files::{delete_file, read_numbered, resolve_path};
use crate::io::listing::list_dir;
use crate::io::search::{SearchRequest, grep_search};
use crate::nodes::Transition;

/// A tool implementation.
///
/// Tool-level failures belong in the returned [`ToolResult`]; an `Err` is fatal
/// to the run.
pub trait Action {
    type Params;
    const TOOL: ToolName;

    /// Extract this action's params from a routed call.
    fn params(call: ToolCall) -> Option<Self::Params>;

    fn execute(&self, working_dir: &Path, params: &Self::Params) -> Result<ToolResult>;
}

/// Wraps an [`Action`] as a main-flow node.
pub struct ActionNode<A> {
    action: A,
}

impl<A: Action> ActionNode<A> {
    pub fn new(action: A) -> Self {
        Self { action }
    }
}

impl<A: Action> Node<SharedContext, Transition> for ActionNode<A> {
    fn name(&self) -> &'static str {
        A::TOOL.as_str()
    }

    #[instrument(skip_all, fields(tool = %A::TOOL))]
    fn step(&self, ctx: &mut SharedContext) -> Result<Transition> {
        let pending = ctx.take_pending(A::TOOL)?;
        let params = A::params(pending.call)
            .ok_or_else(|| anyhow!("pending call does not carry {} params", A::TOOL))?;
        let result = self.action.execute(ctx.working_dir(), &params)?;
        info!(success = result.success(), error = result.error(), "tool finished");
        ctx.record_tool(A::TOOL, pending.reason, pending.params, result);
        Ok(Transition::Continue)
    }
}

pub struct ReadFileAction {
    pub max_lines: usize,
}

impl Action for ReadFileAction {
    type Params = ReadFileParams;
    const TOOL: ToolName = ToolName::ReadFile;

    fn params(call: ToolCall) -> Option<ReadFileParams> {
        match call {
            ToolCall::ReadFile(params) => Some(params),
            _ => None,
        }
    }

    fn execute(&self, working_dir: &Path, params: &ReadFileParams) -> Result<ToolResult> {
        let path = resolve_path(working_dir, &params.target_file);
        let result = match read_numbered(
            &path,
            &params.target_file,
            params.start_line_one_indexed,
            params.end_line_one_indexed,
            self.max_lines,
        ) {
            Ok(content) => ToolResult::ReadFile {
                success: true,
                content,
                error: None,
            },
            Err(err) => ToolResult::failed(Self::TOOL, format!("{err:#}")),
        };
        Ok(result)
    }
}

pub struct GrepSearchAction {
    pub max_results: usize,
}

impl Action for GrepSearchAction {
    type Params = GrepSearchParams;
    const TOOL: ToolName = ToolName::GrepSearch;

    fn params(call: ToolCall) -> Option<GrepSearchParams> {
        match call {
            ToolCall::GrepSearch(params) => Some(params),
            _ => None,
        }
    }

    fn execute(&self, working_dir: &Path, params: &GrepSearchParams) -> Result<ToolResult> {
        let request = SearchRequest {
            query: &params.query,
            case_sensitive: params.case_sensitive,
            include_pattern: params.include_pattern.as_deref(),
            exclude_pattern: params.exclude_pattern.as_deref(),
            max_results: self.max_results,
        };
        let result = match grep_search(working_dir, &request) {
            Ok(matches) => ToolResult::GrepSearch {
                success: true,
                matches,
                error: None,
            },
            Err(err) => ToolResult::failed(Self::TOOL, format!("{err:#}")),
        };
        Ok(result)
    }
}

pub struct ListDirAction {
    pub max_files: usize,
}

impl Action for ListDirAction {
    type Params = ListDirParams;
    const TOOL: ToolName = ToolName::ListDir;

    fn params(call: ToolCall) -> Option<ListDirParams> {
        match call {
            ToolCall::ListDir(params) => Some(params),
            _ => None,
        }
    }

    fn execute(&self, working_dir: &Path, params: &ListDirParams) -> Result<ToolResult> {
        let path = resolve_path(working_dir, &params.relative_workspace_path);
        let result = match list_dir(&path, &params.relative_workspace_path, self.max_files) {
            Ok(tree_visualization) => ToolResult::ListDir {
                success: true,
                tree_visualization,
                error: None,
            },
            Err(err) => ToolResult::failed(Self::TOOL, format!("{err:#}")),
        };
        Ok(result)
    }
}

pub struct DeleteFileAction;

impl Action for DeleteFileAction {
    type Params = DeleteFileParams;
    const TOOL: ToolName = ToolName::DeleteFile;

    fn params(call: ToolCall) -> Option<DeleteFileParams> {
        match call {
            ToolCall::DeleteFile(params) => Some(params),
            _ => None,
        }
    }

    fn execute(&self, working_dir: &Path, params: &DeleteFileParams) -> Result<ToolResult> {
        let path = resolve_path(working_dir, &params.target_file);
        let result = match delete_file(&path, &params.target_file) {
            Ok(()) => ToolResult::DeleteFile {
                success: true,
                error: None,
            },
            Err(err) => ToolResult::failed(Self::TOOL, format!("{err:#}")),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::context::PendingCall;
    use crate::core::types::{HistoryTool, Params};
    use crate::test_support::Workspace;

    fn pending(call: ToolCall) -> PendingCall {
        PendingCall {
            call,
            reason: "test".to_string(),
            params: Params::new(),
        }
    }

    /// Missing files are a recorded failure, not a run error.
    #[test]
    fn read_missing_file_records_failure() {
        let ws = Workspace::new();
        let mut ctx = SharedContext::new("q", ws.path());
        ctx.set_pending(pending(ToolCall::ReadFile(ReadFileParams {
            target_file: "missing.txt".to_string(),
            start_line_one_indexed: None,
            end_line_one_indexed: None,
        })));

        let node = ActionNode::new(ReadFileAction { max_lines: 250 });
        assert_eq!(node.step(&mut ctx).expect("step"), Transition::Continue);

        let entry = &ctx.history()[0];
        assert_eq!(entry.tool, HistoryTool::Tool(ToolName::ReadFile));
        assert!(!entry.result.success());
        assert!(entry.result.error().expect("error").contains("does not exist"));
    }

    #[test]
    fn read_returns_numbered_content() {
        let ws = Workspace::new();
        ws.write("notes.txt", "alpha\nbeta\n");
        let result = ReadFileAction { max_lines: 250 }
            .execute(
                ws.path(),
                &ReadFileParams {
                    target_file: "notes.txt".to_string(),
                    start_line_one_indexed: Some(2),
                    end_line_one_indexed: None,
                },
            )
            .expect("execute");
        assert_eq!(
            result,
            ToolResult::ReadFile {
                success: true,
                content: "2: beta\n".to_string(),
                error: None,
            }
        );
    }

    #[test]
    fn grep_with_no_matches_is_success() {
        let ws = Workspace::new();
        ws.write("a.txt", "nothing here\n");
        let result = GrepSearchAction { max_results: 50 }
            .execute(
                ws.path(),
                &GrepSearchParams {
                    query: "absent_token".to_string(),
                    include_pattern: None,
                    exclude_pattern: None,
                    case_sensitive: false,
                },
            )
            .expect("execute");
        assert_eq!(
            result,
            ToolResult::GrepSearch {
                success: true,
                matches: Vec::new(),
                error: None,
            }
        );
    }

    #[test]
    fn grep_with_invalid_regex_fails() {
        let ws = Workspace::new();
        let result = GrepSearchAction { max_results: 50 }
            .execute(
                ws.path(),
                &GrepSearchParams {
                    query: "(".to_string(),
                    include_pattern: None,
                    exclude_pattern: None,
                    case_sensitive: false,
                },
            )
            .expect("execute");
        assert!(!result.success());
    }

    #[test]
    fn list_empty_directory_succeeds_with_empty_tree() {
        let ws = Workspace::new();
        let result = ListDirAction { max_files: 10 }
            .execute(
                ws.path(),
                &ListDirParams {
                    relative_workspace_path: ".".to_string(),
                },
            )
            .expect("execute");
        assert_eq!(
            result,
            ToolResult::ListDir {
                success: true,
                tree_visualization: String::new(),
                error: None,
            }
        );
    }

    #[test]
    fn delete_removes_file_and_reports_missing() {
        let ws = Workspace::new();
        ws.write("old.txt", "bye");
        let params = DeleteFileParams {
            target_file: "old.txt".to_string(),
        };
        let result = DeleteFileAction.execute(ws.path(), &params).expect("execute");
        assert!(result.success());
        assert!(!ws.path().join("old.txt").exists());

        let result = DeleteFileAction.execute(ws.path(), &params).expect("execute");
        assert!(!result.success());
        assert!(fs::read_dir(ws.path()).expect("read_dir").next().is_none());
    }

    #[test]
    fn mismatched_pending_call_is_an_error() {
        let ws = Workspace::new();
        let mut ctx = SharedContext::new("q", ws.path());
        ctx.set_pending(pending(ToolCall::DeleteFile(DeleteFileParams {
            target_file: "x".to_string(),
        })));
        let node = ActionNode::new(ListDirAction { max_files: 10 });
        assert!(node.step(&mut ctx).is_err());
        assert!(ctx.history().is_empty());
    }
}
