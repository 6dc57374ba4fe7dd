//! The `edit_file` tool: a three-node sub-flow.
//!
//! `read_target` loads the file, `plan_edit` asks the LLM to turn the requested
//! edit into validated line ranges, and `apply_changes` applies them bottom-up
//! and writes the file atomically. Each invocation starts from a fresh
//! [`EditState`], so nothing leaks between edits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::change_set::{ChangeSet, TextBuffer, apply_change_set, parse_change_set};
use crate::core::flow::{Flow, FlowBuilder, Node};
use crate::core::tools::{EditFileParams, ToolCall, ToolName};
use crate::core::types::ToolResult;
use crate::io::files::{read_text, resolve_path, write_atomic};
use crate::io::llm::Llm;
use crate::io::prompt::{EditPlanPrompt, PromptBuilder};
use crate::nodes::actions::Action;

/// Sub-flow edge labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditTransition {
    Next,
    /// Stop early; the state already carries a failed result.
    Abort,
    Done,
}

/// Scratch state for one edit invocation.
#[derive(Debug)]
pub struct EditState {
    request: EditFileParams,
    target: PathBuf,
    buffer: Option<TextBuffer>,
    plan: Option<ChangeSet>,
    outcome: Option<ToolResult>,
}

impl EditState {
    fn new(working_dir: &Path, request: EditFileParams) -> Self {
        Self {
            target: resolve_path(working_dir, &request.target_file),
            request,
            buffer: None,
            plan: None,
            outcome: None,
        }
    }

    fn fail(&mut self, error: String) -> EditTransition {
        self.outcome = Some(ToolResult::failed(ToolName::EditFile, error));
        EditTransition::Abort
    }
}

struct ReadTargetFile;

impl Node<EditState, EditTransition> for ReadTargetFile {
    fn name(&self) -> &'static str {
        "read_target"
    }

    fn step(&self, state: &mut EditState) -> Result<EditTransition> {
        match read_text(&state.target, &state.request.target_file) {
            Ok(content) => {
                state.buffer = Some(TextBuffer::from_content(&content));
                Ok(EditTransition::Next)
            }
            Err(err) => Ok(state.fail(format!("{err:#}"))),
        }
    }
}

struct AnalyzeAndPlan<'a> {
    llm: &'a dyn Llm,
    prompts: &'a PromptBuilder,
    retries: usize,
}

impl Node<EditState, EditTransition> for AnalyzeAndPlan<'_> {
    fn name(&self) -> &'static str {
        "plan_edit"
    }

    #[instrument(skip_all, fields(file = %state.request.target_file))]
    fn step(&self, state: &mut EditState) -> Result<EditTransition> {
        let buffer = state
            .buffer
            .as_ref()
            .ok_or_else(|| anyhow!("target file was not loaded"))?;
        let numbered = buffer.numbered();
        let total_lines = buffer.line_count();
        let attempts = self.retries + 1;
        let mut rejection: Option<String> = None;

        for attempt in 1..=attempts {
            let prompt = self.prompts.edit_plan(&EditPlanPrompt {
                target_file: &state.request.target_file,
                numbered_content: &numbered,
                total_lines,
                instructions: &state.request.instructions,
                code_edit: &state.request.code_edit,
                rejection: rejection.as_deref(),
            })?;
            let reply = self.llm.invoke(&prompt).context("edit planner llm call")?;
            match parse_change_set(&reply, total_lines) {
                Ok(plan) => {
                    info!(operations = plan.changes.len(), "edit plan accepted");
                    state.plan = Some(plan);
                    return Ok(EditTransition::Next);
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "edit plan rejected");
                    rejection = Some(err.to_string());
                }
            }
        }

        let last = rejection.unwrap_or_default();
        Ok(state.fail(format!(
            "edit plan rejected after {attempts} attempts: {last}"
        )))
    }
}

struct ApplyChanges;

impl Node<EditState, EditTransition> for ApplyChanges {
    fn name(&self) -> &'static str {
        "apply_changes"
    }

    fn step(&self, state: &mut EditState) -> Result<EditTransition> {
        let plan = state
            .plan
            .take()
            .ok_or_else(|| anyhow!("no edit plan to apply"))?;
        let mut buffer = state
            .buffer
            .take()
            .ok_or_else(|| anyhow!("target file was not loaded"))?;

        let applied = apply_change_set(&mut buffer, &plan);
        let reasoning = plan.rationale();
        state.outcome = Some(match write_atomic(&state.target, &buffer.render()) {
            Ok(()) => {
                info!(operations = applied, file = %state.request.target_file, "edit applied");
                ToolResult::EditFile {
                    success: true,
                    operations: applied,
                    reasoning,
                    error: None,
                }
            }
            Err(err) => ToolResult::EditFile {
                success: false,
                operations: 0,
                reasoning,
                error: Some(format!("{err:#}")),
            },
        });
        Ok(EditTransition::Done)
    }
}

/// The `edit_file` action, backed by the edit sub-flow.
pub struct EditWorkflow<'a> {
    flow: Flow<'a, EditState, EditTransition>,
}

impl<'a> EditWorkflow<'a> {
    pub fn new(llm: &'a dyn Llm, prompts: &'a PromptBuilder, plan_retries: usize) -> Result<Self> {
        let mut builder = FlowBuilder::new();
        let read = builder.add_node(ReadTargetFile);
        let plan = builder.add_node(AnalyzeAndPlan {
            llm,
            prompts,
            retries: plan_retries,
        });
        let apply = builder.add_node(ApplyChanges);
        builder
            .connect(read, EditTransition::Next, plan)
            .connect(plan, EditTransition::Next, apply);
        Ok(Self {
            flow: builder.build(3).context("build edit flow")?,
        })
    }
}

impl Action for EditWorkflow<'_> {
    type Params = EditFileParams;
    const TOOL: ToolName = ToolName::EditFile;

    fn params(call: ToolCall) -> Option<EditFileParams> {
        match call {
            ToolCall::EditFile(params) => Some(params),
            _ => None,
        }
    }

    fn execute(&self, working_dir: &Path, params: &EditFileParams) -> Result<ToolResult> {
        let mut state = EditState::new(working_dir, params.clone());
        let outcome = self.flow.run(&mut state)?;
        state.outcome.ok_or_else(|| {
            anyhow!(
                "edit flow halted at {} without a result",
                outcome.last_node
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedLlm, Workspace};

    const FIVE: &str = "one\ntwo\nthree\nfour\nfive\n";

    fn params(code_edit: &str) -> EditFileParams {
        EditFileParams {
            target_file: "notes.txt".to_string(),
            instructions: "Uppercase lines 2 and 4".to_string(),
            code_edit: code_edit.to_string(),
        }
    }

    fn run_edit(llm: &ScriptedLlm, ws: &Workspace) -> Result<ToolResult> {
        let prompts = PromptBuilder::new(100_000).expect("prompts");
        let workflow = EditWorkflow::new(llm, &prompts, 1).expect("workflow");
        workflow.execute(ws.path(), &params("TWO\n// ... existing code ...\nFOUR"))
    }

    const TWO_OPS: &str = "```yaml
reasoning: Lines 2 and 4 hold the words to uppercase.
operations:
  - start_line: 2
    end_line: 2
    replacement: |
      TWO
  - start_line: 4
    end_line: 4
    replacement: |
      FOUR
```";

    #[test]
    fn applies_planned_ranges_and_reports_operations() {
        let ws = Workspace::new();
        ws.write("notes.txt", FIVE);
        let llm = ScriptedLlm::new([TWO_OPS]);

        let result = run_edit(&llm, &ws).expect("edit");
        let ToolResult::EditFile {
            success,
            operations,
            reasoning,
            error,
        } = result
        else {
            panic!("expected edit result");
        };
        assert!(success, "{error:?}");
        assert_eq!(operations, 2);
        assert!(reasoning.contains("Lines 2 and 4"));
        assert_eq!(ws.read("notes.txt"), "one\nTWO\nthree\nFOUR\nfive\n");

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("2: two\n3: three"));
    }

    #[test]
    fn invalid_plan_is_retried_with_the_rejection() {
        let ws = Workspace::new();
        ws.write("notes.txt", FIVE);
        let bad = "operations:\n  - start_line: 9\n    end_line: 9\n    replacement: x\n";
        let llm = ScriptedLlm::new([bad, TWO_OPS]);

        let result = run_edit(&llm, &ws).expect("edit");
        assert!(result.success());
        assert!(llm.prompts()[1].contains("end_line 9 exceeds file length 5"));
    }

    /// A plan that never validates leaves the file untouched.
    #[test]
    fn exhausted_plans_fail_without_writing() {
        let ws = Workspace::new();
        ws.write("notes.txt", FIVE);
        let llm = ScriptedLlm::new(["no yaml here: [", "operations: []"]);

        let result = run_edit(&llm, &ws).expect("edit");
        assert!(!result.success());
        assert!(result.error().expect("error").contains("rejected after 2 attempts"));
        assert_eq!(ws.read("notes.txt"), FIVE);
    }

    /// A failed writeback reports zero operations and keeps the original file.
    #[test]
    fn write_failure_reports_no_operations() {
        let ws = Workspace::new();
        ws.write("notes.txt", FIVE);
        // A directory where the sibling temp file would go makes the write fail.
        ws.write(".notes.txt.codeflow.tmp/keep", "");
        let llm = ScriptedLlm::new([TWO_OPS]);

        let result = run_edit(&llm, &ws).expect("edit");
        let ToolResult::EditFile {
            success,
            operations,
            error,
            ..
        } = result
        else {
            panic!("expected edit result");
        };
        assert!(!success);
        assert_eq!(operations, 0);
        assert!(error.expect("error").contains("write temp file"));
        assert_eq!(ws.read("notes.txt"), FIVE);
    }

    #[test]
    fn missing_target_fails_before_planning() {
        let ws = Workspace::new();
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let result = run_edit(&llm, &ws).expect("edit");
        assert!(!result.success());
        assert!(result.error().expect("error").contains("does not exist"));
        assert!(llm.prompts().is_empty());
    }

    #[test]
    fn transport_errors_propagate() {
        let ws = Workspace::new();
        ws.write("notes.txt", FIVE);
        let llm = ScriptedLlm::from_results([Err("timeout".to_string())]);
        let err = run_edit(&llm, &ws).expect_err("transport");
        assert!(format!("{err:#}").contains("timeout"));
        assert_eq!(ws.read("notes.txt"), FIVE);
    }
}
