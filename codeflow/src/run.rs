//! Orchestration for a single `codeflow run`.
//!
//! The main graph is fixed: `decision` routes each tool label to its action node,
//! every action node returns to `decision`, and `finish` leads to `response`.
//! Fatal errors end the graph early; the response is then composed from what
//! was recorded so far.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{error, info, instrument};

use crate::context::SharedContext;
use crate::core::flow::{Flow, FlowBuilder, StepBudgetExceeded};
use crate::core::tools::ToolName;
use crate::core::types::HistoryEntry;
use crate::io::config::AgentConfig;
use crate::io::llm::Llm;
use crate::io::prompt::PromptBuilder;
use crate::nodes::Transition;
use crate::nodes::actions::{
    ActionNode, DeleteFileAction, GrepSearchAction, ListDirAction, ReadFileAction,
};
use crate::nodes::decision::{DecisionAgent, DecisionExhausted};
use crate::nodes::edit::EditWorkflow;
use crate::nodes::response::ResponseFormatter;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// The planner chose `finish`.
    Finished,
    /// A fatal error ended the run; the response explains it.
    Failed { reason: String },
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub response: String,
    pub history: Vec<HistoryEntry>,
    pub stop: RunStop,
}

/// The main agent graph, built once and reusable across runs.
pub struct CodingAgent<'a> {
    flow: Flow<'a, SharedContext, Transition>,
    responder: ResponseFormatter<'a>,
}

impl<'a> CodingAgent<'a> {
    pub fn new(llm: &'a dyn Llm, prompts: &'a PromptBuilder, config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = FlowBuilder::new();
        let decision = builder.add_node(DecisionAgent::new(
            llm,
            prompts,
            config.history_window,
            config.decision_retries,
        ));
        let response = builder.add_node(ResponseFormatter::new(llm, prompts));
        builder.connect(decision, Transition::Finish, response);

        for tool in ToolName::ALL {
            let action = match tool {
                ToolName::ReadFile => builder.add_node(ActionNode::new(ReadFileAction {
                    max_lines: config.read_max_lines,
                })),
                ToolName::EditFile => builder.add_node(ActionNode::new(EditWorkflow::new(
                    llm,
                    prompts,
                    config.plan_retries,
                )?)),
                ToolName::DeleteFile => builder.add_node(ActionNode::new(DeleteFileAction)),
                ToolName::GrepSearch => builder.add_node(ActionNode::new(GrepSearchAction {
                    max_results: config.grep_max_results,
                })),
                ToolName::ListDir => builder.add_node(ActionNode::new(ListDirAction {
                    max_files: config.list_max_files,
                })),
            };
            builder
                .connect(decision, Transition::Tool(tool), action)
                .connect(action, Transition::Continue, decision);
        }

        if let Some(missing) = ToolName::ALL
            .iter()
            .find(|tool| !builder.has_edge(decision, Transition::Tool(**tool)))
        {
            bail!("no action node routed for tool {missing}");
        }

        Ok(Self {
            flow: builder.build(config.max_steps).context("build agent flow")?,
            responder: ResponseFormatter::new(llm, prompts),
        })
    }

    /// Run one request to completion.
    ///
    /// Never fails: fatal errors are reported through [`RunStop::Failed`] and a
    /// response that explains where the run stopped.
    #[instrument(skip_all, fields(working_dir = %working_dir.display()))]
    pub fn run(&self, query: &str, working_dir: &Path) -> RunOutcome {
        let mut ctx = SharedContext::new(query, working_dir);
        let stop = match self.flow.run(&mut ctx) {
            Ok(outcome) if ctx.response().is_some() => {
                info!(steps = outcome.steps, actions = ctx.history().len(), "run finished");
                RunStop::Finished
            }
            Ok(outcome) => RunStop::Failed {
                reason: format!(
                    "flow halted at `{}` on {:?} without a response",
                    outcome.last_node, outcome.label
                ),
            },
            Err(err) => RunStop::Failed {
                reason: describe_failure(&err),
            },
        };

        if let RunStop::Failed { reason } = &stop {
            error!(%reason, actions = ctx.history().len(), "run failed");
            ctx.set_failure(reason.clone());
        }

        let response = match ctx.response() {
            Some(response) if stop == RunStop::Finished => response.to_string(),
            _ => self.responder.compose(&ctx).unwrap_or_else(|err| {
                format!("The run stopped and no summary could be built: {err:#}")
            }),
        };
        let (_, history) = ctx.into_parts();
        RunOutcome {
            response,
            history,
            stop,
        }
    }
}

fn describe_failure(err: &anyhow::Error) -> String {
    if let Some(budget) = err.downcast_ref::<StepBudgetExceeded>() {
        return format!("step budget exceeded ({} steps)", budget.max_steps);
    }
    if let Some(exhausted) = err.downcast_ref::<DecisionExhausted>() {
        return exhausted.to_string();
    }
    format!("{err:#}")
}

/// Build the agent for `config` and run one request.
///
/// Errors only when the agent cannot be assembled (invalid config or templates).
pub fn run(
    llm: &dyn Llm,
    config: &AgentConfig,
    query: &str,
    working_dir: &Path,
) -> Result<RunOutcome> {
    let prompts = PromptBuilder::new(config.prompt_budget_bytes)?;
    let agent = CodingAgent::new(llm, &prompts, config)?;
    Ok(agent.run(query, working_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::HistoryTool;
    use crate::test_support::{ScriptedLlm, Workspace, yaml_reply};

    fn finish(reason: &str) -> String {
        format!("```yaml\ntool: finish\nreason: {reason}\n```")
    }

    #[test]
    fn graph_routes_every_tool() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let prompts = PromptBuilder::new(10_000).expect("prompts");
        let agent = CodingAgent::new(&llm, &prompts, &AgentConfig::default()).expect("agent");
        assert_eq!(agent.flow.max_steps(), AgentConfig::default().max_steps);
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let prompts = PromptBuilder::new(10_000).expect("prompts");
        let config = AgentConfig {
            max_steps: 0,
            ..AgentConfig::default()
        };
        assert!(CodingAgent::new(&llm, &prompts, &config).is_err());
    }

    #[test]
    fn list_then_finish_produces_summary() {
        let ws = Workspace::new();
        ws.write("main.py", "print('hi')\n");
        let llm = ScriptedLlm::new([
            yaml_reply("list_dir", "See what exists", "relative_workspace_path: ."),
            finish("Listing is enough"),
            "There is one file, main.py.".to_string(),
        ]);

        let outcome = run(&llm, &AgentConfig::default(), "What is here?", ws.path()).expect("run");
        assert_eq!(outcome.stop, RunStop::Finished);
        assert_eq!(outcome.response, "There is one file, main.py.");
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].tool, HistoryTool::Tool(ToolName::ListDir));
        assert_eq!(llm.remaining(), 0);
    }

    /// A planner that never finishes is cut off by the step budget.
    #[test]
    fn step_budget_ends_run_with_explanation() {
        let ws = Workspace::new();
        let replies = (0..10).map(|_| yaml_reply("list_dir", "again", "relative_workspace_path: ."));
        let llm = ScriptedLlm::new(replies);
        let config = AgentConfig {
            max_steps: 4,
            ..AgentConfig::default()
        };

        let outcome = run(&llm, &config, "loop forever", ws.path()).expect("run");
        assert_eq!(
            outcome.stop,
            RunStop::Failed {
                reason: "step budget exceeded (4 steps)".to_string()
            }
        );
        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.response.contains("step budget exceeded (4 steps)"));
        assert!(outcome.response.contains("What was attempted:"));
    }

    #[test]
    fn transport_failure_is_reported_not_raised() {
        let ws = Workspace::new();
        let llm = ScriptedLlm::from_results([Err("401 unauthorized".to_string())]);

        let outcome = run(&llm, &AgentConfig::default(), "anything", ws.path()).expect("run");
        let RunStop::Failed { reason } = &outcome.stop else {
            panic!("expected failure, got {:?}", outcome.stop);
        };
        assert!(reason.contains("401 unauthorized"), "{reason}");
        assert!(outcome.history.is_empty());
        assert!(outcome.response.contains("No actions were performed."));
    }

    #[test]
    fn finish_without_actions_skips_summary_llm() {
        let ws = Workspace::new();
        let llm = ScriptedLlm::new([finish("Nothing to do")]);
        let outcome = run(&llm, &AgentConfig::default(), "hello", ws.path()).expect("run");
        assert_eq!(outcome.stop, RunStop::Finished);
        assert_eq!(outcome.response, "No actions were performed.");
        assert_eq!(llm.prompts().len(), 1);
    }
}
