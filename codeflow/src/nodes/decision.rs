//! The planner node: asks the LLM for the next tool and routes to it.

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::context::{PendingCall, SharedContext, now_timestamp};
use crate::core::decision::{DecisionAction, DecisionError, parse_decision};
use crate::core::flow::Node;
use crate::core::history::format_recent_history;
use crate::core::types::{HistoryEntry, HistoryTool, Params, ToolResult};
use crate::io::llm::Llm;
use crate::io::prompt::{DecisionPrompt, PromptBuilder};
use crate::nodes::Transition;

/// Every planner attempt produced an unusable reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("planner reply rejected {attempts} times; last error: {last_error}")]
pub struct DecisionExhausted {
    pub attempts: usize,
    pub last_error: DecisionError,
}

pub struct DecisionAgent<'a> {
    llm: &'a dyn Llm,
    prompts: &'a PromptBuilder,
    history_window: usize,
    retries: usize,
}

impl<'a> DecisionAgent<'a> {
    pub fn new(
        llm: &'a dyn Llm,
        prompts: &'a PromptBuilder,
        history_window: usize,
        retries: usize,
    ) -> Self {
        Self {
            llm,
            prompts,
            history_window,
            retries,
        }
    }
}

impl Node<SharedContext, Transition> for DecisionAgent<'_> {
    fn name(&self) -> &'static str {
        "decision"
    }

    /// Each rejected reply is logged to history so the next attempt (and the
    /// final summary) can see it. A transport error aborts immediately.
    #[instrument(skip_all, fields(history_len = ctx.history().len()))]
    fn step(&self, ctx: &mut SharedContext) -> Result<Transition> {
        let attempts = self.retries + 1;
        let mut rejection: Option<DecisionError> = None;

        for attempt in 1..=attempts {
            let history = format_recent_history(ctx.history(), self.history_window);
            let rejection_text = rejection.as_ref().map(ToString::to_string);
            let prompt = self.prompts.decision(&DecisionPrompt {
                query: ctx.user_query(),
                working_dir: ctx.working_dir(),
                history: &history,
                rejection: rejection_text.as_deref(),
            })?;
            let reply = self.llm.invoke(&prompt).context("planner llm call")?;

            match parse_decision(&reply) {
                Ok(decision) => match decision.action {
                    DecisionAction::Finish => {
                        info!(reason = %decision.reason, "planner chose finish");
                        ctx.set_finish_reason(decision.reason);
                        return Ok(Transition::Finish);
                    }
                    DecisionAction::Call(call) => {
                        let tool = call.tool();
                        info!(%tool, reason = %decision.reason, "planner chose tool");
                        ctx.set_pending(PendingCall {
                            call,
                            reason: decision.reason,
                            params: decision.params,
                        });
                        return Ok(Transition::Tool(tool));
                    }
                },
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "planner reply rejected");
                    ctx.record(HistoryEntry {
                        tool: HistoryTool::RejectedDecision,
                        reason: format!("planner reply rejected (attempt {attempt} of {attempts})"),
                        params: Params::new(),
                        result: ToolResult::DecisionRejected {
                            error: err.to_string(),
                        },
                        timestamp: now_timestamp(),
                    });
                    rejection = Some(err);
                }
            }
        }

        let last_error = rejection.unwrap_or(DecisionError::NotMapping);
        Err(DecisionExhausted {
            attempts,
            last_error,
        }
        .into())
    }
}
