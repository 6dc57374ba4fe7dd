//! The terminal node: turns the run's history into the user-facing reply.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::context::SharedContext;
use crate::core::flow::Node;
use crate::core::history::format_history;
use crate::io::llm::Llm;
use crate::io::prompt::{PromptBuilder, ResponsePrompt};
use crate::nodes::Transition;

pub const NO_ACTIONS: &str = "No actions were performed.";

pub struct ResponseFormatter<'a> {
    llm: &'a dyn Llm,
    prompts: &'a PromptBuilder,
}

impl<'a> ResponseFormatter<'a> {
    pub fn new(llm: &'a dyn Llm, prompts: &'a PromptBuilder) -> Self {
        Self { llm, prompts }
    }

    /// Build the reply text without touching the context.
    ///
    /// Failed runs and empty histories get a fixed reply. Otherwise the LLM
    /// summarizes; if that call fails the history itself becomes the reply.
    pub fn compose(&self, ctx: &SharedContext) -> Result<String> {
        if let Some(reason) = ctx.failure() {
            return Ok(failure_summary(reason, ctx));
        }
        if ctx.history().is_empty() {
            return Ok(NO_ACTIONS.to_string());
        }

        let history = format_history(ctx.history());
        let prompt = self.prompts.response(&ResponsePrompt {
            query: ctx.user_query(),
            history: &history,
            finish_reason: ctx.finish_reason(),
        })?;
        match self.llm.invoke(&prompt) {
            Ok(reply) => Ok(reply.trim().to_string()),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "summary llm call failed; using plain history");
                Ok(format!("Summary unavailable ({err:#}).\n\nActions performed:\n{history}"))
            }
        }
    }
}

fn failure_summary(reason: &str, ctx: &SharedContext) -> String {
    let reason = reason.trim_end_matches('.');
    if ctx.history().is_empty() {
        return format!("The run stopped before completing the request: {reason}.\n\n{NO_ACTIONS}");
    }
    format!(
        "The run stopped before completing the request: {reason}.\n\nWhat was attempted:\n{}",
        format_history(ctx.history())
    )
}

impl Node<SharedContext, Transition> for ResponseFormatter<'_> {
    fn name(&self) -> &'static str {
        "response"
    }

    #[instrument(skip_all, fields(actions = ctx.history().len()))]
    fn step(&self, ctx: &mut SharedContext) -> Result<Transition> {
        let response = self.compose(ctx)?;
        info!(bytes = response.len(), "response ready");
        ctx.set_response(response)?;
        Ok(Transition::Done)
    }
}
