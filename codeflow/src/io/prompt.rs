//! Prompt rendering for the planner, the edit planner, and the final response.
//!
//! Templates mark their sections with `<!-- section:KEY required|droppable -->`.
//! After rendering, sections are measured against a byte budget and trimmed in a
//! fixed order: examples go first, the finish note next, and the history keeps
//! its newest actions and loses the oldest.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use tracing::{debug, warn};

use crate::core::tools::{FINISH, ToolDoc, ToolName, catalog};

const DECISION_TEMPLATE: &str = include_str!("prompts/decision.md");
const EDIT_PLAN_TEMPLATE: &str = include_str!("prompts/edit_plan.md");
const RESPONSE_TEMPLATE: &str = include_str!("prompts/response.md");

const HISTORY_OPEN: &str = "<history>\n";
const HISTORY_CLOSE: &str = "</history>";
const OMITTED_NOTE: &str = "(older actions omitted to fit the prompt)\n\n";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("valid regex")
});
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Action \d+:$").expect("valid regex"));

/// Inputs for the tool-selection prompt.
#[derive(Debug, Clone)]
pub struct DecisionPrompt<'a> {
    pub query: &'a str,
    pub working_dir: &'a Path,
    /// Rendered history text.
    pub history: &'a str,
    /// Why the previous reply was rejected, when retrying.
    pub rejection: Option<&'a str>,
}

/// Inputs for the edit-planning prompt.
#[derive(Debug, Clone)]
pub struct EditPlanPrompt<'a> {
    pub target_file: &'a str,
    pub numbered_content: &'a str,
    pub total_lines: usize,
    pub instructions: &'a str,
    pub code_edit: &'a str,
    pub rejection: Option<&'a str>,
}

/// Inputs for the final summary prompt.
#[derive(Debug, Clone)]
pub struct ResponsePrompt<'a> {
    pub query: &'a str,
    pub history: &'a str,
    pub finish_reason: Option<&'a str>,
}

/// Renders prompts within a byte budget.
#[derive(Debug)]
pub struct PromptBuilder {
    env: Environment<'static>,
    tools: Vec<ToolDoc>,
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("decision", DECISION_TEMPLATE)
            .context("load decision template")?;
        env.add_template("edit_plan", EDIT_PLAN_TEMPLATE)
            .context("load edit plan template")?;
        env.add_template("response", RESPONSE_TEMPLATE)
            .context("load response template")?;
        Ok(Self {
            env,
            tools: catalog()?,
            budget_bytes,
        })
    }

    pub fn decision(&self, input: &DecisionPrompt<'_>) -> Result<String> {
        let tool_names = ToolName::ALL
            .iter()
            .map(|tool| tool.as_str())
            .chain([FINISH])
            .collect::<Vec<_>>()
            .join(", ");
        let rendered = self
            .env
            .get_template("decision")?
            .render(context! {
                query => input.query.trim(),
                working_dir => input.working_dir.display().to_string(),
                history => input.history.trim(),
                tools => &self.tools,
                tool_names => tool_names,
                rejection => input.rejection.map(str::trim).filter(|s| !s.is_empty()),
            })
            .context("render decision prompt")?;
        Ok(self.fit(&rendered))
    }

    pub fn edit_plan(&self, input: &EditPlanPrompt<'_>) -> Result<String> {
        let rendered = self
            .env
            .get_template("edit_plan")?
            .render(context! {
                target_file => input.target_file,
                numbered_content => input.numbered_content.trim_end(),
                total_lines => input.total_lines,
                instructions => input.instructions.trim(),
                code_edit => input.code_edit.trim_end(),
                rejection => input.rejection.map(str::trim).filter(|s| !s.is_empty()),
            })
            .context("render edit plan prompt")?;
        Ok(self.fit(&rendered))
    }

    pub fn response(&self, input: &ResponsePrompt<'_>) -> Result<String> {
        let rendered = self
            .env
            .get_template("response")?
            .render(context! {
                query => input.query.trim(),
                history => input.history.trim(),
                finish_reason => input.finish_reason.map(str::trim).filter(|s| !s.is_empty()),
            })
            .context("render response prompt")?;
        Ok(self.fit(&rendered))
    }

    fn fit(&self, rendered: &str) -> String {
        let mut sections = parse_sections(rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        render_sections(&sections)
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    /// Section content including its header, without the marker.
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(marker), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let required = kind.as_str() == "required";
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());

        let content = rendered[marker.end()..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

fn total_len(sections: &[ParsedSection]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

/// Shed droppable sections until the prompt fits `budget`.
///
/// Order: examples -> finish -> history. History is shortened from the oldest
/// action before it is dropped outright. Required sections are never touched.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    for key in ["examples", "finish", "history"] {
        let excess = total_len(sections).saturating_sub(budget);
        if excess == 0 {
            return;
        }
        let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) else {
            continue;
        };
        if key == "history" && shrink_history(&mut sections[idx], excess) {
            debug!(section = key, excess, "shortened section for budget");
            continue;
        }
        debug!(
            section = key,
            bytes_dropped = sections[idx].content.len(),
            "dropped section for budget"
        );
        sections.remove(idx);
    }

    let total = total_len(sections);
    if total > budget {
        warn!(total, budget, "prompt exceeds budget after dropping optional sections");
    }
}

/// Drop whole actions from the front of a history section until it shrinks by `excess`.
///
/// Returns false if even the newest action alone does not fit.
fn shrink_history(section: &mut ParsedSection, excess: usize) -> bool {
    let content = &section.content;
    let Some(body_start) = content.find(HISTORY_OPEN).map(|i| i + HISTORY_OPEN.len()) else {
        return false;
    };
    let body_end = content.rfind(HISTORY_CLOSE).unwrap_or(content.len());
    if body_end < body_start {
        return false;
    }
    let body = &content[body_start..body_end];

    let cut = ACTION_RE
        .find_iter(body)
        .map(|m| m.start())
        .filter(|&start| start > 0)
        .find(|&start| start >= excess + OMITTED_NOTE.len());
    let Some(cut) = cut else {
        return false;
    };

    let shrunk = format!(
        "{}{OMITTED_NOTE}{}{}",
        &content[..body_start],
        &body[cut..],
        &content[body_end..]
    );
    section.content = shrunk;
    true
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
