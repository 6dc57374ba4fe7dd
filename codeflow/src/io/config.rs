//! Agent configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::files::write_atomic;

/// Agent configuration.
///
/// Every field has a default, so an absent file or a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum node executions per run, including the final response.
    pub max_steps: usize,

    /// Newest history entries shown to the planner.
    pub history_window: usize,

    /// Extra planner attempts after a malformed reply.
    pub decision_retries: usize,

    /// Extra edit-planner attempts after an invalid plan.
    pub plan_retries: usize,

    /// Prompts larger than this shed droppable sections.
    pub prompt_budget_bytes: usize,

    /// Largest line range a single `read_file` may return.
    pub read_max_lines: usize,

    /// `grep_search` stops after this many matches.
    pub grep_max_results: usize,

    /// `list_dir` shows at most this many files.
    pub list_max_files: usize,

    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// Command run once per prompt; the prompt is written to stdin.
    pub command: Vec<String>,

    pub timeout_secs: u64,

    /// Replies longer than this are treated as transport failures.
    pub output_limit_bytes: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            timeout_secs: 300,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            history_window: 20,
            decision_retries: 1,
            plan_retries: 1,
            prompt_budget_bytes: 60_000,
            read_max_lines: 250,
            grep_max_results: 50,
            list_max_files: 10,
            llm: LlmConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.history_window == 0 {
            return Err(anyhow!("history_window must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.read_max_lines == 0 {
            return Err(anyhow!("read_max_lines must be > 0"));
        }
        if self.grep_max_results == 0 {
            return Err(anyhow!("grep_max_results must be > 0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.output_limit_bytes == 0 {
            return Err(anyhow!("llm.output_limit_bytes must be > 0"));
        }
        if self.llm.command.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("llm.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Render config as TOML with a trailing newline.
pub fn render_config(cfg: &AgentConfig) -> Result<String> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    Ok(buf)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    write_atomic(path, &render_config(cfg)?)
}
