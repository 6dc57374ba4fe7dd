//! Parsing and validation of planner replies.
//!
//! A reply is accepted only if it contains a YAML mapping with exactly the keys
//! `tool`, `reason`, and (for tools) `params`, names a known tool or `finish`, and
//! its params satisfy that tool's schema. Anything else is a [`DecisionError`]; the
//! caller decides whether to retry.

use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::core::tools::{FINISH, ToolCall, ToolName};
use crate::core::types::Params;
use crate::core::yaml::extract_yaml_block;

const KEYS: [&str; 3] = ["tool", "reason", "params"];

/// What the planner chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionAction {
    Call(ToolCall),
    Finish,
}

/// A validated planner decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDecision {
    pub action: DecisionAction,
    pub reason: String,
    /// Params as written by the planner, kept for the history log.
    pub params: Params,
}

impl ToolDecision {
    /// The routing label: the selected tool, or `None` for `finish`.
    pub fn tool(&self) -> Option<ToolName> {
        match &self.action {
            DecisionAction::Call(call) => Some(call.tool()),
            DecisionAction::Finish => None,
        }
    }
}

/// Why a planner reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("reply is not valid YAML: {0}")]
    Yaml(String),
    #[error("reply must be a YAML mapping with keys tool, reason, params")]
    NotMapping,
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("unexpected key `{0}` (allowed: tool, reason, params)")]
    UnexpectedKey(String),
    #[error("key `{key}` must be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
    #[error("unknown tool `{0}` (expected one of {names})", names = tool_names())]
    UnknownTool(String),
    #[error("invalid params for `{tool}`: {}", .errors.join("; "))]
    InvalidParams { tool: ToolName, errors: Vec<String> },
}

fn tool_names() -> String {
    ToolName::ALL
        .iter()
        .map(|tool| tool.as_str())
        .chain([FINISH])
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a raw planner reply into a validated decision.
pub fn parse_decision(reply: &str) -> Result<ToolDecision, DecisionError> {
    let block = extract_yaml_block(reply);
    let value: YamlValue =
        serde_yaml::from_str(block).map_err(|err| DecisionError::Yaml(err.to_string()))?;
    let YamlValue::Mapping(mut mapping) = value else {
        return Err(DecisionError::NotMapping);
    };

    if let Some(key) = mapping.keys().find_map(unexpected_key) {
        return Err(DecisionError::UnexpectedKey(key));
    }

    let tool = match mapping.remove("tool") {
        Some(YamlValue::String(tool)) => tool,
        Some(_) => {
            return Err(DecisionError::WrongType {
                key: "tool",
                expected: "a string",
            });
        }
        None => return Err(DecisionError::MissingKey("tool")),
    };
    let reason = match mapping.remove("reason") {
        Some(YamlValue::String(reason)) => reason.trim().to_string(),
        Some(_) => {
            return Err(DecisionError::WrongType {
                key: "reason",
                expected: "a string",
            });
        }
        None => return Err(DecisionError::MissingKey("reason")),
    };
    let params = match mapping.remove("params") {
        Some(YamlValue::Mapping(params)) => Some(params),
        Some(YamlValue::Null) => Some(Params::new()),
        Some(_) => {
            return Err(DecisionError::WrongType {
                key: "params",
                expected: "a mapping",
            });
        }
        None => None,
    };

    let tool = tool.trim();
    if tool == FINISH {
        return Ok(ToolDecision {
            action: DecisionAction::Finish,
            reason,
            params: params.unwrap_or_default(),
        });
    }

    let name: ToolName = tool
        .parse()
        .map_err(|_| DecisionError::UnknownTool(tool.to_string()))?;
    let params = params.ok_or(DecisionError::MissingKey("params"))?;
    let call = typed_call(name, &params)?;
    Ok(ToolDecision {
        action: DecisionAction::Call(call),
        reason,
        params,
    })
}

fn unexpected_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(key) if KEYS.contains(&key.as_str()) => None,
        YamlValue::String(key) => Some(key.clone()),
        other => Some(format!("{other:?}")),
    }
}

fn typed_call(tool: ToolName, params: &Params) -> Result<ToolCall, DecisionError> {
    let invalid = |errors: Vec<String>| DecisionError::InvalidParams { tool, errors };
    let json = serde_json::to_value(params).map_err(|err| invalid(vec![err.to_string()]))?;
    let errors = tool
        .spec()
        .validate(&json)
        .map_err(|err| invalid(vec![format!("{err:#}")]))?;
    if !errors.is_empty() {
        return Err(invalid(errors));
    }
    ToolCall::from_json(tool, json).map_err(|err| invalid(vec![err.to_string()]))
}
