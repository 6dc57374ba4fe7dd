//! The fixed tool catalog.
//!
//! Tool names, parameter schemas, and typed parameter structs live together so the
//! planner prompt, reply validation, and dispatch table cannot drift apart.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved selection that ends the run instead of invoking a tool.
pub const FINISH: &str = "finish";

/// A tool the planner may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ReadFile,
    EditFile,
    DeleteFile,
    GrepSearch,
    ListDir,
}

impl ToolName {
    /// Catalog order, also used for prompt rendering.
    pub const ALL: [ToolName; 5] = [
        ToolName::ReadFile,
        ToolName::EditFile,
        ToolName::DeleteFile,
        ToolName::GrepSearch,
        ToolName::ListDir,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadFile => "read_file",
            ToolName::EditFile => "edit_file",
            ToolName::DeleteFile => "delete_file",
            ToolName::GrepSearch => "grep_search",
            ToolName::ListDir => "list_dir",
        }
    }

    pub fn spec(self) -> &'static ToolSpec {
        match self {
            ToolName::ReadFile => &READ_FILE,
            ToolName::EditFile => &EDIT_FILE,
            ToolName::DeleteFile => &DELETE_FILE,
            ToolName::GrepSearch => &GREP_SEARCH,
            ToolName::ListDir => &LIST_DIR,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| anyhow!("unknown tool `{s}`"))
    }
}

/// Static description of one tool: what the planner sees and what replies must satisfy.
#[derive(Debug)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: &'static str,
    /// JSON Schema (draft 2020-12) for the tool's `params` mapping.
    pub schema: &'static str,
    /// A complete example planner reply selecting this tool.
    pub example: &'static str,
}

static READ_FILE: ToolSpec = ToolSpec {
    name: ToolName::ReadFile,
    description: "Read the content of a file, with line numbers.",
    schema: include_str!("../../schemas/tools/read_file.schema.json"),
    example: "tool: read_file
reason: I need to see the current implementation before changing it.
params:
  target_file: src/main.py",
};

static EDIT_FILE: ToolSpec = ToolSpec {
    name: ToolName::EditFile,
    description: "Make changes to a file. A planning step turns your edit into exact line replacements.",
    schema: include_str!("../../schemas/tools/edit_file.schema.json"),
    example: "tool: edit_file
reason: The greeting must use the configured name instead of a literal.
params:
  target_file: src/greet.py
  instructions: Use the name argument in the greeting.
  code_edit: |
    // ... existing code ...
    def greet(name):
        return f\"Hello, {name}!\"
    // ... existing code ...",
};

static DELETE_FILE: ToolSpec = ToolSpec {
    name: ToolName::DeleteFile,
    description: "Delete a file.",
    schema: include_str!("../../schemas/tools/delete_file.schema.json"),
    example: "tool: delete_file
reason: The module is unused after the refactor.
params:
  target_file: src/legacy.py",
};

static GREP_SEARCH: ToolSpec = ToolSpec {
    name: ToolName::GrepSearch,
    description: "Search file contents for a regular expression.",
    schema: include_str!("../../schemas/tools/grep_search.schema.json"),
    example: "tool: grep_search
reason: I need to find every caller of the function.
params:
  query: def load_config
  include_pattern: \"*.py\"
  case_sensitive: false",
};

static LIST_DIR: ToolSpec = ToolSpec {
    name: ToolName::ListDir,
    description: "List the contents of a directory as a tree.",
    schema: include_str!("../../schemas/tools/list_dir.schema.json"),
    example: "tool: list_dir
reason: I need to see the project layout first.
params:
  relative_workspace_path: .",
};

/// One documented parameter, derived from the tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDoc {
    pub name: String,
    pub required: bool,
    pub description: String,
}

/// Prompt-facing view of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamDoc>,
    pub example: &'static str,
}

impl ToolSpec {
    fn schema_json(&self) -> Result<Value> {
        serde_json::from_str(self.schema).with_context(|| format!("parse {} schema", self.name))
    }

    /// Validate a params object against this tool's schema.
    ///
    /// Returns every violation message; an empty list means the params are valid.
    pub fn validate(&self, params: &Value) -> Result<Vec<String>> {
        let schema = self.schema_json()?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| anyhow!("compile {} schema: {err}", self.name))?;
        Ok(validator
            .iter_errors(params)
            .map(|err| err.to_string())
            .collect())
    }

    /// Parameter docs, required parameters first.
    pub fn params(&self) -> Result<Vec<ParamDoc>> {
        let schema = self.schema_json()?;
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let properties = schema["properties"]
            .as_object()
            .with_context(|| format!("{} schema has no properties", self.name))?;
        let mut docs: Vec<ParamDoc> = properties
            .iter()
            .map(|(name, prop)| ParamDoc {
                name: name.clone(),
                required: required.contains(&name.as_str()),
                description: prop["description"].as_str().unwrap_or_default().to_string(),
            })
            .collect();
        docs.sort_by_key(|doc| !doc.required);
        Ok(docs)
    }

    pub fn doc(&self) -> Result<ToolDoc> {
        Ok(ToolDoc {
            name: self.name.as_str(),
            description: self.description,
            params: self.params()?,
            example: self.example,
        })
    }
}

/// Prompt-facing docs for every tool, in catalog order.
pub fn catalog() -> Result<Vec<ToolDoc>> {
    ToolName::ALL.into_iter().map(|tool| tool.spec().doc()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileParams {
    pub target_file: String,
    #[serde(default)]
    pub start_line_one_indexed: Option<usize>,
    #[serde(default)]
    pub end_line_one_indexed: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditFileParams {
    pub target_file: String,
    pub instructions: String,
    pub code_edit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFileParams {
    pub target_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrepSearchParams {
    pub query: String,
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDirParams {
    #[serde(default = "default_list_path")]
    pub relative_workspace_path: String,
}

fn default_list_path() -> String {
    ".".to_string()
}

/// A validated, typed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ReadFile(ReadFileParams),
    EditFile(EditFileParams),
    DeleteFile(DeleteFileParams),
    GrepSearch(GrepSearchParams),
    ListDir(ListDirParams),
}

impl ToolCall {
    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::ReadFile(_) => ToolName::ReadFile,
            ToolCall::EditFile(_) => ToolName::EditFile,
            ToolCall::DeleteFile(_) => ToolName::DeleteFile,
            ToolCall::GrepSearch(_) => ToolName::GrepSearch,
            ToolCall::ListDir(_) => ToolName::ListDir,
        }
    }

    /// Build a typed call from a params object that already passed schema validation.
    pub fn from_json(tool: ToolName, params: Value) -> Result<Self> {
        let call = match tool {
            ToolName::ReadFile => ToolCall::ReadFile(serde_json::from_value(params)?),
            ToolName::EditFile => ToolCall::EditFile(serde_json::from_value(params)?),
            ToolName::DeleteFile => ToolCall::DeleteFile(serde_json::from_value(params)?),
            ToolName::GrepSearch => ToolCall::GrepSearch(serde_json::from_value(params)?),
            ToolName::ListDir => ToolCall::ListDir(serde_json::from_value(params)?),
        };
        Ok(call)
    }
}
