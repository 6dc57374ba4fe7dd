//! Test-only helpers: a scripted LLM and a scratch workspace.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::llm::Llm;

/// An [`Llm`] that replays canned replies in order and records every prompt.
///
/// Running out of replies is an error, so a test that expects fewer calls fails loudly.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self::from_results(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    /// Script replies where `Err` simulates a transport failure.
    pub fn from_results(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Llm for ScriptedLlm {
    fn invoke(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => Err(anyhow!("llm transport error: {err}")),
            None => Err(anyhow!("scripted llm has no replies left")),
        }
    }
}

/// A planner reply selecting `tool`, with `params_yaml` nested under `params:`.
pub fn yaml_reply(tool: &str, reason: &str, params_yaml: &str) -> String {
    let params = params_yaml
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("```yaml\ntool: {tool}\nreason: {reason}\nparams:\n{params}\n```")
}

/// A temporary working directory.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel)).expect("read file")
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
