//! LLM invocation boundary.
//!
//! The agent only ever needs "prompt in, text out". [`CommandLlm`] shells out to a
//! local command (for example the `llm` CLI) with the prompt on stdin and reads the
//! completion from stdout. Tests substitute a scripted implementation.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::io::config::LlmConfig;
use crate::io::process::run_with_input;

const STDERR_TAIL_BYTES: usize = 2_000;

/// A language model that turns a prompt into a completion.
///
/// Errors are transport failures (the model could not be reached or produced no
/// usable output). They are fatal to a run; malformed replies are not errors here.
pub trait Llm {
    fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Runs a configured command per prompt.
#[derive(Debug, Clone)]
pub struct CommandLlm {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandLlm {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn build_command(&self) -> Result<Command> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("llm.command is empty");
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }
}

impl Llm for CommandLlm {
    #[instrument(skip_all, fields(program = %self.command.first().map_or("", String::as_str), prompt_bytes = prompt.len()))]
    fn invoke(&self, prompt: &str) -> Result<String> {
        let cmd = self.build_command()?;
        let output = run_with_input(cmd, prompt.as_bytes(), self.timeout, self.output_limit_bytes)?;

        if output.timed_out {
            bail!("llm command timed out after {}s", self.timeout.as_secs());
        }
        if !output.status.success() {
            bail!(
                "llm command exited with {}: {}",
                output.status,
                output.stderr_tail(STDERR_TAIL_BYTES)
            );
        }
        if output.stdout_truncated > 0 {
            bail!(
                "llm reply exceeded {} bytes ({} bytes dropped)",
                self.output_limit_bytes,
                output.stdout_truncated
            );
        }
        let reply = output.stdout_text();
        if reply.trim().is_empty() {
            bail!("llm command produced no output");
        }
        debug!(reply_bytes = reply.len(), "llm replied");
        Ok(reply)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn llm(script: &str) -> CommandLlm {
        CommandLlm::new(&LlmConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_secs: 5,
            output_limit_bytes: 1_000,
        })
    }

    #[test]
    fn returns_stdout_of_the_command() {
        let reply = llm("echo 'tool: finish'").invoke("prompt").expect("invoke");
        assert_eq!(reply, "tool: finish\n");
    }

    #[test]
    fn prompt_arrives_on_stdin() {
        let reply = llm("tr a-z A-Z").invoke("shout").expect("invoke");
        assert_eq!(reply, "SHOUT");
    }

    #[test]
    fn non_zero_exit_is_a_transport_error() {
        let err = llm("echo 'quota exceeded' >&2; exit 3")
            .invoke("prompt")
            .expect_err("fails");
        let message = format!("{err:#}");
        assert!(message.contains("quota exceeded"), "{message}");
    }

    #[test]
    fn empty_output_is_a_transport_error() {
        assert!(llm("true").invoke("prompt").is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        let llm = CommandLlm::new(&LlmConfig {
            command: Vec::new(),
            timeout_secs: 5,
            output_limit_bytes: 1_000,
        });
        assert!(llm.invoke("prompt").is_err());
    }
}
