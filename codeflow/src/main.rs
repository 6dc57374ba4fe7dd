//! LLM-driven coding agent.
//!
//! `codeflow run` plans tool calls with an external LLM command, acts on a
//! working directory, and prints a summary of what it did.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use codeflow::exit_codes;
use codeflow::io::config::{AgentConfig, load_config, render_config, write_config};
use codeflow::io::files::write_atomic;
use codeflow::io::llm::CommandLlm;
use codeflow::logging;
use codeflow::run::{RunOutcome, RunStop, run};

const QUERY_PROMPT: &str = "What would you like me to help you with? ";

#[derive(Parser)]
#[command(name = "codeflow", version, about = "LLM-driven coding agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent on one request.
    Run {
        /// The request. Read from stdin when omitted.
        #[arg(short, long)]
        query: Option<String>,
        /// Directory the tools operate in.
        #[arg(short = 'd', long, default_value = "project")]
        working_dir: PathBuf,
        /// Config file; defaults apply when it does not exist.
        #[arg(short, long, default_value = "codeflow.toml")]
        config: PathBuf,
        /// Write the action history as JSON.
        #[arg(long)]
        history_json: Option<PathBuf>,
    },
    /// Print the default config, or write it to a file.
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match dispatch() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn dispatch() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            query,
            working_dir,
            config,
            history_json,
        } => cmd_run(query, &working_dir, &config, history_json.as_deref()),
        Command::Config { write } => cmd_config(write.as_deref()),
    }
}

fn cmd_run(
    query: Option<String>,
    working_dir: &Path,
    config_path: &Path,
    history_json: Option<&Path>,
) -> Result<i32> {
    let cfg = load_config(config_path)?;
    if !working_dir.is_dir() {
        bail!("working directory {} is not a directory", working_dir.display());
    }
    let query = match query {
        Some(query) => query,
        None => read_query()?,
    };
    if query.trim().is_empty() {
        bail!("query is empty");
    }

    let llm = CommandLlm::new(&cfg.llm);
    let outcome = run(&llm, &cfg, query.trim(), working_dir)?;
    println!("{}", outcome.response);
    if let Some(path) = history_json {
        write_history(path, &outcome)?;
    }

    Ok(match outcome.stop {
        RunStop::Finished => exit_codes::OK,
        RunStop::Failed { .. } => exit_codes::RUN_FAILED,
    })
}

fn cmd_config(write: Option<&Path>) -> Result<i32> {
    let cfg = AgentConfig::default();
    match write {
        Some(path) => write_config(path, &cfg)?,
        None => print!("{}", render_config(&cfg)?),
    }
    Ok(exit_codes::OK)
}

fn read_query() -> Result<String> {
    let mut stderr = std::io::stderr();
    stderr.write_all(QUERY_PROMPT.as_bytes()).context("write prompt")?;
    stderr.flush().context("flush prompt")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read query from stdin")?;
    Ok(line)
}

fn write_history(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(&outcome.history).context("serialize history")?;
    payload.push('\n');
    write_atomic(path, &payload).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["codeflow", "run", "-q", "List files"]);
        let Command::Run {
            query,
            working_dir,
            config,
            history_json,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(query.as_deref(), Some("List files"));
        assert_eq!(working_dir, PathBuf::from("project"));
        assert_eq!(config, PathBuf::from("codeflow.toml"));
        assert!(history_json.is_none());
    }

    #[test]
    fn parse_config_write() {
        let cli = Cli::parse_from(["codeflow", "config", "--write", "out.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config { write: Some(path) } if path == Path::new("out.toml")
        ));
    }
}
