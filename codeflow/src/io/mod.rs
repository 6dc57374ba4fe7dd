//! Side-effecting helpers: files, search, the LLM process, config, and prompts.

pub mod config;
pub mod files;
pub mod listing;
pub mod llm;
pub mod process;
pub mod prompt;
pub mod search;
