//! Stable exit codes for codeflow CLI commands.

/// The run finished, or the command succeeded.
pub const OK: i32 = 0;
/// The run started but ended on a fatal error (its response explains why).
pub const RUN_FAILED: i32 = 1;
/// Invalid config, arguments, or working directory; nothing was run.
pub const INVALID: i32 = 2;
