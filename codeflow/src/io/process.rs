//! Child process execution with a timeout, piped input, and bounded output.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the output limit.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last `max_bytes` of stderr, for error messages.
    pub fn stderr_tail(&self, max_bytes: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let text = text.trim();
        let mut cut = text.len().saturating_sub(max_bytes);
        while !text.is_char_boundary(cut) {
            cut += 1;
        }
        text[cut..].to_string()
    }
}

/// Run `cmd`, feeding `input` on stdin, and capture stdout/stderr.
///
/// Stdin is written and both output pipes are drained on separate threads, so a child
/// that produces output before consuming all of its input cannot deadlock. At most
/// `output_limit_bytes` of each stream are kept; the remainder is drained and counted.
/// A child still running after `timeout` is killed and reported with `timed_out`.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs(), input_bytes = input.len()))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let payload = input.to_vec();
    let stdin_handle = thread::spawn(move || -> std::io::Result<()> {
        // Dropping stdin at the end of the closure closes the pipe so the child sees EOF.
        stdin.write_all(&payload)
    });
    let stdout_handle = thread::spawn(move || read_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    match stdin_handle.join() {
        Ok(Ok(())) => {}
        // The child may exit without reading all of its input; that is its business.
        Ok(Err(e)) => debug!(err = %e, "stdin write ended early"),
        Err(_) => return Err(anyhow!("stdin writer thread panicked")),
    }
    let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn pipes_input_through_to_stdout() {
        let output =
            run_with_input(sh("cat"), b"hello\n", Duration::from_secs(5), 1024).expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout_text(), "hello\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn bounds_captured_output() {
        let output = run_with_input(
            sh("printf 'abcdefghij'"),
            b"",
            Duration::from_secs(5),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, b"abcd");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn kills_commands_that_exceed_the_timeout() {
        let output =
            run_with_input(sh("sleep 5"), b"", Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    /// Large inputs must not deadlock a child that writes before it reads.
    #[test]
    fn large_input_does_not_deadlock() {
        let input = vec![b'x'; 1 << 20];
        let output = run_with_input(
            sh("echo started >&2; wc -c"),
            &input,
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert_eq!(output.stdout_text().trim(), "1048576");
        assert_eq!(output.stderr_tail(100), "started");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run_with_input(
            Command::new("definitely-not-a-real-program-codeflow"),
            b"",
            Duration::from_secs(1),
            16,
        )
        .expect_err("spawn fails");
        assert!(format!("{err:#}").contains("spawn"));
    }
}
