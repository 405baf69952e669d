//! External process execution with line-by-line output streaming.
//!
//! Stdout goes either to the log sink or to a capture file; stderr always
//! goes to the log sink. Lines are forwarded as soon as they are read, so a
//! transcript is complete up to the point of any later failure. There is no
//! timeout: a hung process hangs the run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::LogSink;
use crate::error::{CiError, CiResult};

/// Which exit codes count as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Any exit code (the `cmd || true` idiom).
    Any,
    /// Only the listed codes.
    Only(Vec<i32>),
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::Only(vec![0])
    }
}

impl ExitPolicy {
    pub fn accepts(&self, code: i32) -> bool {
        match self {
            ExitPolicy::Any => true,
            ExitPolicy::Only(codes) => codes.contains(&code),
        }
    }
}

/// An external command to run.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub accepted: ExitPolicy,
    /// Stderr substring marking a known, harmless failure.
    pub benign_stderr: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Run `line` through `sh -c`, for command lines carrying their own quoting.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(line)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn accept(mut self, policy: ExitPolicy) -> Self {
        self.accepted = policy;
        self
    }

    pub fn benign_stderr(mut self, needle: impl Into<String>) -> Self {
        self.benign_stderr = Some(needle.into());
        self
    }

    /// Human-readable command line.
    pub fn display(&self) -> String {
        if self.program == "sh" && self.args.first().map(String::as_str) == Some("-c") {
            return self.args[1..].join(" ");
        }
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub command: String,

    /// Exit code, -1 when killed by a signal.
    pub exit_code: i32,

    /// The process failed with the configured benign stderr text.
    pub known_issue: bool,

    pub duration_ms: u64,
}

/// Next raw line without its terminator. Bytes are kept as-is; callers decide
/// how to treat input that is not UTF-8.
async fn next_raw_line<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(true)
}

async fn pump_stdout<R>(reader: Option<R>, log: &LogSink, capture: Option<&Path>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut file = match capture {
        Some(path) => Some(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => None,
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while next_raw_line(&mut reader, &mut buf).await? {
        match file.as_mut() {
            Some(f) => {
                f.write_all(&buf)?;
                f.write_all(b"\n")?;
            }
            None => log.line(String::from_utf8_lossy(&buf)),
        }
    }
    if let Some(mut f) = file {
        f.flush()?;
    }
    Ok(())
}

async fn pump_stderr<R>(reader: Option<R>, log: &LogSink, benign: Option<&str>) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(false);
    };
    let mut seen_benign = false;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while next_raw_line(&mut reader, &mut buf).await? {
        let line = String::from_utf8_lossy(&buf);
        if benign.map(|b| line.contains(b)).unwrap_or(false) {
            seen_benign = true;
        }
        log.line(line);
    }
    Ok(seen_benign)
}

/// Runs external commands on behalf of stages.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run `spec` to completion, streaming output as it arrives.
    ///
    /// With `capture`, stdout is written to that file instead of the log.
    /// A failure whose stderr carries the benign text is returned as
    /// `known_issue` rather than an error.
    pub async fn run(spec: &CommandSpec, log: &LogSink, capture: Option<&Path>) -> CiResult<CommandResult> {
        let start = Instant::now();
        let command = spec.display();
        debug!(command = %command, cwd = ?spec.cwd, "spawning process");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|source| CiError::Spawn {
            command: command.clone(),
            source,
        })?;

        let (out, err) = tokio::join!(
            pump_stdout(child.stdout.take(), log, capture),
            pump_stderr(child.stderr.take(), log, spec.benign_stderr.as_deref()),
        );
        let status = child.wait().await?;
        out?;
        let known_issue = err? && !status.success();

        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        if known_issue {
            warn!(command = %command, exit_code, "process failed with known benign error");
        } else if !spec.accepted.accepts(exit_code) {
            return Err(CiError::UnexpectedExit { command, code: exit_code });
        }

        Ok(CommandResult {
            command,
            exit_code,
            known_issue,
            duration_ms,
        })
    }
}
