//! # Command Execution Module / 命令执行模块
//!
//! Spawns external processes, captures their combined output and waits for
//! them to exit. Every subprocess is awaited unconditionally; there is no
//! timeout or cancellation.
//!
//! 派生外部进程，捕获其合并输出并等待其退出。
//! 每个子进程都会被无条件等待；没有超时或取消。

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// The captured result of a finished process.
/// 已结束进程的捕获结果。
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Combined stdout and stderr, line by line. / 按行合并的 stdout 和 stderr。
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// # Arguments
/// * `cmd` - The `tokio::process::Command` to execute.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。
pub async fn spawn_and_capture(mut cmd: Command) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            return (
                Err(std::io::Error::other("failed to capture stdout")),
                String::new(),
            );
        }
    };
    let stderr = match child.stderr.take() {
        Some(stderr) => stderr,
        None => {
            return (
                Err(std::io::Error::other("failed to capture stderr")),
                String::new(),
            );
        }
    };

    // 使用 Arc<Mutex<String>> 来允许 stdout 和 stderr 任务并发写入。
    let output = Arc::new(tokio::sync::Mutex::new(String::new()));

    let stdout_output = Arc::clone(&output);
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stdout_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let stderr_output = Arc::clone(&output);
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stderr_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let status = child.wait().await;

    // Wait for both readers so that no trailing output is lost.
    // 等待两个读取任务完成，确保不丢失尾部输出。
    if let Err(e) = stdout_handle.await {
        debug!("failed to join stdout task: {}", e);
    }
    if let Err(e) = stderr_handle.await {
        debug!("failed to join stderr task: {}", e);
    }

    let captured = output.lock().await.clone();
    (status, captured)
}

/// Runs `program args...` in `cwd` (or the current directory) and captures its output.
/// 在 `cwd`（或当前目录）中运行 `program args...` 并捕获其输出。
pub async fn run_captured<S: AsRef<std::ffi::OsStr>>(
    program: impl AsRef<std::ffi::OsStr>,
    args: &[S],
    cwd: Option<&Path>,
) -> std::io::Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    debug!("spawning {:?}", cmd.as_std());

    let (status, output) = spawn_and_capture(cmd).await;
    Ok(CommandOutput {
        status: status?,
        output,
    })
}

/// A finished process whose streams were kept apart.
/// 输出流分开保存的已结束进程。
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Like [`run_captured`], but keeps stdout apart from stderr, for commands
/// whose stdout is parsed.
///
/// 与 [`run_captured`] 类似，但将 stdout 与 stderr 分开，用于需要解析 stdout 的命令。
pub async fn run_split<S: AsRef<std::ffi::OsStr>>(
    program: impl AsRef<std::ffi::OsStr>,
    args: &[S],
    cwd: Option<&Path>,
) -> std::io::Result<SplitOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    debug!("spawning {:?}", cmd.as_std());

    let output = cmd.output().await?;
    Ok(SplitOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Renders a program and its arguments as a single printable command line.
pub fn display_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .map(|part| shlex::try_quote(part).map(|q| q.into_owned()).unwrap_or_else(|_| part.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a configured command line into program and arguments, expanding
/// `~` and environment variables first.
///
/// 将配置的命令行拆分为程序和参数，先展开 `~` 和环境变量。
pub fn split_command_line(command_line: &str) -> anyhow::Result<(String, Vec<String>)> {
    let expanded = shellexpand::full(command_line)
        .map_err(|e| anyhow::anyhow!("failed to expand command `{}`: {}", command_line, e))?
        .to_string();
    let mut parts = shlex::split(&expanded)
        .ok_or_else(|| anyhow::anyhow!("failed to parse command: {}", expanded))?;
    if parts.is_empty() {
        anyhow::bail!("empty command after parsing: `{}`", command_line);
    }
    let program = parts.remove(0);
    Ok((program, parts))
}
