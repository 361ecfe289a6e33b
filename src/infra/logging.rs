//! # Logging Context Module / 日志上下文模块
//!
//! Logging is an explicit value built once per run rather than process-wide
//! state. A [`LogContext`] owns a `tracing` dispatcher assembled from
//! pluggable sinks (stderr, a log file, an in-memory capture buffer) and is
//! installed as the scoped default only while a run executes.
//!
//! 日志是每次运行构建一次的显式值，而不是进程级全局状态。
//! [`LogContext`] 持有由可插拔输出端（stderr、日志文件、内存捕获缓冲区）
//! 组装而成的 `tracing` 分发器，并且仅在运行期间作为作用域默认值安装。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::dispatcher::{self, DefaultGuard};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer};

/// Name of the live log file before it is renamed at the end of the run.
pub const LOG_FILE_NAME: &str = "assert.log";

/// Shared in-memory sink. Useful for tests and for embedding the runner.
/// 共享的内存输出端，便于测试和嵌入使用。
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

pub struct CaptureWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("capture buffer poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureBuffer {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder selecting which sinks a [`LogContext`] writes to.
/// 用于选择 [`LogContext`] 写入哪些输出端的构建器。
#[derive(Debug, Default)]
pub struct LogContextBuilder {
    stderr: Option<Level>,
    file: Option<(PathBuf, Level)>,
    capture: Option<(CaptureBuffer, Level)>,
}

impl LogContextBuilder {
    /// Human-oriented lines on stderr. / 在 stderr 上输出面向人的日志行。
    pub fn stderr(mut self, level: Level) -> Self {
        self.stderr = Some(level);
        self
    }

    /// Append to `<dir>/assert.log`. / 追加写入 `<dir>/assert.log`。
    pub fn file(mut self, dir: &Path, level: Level) -> Self {
        self.file = Some((dir.join(LOG_FILE_NAME), level));
        self
    }

    /// Copy every event into an in-memory buffer.
    pub fn capture(mut self, buffer: CaptureBuffer, level: Level) -> Self {
        self.capture = Some((buffer, level));
        self
    }

    pub fn build(self) -> Result<LogContext> {
        let stderr_layer = self.stderr.map(|level| {
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(LevelFilter::from_level(level))
        });

        let file_layer = match &self.file {
            Some((path, level)) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create log directory: {}", parent.display())
                    })?;
                }
                let file: File = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_filter(LevelFilter::from_level(*level)),
                )
            }
            None => None,
        };

        let capture_layer = self.capture.map(|(buffer, level)| {
            fmt::layer()
                .with_writer(buffer)
                .with_ansi(false)
                .without_time()
                .with_filter(LevelFilter::from_level(level))
        });

        let subscriber = tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .with(capture_layer);

        Ok(LogContext {
            dispatch: Dispatch::new(subscriber),
            log_file: self.file.map(|(path, _)| path),
        })
    }
}

/// An explicit logging context passed to the components of one run.
/// 传递给一次运行中各组件的显式日志上下文。
#[derive(Clone)]
pub struct LogContext {
    dispatch: Dispatch,
    log_file: Option<PathBuf>,
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext")
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

impl LogContext {
    pub fn builder() -> LogContextBuilder {
        LogContextBuilder::default()
    }

    /// A context that discards everything.
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
            log_file: None,
        }
    }

    /// Installs this context as the default for the current thread until the
    /// returned guard is dropped.
    ///
    /// 将此上下文安装为当前线程的默认值，直到返回的 guard 被丢弃。
    pub fn enter(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    /// Wraps a future so that every poll logs through this context.
    /// 包装一个 future，使其每次轮询都通过此上下文记录日志。
    pub fn scope<F: Future>(&self, future: F) -> WithDispatch<F> {
        future.with_subscriber(self.dispatch.clone())
    }

    /// Runs `f` with this context as the default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Renames the live log file to `assert_<YYYY-MM-DD_HH-MM-SS>.log`
    /// using the run's start time. Returns the new path.
    ///
    /// 使用运行开始时间将日志文件重命名为 `assert_<YYYY-MM-DD_HH-MM-SS>.log`。
    pub fn finish(self, start_time: DateTime<Local>) -> Result<Option<PathBuf>> {
        let Some(path) = self.log_file else {
            return Ok(None);
        };
        drop(self.dispatch);
        if !path.exists() {
            return Ok(None);
        }
        let renamed = timestamped_log_path(&path, start_time);
        fs::rename(&path, &renamed).with_context(|| {
            format!(
                "Failed to rename log file {} to {}",
                path.display(),
                renamed.display()
            )
        })?;
        Ok(Some(renamed))
    }
}

/// `<dir>/assert_<YYYY-MM-DD_HH-MM-SS>.log`
pub fn timestamped_log_path(live: &Path, start_time: DateTime<Local>) -> PathBuf {
    let name = format!("assert_{}.log", start_time.format("%Y-%m-%d_%H-%M-%S"));
    live.with_file_name(name)
}
