//! # Error Taxonomy / 错误分类
//!
//! Typed errors for every failure class of a regression run. Configuration
//! and scheduling errors are fatal for the whole run; checkout and step
//! errors are confined to the combination that raised them; dispatch errors
//! propagate to the caller.
//!
//! 回归运行中每一类失败的类型化错误。配置错误和调度错误对整个运行是致命的；
//! 检出错误和步骤错误只影响引发它们的组合；发送错误会向调用方传播。

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing configuration. Detected before any side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("test case `{name}` is malformed")]
    TestCase {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required key `{key}` in [{section}]")]
    MissingKey { section: &'static str, key: &'static str },

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Errors raised by the repository accessor. No retries are attempted.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid repository specification: {0}")]
    InvalidRepoSpec(String),

    #[error("destination {0} already exists and overwrite is disabled")]
    DestinationExists(PathBuf),

    #[error("`{command}` failed: {output}")]
    CheckoutFailed { command: String, output: String },

    #[error("checkout into {0} exited successfully but could not be verified")]
    CheckoutUnverified(PathBuf),
}

/// Failure of a build, run or compare step for one combination.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("build failed: {0}")]
    Build(String),

    #[error("run failed: {0}")]
    Run(String),

    #[error("compare failed: {0}")]
    Compare(String),
}

/// An invalid dependency graph. Fatal for the entire run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("all rundecks have dependencies; cannot proceed")]
    NoRoot,

    #[error("required dependency `{dependency}` of `{test}` not found")]
    MissingDependency { test: String, dependency: String },

    #[error("found multilayer/circular dependency on rundeck `{dependency}` (required by `{test}`)")]
    MultiLevelDependency { test: String, dependency: String },

    #[error("run mode `{mode}` of `{test}` not available in dependency `{dependency}`")]
    ModeMismatch {
        test: String,
        dependency: String,
        mode: String,
    },

    #[error("compiler `{compiler}` of `{test}` not available in dependency `{dependency}`")]
    CompilerMismatch {
        test: String,
        dependency: String,
        compiler: String,
    },
}

/// Errors raised while handing a report to the mail transport.
#[derive(Debug, Error)]
pub enum ReportDispatchError {
    #[error("no recipients configured in [reportconfig] mailto")]
    NoRecipients,

    #[error("invalid mailer command `{0}`")]
    InvalidMailer(String),

    #[error("failed to stage report file")]
    Io(#[from] std::io::Error),

    #[error("mailer `{command}` failed: {output}")]
    MailerFailed { command: String, output: String },
}
