//! # Configuration Module / 配置模块
//!
//! Loads the regression configuration document. The document has four
//! top-level sections: `[modelconfig]`, `[systemconfig]`, `[reportconfig]`
//! and `[testcases]`, whose nested tables each become a [`TestCaseSpec`]
//! named after the table key. Table order is preserved.
//!
//! 加载回归配置文件。文件包含四个顶层部分：`[modelconfig]`、`[systemconfig]`、
//! `[reportconfig]` 和 `[testcases]`，其中每个嵌套表都会成为一个以表键命名的
//! [`TestCaseSpec`]。表的顺序会被保留。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;
use crate::core::matrix::axis_values;
use crate::infra::repo::{CvsMode, RepoKind};

/// How a regression test is verified. Anything not recognized is a regular run.
/// 回归测试的验证方式。无法识别的值视为常规运行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Verification {
    /// Only compile the rundeck.
    CompileOnly,
    /// A long custom run (typically two model months).
    CustomRun,
    /// One-hour run plus restart reproducibility check.
    RestartRun,
    #[default]
    #[serde(other)]
    Regular,
}

/// A single test case (rundeck) entry from the `[testcases]` section.
/// 来自 `[testcases]` 部分的单个测试用例（rundeck）条目。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestCaseSpec {
    /// Unique name, taken from the table key. / 唯一名称，取自表键。
    #[serde(skip)]
    pub name: String,
    /// A single compiler or a list of compilers. Kept raw so that an
    /// unrecognized shape can be reported and treated as empty.
    #[serde(default)]
    pub compilers: Option<toml::Value>,
    /// A single mode or a list of modes (e.g. `serial`, `mpi`).
    #[serde(default)]
    pub modes: Option<toml::Value>,
    /// Requested core counts. / 请求的核心数列表。
    #[serde(default)]
    pub npes: Vec<u32>,
    /// Comma-separated names of the rundecks this one depends on, or `"none"`.
    #[serde(default = "default_dependency", alias = "dependency")]
    pub dependencies: String,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub unittest: bool,
    #[serde(default)]
    pub endtime: Option<String>,
    /// Explicit enable flag. A spec without it is not runnable.
    /// 显式启用标志。没有该标志的用例不可运行。
    #[serde(default)]
    pub run: Option<bool>,
}

impl TestCaseSpec {
    /// Creates a spec with the given name and no other settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compilers: None,
            modes: None,
            npes: Vec::new(),
            dependencies: default_dependency(),
            verification: Verification::default(),
            unittest: false,
            endtime: None,
            run: None,
        }
    }

    /// The dependency names in listed order. Empty when the test case is
    /// dependency-free.
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies
            .split(',')
            .map(str::trim)
            .filter(|dep| !dep.is_empty() && !dep.eq_ignore_ascii_case("none"))
            .collect()
    }

    /// Test names and axis values end up as whitespace-separated report
    /// columns and as directory names, so neither may contain whitespace.
    ///
    /// 测试名和轴取值会成为以空白分隔的报告列以及目录名，因此都不能包含空白。
    pub fn check_names(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "testcases",
                reason: format!("test case name `{}` is empty or contains whitespace", self.name),
            });
        }
        for (key, value) in [("compilers", &self.compilers), ("modes", &self.modes)] {
            let values = axis_values(value.as_ref()).unwrap_or_default();
            if let Some(bad) = values
                .iter()
                .find(|v| v.is_empty() || v.chars().any(char::is_whitespace))
            {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!(
                        "`{}` in test case `{}` is empty or contains whitespace",
                        bad, self.name
                    ),
                });
            }
        }
        Ok(())
    }
}

fn default_dependency() -> String {
    "none".to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_command() -> String {
    "sbatch".to_string()
}

/// `[modelconfig]`: where the model source lives and how each step is driven.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Repository URL or local path. / 仓库 URL 或本地路径。
    pub repository: String,
    /// Overrides the model's default version-control backend.
    #[serde(default)]
    pub repo_type: Option<RepoKind>,
    #[serde(default)]
    pub repo_branch: Option<String>,
    #[serde(default)]
    pub clone_depth: Option<i64>,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default)]
    pub cvs_module: Option<String>,
    #[serde(default)]
    pub cvs_user: Option<String>,
    /// CVS checkout style for each combination. Defaults to `module`.
    #[serde(default)]
    pub cvs_mode: Option<CvsMode>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub run_command: Option<String>,
    #[serde(default)]
    pub compare_command: Option<String>,
}

/// What happens to a combination's working directory once its pipeline ends.
/// 组合的流水线结束后，其工作目录的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Purge only when all four steps succeeded. / 仅当四个步骤全部成功时清除。
    #[default]
    OnSuccess,
    /// Keep every directory. / 保留所有目录。
    Never,
    /// Purge every directory, failed ones included. / 清除所有目录，包括失败的。
    Always,
}

impl CleanupPolicy {
    pub fn should_purge(self, fully_succeeded: bool) -> bool {
        match self {
            CleanupPolicy::OnSuccess => fully_succeeded,
            CleanupPolicy::Never => false,
            CleanupPolicy::Always => true,
        }
    }
}

/// `[systemconfig]`: scratch space, batch system and host settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    pub scratchdir: String,
    /// Reset the scratch directory once the run completes.
    #[serde(default)]
    pub cleanscratch: bool,
    #[serde(default)]
    pub cleanup: CleanupPolicy,
    /// Submit run steps to the batch system instead of running them interactively.
    #[serde(default)]
    pub usebatch: bool,
    #[serde(default = "default_batch_command")]
    pub batch_command: String,
    /// Batch account charged for submitted jobs.
    #[serde(default)]
    pub sponsorid: Option<String>,
    /// Forces a host profile (`DISCOVER`, `PLEIADES`, `DESKTOP`) instead of detecting it.
    #[serde(default)]
    pub host: Option<String>,
    /// Directory holding `assert.log`. Defaults to the working directory.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl SystemConfig {
    /// The scratch root with `~` and environment variables expanded.
    pub fn scratch_dir(&self) -> Result<PathBuf, ConfigError> {
        expand_path("scratchdir", &self.scratchdir)
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.log_dir {
            Some(dir) => expand_path("log_dir", dir),
            None => Ok(PathBuf::from(".")),
        }
    }
}

/// `[reportconfig]`: subject, recipients and format of the emailed report.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Subject message. / 邮件主题。
    #[serde(default)]
    pub message: String,
    /// A single address or a list of addresses.
    #[serde(default)]
    pub mailto: Option<toml::Value>,
    #[serde(default)]
    pub html: bool,
    /// Overrides the mail command (split with shell quoting rules).
    #[serde(default)]
    pub mailer: Option<String>,
    /// Also write the result rows as JSON to this path.
    #[serde(default)]
    pub results_json: Option<String>,
}

impl ReportConfig {
    /// The recipient list. Missing or malformed values yield an empty list;
    /// that only becomes an error when the report is dispatched.
    pub fn recipients(&self) -> Vec<String> {
        match &self.mailto {
            Some(toml::Value::String(addr)) if !addr.trim().is_empty() => {
                vec![addr.trim().to_string()]
            }
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    modelconfig: ModelConfig,
    systemconfig: SystemConfig,
    #[serde(default)]
    reportconfig: ReportConfig,
    #[serde(default)]
    testcases: toml::Table,
}

/// The entire regression configuration, loaded from a TOML file.
/// 从 TOML 文件加载的完整回归配置。
#[derive(Debug, Clone)]
pub struct RegressionConfig {
    pub model: ModelConfig,
    pub system: SystemConfig,
    pub report: ReportConfig,
    /// Test cases in document order. / 按文档顺序排列的测试用例。
    pub testcases: Vec<TestCaseSpec>,
    /// Path of the file this configuration was read from.
    pub source: PathBuf,
}

impl RegressionConfig {
    /// Parses a configuration document. `source` is only used for messages.
    pub fn from_toml_str(content: &str, source: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: source.to_path_buf(),
            source: e,
        })?;

        if raw.systemconfig.scratchdir.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                section: "systemconfig",
                key: "scratchdir",
            });
        }
        if raw.modelconfig.repository.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                section: "modelconfig",
                key: "repository",
            });
        }

        let testcases = get_testcases(raw.testcases)?;

        Ok(Self {
            model: raw.modelconfig,
            system: raw.systemconfig,
            report: raw.reportconfig,
            testcases,
            source: source.to_path_buf(),
        })
    }
}

/// Reads and parses the configuration file at `path`.
/// 读取并解析 `path` 处的配置文件。
pub fn load_config(path: &Path) -> Result<RegressionConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    RegressionConfig::from_toml_str(&content, path)
}

/// Turns each `[testcases.<name>]` table into a spec named `<name>`.
fn get_testcases(section: toml::Table) -> Result<Vec<TestCaseSpec>, ConfigError> {
    section
        .into_iter()
        .map(|(name, value)| {
            let mut spec: TestCaseSpec = value.try_into().map_err(|e| ConfigError::TestCase {
                name: name.clone(),
                source: e,
            })?;
            spec.name = name;
            spec.check_names()?;
            Ok(spec)
        })
        .collect()
}

fn expand_path(key: &'static str, raw: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}
