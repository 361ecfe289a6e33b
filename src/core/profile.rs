//! # Model Profile Module / 模型配置档案模块
//!
//! Everything model-specific is bound once into a [`ModelProfile`] value:
//! where the source lives, how it is checked out, which scratch directory
//! it uses, and a [`Toolchain`] providing the build, run and compare steps.
//!
//! 所有与模型相关的内容都在构造时一次性绑定到 [`ModelProfile`] 值中：
//! 源码位置、检出方式、使用的 scratch 目录，以及提供构建、运行和比较步骤的 [`Toolchain`]。

use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::batch::{BatchScript, BatchSettings};
use crate::core::config::{RegressionConfig, Verification};
use crate::core::error::{ConfigError, StepError};
use crate::core::models::Combination;
use crate::core::scheduler::{ResourceRequest, ResourceTable};
use crate::infra::command::{self, display_command, split_command_line};
use crate::infra::host::HostProfile;
use crate::infra::repo::{CvsMode, RepoKind, RepositorySpec};

/// The supported model families. / 支持的模型族。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    ModelE,
    Geos,
    Gce,
    NuWrf,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::ModelE,
        ModelKind::Geos,
        ModelKind::Gce,
        ModelKind::NuWrf,
    ];

    /// The value accepted on the command line.
    pub fn cli_name(self) -> &'static str {
        match self {
            ModelKind::ModelE => "modelE",
            ModelKind::Geos => "GEOS",
            ModelKind::Gce => "GCE",
            ModelKind::NuWrf => "NuWRF",
        }
    }

    /// Name used in report banners and notifications.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::ModelE => "ModelE",
            ModelKind::Geos => "GEOS",
            ModelKind::Gce => "GCE",
            ModelKind::NuWrf => "NU-WRF",
        }
    }

    /// Directory under the scratch root holding this model's runs.
    pub fn scratch_dir_name(self) -> &'static str {
        self.cli_name()
    }

    /// Report header columns. / 报告表头列。
    pub fn header(self) -> &'static [&'static str] {
        match self {
            ModelKind::ModelE => &["RUNDECK", "COMPILER", "MODE", "CLONE", "BUILD", "RUN", "COMPARE"],
            _ => &["TEST", "COMPILER", "MODE", "CLONE", "BUILD", "RUN", "COMPARE"],
        }
    }

    /// All four families are git-hosted unless the configuration says otherwise.
    pub fn default_repo_kind(self) -> RepoKind {
        RepoKind::Git
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.cli_name() == s)
            .ok_or_else(|| format!("unknown model `{}`", s))
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The build, run and compare capabilities of a model.
/// 模型的构建、运行和比较能力。
pub trait Toolchain: Send + Sync {
    fn build<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>>;
    fn run<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>>;
    fn compare<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>>;
}

/// Runs user-configured commands for each step.
///
/// Commands are shell-expanded and split like a shell would, then the
/// placeholders `{test}`, `{compiler}`, `{mode}`, `{dir}`, `{code}` and
/// `{run}` are substituted in every argument. A step without a command
/// only logs and succeeds.
///
/// 为每个步骤运行用户配置的命令。未配置命令的步骤仅记录日志并视为成功。
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    pub build_command: Option<String>,
    pub run_command: Option<String>,
    pub compare_command: Option<String>,
    pub batch: Option<BatchSettings>,
    pub resources: ResourceTable,
    /// Per-test verification kind and core counts, for resource estimates.
    pub requests: IndexMap<String, (Verification, Vec<u32>)>,
}

impl CommandToolchain {
    pub fn new(
        build_command: Option<String>,
        run_command: Option<String>,
        compare_command: Option<String>,
    ) -> Self {
        Self {
            build_command,
            run_command,
            compare_command,
            ..Self::default()
        }
    }

    pub fn with_batch(mut self, settings: BatchSettings, resources: ResourceTable) -> Self {
        self.batch = Some(settings);
        self.resources = resources;
        self
    }

    /// Program and arguments with placeholders filled in.
    pub fn resolve(template: &str, combination: &Combination) -> anyhow::Result<(String, Vec<String>)> {
        let (program, args) = split_command_line(template)?;
        let fill = |part: &str| {
            part.replace("{test}", &combination.test)
                .replace("{compiler}", &combination.compiler)
                .replace("{mode}", &combination.mode)
                .replace("{dir}", &combination.dir.to_string_lossy())
                .replace("{code}", &combination.code_dir().to_string_lossy())
                .replace("{run}", &combination.run_dir().to_string_lossy())
        };
        Ok((fill(&program), args.iter().map(|a| fill(a)).collect()))
    }

    fn request_for(&self, combination: &Combination) -> ResourceRequest {
        let (verification, npes) = self
            .requests
            .get(&combination.test)
            .cloned()
            .unwrap_or_default();
        ResourceRequest::new(&combination.test, &combination.mode, verification, &npes)
    }

    async fn run_step(
        template: Option<&str>,
        step: &'static str,
        combination: &Combination,
        cwd: &Path,
    ) -> Result<(), String> {
        let Some(template) = template else {
            info!("{}: no {} command configured, nothing to do", combination, step);
            return Ok(());
        };
        let (program, args) = Self::resolve(template, combination).map_err(|e| format!("{:#}", e))?;
        let command_line = display_command(&program, &args);
        info!("{}: {} `{}`", combination, step, command_line);
        execute(&program, &args, cwd, &command_line).await
    }

    async fn run_script(&self, combination: &Combination) -> Result<(), String> {
        let Some(template) = self.run_command.as_deref() else {
            info!("{}: no run command configured, nothing to do", combination);
            return Ok(());
        };
        let (program, args) = Self::resolve(template, combination).map_err(|e| format!("{:#}", e))?;
        let run_dir = combination.run_dir();

        let mut script = BatchScript::new(
            &combination.test,
            &combination.mode,
            &run_dir,
            display_command(&program, &args),
        );
        if let Some(batch) = &self.batch {
            let estimate = self.resources.estimate(&self.request_for(combination));
            debug!("{}: requesting {}", combination, estimate);
            script = script.with_batch(estimate, batch.account.clone());
        }

        let path = script.write().map_err(|e| format!("{:#}", e))?;
        let (launcher, launch_args) = script
            .launcher(&path, self.batch.as_ref())
            .map_err(|e| format!("{:#}", e))?;
        let command_line = display_command(&launcher, &launch_args);
        info!("{}: run `{}`", combination, command_line);
        execute(&launcher, &launch_args, &run_dir, &command_line).await
    }
}

async fn execute(program: &str, args: &[String], cwd: &Path, command_line: &str) -> Result<(), String> {
    match command::run_captured(program, args, Some(cwd)).await {
        Ok(out) if out.success() => {
            if !out.output.trim().is_empty() {
                debug!("{}", out.output.trim_end());
            }
            Ok(())
        }
        Ok(out) => Err(format!(
            "`{}` exited with {}: {}",
            command_line,
            out.status,
            out.output.trim()
        )),
        Err(e) => Err(format!("failed to spawn `{}`: {}", command_line, e)),
    }
}

impl Toolchain for CommandToolchain {
    fn build<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move {
            Self::run_step(self.build_command.as_deref(), "build", combination, &combination.dir)
                .await
                .map_err(StepError::Build)
        })
    }

    fn run<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move { self.run_script(combination).await.map_err(StepError::Run) })
    }

    fn compare<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move {
            Self::run_step(self.compare_command.as_deref(), "compare", combination, &combination.dir)
                .await
                .map_err(StepError::Compare)
        })
    }
}

/// Model-specific capabilities bound once at construction.
/// 在构造时一次性绑定的模型特定能力。
#[derive(Clone)]
pub struct ModelProfile {
    pub model: ModelKind,
    pub repo_kind: RepoKind,
    pub repository: String,
    pub branch: Option<String>,
    pub clone_depth: Option<i64>,
    pub overwrite: bool,
    pub cvs_mode: CvsMode,
    pub cvs_module: Option<String>,
    pub cvs_user: Option<String>,
    pub host: HostProfile,
    pub scratch_root: PathBuf,
    pub toolchain: Arc<dyn Toolchain>,
}

impl fmt::Debug for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProfile")
            .field("model", &self.model)
            .field("repo_kind", &self.repo_kind)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("host", &self.host)
            .field("scratch_root", &self.scratch_root)
            .finish_non_exhaustive()
    }
}

impl ModelProfile {
    /// Binds a profile from the loaded configuration.
    ///
    /// The toolchain runs the configured step commands; with `usebatch` on,
    /// run steps are submitted with the ModelE resource table.
    pub fn from_config(
        model: ModelKind,
        config: &RegressionConfig,
        host: HostProfile,
    ) -> Result<Self, ConfigError> {
        let m = &config.model;
        let mut toolchain = CommandToolchain::new(
            m.build_command.clone(),
            m.run_command.clone(),
            m.compare_command.clone(),
        );
        if config.system.usebatch {
            let resources = ResourceTable::standard().map_err(|e| ConfigError::InvalidValue {
                key: "usebatch",
                reason: e.to_string(),
            })?;
            toolchain = toolchain.with_batch(
                BatchSettings {
                    submit_command: config.system.batch_command.clone(),
                    account: config.system.sponsorid.clone(),
                },
                resources,
            );
        }
        toolchain.requests = config
            .testcases
            .iter()
            .map(|spec| (spec.name.clone(), (spec.verification, spec.npes.clone())))
            .collect();

        Ok(Self {
            model,
            repo_kind: m.repo_type.unwrap_or_else(|| model.default_repo_kind()),
            repository: m.repository.clone(),
            branch: m.repo_branch.clone().filter(|b| !b.is_empty()),
            clone_depth: m.clone_depth,
            overwrite: m.overwrite,
            cvs_mode: m.cvs_mode.unwrap_or(CvsMode::Module),
            cvs_module: m.cvs_module.clone(),
            cvs_user: m.cvs_user.clone(),
            host,
            scratch_root: config.system.scratch_dir()?,
            toolchain: Arc::new(toolchain),
        })
    }

    /// A profile with a custom toolchain and no configuration file.
    pub fn new(
        model: ModelKind,
        repository: impl Into<String>,
        scratch_root: impl Into<PathBuf>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            model,
            repo_kind: model.default_repo_kind(),
            repository: repository.into(),
            branch: None,
            clone_depth: None,
            overwrite: true,
            cvs_mode: CvsMode::Module,
            cvs_module: None,
            cvs_user: None,
            host: HostProfile::Desktop,
            scratch_root: scratch_root.into(),
            toolchain,
        }
    }

    /// `<scratch root>/<model dir>`
    pub fn model_dir(&self) -> PathBuf {
        self.scratch_root.join(self.model.scratch_dir_name())
    }

    /// The checkout request for one destination.
    pub fn repository_spec(&self, destination: &Path) -> RepositorySpec {
        RepositorySpec {
            kind: self.repo_kind,
            source: self.repository.clone(),
            branch: self.branch.clone(),
            depth: self.clone_depth,
            overwrite: self.overwrite,
            host: self.host,
            destination: destination.to_path_buf(),
            cvs_mode: self.cvs_mode,
            cvs_module: self.cvs_module.clone(),
            cvs_user: self.cvs_user.clone(),
        }
    }
}
