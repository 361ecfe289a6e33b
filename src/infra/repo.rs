//! # Repository Accessor Module / 仓库访问模块
//!
//! One checkout contract over three version-control backends.
//!
//! - **git**: validated source, optional branch and depth, overwrite handling,
//!   and an independent post-checkout verification.
//! - **cvs**: whole-project checkout, per-module checkout, and a
//!   query-then-update mode.
//! - **svn**: idempotent checkout without verification.
//!
//! 三种版本控制后端之上的统一检出约定。

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::error::CheckoutError;
use crate::infra::command::{self, display_command};
use crate::infra::fs::{is_directory, is_non_empty_dir};
use crate::infra::host::HostProfile;

/// Supported version-control backends. / 支持的版本控制后端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Git,
    Cvs,
    Svn,
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepoKind::Git => "git",
            RepoKind::Cvs => "cvs",
            RepoKind::Svn => "svn",
        };
        f.write_str(name)
    }
}

/// How a CVS checkout is performed. / CVS 检出的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CvsMode {
    /// Whole project into a shared directory; skipped if it already exists.
    #[default]
    Project,
    /// One module at an explicit tag into a caller-specified directory.
    Module,
    /// Query files needing update, then update only those.
    Update,
}

/// Everything needed for one checkout. Transient.
/// 一次检出所需的全部信息。临时使用。
#[derive(Debug, Clone)]
pub struct RepositorySpec {
    pub kind: RepoKind,
    /// URL, `user@host:path`, CVS root or local path.
    pub source: String,
    /// Git branch or CVS tag.
    pub branch: Option<String>,
    /// Git clone depth; must be positive when present.
    pub depth: Option<i64>,
    pub overwrite: bool,
    pub host: HostProfile,
    pub destination: PathBuf,
    pub cvs_mode: CvsMode,
    pub cvs_module: Option<String>,
    pub cvs_user: Option<String>,
}

impl RepositorySpec {
    pub fn new(kind: RepoKind, source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
            branch: None,
            depth: None,
            overwrite: false,
            host: HostProfile::Desktop,
            destination: destination.into(),
            cvs_mode: CvsMode::default(),
            cvs_module: None,
            cvs_user: None,
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_depth(mut self, depth: Option<i64>) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_host(mut self, host: HostProfile) -> Self {
        self.host = host;
        self
    }
}

/// What a successful checkout did. / 成功检出所执行的操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// A fresh tree was fetched.
    Cloned,
    /// The destination already existed; nothing was fetched.
    AlreadyPresent,
    /// CVS update touched these files.
    Updated(Vec<String>),
    /// CVS update found nothing to do.
    NothingChanged,
}

/// The checkout contract. Implementations may be swapped, e.g. in tests.
/// 检出约定。实现可以被替换，例如在测试中。
pub trait RepositoryAccessor: Send + Sync {
    fn checkout<'a>(
        &'a self,
        spec: &'a RepositorySpec,
    ) -> BoxFuture<'a, Result<CheckoutOutcome, CheckoutError>>;
}

/// Production accessor driving the real version-control executables.
/// 驱动真实版本控制可执行文件的生产实现。
#[derive(Debug, Clone, Default)]
pub struct VcsAccessor {
    /// Replaces the resolved git binary. Mostly for tests.
    pub git_program: Option<PathBuf>,
    pub cvs_program: Option<PathBuf>,
    pub svn_program: Option<PathBuf>,
}

impl VcsAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn git_binary(&self, host: HostProfile) -> PathBuf {
        self.git_program
            .clone()
            .unwrap_or_else(|| git_binary_for(host))
    }

    fn cvs_binary(&self) -> PathBuf {
        self.cvs_program.clone().unwrap_or_else(|| PathBuf::from("cvs"))
    }

    fn svn_binary(&self) -> PathBuf {
        self.svn_program.clone().unwrap_or_else(|| PathBuf::from("svn"))
    }
}

impl RepositoryAccessor for VcsAccessor {
    fn checkout<'a>(
        &'a self,
        spec: &'a RepositorySpec,
    ) -> BoxFuture<'a, Result<CheckoutOutcome, CheckoutError>> {
        Box::pin(async move {
            match spec.kind {
                RepoKind::Git => git_clone(&self.git_binary(spec.host), spec).await,
                RepoKind::Cvs => match spec.cvs_mode {
                    CvsMode::Project => cvs_checkout_project(&self.cvs_binary(), spec).await,
                    CvsMode::Module => cvs_checkout_module(&self.cvs_binary(), spec).await,
                    CvsMode::Update => cvs_update(&self.cvs_binary(), spec).await,
                },
                RepoKind::Svn => svn_checkout(&self.svn_binary(), spec).await,
            }
        })
    }
}

/// Host-specific git executable. / 特定主机上的 git 可执行文件。
pub fn git_binary_for(host: HostProfile) -> PathBuf {
    match host {
        HostProfile::Discover => PathBuf::from("/usr/local/other/git/2.30.2/libexec/git-core/git"),
        HostProfile::Pleiades => PathBuf::from("/nobackup/gmao_SIteam/git/git-2.21.0/bin/git"),
        HostProfile::Desktop => PathBuf::from("git"),
    }
}

/// `scheme://...` or scp-like `user@host:path`.
pub fn looks_like_url(source: &str) -> bool {
    if let Some((scheme, rest)) = source.split_once("://") {
        return !scheme.is_empty()
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
            && !rest.is_empty();
    }
    match source.split_once('@') {
        Some((user, rest)) => !user.is_empty() && rest.contains(':') && !rest.starts_with(':'),
        None => false,
    }
}

/// Builds the `git clone` argument list (without the program).
///
/// A depth of zero or less is a configuration error, never silently dropped.
///
/// 构建 `git clone` 参数列表（不含程序名）。深度小于等于零属于配置错误。
pub fn git_clone_args(spec: &RepositorySpec) -> Result<Vec<String>, CheckoutError> {
    let mut args = vec!["clone".to_string()];

    if let Some(branch) = spec.branch.as_deref().filter(|b| !b.is_empty()) {
        args.push("-b".to_string());
        args.push(branch.to_string());
    }

    if let Some(depth) = spec.depth {
        if depth <= 0 {
            return Err(CheckoutError::InvalidRepoSpec(format!(
                "clone depth must be a positive integer, got {}",
                depth
            )));
        }
        args.push("--depth".to_string());
        args.push(depth.to_string());
    }

    args.push(spec.source.clone());
    args.push(spec.destination.to_string_lossy().into_owned());
    Ok(args)
}

/// The source must be an address that answers, or an existing local directory.
async fn validate_git_source(git: &Path, source: &str) -> Result<(), CheckoutError> {
    if source.trim().is_empty() {
        return Err(CheckoutError::InvalidRepoSpec("empty repository source".to_string()));
    }
    if is_directory(Path::new(source)) {
        return Ok(());
    }
    if looks_like_url(source) {
        let reachable = command::run_captured(git, &["ls-remote", "-q", source], None).await;
        return match reachable {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => Err(CheckoutError::InvalidRepoSpec(format!(
                "repository `{}` is not reachable: {}",
                source,
                out.output.trim()
            ))),
            Err(e) => Err(CheckoutError::InvalidRepoSpec(format!(
                "could not probe repository `{}`: {}",
                source, e
            ))),
        };
    }
    Err(CheckoutError::InvalidRepoSpec(format!(
        "`{}` is neither a reachable address nor an existing local directory",
        source
    )))
}

/// Clones a git repository and verifies the result.
///
/// Fails with `DestinationExists` when the destination is present and
/// overwrite is off; the existing content is left untouched. With overwrite
/// on, the destination is removed first and a failed removal aborts.
///
/// 克隆 git 仓库并验证结果。目标已存在且未开启覆盖时失败，且不触碰已有内容。
pub async fn git_clone(git: &Path, spec: &RepositorySpec) -> Result<CheckoutOutcome, CheckoutError> {
    let args = git_clone_args(spec)?;
    validate_git_source(git, &spec.source).await?;

    let dest = &spec.destination;
    if is_occupied(dest) {
        if !spec.overwrite {
            warn!("destination {} already exists, not cloning", dest.display());
            return Err(CheckoutError::DestinationExists(dest.clone()));
        }
        debug!("overwriting existing {} directory", dest.display());
        crate::infra::fs::clean_dir(dest).map_err(|e| CheckoutError::CheckoutFailed {
            command: format!("remove {}", dest.display()),
            output: format!("{:#}", e),
        })?;
    }

    let program = git.to_string_lossy().into_owned();
    let command_line = display_command(&program, &args);
    match spec.branch.as_deref() {
        Some(branch) => info!("cloning [repo: {}, tag: {}]", spec.source, branch),
        None => info!("cloning [repo: {}]", spec.source),
    }

    run_checked(git, &args, None, &command_line).await?;

    if confirm_checkout(dest) {
        info!("git clone into {} verified", dest.display());
        Ok(CheckoutOutcome::Cloned)
    } else {
        Err(CheckoutError::CheckoutUnverified(dest.clone()))
    }
}

/// A destination counts as present unless it is missing or an empty directory.
pub fn is_occupied(dest: &Path) -> bool {
    dest.exists() && !(is_directory(dest) && !is_non_empty_dir(dest))
}

/// The destination must exist and be non-empty or carry a `.git` marker.
/// 目标目录必须存在，并且非空或带有 `.git` 标记。
pub fn confirm_checkout(dest: &Path) -> bool {
    if !is_directory(dest) {
        debug!("repo directory {} not created", dest.display());
        return false;
    }
    if !is_non_empty_dir(dest) && !dest.join(".git").exists() {
        debug!("repo directory {} is empty", dest.display());
        return false;
    }
    true
}

/// `:ext:<user>@<source>` when a user is given, otherwise the source itself.
pub fn cvs_root(spec: &RepositorySpec) -> String {
    match spec.cvs_user.as_deref().filter(|u| !u.is_empty()) {
        Some(user) => format!(":ext:{}@{}", user, spec.source),
        None => spec.source.clone(),
    }
}

fn cvs_checkout_args(spec: &RepositorySpec) -> Result<Vec<String>, CheckoutError> {
    let tag = spec
        .branch
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CheckoutError::InvalidRepoSpec("cvs checkout requires a tag".to_string()))?;
    let module = spec
        .cvs_module
        .clone()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| CheckoutError::InvalidRepoSpec("cvs checkout requires a module".to_string()))?;
    Ok(vec![
        "-Q".to_string(),
        "-d".to_string(),
        cvs_root(spec),
        "co".to_string(),
        "-P".to_string(),
        "-r".to_string(),
        tag,
        module,
    ])
}

/// Whole-project CVS checkout into a shared directory. Idempotent.
/// 将整个项目检出到共享目录。幂等。
pub async fn cvs_checkout_project(
    cvs: &Path,
    spec: &RepositorySpec,
) -> Result<CheckoutOutcome, CheckoutError> {
    if is_occupied(&spec.destination) {
        info!("{} already checked out, skipping", spec.destination.display());
        return Ok(CheckoutOutcome::AlreadyPresent);
    }
    let args = cvs_checkout_args(spec)?;
    create_destination(&spec.destination)?;
    info!("checking out {} into {}", spec.source, spec.destination.display());
    let command_line = display_command(&cvs.to_string_lossy(), &args);
    run_checked(cvs, &args, Some(&spec.destination), &command_line).await?;
    Ok(CheckoutOutcome::Cloned)
}

/// Checks out one module at an explicit tag into the given directory.
/// 将单个模块按指定标签检出到给定目录。
pub async fn cvs_checkout_module(
    cvs: &Path,
    spec: &RepositorySpec,
) -> Result<CheckoutOutcome, CheckoutError> {
    let args = cvs_checkout_args(spec)?;
    create_destination(&spec.destination)?;
    info!(
        "checking out [tag: {}, module: {}] into {}",
        spec.branch.as_deref().unwrap_or_default(),
        spec.cvs_module.as_deref().unwrap_or_default(),
        spec.destination.display()
    );
    let command_line = display_command(&cvs.to_string_lossy(), &args);
    run_checked(cvs, &args, Some(&spec.destination), &command_line).await?;
    Ok(CheckoutOutcome::Cloned)
}

/// Files flagged `U` in the stdout of a `cvs -nq up` dry run. Parsing stops
/// at the first blank line.
pub fn parse_cvs_update_query(output: &str) -> Vec<String> {
    output
        .lines()
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.strip_prefix("U "))
        .map(|file| file.trim().to_string())
        .filter(|file| !file.is_empty())
        .collect()
}

/// Dry-run query, then update only the files that need it.
/// Returns `NothingChanged` when the query finds nothing.
///
/// 先进行试运行查询，然后只更新需要更新的文件。查询为空时返回 `NothingChanged`。
pub async fn cvs_update(cvs: &Path, spec: &RepositorySpec) -> Result<CheckoutOutcome, CheckoutError> {
    let tag = spec
        .branch
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CheckoutError::InvalidRepoSpec("cvs update requires a tag".to_string()))?;
    if !is_directory(&spec.destination) {
        return Err(CheckoutError::InvalidRepoSpec(format!(
            "cvs update target {} does not exist",
            spec.destination.display()
        )));
    }

    info!("updating {} to {}", spec.destination.display(), tag);
    let query_args = ["-nq", "up", "-r", tag.as_str()];
    let command_line = display_command(&cvs.to_string_lossy(), &query_args);
    let query = match command::run_split(cvs, &query_args, Some(&spec.destination)).await {
        Ok(out) if out.status.success() => {
            if !out.stderr.trim().is_empty() {
                debug!("{} stderr: {}", command_line, out.stderr.trim());
            }
            out.stdout
        }
        Ok(out) => {
            return Err(CheckoutError::CheckoutFailed {
                command: command_line,
                output: format!("{}{}", out.stdout, out.stderr).trim().to_string(),
            });
        }
        Err(e) => {
            return Err(CheckoutError::CheckoutFailed {
                command: command_line,
                output: e.to_string(),
            });
        }
    };

    let files = parse_cvs_update_query(&query);
    if files.is_empty() {
        info!("nothing to update");
        return Ok(CheckoutOutcome::NothingChanged);
    }

    for file in &files {
        let args = ["up", "-r", tag.as_str(), file.as_str()];
        let command_line = display_command(&cvs.to_string_lossy(), &args);
        run_checked(cvs, &args, Some(&spec.destination), &command_line).await?;
    }
    for file in &files {
        info!("updated {} (tag {})", file, tag);
    }
    Ok(CheckoutOutcome::Updated(files))
}

/// SVN checkout, skipped when the destination exists.
///
/// There is no post-checkout verification here: a zero exit is taken as
/// success. This is a strictly weaker guarantee than [`git_clone`].
///
/// SVN 检出，目标存在时跳过。这里没有检出后验证，保证严格弱于 [`git_clone`]。
pub async fn svn_checkout(svn: &Path, spec: &RepositorySpec) -> Result<CheckoutOutcome, CheckoutError> {
    if is_occupied(&spec.destination) {
        info!("{} already checked out, skipping", spec.destination.display());
        return Ok(CheckoutOutcome::AlreadyPresent);
    }
    if spec.source.trim().is_empty() {
        return Err(CheckoutError::InvalidRepoSpec("empty repository source".to_string()));
    }
    let args = vec![
        "--quiet".to_string(),
        "checkout".to_string(),
        spec.source.clone(),
        spec.destination.to_string_lossy().into_owned(),
    ];
    info!("checking out {} into {}", spec.source, spec.destination.display());
    let command_line = display_command(&svn.to_string_lossy(), &args);
    run_checked(svn, &args, None, &command_line).await?;
    Ok(CheckoutOutcome::Cloned)
}

fn create_destination(dest: &Path) -> Result<(), CheckoutError> {
    crate::infra::fs::create_dir(dest).map_err(|e| CheckoutError::CheckoutFailed {
        command: format!("mkdir {}", dest.display()),
        output: format!("{:#}", e),
    })
}

/// Runs a VCS command, mapping spawn errors and non-zero exits to `CheckoutFailed`.
async fn run_checked<S: AsRef<std::ffi::OsStr>>(
    program: &Path,
    args: &[S],
    cwd: Option<&Path>,
    command_line: &str,
) -> Result<String, CheckoutError> {
    match command::run_captured(program, args, cwd).await {
        Ok(out) if out.success() => Ok(out.output),
        Ok(out) => Err(CheckoutError::CheckoutFailed {
            command: command_line.to_string(),
            output: out.output.trim().to_string(),
        }),
        Err(e) => Err(CheckoutError::CheckoutFailed {
            command: command_line.to_string(),
            output: e.to_string(),
        }),
    }
}
