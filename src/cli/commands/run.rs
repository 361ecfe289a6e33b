//! # Run Command Module / 运行命令模块
//!
//! Executes one regression run end to end: load the configuration, build the
//! logging context, reset the scratch space, schedule the test matrix, run
//! every combination, then render and mail the report.
//!
//! 端到端执行一次回归运行：加载配置、构建日志上下文、重置 scratch 空间、
//! 调度测试矩阵、运行每个组合，然后渲染并发送报告。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};

use crate::{
    core::{
        config::{self, RegressionConfig},
        error::ConfigError,
        execution::RegressionManager,
        matrix::TestcaseMatrix,
        models::TestResult,
        profile::{ModelKind, ModelProfile},
        scheduler::DependencyGraph,
    },
    infra::{
        fs,
        host::HostProfile,
        logging::LogContext,
        repo::{RepositoryAccessor, VcsAccessor},
        t,
    },
    reporting::{console::print_summary, mail, report::Report},
};

/// Timestamp appended to each test directory name.
pub const DIR_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<TestResult>,
    pub rendered: String,
}

/// Executes the run command.
///
/// # Arguments
/// * `config_path` - Path to the regression configuration file
/// * `model` - Model family selected on the command line
pub async fn execute(config_path: PathBuf, model: ModelKind) -> Result<()> {
    let start_time = Local::now();

    let config = config::load_config(&config_path)
        .with_context(|| t!("run.config_failed", path = config_path.display()).to_string())?;

    let log_dir = config.system.log_dir()?;
    let logging = LogContext::builder()
        .stderr(Level::WARN)
        .file(&log_dir, Level::DEBUG)
        .build()?;

    println!(
        "{}",
        t!("run.commencing", model = model.cli_name(), path = config_path.display()).bold()
    );

    let outcome = logging
        .scope(run_regression(
            &config,
            model,
            Box::new(VcsAccessor::new()),
            start_time,
        ))
        .await;

    match logging.finish(start_time) {
        Ok(Some(path)) => println!("{}", t!("run.log_saved", path = path.display()).dimmed()),
        Ok(None) => {}
        Err(e) => eprintln!("{} {:#}", "Warning:".yellow(), e),
    }

    outcome.map(|_| {
        println!("\n{}", t!("run.completed").green().bold());
    })
}

/// Runs the regression for an already loaded configuration. The repository
/// accessor is injected so callers can replace the version-control layer.
///
/// 针对已加载的配置运行回归。仓库访问器通过注入提供，调用方可以替换版本控制层。
pub async fn run_regression(
    config: &RegressionConfig,
    model: ModelKind,
    accessor: Box<dyn RepositoryAccessor>,
    start_time: DateTime<Local>,
) -> Result<RunOutcome> {
    info!("commencing {} regression test of {}", model.cli_name(), config.source.display());

    let profile = match resolve_profile(model, config).await {
        Ok(profile) => profile,
        Err(e) => return Err(abort_run(model, config, e.into()).await),
    };

    reset_scratch(&profile.scratch_root)?;

    let mut matrix = TestcaseMatrix::new(config.testcases.clone(), profile.model_dir());
    println!(
        "{}",
        t!(
            "run.runnable_tests",
            count = matrix.runnable().len(),
            total = matrix.testcases().len()
        )
        .cyan()
    );

    let graph = DependencyGraph::from_specs(matrix.runnable());
    let waves = match graph.schedule() {
        Ok(waves) => waves,
        Err(e) => return Err(abort_run(model, config, e.into()).await),
    };
    info!("passed all rundeck dependency checks");

    let timestamp = start_time.format(DIR_TIMESTAMP_FORMAT).to_string();
    let total = matrix
        .build_matrix(&timestamp)
        .context("Failed to create combination directories")?;
    info!("{} setup successful: {} combination(s)", model.display_name(), total);

    let mut report = Report::new(model, &config.report, start_time);
    report.set_dependencies(&graph);
    let manager = RegressionManager::new(profile, accessor, config.system.cleanup);
    let results = manager
        .execute(&waves, &matrix.get_directories(), &mut report)
        .await;

    if config.system.cleanscratch {
        reset_scratch(&manager.profile().scratch_root)?;
    }

    let end_time = Local::now();
    let rendered = report.render(end_time);
    print_summary(&results);

    if let Some(path) = config.report.results_json.as_deref() {
        let path = shellexpand::full(path)
            .map(|p| PathBuf::from(p.as_ref()))
            .with_context(|| format!("Failed to expand path: {}", path))?;
        report.write_json(&path)?;
        info!("results written to {}", path.display());
    }

    println!("{}", t!("run.sending_report").cyan());
    mail::dispatch_report(&report, &rendered, config.report.mailer.as_deref())
        .await
        .context(t!("run.report_failed").to_string())?;

    Ok(RunOutcome { results, rendered })
}

/// Binds the model profile to this host. Errors here are configuration
/// errors found only after the document was loaded.
async fn resolve_profile(model: ModelKind, config: &RegressionConfig) -> Result<ModelProfile, ConfigError> {
    let host = match config.system.host.as_deref() {
        Some(name) => name
            .parse::<HostProfile>()
            .map_err(|reason| ConfigError::InvalidValue { key: "host", reason })?,
        None => HostProfile::detect().await,
    };
    info!("host profile: {}", host);
    ModelProfile::from_config(model, config, host)
}

/// Reports a fatal configuration or scheduling error on the console and to
/// the recipients, then hands the error back with context.
async fn abort_run(model: ModelKind, config: &RegressionConfig, err: anyhow::Error) -> anyhow::Error {
    let reason = format!("{:#}", err);
    error!("regression run aborted: {}", reason);
    println!("{}", t!("run.aborted", reason = reason.as_str()).red().bold());
    if let Err(mail_err) = mail::send_abort_notification(model, config, &reason).await {
        warn!("could not send abort notification: {}", mail_err);
    }
    err.context(t!("run.aborted_context").to_string())
}

fn reset_scratch(scratch: &Path) -> Result<()> {
    info!("resetting scratch directory {}", scratch.display());
    fs::reset_dir(scratch)
}
