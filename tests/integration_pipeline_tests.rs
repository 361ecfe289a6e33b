//! # Pipeline Integration Tests / 流水线集成测试
//!
//! Drives the regression manager and the full run over a real scratch tree,
//! with the version-control layer and the model toolchain replaced by
//! scripted stand-ins.
//!
//! 在真实的 scratch 目录树上驱动回归管理器和完整运行，
//! 版本控制层与模型工具链由脚本化替身代替。

mod common;

use assert_runner::cli::commands::run::run_regression;
use assert_runner::core::config::{load_config, CleanupPolicy, ReportConfig, TestCaseSpec};
use assert_runner::core::execution::RegressionManager;
use assert_runner::core::matrix::TestcaseMatrix;
use assert_runner::core::models::{Step, StepOutcome, TestResult};
use assert_runner::core::profile::{ModelKind, ModelProfile};
use assert_runner::core::scheduler::DependencyGraph;
use assert_runner::reporting::report::Report;
use chrono::Local;
use common::{entries, spec, write_config, FakeAccessor, ScriptedToolchain};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const TS: &str = "20240101_120000";

use StepOutcome::{Failure as F, NotAttempted as N, Success as S};

/// Builds the matrix under `scratch`, schedules it and runs every combination.
async fn drive(
    scratch: &Path,
    specs: Vec<TestCaseSpec>,
    accessor: FakeAccessor,
    toolchain: ScriptedToolchain,
    cleanup: CleanupPolicy,
) -> (TestcaseMatrix, Vec<TestResult>, Report) {
    let profile = ModelProfile::new(ModelKind::ModelE, "unused", scratch, Arc::new(toolchain));
    let mut matrix = TestcaseMatrix::new(specs, profile.model_dir());
    let waves = DependencyGraph::from_specs(matrix.runnable()).schedule().unwrap();
    matrix.build_matrix(TS).unwrap();

    let mut report = Report::new(ModelKind::ModelE, &ReportConfig::default(), Local::now());
    let manager = RegressionManager::new(profile, Box::new(accessor), cleanup);
    let results = manager
        .execute(&waves, &matrix.get_directories(), &mut report)
        .await;
    (matrix, results, report)
}

fn outcomes(results: &[TestResult]) -> Vec<[StepOutcome; 4]> {
    results.iter().map(|r| r.outcomes()).collect()
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_build_failure_is_confined_to_its_combination() {
        let scratch = tempdir().unwrap();
        let toolchain = ScriptedToolchain::failing("E1M20/intel-mpi", Step::Build);
        let (_, results, report) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel"], &["serial", "mpi", "openmp"])],
            FakeAccessor::default(),
            toolchain.clone(),
            CleanupPolicy::OnSuccess,
        )
        .await;

        assert_eq!(
            outcomes(&results),
            vec![[S, S, S, S], [S, F, N, N], [S, S, S, S]]
        );
        assert_eq!(report.rows(), results.as_slice());

        let invoked = toolchain.invoked();
        assert!(!invoked.contains(&("E1M20/intel-mpi".to_string(), Step::Run)));
        assert!(invoked.contains(&("E1M20/intel-openmp".to_string(), Step::Compare)));
    }

    #[tokio::test]
    async fn test_on_success_keeps_only_failed_directories() {
        let scratch = tempdir().unwrap();
        let (matrix, _, _) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel"], &["serial", "mpi", "openmp"])],
            FakeAccessor::default(),
            ScriptedToolchain::failing("E1M20/intel-mpi", Step::Build),
            CleanupPolicy::OnSuccess,
        )
        .await;

        assert_eq!(entries(&matrix.test_dir("E1M20", TS)), vec!["intel-mpi"]);
        let kept = &matrix.combinations_for("E1M20")[1];
        assert!(kept.code_dir().join("README").is_file());
    }

    #[tokio::test]
    async fn test_never_and_always_policies() {
        let scratch = tempdir().unwrap();
        let (matrix, _, _) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel"], &["serial", "mpi"])],
            FakeAccessor::default(),
            ScriptedToolchain::failing("E1M20/intel-mpi", Step::Compare),
            CleanupPolicy::Never,
        )
        .await;
        assert_eq!(
            entries(&matrix.test_dir("E1M20", TS)),
            vec!["intel-mpi", "intel-serial"]
        );

        let scratch = tempdir().unwrap();
        let (matrix, _, _) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel"], &["serial", "mpi"])],
            FakeAccessor::default(),
            ScriptedToolchain::failing("E1M20/intel-mpi", Step::Compare),
            CleanupPolicy::Always,
        )
        .await;
        assert!(entries(&matrix.test_dir("E1M20", TS)).is_empty());
    }

    #[tokio::test]
    async fn test_checkout_failure_skips_remaining_steps() {
        let scratch = tempdir().unwrap();
        let toolchain = ScriptedToolchain::default();
        let (_, results, _) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel", "gfortran"], &["serial"])],
            FakeAccessor::failing_for("gfortran-serial"),
            toolchain.clone(),
            CleanupPolicy::OnSuccess,
        )
        .await;

        assert_eq!(outcomes(&results), vec![[S, S, S, S], [F, N, N, N]]);
        assert_eq!(results[1].failed_step(), Some(Step::Checkout));
        assert!(toolchain
            .invoked()
            .iter()
            .all(|(label, _)| label == "E1M20/intel-serial"));
    }

    #[tokio::test]
    async fn test_wave_one_runs_before_wave_two() {
        let scratch = tempdir().unwrap();
        let mut dependent = spec("E4C90", Some(true), &["intel"], &["serial"]);
        dependent.dependencies = "E1M20".to_string();
        let accessor = FakeAccessor::default();

        let (_, results, _) = drive(
            scratch.path(),
            vec![
                dependent,
                spec("E1M20", Some(true), &["intel"], &["serial", "mpi"]),
                spec("disabled", Some(false), &["intel"], &["serial"]),
            ],
            accessor.clone(),
            ScriptedToolchain::default(),
            CleanupPolicy::OnSuccess,
        )
        .await;

        let order: Vec<_> = results.iter().map(|r| r.label()).collect();
        assert_eq!(
            order,
            vec!["E1M20/intel-serial", "E1M20/intel-mpi", "E4C90/intel-serial"]
        );
        assert_eq!(accessor.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_dependent_runs_even_if_dependency_failed() {
        let scratch = tempdir().unwrap();
        let mut dependent = spec("E4C90", Some(true), &["intel"], &["serial"]);
        dependent.dependencies = "E1M20".to_string();

        let (_, results, _) = drive(
            scratch.path(),
            vec![spec("E1M20", Some(true), &["intel"], &["serial"]), dependent],
            FakeAccessor::default(),
            ScriptedToolchain::failing("E1M20/intel-serial", Step::Run),
            CleanupPolicy::OnSuccess,
        )
        .await;

        assert_eq!(outcomes(&results), vec![[S, S, F, N], [S, S, S, S]]);
    }
}

#[cfg(test)]
mod run_tests {
    use super::*;

    const TESTCASES: &str = r#"
[testcases.E1M20]
run = true
compilers = ["intel"]
modes = ["serial", "mpi"]
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_run_renders_and_records_results() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("results.json");
        let config_path = write_config(
            &dir,
            "",
            "",
            &format!(
                "mailto = [\"team@example.org\"]\nmailer = \"true\"\nresults_json = \"{}\"",
                json.display()
            ),
            TESTCASES,
        );
        let config = load_config(&config_path).unwrap();

        let outcome = run_regression(&config, ModelKind::ModelE, Box::new(FakeAccessor::default()), Local::now())
            .await
            .unwrap();

        assert_eq!(outcomes(&outcome.results), vec![[S, S, S, S], [S, S, S, S]]);
        assert_eq!(Report::parse_rows(&outcome.rendered), outcome.results);
        assert!(outcome.rendered.contains("MODEL TYPE: ModelE"));
        assert!(outcome.rendered.contains("*** No dependencies were set in these tests ***"));

        let written: Vec<TestResult> =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(written, outcome.results);
    }

    #[tokio::test]
    async fn test_missing_recipients_fail_dispatch_after_running() {
        let dir = tempdir().unwrap();
        let config_path = write_config(&dir, "", "", "", TESTCASES);
        let config = load_config(&config_path).unwrap();
        let accessor = FakeAccessor::default();

        let err = run_regression(&config, ModelKind::ModelE, Box::new(accessor.clone()), Local::now())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("no recipients"));
        assert_eq!(accessor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_dependencies_abort_before_any_side_effect() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            &dir,
            "",
            "",
            "",
            r#"
[testcases.A]
run = true
compilers = "intel"
modes = "serial"
dependencies = "B"

[testcases.B]
run = true
compilers = "intel"
modes = "serial"
dependencies = "A"
"#,
        );
        let config = load_config(&config_path).unwrap();
        let accessor = FakeAccessor::default();

        let err = run_regression(&config, ModelKind::ModelE, Box::new(accessor.clone()), Local::now())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("all rundecks have dependencies"));
        assert!(accessor.calls().is_empty());
        assert!(!dir.path().join("scratch").join("modelE").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_late_configuration_error_sends_abort_notice() {
        let dir = tempdir().unwrap();
        let notice = dir.path().join("notice.txt");
        let content = format!(
            r#"
[modelconfig]
repository = "unused"
repo_branch = "develop"

[systemconfig]
scratchdir = "{scratch}"
host = "MARS"

[reportconfig]
mailto = "team@example.org"
mailer = "sh -c 'cat > {notice}'"

{TESTCASES}
"#,
            scratch = dir.path().join("scratch").display(),
            notice = notice.display(),
        );
        let config_path = dir.path().join("assert.toml");
        std::fs::write(&config_path, content).unwrap();
        let config = load_config(&config_path).unwrap();
        let accessor = FakeAccessor::default();

        let err = run_regression(&config, ModelKind::ModelE, Box::new(accessor.clone()), Local::now())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("unknown host profile"));
        assert!(accessor.calls().is_empty());
        assert!(!dir.path().join("scratch").exists());

        let body = std::fs::read_to_string(&notice).unwrap();
        assert!(body.starts_with("ModelE regression tests for branch develop aborted!"));
        assert!(body.contains("unknown host profile `MARS`"));
        assert!(body.contains(&format!("Please check the settings in {}", config_path.display())));
    }

    #[tokio::test]
    async fn test_clean_scratch_empties_scratch_root() {
        let dir = tempdir().unwrap();
        let config_path = write_config(&dir, "", "cleanscratch = true\ncleanup = \"never\"", "", TESTCASES);
        let config = load_config(&config_path).unwrap();

        // Dispatch fails for lack of recipients; the scratch reset happens before it.
        let _ = run_regression(&config, ModelKind::ModelE, Box::new(FakeAccessor::default()), Local::now()).await;

        assert!(entries(&dir.path().join("scratch")).is_empty());
    }
}
