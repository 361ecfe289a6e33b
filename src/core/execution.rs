//! # Regression Execution Module / 回归执行模块
//!
//! Drives every combination through the fixed pipeline
//! `checkout → build → run → compare`.
//!
//! A step runs only when the previous one succeeded. The failing step is
//! recorded as `Failure`, the steps after it stay `NotAttempted`, and the
//! manager moves on to the next combination. Nothing is retried or rolled
//! back, and one combination's failure never stops the others.
//!
//! 驱动每个组合依次经过固定流水线 `checkout → build → run → compare`。
//! 只有前一步成功时才运行下一步；失败的步骤记录为 `Failure`，其后的步骤保持
//! `NotAttempted`，然后继续下一个组合。不重试、不回滚，单个组合的失败不会
//! 影响其他组合。

use colored::*;
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::{
    core::{
        config::CleanupPolicy,
        error::StepError,
        models::{Combination, PipelineState, Step, StepOutcome, TestResult},
        profile::ModelProfile,
        scheduler::Wave,
    },
    infra::{fs, repo::RepositoryAccessor, t},
    reporting::report::Report,
};

/// Runs the pipeline for every scheduled combination.
/// 为每个已调度的组合运行流水线。
pub struct RegressionManager {
    profile: ModelProfile,
    accessor: Box<dyn RepositoryAccessor>,
    cleanup: CleanupPolicy,
}

impl RegressionManager {
    pub fn new(
        profile: ModelProfile,
        accessor: Box<dyn RepositoryAccessor>,
        cleanup: CleanupPolicy,
    ) -> Self {
        Self {
            profile,
            accessor,
            cleanup,
        }
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Executes wave 1 completely, then wave 2, appending one row per
    /// combination to `report`. Returns the rows in execution order.
    ///
    /// 先完整执行第 1 波，再执行第 2 波，每个组合向 `report` 追加一行。
    pub async fn execute(
        &self,
        waves: &[Wave],
        directories: &IndexMap<String, Vec<Combination>>,
        report: &mut Report,
    ) -> Vec<TestResult> {
        let mut results = Vec::new();

        for wave in waves {
            if wave.is_empty() {
                continue;
            }
            println!(
                "\n{}",
                t!("run.wave_start", index = wave.index, count = wave.tests.len()).bold()
            );
            for test in &wave.tests {
                let Some(combinations) = directories.get(test) else {
                    warn!("{}: no combinations recorded, skipping", test);
                    continue;
                };
                for combination in combinations {
                    let result = self.run_combination(combination).await;
                    report.add_test(result.clone());
                    results.push(result);
                }
                info!("{}: tests complete", test);
            }
        }

        results
    }

    /// Runs one combination through the pipeline and applies the cleanup policy.
    /// 让一个组合走完流水线并应用清理策略。
    pub async fn run_combination(&self, combination: &Combination) -> TestResult {
        println!(
            "{}",
            t!("run.combination_start", name = combination.label()).blue()
        );

        let mut result = TestResult::pending(combination);
        let mut state = PipelineState::Pending;

        for step in Step::ALL {
            match self.attempt(step, combination).await {
                Ok(()) => {
                    result.set_outcome(step, StepOutcome::Success);
                    state = step.completes();
                }
                Err(reason) => {
                    result.set_outcome(step, StepOutcome::Failure);
                    warn!("{}: {} failed: {}", combination, step, reason);
                    println!(
                        "{}",
                        t!(
                            "run.step_failed",
                            name = combination.label(),
                            step = step.to_string(),
                            reason = reason
                        )
                        .red()
                    );
                    break;
                }
            }
        }

        if state == PipelineState::Compared {
            println!(
                "{}",
                t!("run.combination_passed", name = combination.label()).green()
            );
        }
        self.cleanup_combination(combination, result.is_success());
        result
    }

    async fn attempt(&self, step: Step, combination: &Combination) -> Result<(), String> {
        let toolchain = &self.profile.toolchain;
        let outcome: Result<(), StepError> = match step {
            Step::Checkout => {
                let spec = self.profile.repository_spec(&combination.code_dir());
                return match self.accessor.checkout(&spec).await {
                    Ok(outcome) => {
                        info!("{}: checkout {:?}", combination, outcome);
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                };
            }
            Step::Build => toolchain.build(combination).await,
            Step::Run => toolchain.run(combination).await,
            Step::Compare => toolchain.compare(combination).await,
        };
        outcome.map_err(|e| e.to_string())
    }

    fn cleanup_combination(&self, combination: &Combination, fully_succeeded: bool) {
        if !self.cleanup.should_purge(fully_succeeded) {
            if !fully_succeeded {
                info!("{}: keeping {} for inspection", combination, combination.dir.display());
            }
            return;
        }
        match fs::clean_dir(&combination.dir) {
            Ok(()) => info!("{}: removed {}", combination, combination.dir.display()),
            Err(e) => warn!("{}: cleanup failed: {:#}", combination, e),
        }
    }
}
