//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the runner:
//! the three-valued step outcome, the pipeline steps and states, the
//! per-combination result row and the combination itself.
//!
//! 此模块定义了整个运行器中使用的核心数据结构：
//! 三值步骤结果、流水线步骤与状态、每个组合的结果行以及组合本身。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::infra::t;

/// Outcome of a single pipeline step.
/// The legend symbols map one-to-one onto these three states.
///
/// 单个流水线步骤的结果。图例符号与这三种状态一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The step ran and succeeded. / 步骤已执行并成功。
    Success,
    /// The step was attempted and raised. / 步骤已尝试但失败。
    Failure,
    /// The step was skipped because an earlier step failed.
    /// 由于之前的步骤失败而跳过。
    #[default]
    NotAttempted,
}

impl StepOutcome {
    pub const ALL: [StepOutcome; 3] = [
        StepOutcome::Success,
        StepOutcome::Failure,
        StepOutcome::NotAttempted,
    ];

    /// The legend symbol for this outcome. / 此结果对应的图例符号。
    pub fn symbol(self) -> char {
        match self {
            StepOutcome::Success => '+',
            StepOutcome::Failure => '-',
            StepOutcome::NotAttempted => '*',
        }
    }

    /// Inverse of [`StepOutcome::symbol`].
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.symbol() == symbol)
    }

    /// Human-readable legend meaning. / 图例含义。
    pub fn meaning(self) -> String {
        match self {
            StepOutcome::Success => t!("legend.success").to_string(),
            StepOutcome::Failure => t!("legend.failure").to_string(),
            StepOutcome::NotAttempted => t!("legend.not_attempted").to_string(),
        }
    }

    pub fn is_success(self) -> bool {
        self == StepOutcome::Success
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The four fixed pipeline steps, in execution order.
/// 四个固定的流水线步骤，按执行顺序排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Checkout,
    Build,
    Run,
    Compare,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Checkout, Step::Build, Step::Run, Step::Compare];

    /// The state reached once this step succeeds.
    pub fn completes(self) -> PipelineState {
        match self {
            Step::Checkout => PipelineState::CheckedOut,
            Step::Build => PipelineState::Built,
            Step::Run => PipelineState::Ran,
            Step::Compare => PipelineState::Compared,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Checkout => "checkout",
            Step::Build => "build",
            Step::Run => "run",
            Step::Compare => "compare",
        };
        f.write_str(name)
    }
}

/// Progress of one combination through the pipeline.
/// 单个组合在流水线中的进度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    #[default]
    Pending,
    CheckedOut,
    Built,
    Ran,
    Compared,
}

/// Result row for one (test, compiler, mode) combination.
/// Created when the pipeline starts, appended once to the report.
///
/// 单个（测试、编译器、模式）组合的结果行。
/// 在流水线开始时创建，并且只向报告追加一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub test: String,
    pub compiler: String,
    pub mode: String,
    pub checkout: StepOutcome,
    pub build: StepOutcome,
    pub run: StepOutcome,
    pub compare: StepOutcome,
}

impl TestResult {
    /// A fresh row with every step not attempted.
    pub fn pending(combination: &Combination) -> Self {
        Self {
            test: combination.test.clone(),
            compiler: combination.compiler.clone(),
            mode: combination.mode.clone(),
            checkout: StepOutcome::NotAttempted,
            build: StepOutcome::NotAttempted,
            run: StepOutcome::NotAttempted,
            compare: StepOutcome::NotAttempted,
        }
    }

    pub fn outcome(&self, step: Step) -> StepOutcome {
        match step {
            Step::Checkout => self.checkout,
            Step::Build => self.build,
            Step::Run => self.run,
            Step::Compare => self.compare,
        }
    }

    pub fn set_outcome(&mut self, step: Step, outcome: StepOutcome) {
        match step {
            Step::Checkout => self.checkout = outcome,
            Step::Build => self.build = outcome,
            Step::Run => self.run = outcome,
            Step::Compare => self.compare = outcome,
        }
    }

    /// Outcomes in step order. / 按步骤顺序排列的结果。
    pub fn outcomes(&self) -> [StepOutcome; 4] {
        [self.checkout, self.build, self.run, self.compare]
    }

    /// `true` only when all four steps succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes().iter().all(|o| o.is_success())
    }

    /// The first step that failed, if any.
    pub fn failed_step(&self) -> Option<Step> {
        Step::ALL
            .into_iter()
            .find(|step| self.outcome(*step) == StepOutcome::Failure)
    }

    /// The display label `<test>/<compiler>-<mode>`.
    pub fn label(&self) -> String {
        format!("{}/{}-{}", self.test, self.compiler, self.mode)
    }
}

/// One (test, compiler, mode) triple and its dedicated working directory.
/// 一个（测试、编译器、模式）三元组及其专用工作目录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub test: String,
    pub compiler: String,
    pub mode: String,
    /// `<test dir>/<compiler>-<mode>`
    pub dir: PathBuf,
}

impl Combination {
    pub fn new(test: &str, compiler: &str, mode: &str, test_dir: &Path) -> Self {
        Self {
            test: test.to_string(),
            compiler: compiler.to_string(),
            mode: mode.to_string(),
            dir: test_dir.join(Self::dir_name(compiler, mode)),
        }
    }

    /// Deterministic directory name for a combination. / 组合的确定性目录名。
    pub fn dir_name(compiler: &str, mode: &str) -> String {
        format!("{}-{}", compiler, mode)
    }

    /// Directory the source tree is checked out into.
    pub fn code_dir(&self) -> PathBuf {
        self.dir.join("code")
    }

    /// Directory the model is run in.
    pub fn run_dir(&self) -> PathBuf {
        self.dir.join("run")
    }

    pub fn label(&self) -> String {
        format!("{}/{}-{}", self.test, self.compiler, self.mode)
    }

    /// Whether the mode runs under MPI. / 该模式是否使用 MPI 运行。
    pub fn is_mpi(&self) -> bool {
        self.mode.contains("mpi")
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
