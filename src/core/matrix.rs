//! # Testcase Matrix Module / 测试矩阵模块
//!
//! Expands runnable test cases into the compiler × mode grid and owns the
//! directory index keyed by test name.
//!
//! Layout of one combination:
//!
//! ```text
//! <scratch>/<model dir>/<test>_<timestamp>/<compiler>-<mode>/{code,run}
//! ```
//!
//! 将可运行的测试用例展开为编译器 × 模式网格，并维护以测试名为键的目录索引。

use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::config::TestCaseSpec;
use crate::core::models::Combination;
use crate::infra::fs;

/// Values of a `compilers`/`modes` field: a string gives one value, a list
/// of strings gives its items with repeats dropped (first occurrence wins).
/// Any other shape yields `None`.
///
/// `compilers`/`modes` 字段的值：字符串给出一个值，字符串列表给出其元素（去重，保留首次出现）。
/// 其他形状返回 `None`。
pub fn axis_values(value: Option<&toml::Value>) -> Option<Vec<String>> {
    match value? {
        toml::Value::String(s) => Some(vec![s.trim().to_string()]),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<IndexSet<String>>>()
            .map(|values| values.into_iter().collect()),
        _ => None,
    }
}

/// Like [`axis_values`], but logs a warning and yields an empty set for
/// anything unrecognized.
fn normalize_axis(test: &str, field: &str, value: Option<&toml::Value>) -> Vec<String> {
    match axis_values(value) {
        Some(values) => values,
        None => {
            warn!(
                "{}: `{}` is neither a string nor a list of strings; no combinations on this axis",
                test, field
            );
            Vec::new()
        }
    }
}

/// Holds every configured test case, the runnable subset and, once built,
/// the test name → combinations index.
///
/// 保存所有配置的测试用例、可运行子集，以及构建后的测试名 → 组合索引。
#[derive(Debug, Clone)]
pub struct TestcaseMatrix {
    testcases: Vec<TestCaseSpec>,
    runnable: Vec<TestCaseSpec>,
    model_dir: PathBuf,
    directories: Option<IndexMap<String, Vec<Combination>>>,
}

impl TestcaseMatrix {
    /// `model_dir` is the per-model directory under the scratch root.
    pub fn new(testcases: Vec<TestCaseSpec>, model_dir: impl Into<PathBuf>) -> Self {
        let mut matrix = Self {
            testcases,
            runnable: Vec::new(),
            model_dir: model_dir.into(),
            directories: None,
        };
        matrix.set_runnable_tests();
        matrix
    }

    /// Only an explicit `run = true` makes a test runnable.
    /// A missing flag excludes the test just like `run = false`.
    pub fn is_runnable(spec: &TestCaseSpec) -> bool {
        spec.run == Some(true)
    }

    /// Recomputes the runnable subset, preserving document order.
    pub fn set_runnable_tests(&mut self) -> &[TestCaseSpec] {
        self.runnable = self
            .testcases
            .iter()
            .filter(|spec| Self::is_runnable(spec))
            .cloned()
            .collect();
        debug!(
            "{} of {} test case(s) runnable",
            self.runnable.len(),
            self.testcases.len()
        );
        &self.runnable
    }

    pub fn testcases(&self) -> &[TestCaseSpec] {
        &self.testcases
    }

    pub fn runnable(&self) -> &[TestCaseSpec] {
        &self.runnable
    }

    pub fn testcase_names(&self) -> Vec<String> {
        self.testcases.iter().map(|s| s.name.clone()).collect()
    }

    pub fn runnable_names(&self) -> Vec<String> {
        self.runnable.iter().map(|s| s.name.clone()).collect()
    }

    /// Any configured test case by name, runnable or not.
    pub fn lookup(&self, name: &str) -> Option<&TestCaseSpec> {
        self.testcases.iter().find(|s| s.name == name)
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Directory holding every combination of `test` for this run.
    pub fn test_dir(&self, test: &str, timestamp: &str) -> PathBuf {
        self.model_dir.join(format!("{}_{}", test, timestamp))
    }

    /// Creates the directory tree for every runnable combination and records
    /// the index. Returns the number of combinations created.
    ///
    /// An axis that is empty or malformed gives zero combinations for that
    /// test; that is not an error.
    ///
    /// 为每个可运行组合创建目录树并记录索引。返回创建的组合数量。
    pub fn build_matrix(&mut self, timestamp: &str) -> Result<usize> {
        let mut directories = IndexMap::new();
        let mut total = 0;

        for spec in &self.runnable {
            let compilers = normalize_axis(&spec.name, "compilers", spec.compilers.as_ref());
            let modes = normalize_axis(&spec.name, "modes", spec.modes.as_ref());
            let test_dir = self.test_dir(&spec.name, timestamp);

            let mut combinations = Vec::with_capacity(compilers.len() * modes.len());
            for compiler in &compilers {
                for mode in &modes {
                    let combination = Combination::new(&spec.name, compiler, mode, &test_dir);
                    fs::create_dir(&combination.code_dir())?;
                    fs::create_dir(&combination.run_dir())?;
                    combinations.push(combination);
                }
            }

            info!(
                "{}: {} combination(s) under {}",
                spec.name,
                combinations.len(),
                test_dir.display()
            );
            total += combinations.len();
            directories.insert(spec.name.clone(), combinations);
        }

        self.directories = Some(directories);
        Ok(total)
    }

    pub fn is_built(&self) -> bool {
        self.directories.is_some()
    }

    /// The test name → combinations index. Empty, with a warning, before
    /// [`TestcaseMatrix::build_matrix`] has run.
    pub fn get_directories(&self) -> IndexMap<String, Vec<Combination>> {
        match &self.directories {
            Some(directories) => directories.clone(),
            None => {
                warn!("test matrix has not been built yet; no directories available");
                IndexMap::new()
            }
        }
    }

    /// Combinations of one test, in creation order.
    pub fn combinations_for(&self, test: &str) -> &[Combination] {
        self.directories
            .as_ref()
            .and_then(|d| d.get(test))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every combination, flattened in index order.
    pub fn combinations(&self) -> Vec<Combination> {
        self.directories
            .iter()
            .flat_map(|d| d.values().flatten().cloned())
            .collect()
    }

    /// Removes the directories of every combination of `test`. The index
    /// entry is kept so results can still be attributed.
    ///
    /// 删除 `test` 所有组合的目录。保留索引条目，以便结果仍可归属。
    pub fn clear_test(&self, test: &str) -> Result<()> {
        for combination in self.combinations_for(test) {
            fs::clean_dir(&combination.dir)?;
        }
        Ok(())
    }
}
