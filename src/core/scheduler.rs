//! # Dependency Scheduler Module / 依赖调度模块
//!
//! Validates the single-level dependency graph between runnable test cases,
//! partitions them into two execution waves, and estimates the batch
//! resources (walltime, core count) each combination asks for.
//!
//! A test may list several dependencies (`dependencies = "A,B"`), but only
//! one level is allowed. A chain `A -> B -> C` is rejected because `B` has a
//! dependency of its own; there is no general cycle detection.
//!
//! 验证可运行测试用例之间的单层依赖图，将其划分为两个执行波次，
//! 并估算每个组合所需的批处理资源（墙钟时间、核心数）。
//! 只允许一层依赖；不做一般意义上的环检测。

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::core::config::{TestCaseSpec, Verification};
use crate::core::error::SchedulingError;
use crate::core::matrix::axis_values;

/// One node of the dependency graph. / 依赖图中的一个节点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    pub name: String,
    /// Listed dependencies, in order. Empty for a root.
    pub dependencies: Vec<String>,
    pub compilers: Vec<String>,
    pub modes: Vec<String>,
}

/// A group of tests dispatched together. Wave 1 holds the dependency-free
/// tests, wave 2 the dependents.
///
/// 一起调度的一组测试。第 1 波为无依赖测试，第 2 波为依赖它们的测试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wave {
    pub index: usize,
    pub tests: Vec<String>,
}

impl Wave {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Flat map of test name to its dependencies, in input order.
/// 测试名到其依赖列表的扁平映射，按输入顺序排列。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    entries: IndexMap<String, GraphEntry>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from runnable specs. Malformed compiler or mode
    /// fields count as empty sets here; the matrix reports them.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a TestCaseSpec>) -> Self {
        let mut graph = Self::new();
        for spec in specs {
            graph.insert(GraphEntry {
                name: spec.name.clone(),
                dependencies: spec.dependency_names().into_iter().map(str::to_string).collect(),
                compilers: axis_values(spec.compilers.as_ref()).unwrap_or_default(),
                modes: axis_values(spec.modes.as_ref()).unwrap_or_default(),
            });
        }
        graph
    }

    pub fn insert(&mut self, entry: GraphEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Shorthand for an entry with at most one dependency and no compiler
    /// or mode constraints.
    pub fn with_dependency(self, name: &str, dependency: Option<&str>) -> Self {
        let dependencies: Vec<&str> = dependency.into_iter().collect();
        self.with_dependencies(name, &dependencies)
    }

    pub fn with_dependencies(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.insert(GraphEntry {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            compilers: Vec::new(),
            modes: Vec::new(),
        });
        self
    }

    /// Every entry, in input order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&GraphEntry> {
        self.entries.get(name)
    }

    /// Applies the rules in order; the first violation is returned. Rules 2
    /// to 4 are checked for every listed dependency.
    ///
    /// 1. at least one root exists;
    /// 2. every dependency name exists;
    /// 3. a dependency has no dependency of its own;
    /// 4. a dependent's modes and compilers are subsets of its dependency's.
    ///
    /// An empty graph is valid.
    ///
    /// 按顺序应用规则，返回第一个违规。空图是合法的。
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.entries.is_empty() {
            return Ok(());
        }

        if self.entries.values().all(|e| !e.dependencies.is_empty()) {
            return Err(SchedulingError::NoRoot);
        }

        for (entry, dep) in self.dependents() {
            if !self.entries.contains_key(dep) {
                return Err(SchedulingError::MissingDependency {
                    test: entry.name.clone(),
                    dependency: dep.to_string(),
                });
            }
        }

        for (entry, dep) in self.dependents() {
            if !self.entries[dep].dependencies.is_empty() {
                return Err(SchedulingError::MultiLevelDependency {
                    test: entry.name.clone(),
                    dependency: dep.to_string(),
                });
            }
        }

        for (entry, dep) in self.dependents() {
            let target = &self.entries[dep];
            if let Some(mode) = entry.modes.iter().find(|m| !target.modes.contains(m)) {
                return Err(SchedulingError::ModeMismatch {
                    test: entry.name.clone(),
                    dependency: dep.to_string(),
                    mode: mode.clone(),
                });
            }
            if let Some(compiler) = entry
                .compilers
                .iter()
                .find(|c| !target.compilers.contains(c))
            {
                return Err(SchedulingError::CompilerMismatch {
                    test: entry.name.clone(),
                    dependency: dep.to_string(),
                    compiler: compiler.clone(),
                });
            }
        }

        Ok(())
    }

    /// Splits the tests into `[wave 1, wave 2]`, each in input order.
    /// Call [`DependencyGraph::validate`] first, or use [`DependencyGraph::schedule`].
    pub fn partition(&self) -> Vec<Wave> {
        let (roots, dependents): (Vec<_>, Vec<_>) = self
            .entries
            .values()
            .partition(|e| e.dependencies.is_empty());
        vec![
            Wave {
                index: 1,
                tests: roots.into_iter().map(|e| e.name.clone()).collect(),
            },
            Wave {
                index: 2,
                tests: dependents.into_iter().map(|e| e.name.clone()).collect(),
            },
        ]
    }

    /// Validates, then partitions. / 先验证，再划分。
    pub fn schedule(&self) -> Result<Vec<Wave>, SchedulingError> {
        self.validate()?;
        Ok(self.partition())
    }

    /// Every (dependent, dependency) edge.
    fn dependents(&self) -> impl Iterator<Item = (&GraphEntry, &str)> {
        self.entries
            .values()
            .flat_map(|e| e.dependencies.iter().map(move |dep| (e, dep.as_str())))
    }
}

// ---------------------------------------------------------------------------
// Resource estimation / 资源估算
// ---------------------------------------------------------------------------

/// Which run modes a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFilter {
    Any,
    Mpi,
    Serial,
}

impl ModeFilter {
    fn matches(self, mpi: bool) -> bool {
        match self {
            ModeFilter::Any => true,
            ModeFilter::Mpi => mpi,
            ModeFilter::Serial => !mpi,
        }
    }
}

/// Which verification kinds a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFilter {
    Any,
    Only(Verification),
    /// One-hour and restart runs, i.e. neither compile-only nor custom.
    Regular,
}

impl VerificationFilter {
    fn matches(self, verification: Verification) -> bool {
        match self {
            VerificationFilter::Any => true,
            VerificationFilter::Only(kind) => kind == verification,
            VerificationFilter::Regular => matches!(
                verification,
                Verification::Regular | Verification::RestartRun
            ),
        }
    }
}

/// How many cores a matching rule grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorePolicy {
    Fixed(u32),
    /// The largest requested core count (at least one).
    MaxRequested,
    /// `MaxRequested` under MPI, one core otherwise.
    PerMode,
}

impl CorePolicy {
    fn cores(self, request: &ResourceRequest) -> u32 {
        match self {
            CorePolicy::Fixed(n) => n,
            CorePolicy::MaxRequested => request.max_npes(),
            CorePolicy::PerMode if request.mpi => request.max_npes(),
            CorePolicy::PerMode => 1,
        }
    }
}

/// One entry of the ordered rule list. / 有序规则列表中的一条。
#[derive(Debug, Clone)]
pub struct ResourceRule {
    pub pattern: Regex,
    pub mode: ModeFilter,
    pub verification: VerificationFilter,
    pub walltime: String,
    pub cores: CorePolicy,
}

impl ResourceRule {
    pub fn new(pattern: &str, walltime: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            mode: ModeFilter::Any,
            verification: VerificationFilter::Any,
            walltime: walltime.to_string(),
            cores: CorePolicy::PerMode,
        })
    }

    pub fn mode(mut self, mode: ModeFilter) -> Self {
        self.mode = mode;
        self
    }

    pub fn verification(mut self, verification: VerificationFilter) -> Self {
        self.verification = verification;
        self
    }

    pub fn cores(mut self, cores: CorePolicy) -> Self {
        self.cores = cores;
        self
    }

    pub fn matches(&self, request: &ResourceRequest) -> bool {
        self.mode.matches(request.mpi)
            && self.verification.matches(request.verification)
            && self.pattern.is_match(&request.test)
    }
}

/// What a combination asks the batch system for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub test: String,
    pub mpi: bool,
    pub verification: Verification,
    pub npes: Vec<u32>,
}

impl ResourceRequest {
    pub fn new(test: &str, mode: &str, verification: Verification, npes: &[u32]) -> Self {
        Self {
            test: test.to_string(),
            mpi: mode.contains("mpi"),
            verification,
            npes: npes.to_vec(),
        }
    }

    fn max_npes(&self) -> u32 {
        self.npes.iter().copied().max().unwrap_or(1).max(1)
    }
}

/// Walltime (`HH:MM:SS`) and core count for one batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEstimate {
    pub walltime: String,
    pub cores: u32,
}

impl fmt::Display for ResourceEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} core(s)", self.walltime, self.cores)
    }
}

pub const DEFAULT_SERIAL_WALLTIME: &str = "00:50:00";
pub const DEFAULT_MPI_WALLTIME: &str = "01:30:00";

/// Ordered rule list; the first matching rule wins.
/// 有序规则列表；第一条匹配的规则生效。
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    rules: Vec<ResourceRule>,
}

impl ResourceTable {
    pub fn new(rules: Vec<ResourceRule>) -> Self {
        Self { rules }
    }

    /// The rules in precedence order.
    pub fn rules(&self) -> &[ResourceRule] {
        &self.rules
    }

    /// First matching rule, or the default: `00:50:00` on one core for
    /// serial runs, `01:30:00` on the largest requested core count for MPI.
    pub fn estimate(&self, request: &ResourceRequest) -> ResourceEstimate {
        match self.rules.iter().find(|rule| rule.matches(request)) {
            Some(rule) => ResourceEstimate {
                walltime: rule.walltime.clone(),
                cores: rule.cores.cores(request),
            },
            None if request.mpi => ResourceEstimate {
                walltime: DEFAULT_MPI_WALLTIME.to_string(),
                cores: request.max_npes(),
            },
            None => ResourceEstimate {
                walltime: DEFAULT_SERIAL_WALLTIME.to_string(),
                cores: 1,
            },
        }
    }

    /// The ModelE rundeck table.
    ///
    /// Compile-only runs come first, then two-month custom runs, then the
    /// per-rundeck adjustments for regular runs, then the MPI and serial
    /// base budgets.
    pub fn standard() -> Result<Self, regex::Error> {
        use CorePolicy::{Fixed, MaxRequested};
        use ModeFilter::{Mpi, Serial};
        use VerificationFilter::{Only, Regular};

        let custom: &[(&str, &str)] = &[
            ("campi", "04:00:00"),
            ("Tmatrix", "04:00:00"),
            ("Ttomas", "04:00:00"),
            ("cadi", "02:00:00"),
            ("Toma", "02:00:00"),
            ("obio", "01:00:00"),
            ("C12", "00:30:00"),
            ("M20", "00:30:00"),
            (".*", "01:00:00"),
        ];
        let adjustments: &[(&str, ModeFilter, &str)] = &[
            ("Mars", ModeFilter::Any, "00:55:00"),
            ("SGP", ModeFilter::Any, "00:10:00"),
            ("campi", ModeFilter::Any, "02:00:00"),
            ("P2SAoF", ModeFilter::Any, "01:45:00"),
            ("Toma", Mpi, "03:00:00"),
            ("Toma", Serial, "04:00:00"),
            ("ctomas", ModeFilter::Any, "02:00:00"),
            ("Ttomas", ModeFilter::Any, "03:00:00"),
            ("Tmatrix", ModeFilter::Any, "02:00:00"),
            ("E_Tdus", ModeFilter::Any, "02:00:00"),
            ("E6Twis", Mpi, "02:00:00"),
            ("E6Twis", Serial, "01:00:00"),
            ("E6Tlernerpsv", Mpi, "04:00:00"),
            ("E6Tlernerpsv", Serial, "03:00:00"),
            ("vsd", Mpi, "07:00:00"),
            ("vsd", Serial, "06:00:00"),
        ];
        let serial: &[(&str, &str)] = &[
            ("obio", "01:00:00"),
            ("cadi", "04:00:00"),
            ("lerner", "01:00:00"),
            ("E6Tdus", "01:30:00"),
            ("E_Tdus", "01:00:00"),
            ("P2SAq", "01:10:00"),
            ("P2SAp", "01:10:00"),
            ("P2SNo", "00:55:00"),
            ("P2Sxo", "01:00:00"),
            ("LL", "01:00:00"),
            ("E6F40", "01:00:00"),
            (".*", DEFAULT_SERIAL_WALLTIME),
        ];

        let mut rules = vec![
            ResourceRule::new(".*", "00:10:00")?
                .verification(Only(Verification::CompileOnly))
                .cores(Fixed(4)),
        ];
        for (pattern, walltime) in custom {
            rules.push(
                ResourceRule::new(pattern, walltime)?
                    .verification(Only(Verification::CustomRun))
                    .cores(MaxRequested),
            );
        }
        for (pattern, mode, walltime) in adjustments {
            rules.push(
                ResourceRule::new(pattern, walltime)?
                    .mode(*mode)
                    .verification(Regular),
            );
        }
        for (pattern, walltime) in [("E4Tcad", "04:00:00"), (".*", DEFAULT_MPI_WALLTIME)] {
            rules.push(
                ResourceRule::new(pattern, walltime)?
                    .mode(Mpi)
                    .verification(Regular)
                    .cores(MaxRequested),
            );
        }
        for (pattern, walltime) in serial {
            rules.push(
                ResourceRule::new(pattern, walltime)?
                    .mode(Serial)
                    .verification(Regular)
                    .cores(Fixed(1)),
            );
        }

        Ok(Self { rules })
    }
}

/// Batch job name for a rundeck: the part after `nonProduction_` if present.
pub fn job_name(test: &str) -> &str {
    match test.find("nonProduction") {
        Some(start) => test.get(start + "nonProduction".len() + 1..).unwrap_or(test),
        None => test,
    }
}
