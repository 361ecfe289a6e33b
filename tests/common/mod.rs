// Shared test helpers for integration tests
#![allow(dead_code)]

use assert_runner::core::config::TestCaseSpec;
use assert_runner::core::error::{CheckoutError, StepError};
use assert_runner::core::models::{Combination, Step};
use assert_runner::core::profile::Toolchain;
use assert_runner::infra::repo::{CheckoutOutcome, RepositoryAccessor, RepositorySpec};
use futures::future::BoxFuture;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A spec with the given enable flag, compilers and modes.
pub fn spec(name: &str, run: Option<bool>, compilers: &[&str], modes: &[&str]) -> TestCaseSpec {
    let mut spec = TestCaseSpec::named(name);
    spec.run = run;
    spec.compilers = Some(toml::Value::Array(
        compilers.iter().map(|c| toml::Value::String(c.to_string())).collect(),
    ));
    spec.modes = Some(toml::Value::Array(
        modes.iter().map(|m| toml::Value::String(m.to_string())).collect(),
    ));
    spec
}

/// Writes a complete configuration document into `dir` and returns its path.
///
/// The scratch and log directories live inside `dir`; the `*_extra`
/// fragments are appended verbatim to their sections.
pub fn write_config(dir: &TempDir, model_extra: &str, system_extra: &str, report_extra: &str, testcases: &str) -> PathBuf {
    let root = dir.path();
    let content = format!(
        r#"
[modelconfig]
repository = "{missing}"
{model_extra}

[systemconfig]
scratchdir = "{scratch}"
log_dir = "{logs}"
host = "DESKTOP"
{system_extra}

[reportconfig]
message = "nightly"
{report_extra}

{testcases}
"#,
        missing = root.join("no-such-repository").display(),
        scratch = root.join("scratch").display(),
        logs = root.join("logs").display(),
    );
    let path = root.join("assert.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

/// Accessor that fabricates a checkout instead of calling a VCS.
#[derive(Debug, Clone, Default)]
pub struct FakeAccessor {
    /// Destinations containing any of these fragments fail.
    pub fail_when: Vec<String>,
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeAccessor {
    pub fn failing_for(fragment: &str) -> Self {
        Self {
            fail_when: vec![fragment.to_string()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl RepositoryAccessor for FakeAccessor {
    fn checkout<'a>(
        &'a self,
        spec: &'a RepositorySpec,
    ) -> BoxFuture<'a, Result<CheckoutOutcome, CheckoutError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(spec.destination.clone());
            let dest = spec.destination.to_string_lossy();
            if self.fail_when.iter().any(|f| dest.contains(f.as_str())) {
                return Err(CheckoutError::CheckoutFailed {
                    command: "fake clone".to_string(),
                    output: "refused".to_string(),
                });
            }
            fs::create_dir_all(&spec.destination).unwrap();
            fs::write(spec.destination.join("README"), "model source").unwrap();
            Ok(CheckoutOutcome::Cloned)
        })
    }
}

/// Toolchain whose steps fail for chosen combination labels.
#[derive(Debug, Clone, Default)]
pub struct ScriptedToolchain {
    pub failures: Vec<(String, Step)>,
    pub invoked: Arc<Mutex<Vec<(String, Step)>>>,
}

impl ScriptedToolchain {
    pub fn failing(label: &str, step: Step) -> Self {
        Self {
            failures: vec![(label.to_string(), step)],
            ..Self::default()
        }
    }

    pub fn invoked(&self) -> Vec<(String, Step)> {
        self.invoked.lock().unwrap().clone()
    }

    fn step(&self, combination: &Combination, step: Step) -> Result<(), String> {
        let label = combination.label();
        self.invoked.lock().unwrap().push((label.clone(), step));
        if self.failures.iter().any(|(l, s)| *l == label && *s == step) {
            Err(format!("{} refused", step))
        } else {
            Ok(())
        }
    }
}

impl Toolchain for ScriptedToolchain {
    fn build<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move { self.step(combination, Step::Build).map_err(StepError::Build) })
    }

    fn run<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move { self.step(combination, Step::Run).map_err(StepError::Run) })
    }

    fn compare<'a>(&'a self, combination: &'a Combination) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move { self.step(combination, Step::Compare).map_err(StepError::Compare) })
    }
}

/// Names of the entries directly under `dir`, sorted.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
