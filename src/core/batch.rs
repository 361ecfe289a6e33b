//! Batch script generation for the run step.
//!
//! A script is written for every run. With batch submission on it carries
//! `#SBATCH` headers derived from the resource estimate and is handed to the
//! batch command; otherwise it is executed with `bash` and awaited.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::scheduler::{job_name, ResourceEstimate};

/// Where and how a script is submitted.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Submission command, e.g. `sbatch`.
    pub submit_command: String,
    /// Account charged for the job (`--account`).
    pub account: Option<String>,
}

/// A rendered run script for one combination.
#[derive(Debug, Clone)]
pub struct BatchScript {
    pub job_name: String,
    pub mode: String,
    pub run_dir: PathBuf,
    /// `None` for interactive runs: no scheduler headers.
    pub estimate: Option<ResourceEstimate>,
    pub account: Option<String>,
    pub command_line: String,
}

impl BatchScript {
    pub fn new(test: &str, mode: &str, run_dir: &Path, command_line: impl Into<String>) -> Self {
        Self {
            job_name: job_name(test).to_string(),
            mode: mode.to_string(),
            run_dir: run_dir.to_path_buf(),
            estimate: None,
            account: None,
            command_line: command_line.into(),
        }
    }

    pub fn with_batch(mut self, estimate: ResourceEstimate, account: Option<String>) -> Self {
        self.estimate = Some(estimate);
        self.account = account;
        self
    }

    /// `<job>.<mode>.bash`
    pub fn file_name(&self) -> String {
        format!("{}.{}.bash", self.job_name, self.mode)
    }

    pub fn path(&self) -> PathBuf {
        self.run_dir.join(self.file_name())
    }

    pub fn render(&self) -> String {
        let mut script = String::from("#!/bin/bash\n");
        if let Some(estimate) = &self.estimate {
            let stem = format!("{}.{}", self.job_name, self.mode);
            let _ = writeln!(script, "#SBATCH -J {}", self.job_name);
            let _ = writeln!(script, "#SBATCH -o {}", quote_path(&self.run_dir.join(format!("{stem}.out"))));
            let _ = writeln!(script, "#SBATCH -e {}", quote_path(&self.run_dir.join(format!("{stem}.err"))));
            if let Some(account) = self.account.as_deref().filter(|a| !a.is_empty()) {
                let _ = writeln!(script, "#SBATCH --account={}", account);
            }
            let _ = writeln!(script, "#SBATCH --ntasks={}", estimate.cores);
            let _ = writeln!(script, "#SBATCH --time={}", estimate.walltime);
        }
        script.push_str("umask 022\n");
        script.push_str("ulimit -s unlimited\n");
        let _ = writeln!(script, "cd {}", quote_path(&self.run_dir));
        let _ = writeln!(script, "{}", self.command_line);
        script
    }

    /// Writes the script into the run directory and returns its path.
    pub fn write(&self) -> Result<PathBuf> {
        let path = self.path();
        fs::write(&path, self.render())
            .with_context(|| format!("Failed to write batch script: {}", path.display()))?;
        Ok(path)
    }

    /// Program and arguments that launch the written script.
    pub fn launcher(&self, script: &Path, settings: Option<&BatchSettings>) -> Result<(String, Vec<String>)> {
        let script = script.to_string_lossy().into_owned();
        match settings {
            Some(batch) if self.estimate.is_some() => {
                let (program, mut args) = crate::infra::command::split_command_line(&batch.submit_command)?;
                args.push(script);
                Ok((program, args))
            }
            _ => Ok(("bash".to_string(), vec![script])),
        }
    }
}

/// Shell-quotes a path when it needs it; plain paths are left as they are.
fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    shlex::try_quote(&raw)
        .map(|quoted| quoted.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
