//! # Console Reporting Module / 控制台报告模块
//!
//! Prints a colored summary of the run's result rows, one line per
//! combination, followed by pass/fail totals.
//!
//! 打印本次运行结果行的彩色摘要，每个组合一行，最后给出通过/失败总数。

use colored::*;

use crate::core::models::{StepOutcome, TestResult};
use crate::infra::t;

fn colored_symbol(outcome: StepOutcome) -> ColoredString {
    let symbol = outcome.symbol().to_string();
    match outcome {
        StepOutcome::Success => symbol.green(),
        StepOutcome::Failure => symbol.red().bold(),
        StepOutcome::NotAttempted => symbol.dimmed(),
    }
}

/// Prints the summary table.
///
/// # Output Format / 输出格式
/// ```text
/// --- Regression Summary ---
///   E1M20              intel     serial     + + + +
///   E1M20              gfortran  mpi        + - * *   (failed at build)
/// ```
pub fn print_summary(results: &[TestResult]) {
    println!("\n{}", t!("summary.banner").bold());

    for result in results {
        let symbols: Vec<String> = result
            .outcomes()
            .into_iter()
            .map(|o| colored_symbol(o).to_string())
            .collect();
        let note = match result.failed_step() {
            Some(step) => format!("  ({})", t!("summary.failed_at", step = step.to_string()))
                .red()
                .to_string(),
            None => String::new(),
        };
        println!(
            "  {:<25} {:<12} {:<10} {}{}",
            result.test,
            result.compiler,
            result.mode,
            symbols.join(" "),
            note
        );
    }

    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - passed;
    let totals = t!("summary.totals", passed = passed, failed = failed);
    if failed == 0 {
        println!("\n{}", totals.green().bold());
    } else {
        println!("\n{}", totals.yellow().bold());
    }
}
