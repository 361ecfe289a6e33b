//! # Regression Report Module / 回归报告模块
//!
//! Collects one row per combination and renders the final report: banner,
//! header, rows of legend symbols, the rundeck dependency list, legend block
//! and a timing footer.
//! In HTML mode the whole body is wrapped in a single `<html><pre>` block
//! without escaping.
//!
//! 为每个组合收集一行结果并渲染最终报告：横幅、表头、图例符号行、
//! 图例块以及计时页脚。HTML 模式下整个正文被包裹在一个 `<html><pre>` 块中，不做转义。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::core::config::ReportConfig;
use crate::core::models::{StepOutcome, TestResult};
use crate::core::profile::ModelKind;
use crate::core::scheduler::DependencyGraph;

const BANNER_TITLE: &str = "ASSERT: A Software Suite for Earth-systems Regression Testing";
const RULE_WIDTH: usize = 60;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAME_WIDTH: usize = 25;
const COMPILER_WIDTH: usize = 17;
const MODE_WIDTH: usize = 15;
const SYMBOL_WIDTH: usize = 8;

/// Append-only store of result rows plus the mail settings of the run.
///
/// Recipients are resolved here but only checked when the report is
/// dispatched.
///
/// 仅追加的结果行存储，以及本次运行的邮件设置。收件人在此解析，但仅在发送时检查。
#[derive(Debug, Clone)]
pub struct Report {
    model: ModelKind,
    header: Vec<String>,
    rows: Vec<TestResult>,
    dependencies: Vec<(String, Vec<String>)>,
    start_time: DateTime<Local>,
    subject: String,
    recipients: Vec<String>,
    html: bool,
}

impl Report {
    pub fn new(model: ModelKind, config: &ReportConfig, start_time: DateTime<Local>) -> Self {
        Self {
            model,
            header: model.header().iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            dependencies: Vec::new(),
            start_time,
            subject: config.message.clone(),
            recipients: config.recipients(),
            html: config.html,
        }
    }

    /// Appends one row. Called once per combination.
    pub fn add_test(&mut self, row: TestResult) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[TestResult] {
        &self.rows
    }

    /// Records which tests depend on which, for the dependency block.
    /// Roots are left out.
    pub fn set_dependencies(&mut self, graph: &DependencyGraph) {
        self.dependencies = graph
            .iter()
            .filter(|entry| !entry.dependencies.is_empty())
            .map(|entry| (entry.name.clone(), entry.dependencies.clone()))
            .collect();
    }

    pub fn dependencies(&self) -> &[(String, Vec<String>)] {
        &self.dependencies
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Symbol → meaning, in legend order.
    pub fn legend(&self) -> Vec<(char, String)> {
        StepOutcome::ALL
            .into_iter()
            .map(|o| (o.symbol(), o.meaning()))
            .collect()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn is_html(&self) -> bool {
        self.html
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    /// `end - start` in seconds, with the fractional part.
    pub fn elapsed_seconds(&self, end: DateTime<Local>) -> f64 {
        let elapsed = end - self.start_time;
        match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => elapsed.num_milliseconds() as f64 / 1_000.0,
        }
    }

    /// Renders the full report text. / 渲染完整的报告文本。
    pub fn render(&self, end: DateTime<Local>) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let dashes = "- ".repeat(RULE_WIDTH / 2);
        let mut out = String::new();

        if self.html {
            out.push_str("<html><pre>");
        }

        let _ = write!(
            out,
            "\n{rule}\n{BANNER_TITLE}\n{rule}\nMODEL TYPE: {}\n",
            self.model.display_name()
        );

        let _ = writeln!(out, "\n{dashes}");
        let _ = writeln!(out, "{}", self.format_header());
        let _ = writeln!(out, "{dashes}");
        for row in &self.rows {
            let _ = writeln!(out, "{}", format_row(row));
        }
        let _ = writeln!(out, "{dashes}");

        out.push_str("\n             RUNDECK : DEPENDENCIES\n---------------------------------\n");
        if self.dependencies.is_empty() {
            out.push_str(" *** No dependencies were set in these tests ***\n");
        }
        for (test, deps) in &self.dependencies {
            let _ = writeln!(out, "{:>20} : {}", test, deps.join(","));
        }

        out.push_str("\nLegend:\n---------------------------------\n");
        for (symbol, meaning) in self.legend() {
            let _ = writeln!(out, "{} : {}", symbol, meaning);
        }

        let _ = write!(
            out,
            "\n{rule}\nStart Time:         {}\nEnd Time:           {}\nTotal Time Elapsed: {:.6}\n{rule}\n",
            self.start_time.format(TIME_FORMAT),
            end.format(TIME_FORMAT),
            self.elapsed_seconds(end)
        );

        if self.html {
            out.push_str("</pre></html>\n");
        }
        out
    }

    fn format_header(&self) -> String {
        let mut columns = self.header.iter();
        let mut line = String::new();
        for width in [NAME_WIDTH, COMPILER_WIDTH, MODE_WIDTH] {
            if let Some(column) = columns.next() {
                let _ = write!(line, "{:<width$} ", column);
            }
        }
        for column in columns {
            let _ = write!(line, "{:^width$}", column, width = SYMBOL_WIDTH);
        }
        line.trim_end().to_string()
    }

    /// Re-extracts the rows from rendered report text.
    ///
    /// A row is any line between the table rules whose last four tokens are
    /// legend symbols; the two tokens before them are compiler and mode and
    /// the rest is the test name. Names and axis values never hold
    /// whitespace (the configuration loader rejects them), so the columns
    /// split cleanly.
    ///
    /// 从渲染后的报告文本中重新提取结果行。
    pub fn parse_rows(rendered: &str) -> Vec<TestResult> {
        let mut rules_seen = 0;
        let mut rows = Vec::new();

        for line in rendered.lines() {
            if line.trim_start().starts_with("- -") {
                rules_seen += 1;
                continue;
            }
            if rules_seen != 2 {
                continue;
            }
            if let Some(row) = parse_row(line) {
                rows.push(row);
            }
        }
        rows
    }

    /// The rows as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.rows)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json().context("Failed to serialize results")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))
    }
}

fn format_row(row: &TestResult) -> String {
    let mut line = format!(
        "{:<NAME_WIDTH$} {:<COMPILER_WIDTH$} {:<MODE_WIDTH$} ",
        row.test, row.compiler, row.mode
    );
    for outcome in row.outcomes() {
        let _ = write!(line, "{:^SYMBOL_WIDTH$}", outcome.symbol());
    }
    line.trim_end().to_string()
}

fn parse_row(line: &str) -> Option<TestResult> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 7 {
        return None;
    }
    let (head, symbols) = tokens.split_at(tokens.len() - 4);
    let mut outcomes = symbols.iter().map(|token| {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => StepOutcome::from_symbol(c),
            _ => None,
        }
    });
    let checkout = outcomes.next()??;
    let build = outcomes.next()??;
    let run = outcomes.next()??;
    let compare = outcomes.next()??;

    let (name, rest) = head.split_at(head.len() - 2);
    Some(TestResult {
        test: name.join(" "),
        compiler: rest[0].to_string(),
        mode: rest[1].to_string(),
        checkout,
        build,
        run,
        compare,
    })
}
