//! # Mail Dispatch Module / 邮件发送模块
//!
//! Hands the rendered report (or an abort notice) to a mail command. The
//! content is written to a temporary file that becomes the mailer's stdin
//! and is removed afterwards.
//!
//! 将渲染后的报告（或中止通知）交给邮件命令。内容先写入临时文件，
//! 作为邮件程序的标准输入，之后删除。

use std::io::Write;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::config::RegressionConfig;
use crate::core::error::ReportDispatchError;
use crate::core::profile::ModelKind;
use crate::infra::command::{display_command, spawn_and_capture, split_command_line};
use crate::reporting::report::Report;

/// Subject line sent with every message.
pub fn subject_line(message: &str) -> String {
    format!("[ASSERT] {}", message)
}

/// Builds the mail command: the configured override, or `mutt` for HTML and
/// `/usr/bin/mail` for plain text. The subject and recipients are appended.
///
/// 构建邮件命令：优先使用配置的覆盖命令，否则 HTML 用 `mutt`，纯文本用 `/usr/bin/mail`。
pub fn mailer_command(
    mailer: Option<&str>,
    html: bool,
    subject: &str,
    recipients: &[String],
) -> Result<(String, Vec<String>), ReportDispatchError> {
    if recipients.is_empty() {
        return Err(ReportDispatchError::NoRecipients);
    }

    let (program, mut args) = match mailer.map(str::trim).filter(|m| !m.is_empty()) {
        Some(custom) => split_command_line(custom)
            .map_err(|e| ReportDispatchError::InvalidMailer(format!("{:#}", e)))?,
        None if html => (
            "mutt".to_string(),
            vec!["-e".to_string(), "set content_type=text/html".to_string()],
        ),
        None => ("/usr/bin/mail".to_string(), Vec::new()),
    };
    args.push("-s".to_string());
    args.push(subject_line(subject));
    args.extend(recipients.iter().cloned());
    Ok((program, args))
}

/// Mails the rendered report to its recipients.
/// 将渲染后的报告发送给收件人。
pub async fn dispatch_report(
    report: &Report,
    rendered: &str,
    mailer: Option<&str>,
) -> Result<(), ReportDispatchError> {
    let (program, args) =
        mailer_command(mailer, report.is_html(), report.subject(), report.recipients())?;
    send(&program, &args, rendered, "assert_report_").await?;
    info!("report sent to {}", report.recipients().join(", "));
    Ok(())
}

/// The standalone notice sent when a configuration or dependency error
/// aborts the run before any combination runs.
pub fn abort_notice(model: ModelKind, message: &str, config: &RegressionConfig, html: bool) -> String {
    let branch = config
        .model
        .repo_branch
        .as_deref()
        .filter(|b| !b.is_empty())
        .map(|b| format!(" for branch {}", b))
        .unwrap_or_default();
    let mut body = String::new();
    if html {
        body.push_str("<html><pre>\n");
    }
    body.push_str(&format!(
        "{} regression tests{} aborted!\n{}\n\nPlease check the settings in {}\n",
        model.display_name(),
        branch,
        message,
        config.source.display()
    ));
    if html {
        body.push_str("</pre></html>\n");
    }
    body
}

/// Sends an abort notice through the same transport as the report.
/// 通过与报告相同的通道发送中止通知。
pub async fn send_abort_notification(
    model: ModelKind,
    config: &RegressionConfig,
    message: &str,
) -> Result<(), ReportDispatchError> {
    let report_cfg = &config.report;
    let subject = format!("{} regression tests aborted", model.display_name());
    let (program, args) = mailer_command(
        report_cfg.mailer.as_deref(),
        report_cfg.html,
        &subject,
        &report_cfg.recipients(),
    )?;
    let body = abort_notice(model, message, config, report_cfg.html);
    send(&program, &args, &body, "assert_abort_").await?;
    info!("abort notice sent to {}", report_cfg.recipients().join(", "));
    Ok(())
}

async fn send(program: &str, args: &[String], body: &str, prefix: &str) -> Result<(), ReportDispatchError> {
    let mut file = tempfile::Builder::new().prefix(prefix).tempfile()?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    let stdin = file.reopen()?;

    let command_line = display_command(program, args);
    debug!("mail command: {} < {}", command_line, file.path().display());

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::from(stdin)).kill_on_drop(true);
    let (status, output) = spawn_and_capture(cmd).await;
    // The temporary file is removed when `file` drops.
    drop(file);

    let status = status?;
    if !status.success() {
        return Err(ReportDispatchError::MailerFailed {
            command: command_line,
            output: output.trim().to_string(),
        });
    }
    Ok(())
}
