//! # Reporting Module / 报告模块
//!
//! This module aggregates per-combination outcomes into the final regression
//! report, renders it as plain text or HTML, prints a colored console summary
//! and hands the rendered report to the mail transport.
//!
//! 此模块将每个组合的结果汇总为最终的回归报告，将其渲染为纯文本或 HTML，
//! 在控制台打印彩色摘要，并将渲染后的报告交给邮件传输。

pub mod console;
pub mod mail;
pub mod report;

// Re-export common reporting functions
pub use console::print_summary;
pub use mail::{dispatch_report, send_abort_notification};
pub use report::Report;
