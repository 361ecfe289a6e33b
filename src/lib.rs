//! # Assert Runner Library / Assert Runner 库
//!
//! This library provides the core functionality for the Assert Runner tool,
//! a configuration-driven regression test orchestrator for Earth-system models.
//!
//! 此库为 Assert Runner 工具提供核心功能，
//! 这是一个配置驱动的地球系统模式回归测试编排器。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, test matrix, dependency scheduling and the per-combination pipeline
//! - `infra` - Infrastructure services: subprocesses, file system, repository checkout, logging
//! - `reporting` - Result aggregation, report rendering and dispatch
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 配置、测试矩阵、依赖调度以及每个组合的流水线
//! - `infra` - 基础设施服务：子进程、文件系统、仓库检出、日志
//! - `reporting` - 结果汇总、报告渲染与发送
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale.as_str()) {
        &locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
