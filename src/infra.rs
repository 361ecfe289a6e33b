//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Assert Runner,
//! including command execution, file system operations, repository
//! checkout, host detection, logging and i18n support.
//!
//! 此模块为 Assert Runner 提供基础设施服务，
//! 包括命令执行、文件系统操作、仓库检出、主机识别、日志和国际化支持。

pub mod command;
pub mod fs;
pub mod host;
pub mod logging;
pub mod repo;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
