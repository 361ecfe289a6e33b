//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Assert Runner,
//! including configuration, the test matrix, dependency scheduling
//! and the per-combination regression pipeline.
//!
//! 此模块包含 Assert Runner 的核心功能，
//! 包括配置、测试矩阵、依赖调度以及每个组合的回归流水线。

pub mod batch;
pub mod config;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod models;
pub mod profile;
pub mod scheduler;

// Re-exports
pub use config::RegressionConfig;
pub use execution::RegressionManager;
pub use models::{StepOutcome, TestResult};
