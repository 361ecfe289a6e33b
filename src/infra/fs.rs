//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for the scratch directory tree:
//! creating combination directories, purging them, and resetting the
//! scratch root.
//!
//! 此模块为 scratch 目录树提供实用功能：
//! 创建组合目录、清除目录以及重置 scratch 根目录。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Creates a directory and all of its parents. Existing directories are fine.
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Recursively removes a directory. A missing directory is not an error.
///
/// # Arguments
/// * `path` - Directory to remove
///
/// 递归删除目录。目录不存在不视为错误。
pub fn clean_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs_extra::dir::remove(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))
}

/// Empties the scratch root, recreating it if needed.
///
/// Refuses a filesystem root, the home directory, and the working directory
/// or any of its ancestors. Not guarded against a pipeline running
/// concurrently in the same tree.
///
/// 清空 scratch 根目录，必要时重新创建。拒绝文件系统根目录、主目录以及当前工作目录
/// 或其任一上级目录。不防止同一目录树中并发运行的流水线。
pub fn reset_dir(path: &Path) -> Result<()> {
    if is_protected(path) {
        anyhow::bail!("Refusing to reset {}", path.display());
    }
    if path.is_dir() {
        let entries: Vec<_> = fs::read_dir(path)
            .with_context(|| format!("Failed to list directory: {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        fs_extra::remove_items(&entries)
            .with_context(|| format!("Failed to empty directory: {}", path.display()))?;
    }
    create_dir(path)
}

fn is_protected(path: &Path) -> bool {
    if path.as_os_str().is_empty() || path.parent().is_none() {
        return true;
    }
    // A directory that does not exist yet cannot hold anything we care about.
    let Ok(resolved) = path.canonicalize() else {
        return false;
    };
    if resolved.parent().is_none() {
        return true;
    }
    if let Ok(cwd) = std::env::current_dir().and_then(|dir| dir.canonicalize()) {
        if cwd.starts_with(&resolved) {
            return true;
        }
    }
    let home = PathBuf::from(shellexpand::tilde("~").as_ref());
    home.canonicalize().is_ok_and(|home| home == resolved)
}

/// Checks if a path exists and is a directory.
pub fn is_directory(path: &Path) -> bool {
    path.exists() && path.is_dir()
}

/// `true` if the directory exists and has at least one entry.
/// 如果目录存在且至少包含一个条目，则返回 `true`。
pub fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
