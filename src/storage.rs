//! 导出目录管理模块
//!
//! # 设计思路
//!
//! 统一管理导出 JPEG 的落盘路径，支持用户自定义目录，
//! 并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用用户在设置中配置的自定义目录。
//! - 未设置时回退到应用数据目录下的 `exports` 子目录。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::photo::ExportedFile;

/// 获取导出目录
///
/// # 参数
/// * `data_dir` - 应用数据目录
/// * `custom_dir` - 用户自定义目录（可选）
pub fn get_exports_dir(data_dir: &Path, custom_dir: Option<&str>) -> Result<PathBuf, AppError> {
    // 优先使用用户自定义目录
    if let Some(dir) = custom_dir.filter(|d| !d.is_empty()) {
        let path = PathBuf::from(dir);
        if !path.exists() {
            fs::create_dir_all(&path).map_err(|e| {
                AppError::Storage(format!("创建自定义目录 '{}' 失败: {}", dir, e))
            })?;
        }
        return Ok(path);
    }

    let exports_dir = data_dir.join("exports");
    if !exports_dir.exists() {
        fs::create_dir_all(&exports_dir).map_err(|e| {
            AppError::Storage(format!("创建导出目录失败: {}", e))
        })?;
    }
    Ok(exports_dir)
}

/// 把导出文件写入目录，返回完整路径。
///
/// 同一毫秒内重复导出时追加序号，避免覆盖。
pub fn save_export(dir: &Path, file: &ExportedFile) -> Result<PathBuf, AppError> {
    let mut target = dir.join(&file.filename);
    let stem = file.filename.trim_end_matches(".jpg");
    let mut suffix = 1;
    while target.exists() {
        target = dir.join(format!("{}-{}.jpg", stem, suffix));
        suffix += 1;
    }

    fs::write(&target, &file.bytes)?;
    log::info!("💾 已保存导出文件: {}", target.display());
    Ok(target)
}
