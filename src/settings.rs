//! 用户设置模块
//!
//! # 设计思路
//!
//! 设置以 JSON 文件保存在应用数据目录下，所有字段都是可选覆盖项：
//! 未填写的字段沿用 `PhotoConfig::default()`。文件不存在或内容损坏时
//! 回退为默认设置，不阻塞主流程。
//!
//! # 实现思路
//!
//! - 应用数据目录优先取 `STAR_BOOTH_HOME`，否则为 `$HOME/.star-booth`。
//! - `apply_to` 把覆盖项写入配置，并复用 `PhotoConfig::validate` 做范围检查。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::photo::{ImageKitConfig, PerformanceProfile, PhotoConfig};

/// 覆盖应用数据目录的环境变量。
pub const HOME_ENV: &str = "STAR_BOOTH_HOME";

/// ImageKit 上传设置。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageKitSettings {
    pub public_key: String,
    pub auth_endpoint: String,
    #[serde(default)]
    pub upload_endpoint: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
}

impl ImageKitSettings {
    pub fn to_config(&self) -> ImageKitConfig {
        let mut config = ImageKitConfig::new(&self.public_key, &self.auth_endpoint);
        if let Some(endpoint) = self.upload_endpoint.as_deref().filter(|v| !v.is_empty()) {
            config.upload_endpoint = endpoint.to_string();
        }
        if let Some(folder) = self.folder.as_deref().filter(|v| !v.is_empty()) {
            config.folder = folder.to_string();
        }
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoothSettings {
    #[serde(default)]
    pub performance_profile: Option<String>,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub allow_private_network: Option<bool>,
    #[serde(default)]
    pub original_jpeg_quality: Option<u8>,
    #[serde(default)]
    pub export_jpeg_quality: Option<u8>,
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub imagekit: Option<ImageKitSettings>,
}

impl BoothSettings {
    /// 把覆盖项写入合成配置。
    pub fn apply_to(&self, config: &mut PhotoConfig) -> Result<(), AppError> {
        if let Some(profile) = self.performance_profile.as_deref() {
            config.apply_performance_profile(PerformanceProfile::parse(profile)?);
        }
        if let Some(path) = self.font_path.as_deref().filter(|p| !p.is_empty()) {
            config.font_path = Some(PathBuf::from(path));
        }
        if let Some(allow) = self.allow_private_network {
            config.allow_private_network = allow;
        }
        if let Some(quality) = self.original_jpeg_quality {
            config.original_jpeg_quality = quality;
        }
        if let Some(quality) = self.export_jpeg_quality {
            config.export_jpeg_quality = quality;
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = limit;
        }

        config.validate()?;
        Ok(())
    }
}

/// 应用数据目录。
pub fn app_data_dir() -> Result<PathBuf, AppError> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".star-booth"))
        .ok_or_else(|| AppError::Settings("无法确定应用数据目录（未设置 HOME）".to_string()))
}

pub fn default_settings_path() -> Result<PathBuf, AppError> {
    Ok(app_data_dir()?.join("settings.json"))
}

/// 读取设置；文件缺失或损坏时返回默认值。
pub fn load_settings_from_path(settings_path: &Path) -> BoothSettings {
    if !settings_path.exists() {
        return BoothSettings::default();
    }

    match fs::read_to_string(settings_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("⚠️ 解析设置文件失败，使用默认设置: {}", e);
                BoothSettings::default()
            }
        },
        Err(e) => {
            log::warn!("⚠️ 读取设置文件失败，使用默认设置: {}", e);
            BoothSettings::default()
        }
    }
}
