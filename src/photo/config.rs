//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `PhotoConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中性能档位（quality / balanced / speed）作为高层语义，映射到缩放滤镜。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置，画布常量与活动页面保持一致。
//! - `PerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体滤镜。

use std::path::PathBuf;

use image::imageops::FilterType;

use super::PhotoError;

/// 合成链路配置。
///
/// 字段覆盖了加载、解码、合成、导出与历史记录五个阶段。
#[derive(Debug, Clone)]
pub struct PhotoConfig {
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 有相框时画布的固定宽度。
    pub frame_canvas_width: u32,
    /// 无相框时画布长边上限。
    pub max_canvas_dimension: u32,
    /// 缩放滤镜策略。
    pub resize_filter: FilterType,
    /// 原始尺寸导出的 JPEG 质量（1~100）。
    pub original_jpeg_quality: u8,
    /// 预设尺寸导出的 JPEG 质量（1~100）。
    pub export_jpeg_quality: u8,
    /// 导出历史最多保留条数。
    pub history_limit: usize,
    /// 相框下载缓存条数。
    pub frame_cache_entries: usize,
    /// 相框下载缓存有效期（秒）。
    pub frame_cache_ttl_secs: u64,
    /// 文字叠加使用的字体文件（TTF/OTF）。
    pub font_path: Option<PathBuf>,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            allow_private_network: false,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            frame_canvas_width: 1080,
            max_canvas_dimension: 1920,
            resize_filter: FilterType::CatmullRom,
            original_jpeg_quality: 92,
            export_jpeg_quality: 95,
            history_limit: 20,
            frame_cache_entries: 8,
            frame_cache_ttl_secs: 300,
            font_path: None,
        }
    }
}

/// 性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先导出速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl PerformanceProfile {
    /// 从外部字符串解析档位。
    pub fn parse(profile: &str) -> Result<Self, PhotoError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(PhotoError::InvalidFormat(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl PhotoConfig {
    /// 基于当前滤镜反推性能档位。
    pub fn performance_profile(&self) -> PerformanceProfile {
        match self.resize_filter {
            FilterType::Lanczos3 => PerformanceProfile::Quality,
            FilterType::Nearest | FilterType::Triangle => PerformanceProfile::Speed,
            _ => PerformanceProfile::Balanced,
        }
    }

    /// 应用指定性能档位到实际参数。
    pub fn apply_performance_profile(&mut self, profile: PerformanceProfile) {
        self.resize_filter = match profile {
            PerformanceProfile::Quality => FilterType::Lanczos3,
            PerformanceProfile::Balanced => FilterType::CatmullRom,
            PerformanceProfile::Speed => FilterType::Triangle,
        };
    }

    /// 校验配置中的数值范围。
    pub fn validate(&self) -> Result<(), PhotoError> {
        if self.frame_canvas_width == 0 || self.max_canvas_dimension == 0 {
            return Err(PhotoError::InvalidFormat("画布尺寸必须大于 0".to_string()));
        }
        if !(1..=100).contains(&self.original_jpeg_quality)
            || !(1..=100).contains(&self.export_jpeg_quality)
        {
            return Err(PhotoError::InvalidFormat("JPEG 质量必须在 1~100 之间".to_string()));
        }
        if self.history_limit == 0 {
            return Err(PhotoError::InvalidFormat("history_limit 不能为 0".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(PhotoError::InvalidFormat("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        Ok(())
    }
}
