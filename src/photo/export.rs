//! # 导出模块
//!
//! ## 设计思路
//!
//! 合成结果按预设尺寸导出为 JPEG。原始尺寸直接重新编码；
//! 其它预设采用“模糊铺底 + 居中前景”两层重绘，避免裁掉画面或留黑边：
//!
//! 1. 背景层：cover 缩放铺满目标画布，高斯模糊并调暗到 70%。
//! 2. 前景层：contain 缩放后再缩到 90%，居中绘制，带柔和投影。
//!
//! 宽高比与预设一致时，前景按 contain 比例铺满画布，不绘制背景层与投影。
//!
//! ## 实现思路
//!
//! - `plan_export` 只算几何，便于单测；`export_composite` 负责出图与编码。
//! - 重绘阶段的任何失败统一归为 `PhotoError::Export`，提示用户改用原始尺寸。

use base64::{Engine as _, engine::general_purpose};
use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;

use super::pipeline::resize_region;
use super::raster::{alpha_mask, blur_rgba, darken, drop_shadow, flatten_on_black};
use super::{CompositeResult, PhotoConfig, PhotoError};

/// 导出文件名前缀。
pub const EXPORT_FILENAME_PREFIX: &str = "ulp-star";

const BACKGROUND_BLUR_SIGMA: f32 = 20.0;
const BACKGROUND_BRIGHTNESS: f32 = 0.7;
const FOREGROUND_SCALE: f64 = 0.9;
const FOREGROUND_SHADOW_OPACITY: f32 = 0.5;
const FOREGROUND_SHADOW_BLUR: f32 = 30.0;
const FOREGROUND_SHADOW_OFFSET_Y: i64 = 10;
const ASPECT_EPSILON: f64 = 1e-6;

/// 导出尺寸预设。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPreset {
    pub key: &'static str,
    pub name: &'static str,
    /// 原始尺寸预设宽高为 0。
    pub width: u32,
    pub height: u32,
}

/// 全部预设，顺序即界面展示顺序。
pub const EXPORT_PRESETS: [ExportPreset; 5] = [
    ExportPreset {
        key: "original",
        name: "原始尺寸",
        width: 0,
        height: 0,
    },
    ExportPreset {
        key: "instagram-post",
        name: "Instagram Post",
        width: 1080,
        height: 1080,
    },
    ExportPreset {
        key: "instagram-story",
        name: "Instagram Story",
        width: 1080,
        height: 1920,
    },
    ExportPreset {
        key: "facebook-post",
        name: "Facebook Post",
        width: 1200,
        height: 630,
    },
    ExportPreset {
        key: "twitter",
        name: "Twitter/X",
        width: 1200,
        height: 675,
    },
];

impl ExportPreset {
    pub fn all() -> &'static [ExportPreset] {
        &EXPORT_PRESETS
    }

    pub fn by_key(key: &str) -> Result<ExportPreset, PhotoError> {
        EXPORT_PRESETS
            .iter()
            .find(|preset| preset.key.eq_ignore_ascii_case(key.trim()))
            .copied()
            .ok_or_else(|| {
                PhotoError::InvalidFormat(format!(
                    "未知导出预设：{}（可选：{}）",
                    key,
                    EXPORT_PRESETS
                        .iter()
                        .map(|p| p.key)
                        .collect::<Vec<_>>()
                        .join(" / ")
                ))
            })
    }

    pub fn is_original(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 图层在目标画布上的位置与缩放。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    fn centered(source_width: u32, source_height: u32, scale: f64, target_width: u32, target_height: u32) -> Self {
        let width = ((source_width as f64 * scale).round() as u32).max(1);
        let height = ((source_height as f64 * scale).round() as u32).max(1);
        Self {
            scale,
            x: (target_width as i64 - width as i64).div_euclid(2),
            y: (target_height as i64 - height as i64).div_euclid(2),
            width,
            height,
        }
    }
}

/// 两层重绘布局。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportLayout {
    pub target_width: u32,
    pub target_height: u32,
    /// 宽高比一致时为 `None`。
    pub background: Option<Placement>,
    pub foreground: Placement,
}

impl ExportLayout {
    pub fn has_foreground_shadow(&self) -> bool {
        self.background.is_some()
    }
}

/// 计算导出布局。
pub fn plan_export(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> ExportLayout {
    let scale_x = target_width as f64 / source_width as f64;
    let scale_y = target_height as f64 / source_height as f64;
    let cover = scale_x.max(scale_y);
    let contain = scale_x.min(scale_y);

    let source_aspect = source_width as f64 / source_height as f64;
    let target_aspect = target_width as f64 / target_height as f64;
    let aspect_matches = (source_aspect - target_aspect).abs() <= ASPECT_EPSILON * target_aspect;

    if aspect_matches {
        return ExportLayout {
            target_width,
            target_height,
            background: None,
            foreground: Placement {
                scale: contain,
                x: 0,
                y: 0,
                width: target_width,
                height: target_height,
            },
        };
    }

    ExportLayout {
        target_width,
        target_height,
        background: Some(Placement::centered(
            source_width,
            source_height,
            cover,
            target_width,
            target_height,
        )),
        foreground: Placement::centered(
            source_width,
            source_height,
            contain * FOREGROUND_SCALE,
            target_width,
            target_height,
        ),
    }
}

/// 导出产物。
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl ExportedFile {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// 以 Data URI 形式输出，用于历史记录与前端预览。
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            Self::MIME_TYPE,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// 生成 `ulp-star-<毫秒时间戳>.jpg`。
pub fn export_filename(timestamp_ms: i64) -> String {
    format!("{}-{}.jpg", EXPORT_FILENAME_PREFIX, timestamp_ms)
}

/// 按预设导出合成结果。
pub fn export_composite(
    composite: &CompositeResult,
    preset: &ExportPreset,
    config: &PhotoConfig,
) -> Result<ExportedFile, PhotoError> {
    let filename = export_filename(chrono::Utc::now().timestamp_millis());

    if preset.is_original() {
        let bytes = encode_jpeg(composite.image(), config.original_jpeg_quality)?;
        return Ok(ExportedFile {
            bytes,
            filename,
            width: composite.width(),
            height: composite.height(),
            quality: config.original_jpeg_quality,
        });
    }

    let layout = plan_export(composite.width(), composite.height(), preset.width, preset.height);
    let canvas = render_layout(composite.image(), &layout, config)?;
    let bytes = encode_jpeg(&canvas, config.export_jpeg_quality)?;

    log::info!(
        "📤 导出完成 - 预设: {} {}x{} 前景缩放: {:.5} 背景: {}",
        preset.key,
        preset.width,
        preset.height,
        layout.foreground.scale,
        layout.background.is_some()
    );

    Ok(ExportedFile {
        bytes,
        filename,
        width: preset.width,
        height: preset.height,
        quality: config.export_jpeg_quality,
    })
}

/// 按布局把合成图重绘到目标尺寸画布。
pub(crate) fn render_layout(
    source: &RgbaImage,
    layout: &ExportLayout,
    config: &PhotoConfig,
) -> Result<RgbaImage, PhotoError> {
    let to_export_error = |e: PhotoError| PhotoError::Export(e.to_string());
    let mut canvas = RgbaImage::new(layout.target_width, layout.target_height);

    if let Some(background) = layout.background {
        let scaled = resize_region(source, None, background.width, background.height, config.resize_filter)
            .map_err(to_export_error)?;
        let mut blurred = blur_rgba(&scaled, BACKGROUND_BLUR_SIGMA);
        darken(&mut blurred, BACKGROUND_BRIGHTNESS);
        image::imageops::overlay(&mut canvas, &blurred, background.x, background.y);
    }

    let foreground = layout.foreground;
    let scaled = resize_region(source, None, foreground.width, foreground.height, config.resize_filter)
        .map_err(to_export_error)?;

    if layout.has_foreground_shadow() {
        let (shadow, pad) = drop_shadow(
            &alpha_mask(&scaled),
            FOREGROUND_SHADOW_OPACITY,
            FOREGROUND_SHADOW_BLUR,
        );
        image::imageops::overlay(
            &mut canvas,
            &shadow,
            foreground.x - pad as i64,
            foreground.y - pad as i64 + FOREGROUND_SHADOW_OFFSET_Y,
        );
    }

    image::imageops::overlay(&mut canvas, &scaled, foreground.x, foreground.y);
    Ok(canvas)
}

/// 编码为 JPEG（透明区域压在黑底上）。
pub(crate) fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let rgb = flatten_on_black(image);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|e| PhotoError::Export(format!("JPEG 编码失败：{}", e)))?;
    Ok(bytes)
}
