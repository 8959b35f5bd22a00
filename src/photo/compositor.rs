//! # 画布合成模块
//!
//! ## 设计思路
//!
//! 画布尺寸只由相框决定：有相框时宽度固定、高度跟随相框宽高比；
//! 无相框时沿用照片尺寸，长边封顶。照片按 cover 方式居中裁剪铺满画布，
//! 相框拉伸到整张画布后叠加在照片之上，透明镂空处露出照片。
//!
//! ## 实现思路
//!
//! - `cover_crop` / `frame_canvas_size` / `capped_canvas_size` 是纯几何函数，便于单测与属性测试。
//! - `plan_composite` 只算布局，`composite` 负责真正出图。
//! - 文字叠加由上层在合成结果上追加，本模块不感知文字。

use image::RgbaImage;

use super::pipeline::resize_region;
use super::{FrameAsset, PhotoConfig, PhotoError, SourceImage};

/// 源图上的矩形区域（浮点像素坐标）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    /// 覆盖整张图的区域。
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

/// 以 cover 方式计算居中裁剪区域。
///
/// 源图比画布“更宽”时裁掉左右两侧，否则裁掉上下两侧；
/// 返回区域的宽高比与画布一致，且完全落在源图内。
pub fn cover_crop(source_width: u32, source_height: u32, canvas_width: u32, canvas_height: u32) -> CropRect {
    let sw = source_width as f64;
    let sh = source_height as f64;
    let canvas_aspect = canvas_width as f64 / canvas_height as f64;
    let source_aspect = sw / sh;

    if source_aspect > canvas_aspect {
        let width = sh * canvas_aspect;
        CropRect {
            x: (sw - width) / 2.0,
            y: 0.0,
            width,
            height: sh,
        }
    } else {
        let height = sw / canvas_aspect;
        CropRect {
            x: 0.0,
            y: (sh - height) / 2.0,
            width: sw,
            height,
        }
    }
}

/// 有相框时的画布尺寸：宽度固定，高度按相框宽高比取整。
pub fn frame_canvas_size(frame_width: u32, frame_height: u32, canvas_width: u32) -> (u32, u32) {
    let frame_aspect = frame_width as f64 / frame_height as f64;
    let height = (canvas_width as f64 / frame_aspect).round().max(1.0) as u32;
    (canvas_width, height)
}

/// 无相框时的画布尺寸：沿用源图尺寸，长边不超过 `max_dimension`。
pub fn capped_canvas_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / longest as f64;
    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled_width, scaled_height)
}

/// 合成布局：画布尺寸与源图采样区域。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeLayout {
    pub width: u32,
    pub height: u32,
    pub source_crop: CropRect,
    pub framed: bool,
}

/// 计算合成布局。
pub fn plan_composite(
    source: &SourceImage,
    frame: Option<&FrameAsset>,
    config: &PhotoConfig,
) -> Result<CompositeLayout, PhotoError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(PhotoError::Composite("照片尺寸为 0".to_string()));
    }

    let layout = match frame {
        Some(frame) => {
            if frame.width() == 0 || frame.height() == 0 {
                return Err(PhotoError::Composite("相框尺寸为 0".to_string()));
            }
            let (width, height) =
                frame_canvas_size(frame.width(), frame.height(), config.frame_canvas_width);
            CompositeLayout {
                width,
                height,
                source_crop: cover_crop(source.width(), source.height(), width, height),
                framed: true,
            }
        }
        None => {
            let (width, height) =
                capped_canvas_size(source.width(), source.height(), config.max_canvas_dimension);
            CompositeLayout {
                width,
                height,
                source_crop: CropRect::full(source.width(), source.height()),
                framed: false,
            }
        }
    };

    check_canvas_limits(layout.width, layout.height, config)?;
    Ok(layout)
}

/// 画布分配前的像素与内存检查，极窄或极扁的相框会推出超大画布。
fn check_canvas_limits(width: u32, height: u32, config: &PhotoConfig) -> Result<(), PhotoError> {
    let pixels = width as u64 * height as u64;
    if pixels > config.max_decoded_pixels {
        return Err(PhotoError::Composite(format!(
            "画布尺寸过大：{}x{}（像素上限：{}）",
            width, height, config.max_decoded_pixels
        )));
    }

    let bytes = pixels.saturating_mul(4);
    if bytes > config.max_decoded_bytes {
        return Err(PhotoError::Composite(format!(
            "画布内存占用过大：{:.2} MB（限制：{:.2} MB）",
            bytes as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 合成结果（不可变），后续导出与上传都以它为输入。
#[derive(Debug, Clone)]
pub struct CompositeResult {
    image: RgbaImage,
    layout: CompositeLayout,
}

impl CompositeResult {
    pub fn new(image: RgbaImage, layout: CompositeLayout) -> Self {
        Self { image, layout }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height().max(1) as f64
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn layout(&self) -> &CompositeLayout {
        &self.layout
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// 绘制照片与相框两层，返回不含文字的画布。
pub fn composite(
    source: &SourceImage,
    frame: Option<&FrameAsset>,
    config: &PhotoConfig,
) -> Result<CompositeResult, PhotoError> {
    let layout = plan_composite(source, frame, config)?;

    let mut canvas = resize_region(
        source.pixels(),
        Some(layout.source_crop),
        layout.width,
        layout.height,
        config.resize_filter,
    )?;

    if let Some(frame) = frame {
        let stretched = resize_region(
            frame.pixels(),
            None,
            layout.width,
            layout.height,
            config.resize_filter,
        )?;
        image::imageops::overlay(&mut canvas, &stretched, 0, 0);
    }

    log::debug!(
        "🖼️ 画布合成完成 - {}x{} framed={} crop=({:.1},{:.1},{:.1},{:.1})",
        layout.width,
        layout.height,
        layout.framed,
        layout.source_crop.x,
        layout.source_crop.y,
        layout.source_crop.width,
        layout.source_crop.height
    );

    Ok(CompositeResult::new(canvas, layout))
}
