//! # 文字叠加模块
//!
//! ## 设计思路
//!
//! 在合成画布上绘制一行大写标题：字号随画布宽度与字符数自适应，
//! 水平居中，靠上或靠下留 5% 边距。绘制顺序固定为
//! 投影 → 黑色描边 → 填充色。投影覆盖整段文字（由描边后的轮廓生成，
//! 填充位于轮廓之内），只在文字阶段生效，不影响画布上其它图层。
//!
//! ## 实现思路
//!
//! - 字形光栅化抽象为 [`GlyphRasterizer`]，生产实现基于 `ab_glyph` + `imageproc`。
//! - 描边通过对字形遮罩做 L2 膨胀得到，半径为描边宽度的一半。
//! - 所有图层先在带边距的遮罩上生成，再按同一原点叠加到画布。

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use std::path::Path;

use super::PhotoError;
use super::raster::{blur_mask, pad_mask, tint_mask};

/// 基础字号占画布宽度比例。
pub const BASE_FONT_RATIO: f32 = 0.12;
/// 超过该字符数后字号按比例缩小。
pub const MAX_FULL_SIZE_CHARS: usize = 8;
/// 上下边距占画布高度比例。
pub const VERTICAL_PADDING_RATIO: f32 = 0.05;
/// 描边宽度占字号比例。
pub const STROKE_WIDTH_RATIO: f32 = 0.08;

const SHADOW_BLUR: f32 = 20.0;
const SHADOW_OFFSET_Y: i64 = 4;
const SHADOW_OPACITY: f32 = 0.8;
const STROKE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// 文字位置。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextPosition {
    Top,
    #[default]
    Bottom,
}

impl TextPosition {
    pub fn parse(value: &str) -> Result<Self, PhotoError> {
        match value.trim().to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(PhotoError::InvalidFormat(format!(
                "未知文字位置：{}（可选：top / bottom）",
                other
            ))),
        }
    }
}

/// 文字填充色。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextColor {
    #[default]
    White,
    /// 品牌红 #E31E24。
    Red,
}

impl TextColor {
    pub fn parse(value: &str) -> Result<Self, PhotoError> {
        match value.trim().to_lowercase().as_str() {
            "white" => Ok(Self::White),
            "red" => Ok(Self::Red),
            other => Err(PhotoError::InvalidFormat(format!(
                "未知文字颜色：{}（可选：white / red）",
                other
            ))),
        }
    }

    pub fn rgba(self) -> Rgba<u8> {
        match self {
            Self::White => Rgba([255, 255, 255, 255]),
            Self::Red => Rgba([0xE3, 0x1E, 0x24, 255]),
        }
    }
}

/// 用户输入的叠加文字设置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOverlaySpec {
    pub text: String,
    pub position: TextPosition,
    pub color: TextColor,
}

impl TextOverlaySpec {
    pub fn new(text: impl Into<String>, position: TextPosition, color: TextColor) -> Self {
        Self {
            text: text.into(),
            position,
            color,
        }
    }

    /// 实际绘制的文字：去首尾空白并转大写。
    pub fn display_text(&self) -> String {
        self.text.trim().to_uppercase()
    }

    /// 去空白后为空则不绘制任何东西。
    pub fn is_enabled(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// 按画布宽度与字符数计算字号。
///
/// 不超过 8 个字符时为宽度的 12%，更长时按 `8 / len` 等比缩小。
pub fn font_size_for(canvas_width: u32, char_count: usize) -> f32 {
    let base = canvas_width as f32 * BASE_FONT_RATIO;
    if char_count > MAX_FULL_SIZE_CHARS {
        base * (MAX_FULL_SIZE_CHARS as f32 / char_count as f32)
    } else {
        base
    }
}

/// 文字布局参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    pub stroke_width: f32,
    pub center_x: f32,
    /// 顶部对齐时为文字上边缘，底部对齐时为文字下边缘。
    pub anchor_y: f32,
    pub position: TextPosition,
}

/// 计算文字布局；文字为空时返回 `None`。
pub fn layout_text(spec: &TextOverlaySpec, canvas_width: u32, canvas_height: u32) -> Option<TextLayout> {
    if !spec.is_enabled() {
        return None;
    }

    let char_count = spec.display_text().chars().count();
    let font_size = font_size_for(canvas_width, char_count);
    let padding = canvas_height as f32 * VERTICAL_PADDING_RATIO;
    let anchor_y = match spec.position {
        TextPosition::Top => padding,
        TextPosition::Bottom => canvas_height as f32 - padding,
    };

    Some(TextLayout {
        font_size,
        stroke_width: font_size * STROKE_WIDTH_RATIO,
        center_x: canvas_width as f32 / 2.0,
        anchor_y,
        position: spec.position,
    })
}

/// 字形光栅化接口：把一行文字渲染为灰度覆盖率遮罩。
///
/// 遮罩高度应为整行高度（上升部 + 下降部），宽度为排版宽度。
pub trait GlyphRasterizer: Send + Sync {
    fn rasterize(&self, text: &str, font_size: f32) -> Result<GrayImage, PhotoError>;
}

/// 基于 TTF/OTF 字体文件的光栅化实现。
pub struct FontRasterizer {
    font: FontArc,
}

impl FontRasterizer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PhotoError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| PhotoError::InvalidFormat(format!("字体解析失败：{}", e)))?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> Result<Self, PhotoError> {
        let bytes = std::fs::read(path).map_err(|e| {
            PhotoError::FileSystem(format!("无法读取字体文件 {}：{}", path.display(), e))
        })?;
        log::info!("🔤 已加载字体：{}", path.display());
        Self::from_bytes(bytes)
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn rasterize(&self, text: &str, font_size: f32) -> Result<GrayImage, PhotoError> {
        let scale = PxScale::from(font_size);
        let (text_width, _) = imageproc::drawing::text_size(scale, &self.font, text);
        let line_height = self.font.as_scaled(scale).height().ceil() as u32;

        let mut mask = GrayImage::new(text_width.max(1), line_height.max(1));
        imageproc::drawing::draw_text_mut(&mut mask, Luma([255]), 0, 0, scale, &self.font, text);
        Ok(mask)
    }
}

/// 在画布上绘制叠加文字。
///
/// 文字为空时不做任何修改；需要绘制但没有可用字体时返回合成错误。
pub fn render_text_overlay(
    canvas: &mut RgbaImage,
    spec: &TextOverlaySpec,
    rasterizer: Option<&dyn GlyphRasterizer>,
) -> Result<(), PhotoError> {
    let Some(layout) = layout_text(spec, canvas.width(), canvas.height()) else {
        return Ok(());
    };

    let rasterizer = rasterizer
        .ok_or_else(|| PhotoError::Composite("未配置字体，无法绘制文字".to_string()))?;

    let text = spec.display_text();
    let glyphs = rasterizer.rasterize(&text, layout.font_size)?;

    let stroke_radius = (layout.stroke_width / 2.0).ceil().clamp(1.0, 255.0) as u8;
    let pad = stroke_radius as u32 + (SHADOW_BLUR / 2.0 * 3.0).ceil() as u32;

    let fill_mask = pad_mask(&glyphs, pad);
    let outline_mask = imageproc::morphology::dilate(&fill_mask, Norm::L2, stroke_radius);
    let shadow_mask = blur_mask(&outline_mask, SHADOW_BLUR / 2.0);

    let left = (layout.center_x - glyphs.width() as f32 / 2.0).round() as i64 - pad as i64;
    let top = match layout.position {
        TextPosition::Top => layout.anchor_y.round() as i64,
        TextPosition::Bottom => (layout.anchor_y - glyphs.height() as f32).round() as i64,
    } - pad as i64;

    let shadow = tint_mask(&shadow_mask, Rgba([0, 0, 0, 255]), SHADOW_OPACITY);
    image::imageops::overlay(canvas, &shadow, left, top + SHADOW_OFFSET_Y);

    let outline = tint_mask(&outline_mask, STROKE_COLOR, 1.0);
    image::imageops::overlay(canvas, &outline, left, top);

    let fill = tint_mask(&fill_mask, spec.color.rgba(), 1.0);
    image::imageops::overlay(canvas, &fill, left, top);

    log::debug!(
        "🔤 文字叠加完成 - \"{}\" size={:.1} stroke={:.1} position={:?}",
        text,
        layout.font_size,
        layout.stroke_width,
        layout.position
    );

    Ok(())
}
