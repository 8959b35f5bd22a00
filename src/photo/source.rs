//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `PhotoSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `SourceImage` / `FrameAsset` 表示解码后的 RGBA 位图，加载后不可变

use image::RgbaImage;

/// 图片输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// 网络地址来源（相框或远程照片）。
    Url(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串），拍照结果通常走这里。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(String),
}

impl PhotoSource {
    /// 根据字符串外观推断来源类型。
    ///
    /// `data:` 前缀视为 Base64，`http(s)://` 视为 URL，其余一律按本地路径处理。
    pub fn detect(reference: &str) -> Self {
        let trimmed = reference.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("data:") {
            Self::Base64(trimmed.to_string())
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::FilePath(trimmed.to_string())
        }
    }

    /// 来源提示（用于日志）。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Base64(_) => "base64",
            Self::FilePath(_) => "file",
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 用户照片（解码后）。
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height().max(1) as f64
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// 相框素材（解码后）。
///
/// 带透明镂空的装饰图，其自身宽高比决定输出画布的宽高比。
#[derive(Debug, Clone)]
pub struct FrameAsset {
    pixels: RgbaImage,
}

impl FrameAsset {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height().max(1) as f64
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_classifies_references() {
        assert!(matches!(
            PhotoSource::detect("data:image/png;base64,AAAA"),
            PhotoSource::Base64(_)
        ));
        assert!(matches!(
            PhotoSource::detect("  https://ik.imagekit.io/frames/gold.png "),
            PhotoSource::Url(ref u) if u == "https://ik.imagekit.io/frames/gold.png"
        ));
        assert!(matches!(PhotoSource::detect("HTTP://a/b.png"), PhotoSource::Url(_)));
        assert!(matches!(PhotoSource::detect("./me.jpg"), PhotoSource::FilePath(_)));
    }

    #[test]
    fn aspect_ratio_uses_pixel_dimensions() {
        let frame = FrameAsset::new(RgbaImage::new(1080, 1920));
        assert!((frame.aspect_ratio() - 0.5625).abs() < 1e-12);

        let source = SourceImage::new(RgbaImage::new(1200, 1600));
        assert!((source.aspect_ratio() - 0.75).abs() < 1e-12);
    }
}
