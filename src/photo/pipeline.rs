//! # 解码与缩放流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限与内存上限快速拒绝
//! 3. 完整解码并转为 RGBA
//! 4. 缩放统一走 `fast_image_resize`（支持源矩形裁剪），失败时回退 `image::imageops`

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{GenericImageView, ImageBuffer, RgbaImage};
use std::io::Cursor;

use super::compositor::CropRect;
use super::source::RawImageData;
use super::{PhotoConfig, PhotoError, PhotoHandler};

impl PhotoHandler {
    /// 将原始字节解码为 RGBA 位图。
    pub(super) fn decode_rgba(
        &self,
        raw: RawImageData,
        config: &PhotoConfig,
    ) -> Result<RgbaImage, PhotoError> {
        image::guess_format(&raw.bytes)
            .map_err(|e| PhotoError::InvalidFormat(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
        validate_pixel_limits(config, header_width, header_height)?;
        validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(&raw.bytes)
            .map_err(|e| PhotoError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(PhotoError::Decode("图片尺寸为 0".to_string()));
        }
        validate_pixel_limits(config, width, height)?;
        validate_decoded_memory_limits(config, width, height)?;

        let rgba = decoded.to_rgba8();

        log::info!(
            "✅ 图片解码成功 - 来源: {} 尺寸: {}x{}",
            raw.source_hint,
            width,
            height
        );

        Ok(rgba)
    }
}

/// 仅通过内存中的图片头信息读取宽高。
///
/// 用于在完整解码前做像素限制检查。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), PhotoError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PhotoError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| PhotoError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
}

/// 校验像素数量是否超过配置上限。
fn validate_pixel_limits(config: &PhotoConfig, width: u32, height: u32) -> Result<(), PhotoError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| PhotoError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(PhotoError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(
    config: &PhotoConfig,
    width: u32,
    height: u32,
) -> Result<(), PhotoError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| PhotoError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(PhotoError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 把 `src` 中的 `crop` 区域缩放到 `target_width x target_height`。
///
/// `crop` 为 `None` 时使用整张图。尺寸一致且无裁剪时直接复制。
pub(crate) fn resize_region(
    src: &RgbaImage,
    crop: Option<CropRect>,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, PhotoError> {
    if target_width == 0 || target_height == 0 {
        return Err(PhotoError::Composite(format!(
            "目标尺寸无效：{}x{}",
            target_width, target_height
        )));
    }

    let full = CropRect::full(src.width(), src.height());
    let crop = crop.unwrap_or(full);
    if crop == full && src.dimensions() == (target_width, target_height) {
        return Ok(src.clone());
    }

    match resize_with_fast_image_resize(src, crop, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops：{}", err);
            Ok(resize_with_imageops(src, crop, target_width, target_height, filter))
        }
    }
}

fn resize_with_fast_image_resize(
    src: &RgbaImage,
    crop: CropRect,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, PhotoError> {
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.as_raw().clone(), fr::PixelType::U8x4)
            .map_err(|e| PhotoError::Composite(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)))
        .crop(crop.x, crop.y, crop.width, crop.height);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| PhotoError::Composite(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| PhotoError::Composite("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn resize_with_imageops(
    src: &RgbaImage,
    crop: CropRect,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> RgbaImage {
    let x = crop.x.round().max(0.0) as u32;
    let y = crop.y.round().max(0.0) as u32;
    let width = (crop.width.round() as u32).clamp(1, src.width().saturating_sub(x).max(1));
    let height = (crop.height.round() as u32).clamp(1, src.height().saturating_sub(y).max(1));

    let region = image::imageops::crop_imm(src, x, y, width, height).to_image();
    image::imageops::resize(&region, target_width, target_height, filter)
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba};

    fn encode_png(img: RgbaImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode png");
        cursor.into_inner()
    }

    fn raw(bytes: Vec<u8>) -> RawImageData {
        RawImageData {
            bytes,
            source_hint: "test",
        }
    }

    #[test]
    fn decode_rejects_images_over_pixel_limit_from_header() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler");
        let mut config = PhotoConfig::default();
        config.max_decoded_pixels = 100;

        let bytes = encode_png(RgbaImage::new(20, 20));
        let result = handler.decode_rgba(raw(bytes), &config);
        assert!(matches!(result, Err(PhotoError::ResourceLimit(_))));
    }

    #[test]
    fn decode_rejects_truncated_data() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler");
        let mut bytes = encode_png(RgbaImage::new(32, 32));
        bytes.truncate(40);

        let result = handler.decode_rgba(raw(bytes), &PhotoConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn decode_returns_rgba_pixels() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler");
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));

        let decoded = handler
            .decode_rgba(raw(encode_png(img)), &PhotoConfig::default())
            .expect("decode");
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn resize_region_samples_only_the_crop() {
        // 左半红、右半蓝；只裁右半部分，结果应全为蓝色
        let src = RgbaImage::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let crop = CropRect {
            x: 20.0,
            y: 0.0,
            width: 20.0,
            height: 20.0,
        };

        let out = resize_region(&src, Some(crop), 10, 10, FilterType::Triangle).expect("resize");
        assert_eq!(out.dimensions(), (10, 10));
        for pixel in out.pixels() {
            assert!(pixel[2] > 200 && pixel[0] < 60, "unexpected pixel {:?}", pixel);
        }
    }

    #[test]
    fn resize_region_rejects_zero_target() {
        let src = RgbaImage::new(4, 4);
        assert!(matches!(
            resize_region(&src, None, 0, 4, FilterType::Triangle),
            Err(PhotoError::Composite(_))
        ));
    }
}
