//! 图层辅助：遮罩着色、阴影、模糊、调暗与去透明。
//!
//! 文字叠加与导出重绘共用这些操作，所有函数都返回新图层或就地修改，不持有状态。

use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};

/// 用单色把灰度遮罩转成 RGBA 图层，遮罩值乘以 `opacity` 作为透明度。
pub(crate) fn tint_mask(mask: &GrayImage, color: Rgba<u8>, opacity: f32) -> RgbaImage {
    let opacity = opacity.clamp(0.0, 1.0);
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let coverage = mask.get_pixel(x, y)[0] as f32 / 255.0;
        let alpha = (coverage * opacity * color[3] as f32).round() as u8;
        Rgba([color[0], color[1], color[2], alpha])
    })
}

/// 高斯近似模糊。`sigma <= 0` 时原样返回。
pub(crate) fn blur_mask(mask: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return mask.clone();
    }
    image::imageops::fast_blur(mask, sigma)
}

pub(crate) fn blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    image::imageops::fast_blur(image, sigma)
}

/// 取出 alpha 通道作为遮罩。
pub(crate) fn alpha_mask(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[3]])
    })
}

/// 四周补 `pad` 像素透明边，给模糊/描边留出扩散空间。
pub(crate) fn pad_mask(mask: &GrayImage, pad: u32) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + pad * 2, mask.height() + pad * 2);
    image::imageops::replace(&mut padded, mask, pad as i64, pad as i64);
    padded
}

/// 生成黑色投影图层。
///
/// `blur` 采用画布阴影的模糊半径语义，高斯 sigma 取其一半。
/// 返回的图层比输入四周各大 `pad` 像素，调用方需把绘制位置减去 `pad`。
pub(crate) fn drop_shadow(alpha: &GrayImage, opacity: f32, blur: f32) -> (RgbaImage, u32) {
    let sigma = blur / 2.0;
    let pad = (sigma * 3.0).ceil().max(0.0) as u32;
    let blurred = blur_mask(&pad_mask(alpha, pad), sigma);
    (tint_mask(&blurred, Rgba([0, 0, 0, 255]), opacity), pad)
}

/// 按比例调暗 RGB 通道，alpha 不变。
pub(crate) fn darken(image: &mut RgbaImage, brightness: f32) {
    let factor = brightness.clamp(0.0, 1.0);
    for pixel in image.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = (pixel[channel] as f32 * factor).round() as u8;
        }
    }
}

/// 压平到黑底 RGB，供 JPEG 编码。
pub(crate) fn flatten_on_black(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let alpha = a as u16;
        let mix = |c: u8| ((c as u16 * alpha + 127) / 255) as u8;
        image::Rgb([mix(r), mix(g), mix(b)])
    })
}
