use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};

use star_booth::photo::{
    ExportPreset, FailureStage, GlyphRasterizer, PhotoConfig, PhotoError, PhotoHandler,
    PhotoSource, SourceImage, TextColor, TextOverlaySpec, TextPosition, composite,
    export_composite, plan_export, recompute,
};

struct SolidGlyphs;

impl GlyphRasterizer for SolidGlyphs {
    fn rasterize(&self, text: &str, font_size: f32) -> Result<GrayImage, PhotoError> {
        let width = (font_size * 0.6 * text.chars().count() as f32).round().max(1.0) as u32;
        Ok(GrayImage::from_pixel(width, font_size.round().max(1.0) as u32, Luma([255])))
    }
}

fn data_uri(img: RgbaImage) -> String {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(cursor.into_inner())
    )
}

fn assert_close(actual: &Rgba<u8>, expected: Rgba<u8>) {
    for channel in 0..4 {
        assert!(
            actual[channel].abs_diff(expected[channel]) <= 1,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }
}

/// 1080x1920 相框，中间留出透明窗口。
fn story_frame() -> RgbaImage {
    RgbaImage::from_fn(1080, 1920, |x, y| {
        if (100..980).contains(&x) && (200..1700).contains(&y) {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([227, 30, 36, 255])
        }
    })
}

#[tokio::test]
async fn portrait_photo_in_story_frame_is_center_cropped() {
    let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler init failed");
    let photo = PhotoSource::detect(&data_uri(RgbaImage::from_pixel(1200, 1600, Rgba([20, 180, 90, 255]))));
    let frame = PhotoSource::detect(&data_uri(story_frame()));

    let result = handler
        .compose(&photo, Some(&frame), &TextOverlaySpec::default())
        .await
        .expect("compose should succeed");

    assert_eq!((result.width(), result.height()), (1080, 1920));
    let crop = result.layout().source_crop;
    assert!((crop.x - 150.0).abs() < 1e-9);
    assert!((crop.width - 900.0).abs() < 1e-9);
    assert!((crop.height - 1600.0).abs() < 1e-9);

    // 相框不透明处是相框色，镂空处露出照片
    assert_close(result.image().get_pixel(10, 10), Rgba([227, 30, 36, 255]));
    assert_close(result.image().get_pixel(540, 960), Rgba([20, 180, 90, 255]));
}

#[test]
fn blank_caption_matches_plain_composite() {
    let source = SourceImage::new(RgbaImage::from_fn(300, 200, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 77, 255])
    }));
    let config = PhotoConfig::default();

    let plain = composite(&source, None, &config).expect("plain composite");
    let blank = TextOverlaySpec::new("   ", TextPosition::Top, TextColor::Red);
    let with_blank = recompute(&source, None, &blank, Some(&SolidGlyphs), &config).expect("recompute");

    assert_eq!(plain.image(), with_blank.image());
}

#[test]
fn caption_changes_only_its_band() {
    let source = SourceImage::new(RgbaImage::from_pixel(400, 600, Rgba([10, 10, 10, 255])));
    let config = PhotoConfig::default();
    let spec = TextOverlaySpec::new("ulp stars", TextPosition::Bottom, TextColor::White);

    let plain = composite(&source, None, &config).expect("plain");
    let captioned = recompute(&source, None, &spec, Some(&SolidGlyphs), &config).expect("captioned");

    // 顶部区域不受底部标题影响
    for y in 0..200 {
        assert_eq!(plain.image().get_pixel(200, y), captioned.image().get_pixel(200, y));
    }
    // 标题中心为白色填充
    let fill = captioned.image().get_pixel(200, 600 - 30 - 10);
    assert_eq!(fill, &Rgba([255, 255, 255, 255]));
}

#[test]
fn story_composite_exported_as_square_post() {
    let layout = plan_export(1080, 1920, 1080, 1080);
    let background = layout.background.expect("background layer expected");

    assert!((background.scale - 1.0).abs() < 1e-12);
    assert!((layout.foreground.scale - 0.50625).abs() < 1e-12);

    let source = SourceImage::new(RgbaImage::from_pixel(108, 192, Rgba([240, 240, 240, 255])));
    let composed = composite(&source, None, &PhotoConfig::default()).expect("composite");
    let post = ExportPreset::by_key("instagram-post").expect("preset");
    let file = export_composite(&composed, &post, &PhotoConfig::default()).expect("export");

    let decoded = image::load_from_memory(&file.bytes).expect("jpeg decodes");
    assert_eq!((decoded.width(), decoded.height()), (1080, 1080));
}

#[test]
fn every_preset_produces_its_dimensions() {
    let source = SourceImage::new(RgbaImage::from_pixel(90, 120, Rgba([90, 90, 200, 255])));
    let composed = composite(&source, None, &PhotoConfig::default()).expect("composite");

    for preset in ExportPreset::all() {
        let file = export_composite(&composed, preset, &PhotoConfig::default()).expect("export");
        let decoded = image::load_from_memory(&file.bytes).expect("jpeg decodes");
        let expected = if preset.is_original() {
            (composed.width(), composed.height())
        } else {
            (preset.width, preset.height)
        };
        assert_eq!((decoded.width(), decoded.height()), expected, "preset {}", preset.key);
    }
}

#[tokio::test]
async fn corrupt_frame_fails_at_load_stage() {
    let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler init failed");
    let photo = PhotoSource::detect(&data_uri(RgbaImage::from_pixel(20, 20, Rgba([1, 2, 3, 255]))));
    let frame = PhotoSource::Base64("data:image/png;base64,iVBORw0KGgoAAAA".to_string());

    let err = handler
        .compose(&photo, Some(&frame), &TextOverlaySpec::default())
        .await
        .expect_err("corrupt frame must fail");
    assert_eq!(err.stage(), FailureStage::Load);
}
