//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `PhotoHandler` 只负责流程编排与配置管理，不持有界面状态。
//! 处理链路固定为：
//! 1. 读取处理器配置
//! 2. 按来源加载照片与相框
//! 3. 合成画布（照片 → 相框 → 文字）
//! 4. 按预设导出
//!
//! ## 实现思路
//!
//! - 配置在构造时确定，处理器生命周期内不变；换档需重建处理器。
//! - 记录 `load/composite/text/total` 与导出阶段耗时，便于性能诊断。
//! - `recompute` 是纯函数：相同输入得到相同画布，文字修改时只需重跑这一步。

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::compositor::composite;
use super::export::export_composite;
use super::text::{FontRasterizer, GlyphRasterizer, render_text_overlay};
use super::{
    CompositeResult, ExportPreset, ExportedFile, FrameAsset, PhotoConfig, PhotoError, PhotoSource,
    SourceImage, TextOverlaySpec,
};

/// 合成处理器。
///
/// 封装了配置状态、相框缓存与字体，并编排各子模块实现完整流程。
pub struct PhotoHandler {
    pub(super) config: PhotoConfig,
    pub(super) frame_cache: Mutex<LruCache<String, CachedFrame>>,
    rasterizer: Option<Arc<dyn GlyphRasterizer>>,
}

pub(super) struct CachedFrame {
    pub(super) created_at: Instant,
    pub(super) frame: Arc<FrameAsset>,
}

impl PhotoHandler {
    /// 根据初始配置创建处理器。
    ///
    /// 配置了 `font_path` 时立即加载字体，字体损坏会在这里直接报错。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use star_booth::photo::{PhotoConfig, PhotoHandler};
    ///
    /// let handler = PhotoHandler::new(PhotoConfig::default())?;
    /// # Ok::<(), star_booth::photo::PhotoError>(())
    /// ```
    pub fn new(config: PhotoConfig) -> Result<Self, PhotoError> {
        config.validate()?;

        let rasterizer: Option<Arc<dyn GlyphRasterizer>> = match config.font_path.as_deref() {
            Some(path) => Some(Arc::new(FontRasterizer::from_file(path)?)),
            None => None,
        };

        let capacity = NonZeroUsize::new(config.frame_cache_entries.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        log::info!(
            "⚙️ 合成处理器已创建 - profile={} font={}",
            config.performance_profile().as_str(),
            rasterizer.is_some()
        );

        Ok(Self {
            config,
            frame_cache: Mutex::new(LruCache::new(capacity)),
            rasterizer,
        })
    }

    /// 替换字形光栅化实现（例如注入内置字体）。
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn GlyphRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn config(&self) -> &PhotoConfig {
        &self.config
    }

    /// 同时加载照片与相框，任一失败则整体失败。
    pub async fn load_inputs(
        &self,
        source: &PhotoSource,
        frame: Option<&PhotoSource>,
    ) -> Result<(SourceImage, Option<Arc<FrameAsset>>), PhotoError> {
        match frame {
            Some(frame) => {
                let (photo, frame) = tokio::try_join!(self.load_source(source), self.load_frame(frame))?;
                Ok((photo, Some(frame)))
            }
            None => Ok((self.load_source(source).await?, None)),
        }
    }

    /// 以当前配置重新合成（不触发任何加载）。
    pub fn recompute(
        &self,
        source: &SourceImage,
        frame: Option<&FrameAsset>,
        text: &TextOverlaySpec,
    ) -> Result<CompositeResult, PhotoError> {
        let start = Instant::now();
        let composed = composite(source, frame, &self.config)?;
        let composite_elapsed = start.elapsed();

        let text_start = Instant::now();
        let result = apply_text(composed, text, self.rasterizer.as_deref())?;

        log::info!(
            "🎨 合成完成 - {}x{} framed={} composite={}ms text={}ms total={}ms",
            result.width(),
            result.height(),
            frame.is_some(),
            composite_elapsed.as_millis(),
            text_start.elapsed().as_millis(),
            start.elapsed().as_millis()
        );

        Ok(result)
    }

    /// 处理主入口：加载输入并合成。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use star_booth::photo::{PhotoConfig, PhotoHandler, PhotoSource, TextOverlaySpec};
    ///
    /// # async fn demo() -> Result<(), star_booth::photo::PhotoError> {
    /// let handler = PhotoHandler::new(PhotoConfig::default())?;
    /// let result = handler
    ///     .compose(&PhotoSource::detect("./me.jpg"), None, &TextOverlaySpec::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compose(
        &self,
        source: &PhotoSource,
        frame: Option<&PhotoSource>,
        text: &TextOverlaySpec,
    ) -> Result<CompositeResult, PhotoError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let (photo, frame_asset) = self.load_inputs(source, frame).await?;
        let load_elapsed = load_start.elapsed();

        let composite_start = Instant::now();
        let composed = composite(&photo, frame_asset.as_deref(), &self.config)?;
        let composite_elapsed = composite_start.elapsed();

        let text_start = Instant::now();
        let result = apply_text(composed, text, self.rasterizer.as_deref())?;
        let text_elapsed = text_start.elapsed();

        log::info!(
            "✅ 合成处理完成 - source={} load={}ms composite={}ms text={}ms total={}ms",
            source.kind(),
            load_elapsed.as_millis(),
            composite_elapsed.as_millis(),
            text_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(result)
    }

    /// 按预设导出合成结果。
    pub fn export(
        &self,
        composite: &CompositeResult,
        preset: &ExportPreset,
    ) -> Result<ExportedFile, PhotoError> {
        let start = Instant::now();
        let file = export_composite(composite, preset, &self.config)?;

        log::info!(
            "✅ 导出处理完成 - preset={} size={}KB export={}ms",
            preset.key,
            file.bytes.len() / 1024,
            start.elapsed().as_millis()
        );

        Ok(file)
    }

    /// 清空相框缓存。
    pub fn clear_frame_cache(&self) {
        if let Ok(mut cache) = self.frame_cache.lock() {
            cache.clear();
        }
    }
}

/// 纯合成：照片 → 相框 → 文字。
///
/// 相同输入得到相同画布；文字为空时结果与不带文字完全一致。
pub fn recompute(
    source: &SourceImage,
    frame: Option<&FrameAsset>,
    text: &TextOverlaySpec,
    rasterizer: Option<&dyn GlyphRasterizer>,
    config: &PhotoConfig,
) -> Result<CompositeResult, PhotoError> {
    let composed = composite(source, frame, config)?;
    apply_text(composed, text, rasterizer)
}

/// 在合成结果上叠加文字；文字为空时原样返回。
fn apply_text(
    composed: CompositeResult,
    text: &TextOverlaySpec,
    rasterizer: Option<&dyn GlyphRasterizer>,
) -> Result<CompositeResult, PhotoError> {
    if !text.is_enabled() {
        return Ok(composed);
    }

    let layout = *composed.layout();
    let mut image = composed.into_image();
    render_text_overlay(&mut image, text, rasterizer)?;
    Ok(CompositeResult::new(image, layout))
}
