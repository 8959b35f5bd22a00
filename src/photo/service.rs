//! # 服务层（显式注入）
//!
//! ## 设计思路
//!
//! `PhotoService` 是调用方唯一需要持有的对象：内部组合
//! 处理器、合成会话、导出历史与可选的上传器。所有依赖都由构造方传入，
//! 不存在全局单例；`shutdown` 负责释放缓存并落盘。
//!
//! ## 实现思路
//!
//! - 合成走会话代号：较早发起但较晚完成的合成不会覆盖最新结果。
//! - 导出成功后写入历史；历史写入失败只记日志，不影响导出结果。

use std::sync::Arc;

use super::{
    CompositeResult, CompositeSession, ExportPreset, ExportedFile, FrameAsset, MediaUploader,
    PhotoError, PhotoHandler, PhotoRecord, PhotoSource, SourceImage, TextOverlaySpec,
    UploadedMedia,
};
use crate::db::ExportHistory;
use crate::error::AppError;

pub struct PhotoService {
    handler: Arc<PhotoHandler>,
    session: CompositeSession,
    history: ExportHistory,
    uploader: Option<Arc<dyn MediaUploader>>,
}

impl PhotoService {
    pub fn new(handler: PhotoHandler, history: ExportHistory) -> Self {
        Self {
            handler: Arc::new(handler),
            session: CompositeSession::new(),
            history,
            uploader: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn handler(&self) -> &PhotoHandler {
        &self.handler
    }

    /// 加载并合成，结果成为会话当前结果。
    ///
    /// 若合成期间有更新的请求发起，返回 `Superseded`。
    pub async fn compose(
        &self,
        source: &PhotoSource,
        frame: Option<&PhotoSource>,
        text: &TextOverlaySpec,
    ) -> Result<Arc<CompositeResult>, PhotoError> {
        let ticket = self.session.begin();
        match self.handler.compose(source, frame, text).await {
            Ok(result) => self.session.commit(ticket, result),
            Err(e) => {
                self.session.fail(ticket);
                Err(e)
            }
        }
    }

    /// 基于已加载的素材重新合成（文字修改时使用）。
    pub fn recompose(
        &self,
        source: &SourceImage,
        frame: Option<&FrameAsset>,
        text: &TextOverlaySpec,
    ) -> Result<Arc<CompositeResult>, PhotoError> {
        let ticket = self.session.begin();
        match self.handler.recompute(source, frame, text) {
            Ok(result) => self.session.commit(ticket, result),
            Err(e) => {
                self.session.fail(ticket);
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<Arc<CompositeResult>> {
        self.session.current()
    }

    /// 导出当前合成结果并记录历史。
    pub fn export_current(&self, preset: &ExportPreset) -> Result<ExportedFile, AppError> {
        let composite = self
            .session
            .current()
            .ok_or_else(|| PhotoError::Composite("尚未完成合成，无法导出".to_string()))?;
        self.export(&composite, preset)
    }

    pub fn export(
        &self,
        composite: &CompositeResult,
        preset: &ExportPreset,
    ) -> Result<ExportedFile, AppError> {
        let file = self.handler.export(composite, preset)?;

        if let Err(e) = self.history.record(file.data_uri()) {
            log::warn!("⚠️ 导出历史写入失败: {}", e);
        }

        Ok(file)
    }

    /// 上传导出文件，成功后生成照片墙记录（附带用户输入的标题）。
    pub async fn upload(
        &self,
        file: &ExportedFile,
        caption: &str,
        tags: &[String],
        user_id: &str,
        user_name: &str,
    ) -> Result<(UploadedMedia, PhotoRecord), PhotoError> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| PhotoError::Upload("未配置上传服务".to_string()))?;

        let media = uploader.upload(file, tags).await?;
        let record = PhotoRecord::from_upload(&media, user_id, user_name, (file.width, file.height))
            .with_caption(caption)
            .with_tags(tags.to_vec());
        Ok((media, record))
    }

    pub fn history(&self) -> Result<Vec<String>, AppError> {
        self.history.entries()
    }

    pub fn clear_history(&self) -> Result<(), AppError> {
        self.history.clear()
    }

    /// 释放缓存与会话结果。
    pub fn shutdown(self) {
        self.handler.clear_frame_cache();
        self.session.reset();
        log::info!("👋 合成服务已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use crate::photo::upload::UploadFuture;
    use crate::photo::PhotoConfig;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    struct RecordingUploader {
        calls: Mutex<Vec<String>>,
    }

    impl MediaUploader for RecordingUploader {
        fn upload<'a>(&'a self, file: &'a ExportedFile, _tags: &'a [String]) -> UploadFuture<'a> {
            Box::pin(async move {
                if let Ok(mut calls) = self.calls.lock() {
                    calls.push(file.filename.clone());
                }
                Ok(UploadedMedia {
                    file_id: "f-9".to_string(),
                    url: format!("https://ik.imagekit.io/demo/{}", file.filename),
                    thumbnail_url: None,
                    width: Some(file.width),
                    height: Some(file.height),
                    size: file.bytes.len() as u64,
                })
            })
        }
    }

    fn service() -> PhotoService {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler");
        PhotoService::new(handler, ExportHistory::new(init_memory_db().expect("db"), 20))
    }

    fn photo() -> SourceImage {
        SourceImage::new(RgbaImage::from_pixel(24, 32, Rgba([120, 60, 30, 255])))
    }

    #[test]
    fn export_without_composite_is_a_composite_error() {
        let service = service();
        let preset = ExportPreset::by_key("original").expect("preset");

        let err = service.export_current(&preset).expect_err("nothing to export");
        assert_eq!(err.stage(), Some(crate::photo::FailureStage::Composite));
    }

    #[test]
    fn export_records_history_newest_first() {
        let service = service();
        service
            .recompose(&photo(), None, &TextOverlaySpec::default())
            .expect("recompose");

        let original = ExportPreset::by_key("original").expect("preset");
        let post = ExportPreset::by_key("instagram-post").expect("preset");
        let first = service.export_current(&original).expect("export original");
        let second = service.export_current(&post).expect("export post");

        let history = service.history().expect("history");
        assert_eq!(history, vec![second.data_uri(), first.data_uri()]);

        service.clear_history().expect("clear");
        assert!(service.history().expect("history").is_empty());
    }

    #[tokio::test]
    async fn failed_compose_drops_previous_composite() {
        let service = service();
        service
            .recompose(&photo(), None, &TextOverlaySpec::default())
            .expect("recompose");
        assert!(service.current().is_some());

        let missing = PhotoSource::FilePath("/missing/new.jpg".to_string());
        let err = service
            .compose(&missing, None, &TextOverlaySpec::default())
            .await
            .expect_err("missing photo must fail");
        assert!(matches!(err, PhotoError::FileSystem(_)));

        let original = ExportPreset::by_key("original").expect("preset");
        let err = service
            .export_current(&original)
            .expect_err("old composite must not be exported");
        assert_eq!(err.stage(), Some(crate::photo::FailureStage::Composite));
        assert!(service.history().expect("history").is_empty());
    }

    #[test]
    fn failed_recompose_drops_previous_composite() {
        let service = service();
        service
            .recompose(&photo(), None, &TextOverlaySpec::default())
            .expect("recompose");

        // 无字体时带标题的合成失败
        let caption = TextOverlaySpec::new("star", crate::photo::TextPosition::Top, crate::photo::TextColor::Red);
        assert!(service.recompose(&photo(), None, &caption).is_err());
        assert!(service.current().is_none());
    }

    #[tokio::test]
    async fn upload_requires_configured_uploader() {
        let service = service();
        let file = ExportedFile {
            bytes: vec![1],
            filename: "ulp-star-1.jpg".to_string(),
            width: 1,
            height: 1,
            quality: 92,
        };

        let result = service.upload(&file, "", &[], "u", "n").await;
        assert!(matches!(result, Err(PhotoError::Upload(_))));
    }

    #[tokio::test]
    async fn upload_builds_record_from_media() {
        let uploader = Arc::new(RecordingUploader {
            calls: Mutex::new(Vec::new()),
        });
        let service = service().with_uploader(uploader.clone());
        service
            .recompose(&photo(), None, &TextOverlaySpec::default())
            .expect("recompose");
        let file = service
            .export_current(&ExportPreset::by_key("twitter").expect("preset"))
            .expect("export");

        let tags = vec!["ulp".to_string()];
        let (media, record) = service.upload(&file, "go stars", &tags, "u1", "Fan").await.expect("upload");

        assert_eq!(media.file_id, "f-9");
        assert_eq!((record.width, record.height), (1200, 675));
        assert_eq!(record.tags, tags);
        assert_eq!(record.caption.as_deref(), Some("go stars"));
        assert_eq!(record.size, file.bytes.len() as u64);
        assert_eq!(uploader.calls.lock().expect("calls").len(), 1);

        service.shutdown();
    }
}
