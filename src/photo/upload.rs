//! # 上传模块
//!
//! ## 设计思路
//!
//! 导出的 JPEG 可以上传到 ImageKit 媒体 CDN。上传前先向自有鉴权端点
//! 换取一次性签名（token / expire / signature），再以 multipart 表单提交。
//!
//! ## 实现思路
//!
//! - `MediaUploader` 抽象上传目标，服务层只依赖该 trait，测试可替换实现。
//! - 上传失败统一归为 `PhotoError::Upload`，保留服务端返回的错误信息。

use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{ExportedFile, PhotoError};

/// ImageKit 默认上传地址。
pub const IMAGEKIT_UPLOAD_ENDPOINT: &str = "https://upload.imagekit.io/api/v1/files/upload";

pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<UploadedMedia, PhotoError>> + Send + 'a>>;

/// 上传成功后的媒体信息。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    pub file_id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size: u64,
}

/// 媒体上传目标。
pub trait MediaUploader: Send + Sync {
    fn upload<'a>(&'a self, file: &'a ExportedFile, tags: &'a [String]) -> UploadFuture<'a>;
}

/// ImageKit 上传配置。
#[derive(Debug, Clone)]
pub struct ImageKitConfig {
    pub public_key: String,
    /// 返回签名参数的鉴权端点。
    pub auth_endpoint: String,
    pub upload_endpoint: String,
    pub folder: String,
    pub timeout_secs: u64,
}

impl ImageKitConfig {
    pub fn new(public_key: impl Into<String>, auth_endpoint: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            auth_endpoint: auth_endpoint.into(),
            upload_endpoint: IMAGEKIT_UPLOAD_ENDPOINT.to_string(),
            folder: "/photobooth".to_string(),
            timeout_secs: 60,
        }
    }
}

/// 鉴权端点返回的签名参数。
#[derive(Debug, Clone, Deserialize)]
struct AuthParams {
    token: String,
    expire: i64,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ImageKitUploader {
    config: ImageKitConfig,
    client: reqwest::Client,
}

impl ImageKitUploader {
    pub fn new(config: ImageKitConfig) -> Result<Self, PhotoError> {
        if config.public_key.trim().is_empty() {
            return Err(PhotoError::Upload("缺少 ImageKit public key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PhotoError::Upload(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self { config, client })
    }

    async fn authenticate(&self) -> Result<AuthParams, PhotoError> {
        let response = self
            .client
            .get(&self.config.auth_endpoint)
            .send()
            .await
            .map_err(|e| PhotoError::Upload(format!("鉴权请求失败：{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhotoError::Upload(format!("鉴权失败：HTTP {}", status.as_u16())));
        }

        response
            .json::<AuthParams>()
            .await
            .map_err(|e| PhotoError::Upload(format!("鉴权响应格式错误：{}", e)))
    }

    async fn upload_inner(&self, file: &ExportedFile, tags: &[String]) -> Result<UploadedMedia, PhotoError> {
        let auth = self.authenticate().await?;

        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(ExportedFile::MIME_TYPE)
            .map_err(|e| PhotoError::Upload(format!("构建上传表单失败：{}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("fileName", file.filename.clone())
            .text("publicKey", self.config.public_key.clone())
            .text("signature", auth.signature)
            .text("expire", auth.expire.to_string())
            .text("token", auth.token)
            .text("folder", self.config.folder.clone())
            .text("useUniqueFileName", "true");
        if !tags.is_empty() {
            form = form.text("tags", tags.join(","));
        }

        log::info!(
            "☁️ 开始上传 - 文件: {} 大小: {}KB",
            file.filename,
            file.bytes.len() / 1024
        );

        let response = self
            .client
            .post(&self.config.upload_endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PhotoError::Upload(format!("上传请求失败：{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(PhotoError::Upload(format!("HTTP {}：{}", status.as_u16(), message)));
        }

        let media = response
            .json::<UploadedMedia>()
            .await
            .map_err(|e| PhotoError::Upload(format!("上传响应格式错误：{}", e)))?;

        log::info!("✅ 上传完成 - fileId: {}", media.file_id);
        Ok(media)
    }
}

impl MediaUploader for ImageKitUploader {
    fn upload<'a>(&'a self, file: &'a ExportedFile, tags: &'a [String]) -> UploadFuture<'a> {
        Box::pin(self.upload_inner(file, tags))
    }
}
