//! 照片墙记录模型。
//!
//! 上传成功后生成一条记录，供照片墙与审核后台使用；序列化字段为 camelCase。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UploadedMedia;

/// 审核状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    #[default]
    Active,
    Pending,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub file_id: String,
    pub url: String,
    pub thumbnail_url: String,
    pub aspect_ratio: f64,
    pub width: u32,
    pub height: u32,
    /// 文件字节数。
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub user_id: String,
    pub user_name: String,
    pub likes: u32,
    #[serde(default)]
    pub liked_by: Vec<String>,
    pub views: u32,
    pub shares: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub featured: bool,
    pub status: PhotoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl PhotoRecord {
    /// 由上传结果生成新记录。
    ///
    /// CDN 未返回尺寸时使用导出时的尺寸；缩略图缺失时回退为原图地址。
    pub fn from_upload(
        media: &UploadedMedia,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        fallback_size: (u32, u32),
    ) -> Self {
        let width = media.width.unwrap_or(fallback_size.0);
        let height = media.height.unwrap_or(fallback_size.1);
        let now = Utc::now();

        Self {
            file_id: media.file_id.clone(),
            url: media.url.clone(),
            thumbnail_url: media.thumbnail_url.clone().unwrap_or_else(|| media.url.clone()),
            aspect_ratio: width as f64 / height.max(1) as f64,
            width,
            height,
            size: media.size,
            tags: Vec::new(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            likes: 0,
            liked_by: Vec::new(),
            views: 0,
            shares: 0,
            created_at: now,
            updated_at: now,
            featured: false,
            status: PhotoStatus::Active,
            caption: None,
            location: None,
            event: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        let trimmed = caption.trim();
        self.caption = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
