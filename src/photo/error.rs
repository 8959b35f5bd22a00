//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载合成链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 变体较细，但对外按阶段归为四类（见 [`FailureStage`]）：
//! 加载 / 合成 / 导出 / 上传。界面只需要按阶段决定提示文案。

/// 失败所属阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// 源图或相框加载失败（损坏、网络、跨域拒绝、体积限制）。
    Load,
    /// 画布合成失败（尺寸异常、缓冲分配失败、结果已过期）。
    Composite,
    /// 导出缩放/重绘失败，可改用原始尺寸重试。
    Export,
    /// 上传到媒体 CDN 失败。
    Upload,
}

/// 合成链路统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("合成失败：{0}")]
    Composite(String),

    #[error("合成结果已过期：第 {generation} 代已被第 {latest} 代取代")]
    Superseded { generation: u64, latest: u64 },

    #[error("导出优化失败，请尝试原始尺寸：{0}")]
    Export(String),

    #[error("上传失败：{0}")]
    Upload(String),
}

impl PhotoError {
    /// 按阶段归类，供界面选择提示文案。
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::Network(_)
            | Self::Timeout(_)
            | Self::InvalidFormat(_)
            | Self::Decode(_)
            | Self::FileSystem(_)
            | Self::ResourceLimit(_) => FailureStage::Load,
            Self::Composite(_) | Self::Superseded { .. } => FailureStage::Composite,
            Self::Export(_) => FailureStage::Export,
            Self::Upload(_) => FailureStage::Upload,
        }
    }
}

impl From<PhotoError> for String {
    fn from(error: PhotoError) -> Self {
        error.to_string()
    }
}
