//! # 合影合成模块（photo）
//!
//! ## 设计思路
//!
//! 该模块将“素材加载 → 画布合成 → 文字叠加 → 预设导出 → 上传”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：组合处理器、会话、历史与上传器，是调用方的唯一入口
//! - `handler`：编排整条处理流水线
//! - `loader`：负责 URL/Base64/文件加载与安全校验，相框缓存
//! - `pipeline`：负责解码、像素限制、缩放
//! - `compositor`：画布尺寸、cover 裁剪、相框叠加
//! - `text`：标题字号、位置、描边与投影
//! - `export`：尺寸预设、两层重绘、JPEG 编码
//! - `session`：合成代号，丢弃过期结果
//! - `upload` / `record`：ImageKit 上传与照片墙记录
//! - `config/error/source/raster`：配置、错误、中间数据模型、图层辅助
//!
//! ## 新同事快速上手
//!
//! ```text
//! main.rs（命令行参数）
//!    ↓
//! service.rs（依赖注入、会话代号、导出历史）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + URL/体积安全校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 缩放）
//!    ├─ compositor.rs（照片 + 相框）
//!    ├─ text.rs（标题）
//!    └─ export.rs（预设导出）
//!    ↓
//! 返回 PhotoError / AppError
//! ```
//!
//! ## 分层职责建议
//!
//! - 配置与策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 画面效果调整分别改 `compositor/text/export` 中的常量

mod compositor;
mod config;
mod error;
mod export;
mod handler;
mod loader;
mod pipeline;
mod raster;
mod record;
mod service;
mod session;
mod source;
mod text;
pub mod upload;

pub use compositor::{
    CompositeLayout, CompositeResult, CropRect, capped_canvas_size, composite, cover_crop,
    frame_canvas_size, plan_composite,
};
pub use config::{PerformanceProfile, PhotoConfig};
pub use error::{FailureStage, PhotoError};
pub use export::{
    EXPORT_PRESETS, ExportLayout, ExportPreset, ExportedFile, Placement, export_composite,
    export_filename, plan_export,
};
pub use handler::{PhotoHandler, recompute};
pub use record::{PhotoRecord, PhotoStatus};
pub use service::PhotoService;
pub use session::{CompositeSession, GenerationTicket};
pub use source::{FrameAsset, PhotoSource, SourceImage};
pub use text::{
    FontRasterizer, GlyphRasterizer, TextColor, TextLayout, TextOverlaySpec, TextPosition,
    font_size_for, layout_text, render_text_overlay,
};
pub use upload::{
    IMAGEKIT_UPLOAD_ENDPOINT, ImageKitConfig, ImageKitUploader, MediaUploader, UploadedMedia,
};
