//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，承载合成链路之外的错误来源
//! （配置文件、输出目录、历史数据库），与 `PhotoError` 汇合后统一向上返回。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PhotoError` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 输出给调用方。

use serde::Serialize;

use crate::photo::{FailureStage, PhotoError};

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 合成链路错误（加载 / 合成 / 导出 / 上传）
    #[error("{0}")]
    Photo(#[from] PhotoError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输出目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 配置文件读写失败
    #[error("配置错误: {0}")]
    Settings(String),

    /// 数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),
}

impl AppError {
    /// 合成链路错误所属阶段；其它错误返回 `None`。
    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            Self::Photo(err) => Some(err.stage()),
            _ => None,
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
