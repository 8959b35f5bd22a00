//! # 合影打卡工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                命令行 (clap) / 嵌入方                     │
//! │        compose ── history ── presets                     │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ photo ────── 加载·合成·文字·导出·上传                 │
//! │  │   ├─ PhotoService    依赖注入入口 + 会话代号           │
//! │  │   └─ PhotoHandler    流水线编排 + 阶段耗时             │
//! │  │                                                       │
//! │  ├─ db ───────── SQLite (rusqlite) 键值 + 导出历史         │
//! │  ├─ settings           JSON 设置覆盖                      │
//! │  └─ storage            导出目录 (返回 Result)             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`photo`] | 照片/相框加载、画布合成、标题叠加、预设导出、ImageKit 上传 |
//! | [`db`] | SQLite 键值存储与最近导出历史 |
//! | [`settings`] | 应用数据目录与用户设置 |
//! | [`storage`] | 导出目录的获取、自动创建与落盘 |

pub mod error;
pub mod db;
pub mod photo;
pub mod settings;
pub mod storage;
