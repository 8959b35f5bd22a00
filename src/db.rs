//! 数据库模块
//!
//! # 设计思路
//!
//! 使用 `rusqlite` 在本地 SQLite 中保存少量持久状态（目前只有导出历史）。
//! 数据以键值对形式存放，值为 JSON 字符串，和浏览器端的本地存储格式保持一致，
//! 方便两边互相导入导出。
//!
//! # 实现思路
//!
//! - `init_db` 负责建目录、打开连接、初始化 Schema。
//! - `read_value` / `write_value` / `delete_value` 是最小的键值操作。
//! - 具体业务（历史列表）放在子模块里，通过 `pub use` 导出。

use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AppError;

mod history;
mod schema;

pub use history::{ExportHistory, HISTORY_KEY, push_recent};

/// 打开（必要时创建）数据库文件并初始化 Schema。
pub fn init_db(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Database(format!("创建数据库目录失败: {}", e))
        })?;
    }
    log::info!("数据库路径: {}", db_path.display());

    let conn = Connection::open(db_path).map_err(|e| {
        AppError::Database(format!("打开数据库失败: {}", e))
    })?;

    schema::initialize_schema(&conn)?;

    Ok(conn)
}

/// 内存数据库，用于测试与一次性运行。
pub fn init_memory_db() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory().map_err(|e| {
        AppError::Database(format!("打开内存数据库失败: {}", e))
    })?;
    schema::initialize_schema(&conn)?;
    Ok(conn)
}

pub(crate) fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| AppError::Database(format!("读取键值失败: {}", e)))
}

pub(crate) fn write_value(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, chrono::Utc::now().timestamp_millis()],
    )
    .map_err(|e| AppError::Database(format!("写入键值失败: {}", e)))?;
    Ok(())
}

pub(crate) fn delete_value(conn: &Connection, key: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
        .map_err(|e| AppError::Database(format!("删除键值失败: {}", e)))?;
    Ok(())
}
