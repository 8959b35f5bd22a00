//! 导出历史子模块
//!
//! ## 职责
//! - 以 JSON 字符串数组保存最近导出的 Data URI
//! - 最新在前；重复导出同一张图时移到最前而不是新增
//! - 超过上限的旧条目直接丢弃
//!
//! ## 错误语义
//! - 存储读写失败映射为 `AppError::Database`
//! - 存量数据损坏时视为空列表，不阻塞导出

use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::AppError;

use super::{delete_value, read_value, write_value};

/// 历史记录在键值表中的键名。
pub const HISTORY_KEY: &str = "ulp-star-export-history";

/// 把 `entry` 放到列表最前，去重并截断到 `limit` 条。
pub fn push_recent(entries: &mut Vec<String>, entry: String, limit: usize) {
    entries.retain(|existing| existing != &entry);
    entries.insert(0, entry);
    entries.truncate(limit);
}

fn load_entries(conn: &Connection) -> Result<Vec<String>, AppError> {
    let Some(raw) = read_value(conn, HISTORY_KEY)? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            log::warn!("⚠️ 导出历史数据损坏，已忽略: {}", e);
            Ok(Vec::new())
        }
    }
}

fn save_entries(conn: &Connection, entries: &[String]) -> Result<(), AppError> {
    let content = serde_json::to_string(entries)
        .map_err(|e| AppError::Database(format!("序列化导出历史失败: {}", e)))?;
    write_value(conn, HISTORY_KEY, &content)
}

/// 导出历史（有界、最新在前）。
pub struct ExportHistory {
    conn: Mutex<Connection>,
    limit: usize,
}

impl ExportHistory {
    pub fn new(conn: Connection, limit: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            limit: limit.max(1),
        }
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> Result<T, AppError>) -> Result<T, AppError> {
        let conn = self.conn.lock().map_err(|e| {
            AppError::Database(format!("获取数据库锁失败: {}", e))
        })?;
        op(&conn)
    }

    /// 记录一次导出。
    pub fn record(&self, data_uri: String) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let mut entries = load_entries(conn)?;
            push_recent(&mut entries, data_uri, self.limit);
            save_entries(conn, &entries)?;
            log::debug!("🗂️ 导出历史已更新 - 共 {} 条", entries.len());
            Ok(())
        })
    }

    /// 全部条目，最新在前。
    pub fn entries(&self) -> Result<Vec<String>, AppError> {
        self.with_conn(|conn| {
            let mut entries = load_entries(conn)?;
            entries.truncate(self.limit);
            Ok(entries)
        })
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.with_conn(|conn| delete_value(conn, HISTORY_KEY))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use proptest::prelude::*;

    fn history(limit: usize) -> ExportHistory {
        ExportHistory::new(init_memory_db().expect("memory db"), limit)
    }

    #[test]
    fn record_moves_duplicates_to_front() {
        let history = history(20);
        history.record("a".into()).expect("a");
        history.record("b".into()).expect("b");
        history.record("a".into()).expect("a again");

        assert_eq!(history.entries().expect("entries"), vec!["a", "b"]);
    }

    #[test]
    fn corrupt_payload_is_treated_as_empty() {
        let history = history(20);
        history
            .with_conn(|conn| write_value(conn, HISTORY_KEY, "{not json"))
            .expect("seed corrupt value");

        assert!(history.entries().expect("entries").is_empty());
        history.record("x".into()).expect("record after corruption");
        assert_eq!(history.entries().expect("entries"), vec!["x"]);
    }

    #[test]
    fn stored_format_is_json_string_array() {
        let history = history(20);
        history.record("data:image/jpeg;base64,AAA".into()).expect("record");

        let raw = history
            .with_conn(|conn| read_value(conn, HISTORY_KEY))
            .expect("read")
            .expect("value present");
        assert_eq!(raw, r#"["data:image/jpeg;base64,AAA"]"#);
    }

    #[test]
    fn clear_removes_everything() {
        let history = history(20);
        history.record("a".into()).expect("a");
        history.clear().expect("clear");
        assert!(history.entries().expect("entries").is_empty());
    }

    proptest! {
        #[test]
        fn push_recent_is_bounded_unique_and_newest_first(
            items in proptest::collection::vec(0u8..12, 0..60),
            limit in 1usize..25,
        ) {
            let mut entries = Vec::new();
            for item in &items {
                push_recent(&mut entries, item.to_string(), limit);
            }

            prop_assert!(entries.len() <= limit);
            let mut seen = std::collections::HashSet::new();
            prop_assert!(entries.iter().all(|e| seen.insert(e.clone())));
            if let Some(last) = items.last() {
                prop_assert_eq!(&entries[0], &last.to_string());
            }
        }
    }
}
