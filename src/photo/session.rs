//! 合成会话：用递增的代号保证“最后一次输入”胜出。
//!
//! 每次输入变化（照片、相框、文字）都先 `begin` 领取新代号，
//! 合成完成后 `commit`；若期间又有更新的代号发出，旧结果被丢弃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{CompositeResult, PhotoError};

/// 一次合成请求的代号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket(u64);

impl GenerationTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct CompositeSession {
    latest: AtomicU64,
    current: Mutex<Option<Arc<CompositeResult>>>,
}

impl CompositeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 领取新代号，之前发出的代号全部失效。
    pub fn begin(&self) -> GenerationTicket {
        GenerationTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: GenerationTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// 提交合成结果；代号已过期时返回 `Superseded`，当前结果保持不变。
    pub fn commit(
        &self,
        ticket: GenerationTicket,
        result: CompositeResult,
    ) -> Result<Arc<CompositeResult>, PhotoError> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| PhotoError::Composite("合成会话锁已中毒".to_string()))?;

        // 持锁后再比较，避免与更新的提交交错
        let latest = self.latest.load(Ordering::SeqCst);
        if latest != ticket.0 {
            log::debug!("⏭️ 丢弃过期合成结果 - 第 {} 代（最新第 {} 代）", ticket.0, latest);
            return Err(PhotoError::Superseded {
                generation: ticket.0,
                latest,
            });
        }

        let shared = Arc::new(result);
        *current = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// 本代合成失败：代号仍是最新时清空当前结果，旧画面不再可导出。
    pub fn fail(&self, ticket: GenerationTicket) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if self.latest.load(Ordering::SeqCst) == ticket.0 {
            log::debug!("🧹 第 {} 代合成失败，清空当前结果", ticket.0);
            *current = None;
        }
    }

    /// 最近一次成功提交的结果。
    pub fn current(&self) -> Option<Arc<CompositeResult>> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    /// 清空当前结果（例如重新拍照）。
    pub fn reset(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}
