//! 生命周期历史
//!
//! 有界队列，按时间顺序保存（最旧在前），超出上限丢弃最旧的记录

use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::config::env::constants::MAX_HISTORY_ENTRIES;
use crate::domain::container::{HistoryEntry, LifecycleStatus};

pub struct HistoryLog {
    entries: RwLock<VecDeque<HistoryEntry>>,
    max_entries: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    /// 追加一条记录
    pub async fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);

        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// 便捷写法
    pub async fn push(&self, service: &str, status: LifecycleStatus, message: Option<String>) {
        let mut entry = HistoryEntry::new(service, status);
        entry.message = message;
        self.record(entry).await;
    }

    /// 全部记录（时间顺序）
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}
