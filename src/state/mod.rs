//! 运行时状态模块
//!
//! 管理应用状态、生命周期历史和构建锁

pub mod app_state;
pub mod build_locks;
pub mod history;

pub use app_state::AppState;
pub use build_locks::{BuildLease, BuildLocks};
pub use history::HistoryLog;
