//! 同步模块
//!
//! 职责：
//! - 按实体类型执行增量同步（change list + 版本游标）
//! - 并发编排所有实体类型，汇总为单个 bool 交给外部调度器
//! - 发布同步状态（is_syncing）
//! - 新内容通知

pub mod entity_sync;
pub mod notifier;
pub mod orchestrator;

pub use entity_sync::{
    ChangeListVersions, EntitySyncEngine, EntitySyncReport, SyncCursorStore, SyncEntityType,
};
pub use notifier::{LoggingNotifier, Notifier};
pub use orchestrator::SyncOrchestrator;
