//! 实体状态同步 - 每种实体类型一个 change list 与一个版本游标
//!
//! 游标、类型枚举与单类型同步引擎；多类型编排见 [`crate::sync::SyncOrchestrator`]。

mod cursor_store;
mod engine;
mod entity_type;

pub use cursor_store::{ChangeListVersions, SyncCursorStore};
pub use engine::{EntitySyncEngine, EntitySyncReport};
pub use entity_type::SyncEntityType;
