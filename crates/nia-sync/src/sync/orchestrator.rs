//! 同步编排层
//!
//! **职责边界**（与 EntitySyncEngine 分离）：
//! - **EntitySyncEngine**：只做「给定 entity_type，读游标 → 拉取 → 写库 → 更新游标」。
//! - **本模块**：并发执行所有已注册类型，把每个类型的错误收敛为 `false`，汇总为一个 bool。
//!
//! **单飞**：调用方保证同一时刻只有一次 `sync()`（外部调度器的唯一任务语义）；本层不加锁。

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{info, warn};

use super::entity_sync::{ChangeListVersions, EntitySyncEngine, SyncEntityType};
use crate::error::Result;

pub struct SyncOrchestrator {
    engine: Arc<EntitySyncEngine>,
    entity_types: Vec<SyncEntityType>,
    syncing: watch::Sender<bool>,
}

impl SyncOrchestrator {
    /// 重复的类型只注册一次，同一类型不会有并发的两次同步
    pub fn new(engine: Arc<EntitySyncEngine>, entity_types: Vec<SyncEntityType>) -> Self {
        let registered = entity_types.len();
        let entity_types = SyncEntityType::unique(entity_types);
        if entity_types.len() != registered {
            warn!("忽略重复的实体类型: {:?}", entity_types);
        }
        let (syncing, _rx) = watch::channel(false);
        Self {
            engine,
            entity_types,
            syncing,
        }
    }

    pub fn entity_types(&self) -> &[SyncEntityType] {
        &self.entity_types
    }

    /// 同步所有实体类型；全部成功才返回 true。错误不会传出本方法。
    pub async fn sync(&self) -> bool {
        let _syncing = SyncingGuard::new(&self.syncing);
        info!("🔄 开始同步: {:?}", self.entity_types);

        let passes = self
            .entity_types
            .iter()
            .map(|&entity_type| self.sync_entity_type(entity_type));
        let results = join_all(passes).await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        let all_ok = succeeded == results.len();
        if all_ok {
            info!("✅ 同步完成");
        } else {
            warn!("⚠️  同步部分失败: {}/{} 成功", succeeded, results.len());
        }
        all_ok
    }

    async fn sync_entity_type(&self, entity_type: SyncEntityType) -> bool {
        match self.engine.run_entity_sync(entity_type).await {
            Ok(_) => true,
            Err(e) => {
                warn!("❌ entity_sync {} 失败: {}", entity_type, e);
                false
            }
        }
    }

    /// 同步状态订阅（true 表示 `sync()` 正在执行）
    pub fn subscribe_syncing(&self) -> watch::Receiver<bool> {
        self.syncing.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        *self.syncing.borrow()
    }

    /// 各实体类型当前游标
    pub async fn versions(&self) -> Result<ChangeListVersions> {
        self.engine.cursor_store().versions().await
    }
}

/// `sync()` 期间置 true；future 被取消时同样复位
struct SyncingGuard<'a> {
    syncing: &'a watch::Sender<bool>,
}

impl<'a> SyncingGuard<'a> {
    fn new(syncing: &'a watch::Sender<bool>) -> Self {
        syncing.send_replace(true);
        Self { syncing }
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.syncing.send_replace(false);
    }
}
