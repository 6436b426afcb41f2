//! 同步游标存储 - VersionCursor
//!
//! 格式：sync_cursor:{entity_type}，值为最近一次完整应用的 change list 版本。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SyncEntityType;
use crate::error::Result;
use crate::storage::kv::{keys, KvStore};

/// 各实体类型游标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListVersions {
    pub topic_version: i64,
    pub author_version: i64,
    pub news_resource_version: i64,
}

impl ChangeListVersions {
    pub fn get(&self, entity_type: SyncEntityType) -> i64 {
        match entity_type {
            SyncEntityType::Topic => self.topic_version,
            SyncEntityType::Author => self.author_version,
            SyncEntityType::NewsResource => self.news_resource_version,
        }
    }
}

/// 存储每种 entity_type 的 last_version
///
/// 游标单调不减：写入比当前值小的版本会被忽略。
#[derive(Debug, Clone)]
pub struct SyncCursorStore {
    kv: Arc<KvStore>,
}

impl SyncCursorStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    fn key(entity_type: SyncEntityType) -> String {
        format!("{}:{}", keys::SYNC_CURSOR, entity_type.as_str())
    }

    /// 读取游标；从未同步过返回 0
    pub async fn get(&self, entity_type: SyncEntityType) -> Result<i64> {
        let key = Self::key(entity_type);
        Ok(self.kv.get::<&str, i64>(key.as_str()).await?.unwrap_or(0))
    }

    /// 写入游标，返回实际持久化的值
    pub async fn set(&self, entity_type: SyncEntityType, version: i64) -> Result<i64> {
        let key = Self::key(entity_type);
        let stored = self
            .kv
            .update(key.as_str(), |current: Option<i64>| match current {
                Some(cur) if cur > version => cur,
                _ => version,
            })
            .await?;
        if stored != version {
            warn!(
                "sync cursor {} 未回退: 服务端版本 {} 小于本地 {}",
                entity_type, version, stored
            );
        }
        Ok(stored)
    }

    pub async fn versions(&self) -> Result<ChangeListVersions> {
        Ok(ChangeListVersions {
            topic_version: self.get(SyncEntityType::Topic).await?,
            author_version: self.get(SyncEntityType::Author).await?,
            news_resource_version: self.get(SyncEntityType::NewsResource).await?,
        })
    }
}
