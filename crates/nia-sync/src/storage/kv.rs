//! KV 存储模块 - 基于 sled 的持久化键值存储
//!
//! 本模块提供：
//! - 同步游标（VersionCursor）与用户偏好（UserData）的持久化
//! - 基于 compare_and_swap 的原子读改写

use std::path::Path;

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::{NiaSyncError, Result};

const PREFERENCES_TREE: &str = "nia_preferences";

/// KV 存储组件
#[derive(Debug, Clone)]
pub struct KvStore {
    /// 主数据库实例
    db: Db,
    /// 偏好数据所在的 Tree
    tree: Tree,
}

impl KvStore {
    /// 创建新的 KV 存储实例（路径为 {base_path}/kv）
    pub async fn new(base_path: &Path) -> Result<Self> {
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| NiaSyncError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 进程重启后旧实例可能刚释放文件锁，带退避重试
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut last_err: Option<sled::Error> = None;
        let mut db_opt: Option<Db> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            NiaSyncError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        let tree = db
            .open_tree(PREFERENCES_TREE)
            .map_err(|e| NiaSyncError::KvStore(format!("打开偏好 Tree 失败: {}", e)))?;

        tracing::debug!("KV 存储已打开: {}", kv_path.display());

        Ok(Self { db, tree })
    }

    /// 获取键值对
    pub async fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: for<'de> Deserialize<'de>,
    {
        let result = self
            .tree
            .get(key)
            .map_err(|e| NiaSyncError::KvStore(format!("获取键值对失败: {}", e)))?;
        match result {
            Some(value_bytes) => {
                let value = serde_json::from_slice(&value_bytes)
                    .map_err(|e| NiaSyncError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 原子读改写：读取当前值（不存在时为 None），由 `f` 生成新值并以 CAS 写回。
    ///
    /// 冲突时重读重算，返回最终写入的值。
    pub async fn update<K, V, F>(&self, key: K, mut f: F) -> Result<V>
    where
        K: AsRef<[u8]>,
        V: Serialize + for<'de> Deserialize<'de>,
        F: FnMut(Option<V>) -> V,
    {
        let key = key.as_ref();
        loop {
            let current_bytes = self
                .tree
                .get(key)
                .map_err(|e| NiaSyncError::KvStore(format!("读取当前值失败: {}", e)))?;
            let current: Option<V> = match &current_bytes {
                Some(bytes) => Some(
                    serde_json::from_slice(bytes)
                        .map_err(|e| NiaSyncError::Serialization(format!("反序列化值失败: {}", e)))?,
                ),
                None => None,
            };

            let new_value = f(current);
            let new_bytes = serde_json::to_vec(&new_value)
                .map_err(|e| NiaSyncError::Serialization(format!("序列化值失败: {}", e)))?;

            let result = self
                .tree
                .compare_and_swap(key, current_bytes, Some(new_bytes))
                .map_err(|e| NiaSyncError::KvStore(format!("原子更新失败: {}", e)))?;

            match result {
                Ok(()) => return Ok(new_value),
                Err(_) => {
                    tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
                    continue;
                }
            }
        }
    }

    /// 落盘
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| NiaSyncError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }
}

/// 常用的键前缀常量
pub mod keys {
    /// 同步游标前缀（sync_cursor:{entity_type}）
    pub const SYNC_CURSOR: &str = "sync_cursor";
    /// 用户偏好数据
    pub const USER_DATA: &str = "user_data";
}
