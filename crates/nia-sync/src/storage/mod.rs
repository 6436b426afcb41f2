//! 存储模块 - 本地缓存的持久化层
//!
//! 采用分层架构设计：
//! - [`LocalStore`]: 同步引擎依赖的写入/读取接口
//! - [`SqliteNewsStore`]: rusqlite 实现，所有 SQL 在 DB Actor 线程执行，查询可实时订阅
//! - DAO Layer: 数据访问层，每张表一个专门的操作模块
//! - [`KvStore`]: sled 键值存储，保存同步游标与用户偏好

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{NewsResource, NewsResourceQuery, Topic};
use crate::network::EntityBatch;
use crate::repository::{NewsLoad, NewsResourceSource};
use crate::sync::SyncEntityType;

pub mod dao;
pub mod db_actor;
pub mod kv;
pub mod migrate;
pub mod user_data;

pub use dao::{DaoFactory, TransactionManager};
pub use db_actor::DbActorHandle;
pub use kv::KvStore;
pub use user_data::UserDataStore;

/// SQLite 数据库文件名（位于 data_dir 下）
pub const DB_FILE_NAME: &str = "nia.db";

/// 本地缓存接口（同步引擎只通过它写入）
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// 按 id 插入或整行替换
    async fn upsert(&self, batch: EntityBatch) -> Result<()>;

    /// 按 id 删除；不存在的 id 忽略
    async fn delete(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<()>;

    /// 满足查询条件的新闻 id
    async fn news_resource_ids(&self, query: &NewsResourceQuery) -> Result<Vec<String>>;

    /// 满足查询条件的完整新闻
    async fn news_resources(&self, query: &NewsResourceQuery) -> Result<Vec<NewsResource>>;
}

/// rusqlite 实现的本地缓存
#[derive(Debug, Clone)]
pub struct SqliteNewsStore {
    db: DbActorHandle,
}

impl SqliteNewsStore {
    /// 打开 `{data_dir}/nia.db`，不存在则创建并迁移
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join(DB_FILE_NAME);
        let db = DbActorHandle::spawn()?;
        db.open(Some(db_path.clone())).await?;
        info!("✅ 本地数据库已就绪: {}", db_path.display());
        Ok(Self { db })
    }

    /// 内存数据库（测试与演示）
    pub async fn open_in_memory() -> Result<Self> {
        let db = DbActorHandle::spawn()?;
        db.open(None).await?;
        Ok(Self { db })
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.db.get_topics().await
    }

    pub fn shutdown(&self) {
        self.db.shutdown();
    }
}

#[async_trait]
impl LocalStore for SqliteNewsStore {
    async fn upsert(&self, batch: EntityBatch) -> Result<()> {
        self.db.upsert(batch).await?;
        Ok(())
    }

    async fn delete(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<()> {
        self.db.delete(entity_type, ids.to_vec()).await?;
        Ok(())
    }

    async fn news_resource_ids(&self, query: &NewsResourceQuery) -> Result<Vec<String>> {
        self.db.query_news_resource_ids(query.clone()).await
    }

    async fn news_resources(&self, query: &NewsResourceQuery) -> Result<Vec<NewsResource>> {
        self.db.query_news_resources(query.clone()).await
    }
}

impl NewsResourceSource for SqliteNewsStore {
    /// 实时查询：先发出当前结果，之后每次写入后重新查询并发出。
    /// 每次发出的都是真实读库结果，因此总是 `Loaded`。
    ///
    /// 查询失败记录日志后等待下一次写入，不结束流。
    fn observe_news_resources(&self, query: NewsResourceQuery) -> BoxStream<'static, NewsLoad> {
        let db = self.db.clone();
        let changes = self.db.subscribe_changes();
        stream::unfold((db, changes, query, true), |(db, mut changes, query, first)| async move {
            if first {
                changes.borrow_and_update();
            } else if changes.changed().await.is_err() {
                return None;
            }
            loop {
                match db.query_news_resources(query.clone()).await {
                    Ok(list) => return Some((NewsLoad::Loaded(list), (db, changes, query, false))),
                    Err(e) => {
                        warn!("实时查询新闻失败，等待下一次写入: {}", e);
                        if changes.changed().await.is_err() {
                            return None;
                        }
                    }
                }
            }
        })
        .boxed()
    }
}
