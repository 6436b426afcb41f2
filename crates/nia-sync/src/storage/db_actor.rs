//! 数据库 Actor - 单线程数据库访问模型
//!
//! 核心设计：
//! - SQLite Connection 永远只在一个专用线程中
//! - 所有数据库操作通过 channel 发送命令，结果经 oneshot 返回
//! - 每次成功写入后递增失效计数（watch），实时查询据此重新执行

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rusqlite::Connection;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::error::{NiaSyncError, Result};
use crate::model::{Author, NewsResource, NewsResourceQuery, Topic};
use crate::network::EntityBatch;
use crate::storage::dao::{DaoFactory, TransactionManager};
use crate::storage::migrate::init_db;
use crate::sync::SyncEntityType;

/// 数据库命令
pub enum DbCommand {
    /// 打开数据库（None 为内存库）并执行迁移
    Open {
        db_path: Option<PathBuf>,
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// 按 id 插入或更新一批实体（单事务）
    Upsert {
        batch: EntityBatch,
        respond_to: oneshot::Sender<Result<usize>>,
    },

    /// 按 id 删除（单事务）
    Delete {
        entity_type: SyncEntityType,
        ids: Vec<String>,
        respond_to: oneshot::Sender<Result<usize>>,
    },

    /// 查询完整新闻
    QueryNewsResources {
        query: NewsResourceQuery,
        respond_to: oneshot::Sender<Result<Vec<NewsResource>>>,
    },

    /// 查询新闻 id
    QueryNewsResourceIds {
        query: NewsResourceQuery,
        respond_to: oneshot::Sender<Result<Vec<String>>>,
    },

    /// 全部话题
    GetTopics {
        respond_to: oneshot::Sender<Result<Vec<Topic>>>,
    },

    /// 停止 Actor
    Shutdown,
}

/// 数据库 Actor（运行在独立线程）
struct DbActor {
    conn: Option<Connection>,
    receiver: Receiver<DbCommand>,
    /// 写入计数，订阅方据此重新查询
    changes: watch::Sender<u64>,
    thread_id: thread::ThreadId,
}

impl DbActor {
    fn new(receiver: Receiver<DbCommand>, changes: watch::Sender<u64>) -> Self {
        let thread_id = thread::current().id();
        info!("🚀 [Thread {:?}] DbActor 已启动", thread_id);
        Self {
            conn: None,
            receiver,
            changes,
            thread_id,
        }
    }

    fn run(mut self) {
        while let Ok(command) = self.receiver.recv() {
            match command {
                DbCommand::Shutdown => {
                    info!("🛑 [Thread {:?}] DbActor 收到停止信号", self.thread_id);
                    break;
                }

                DbCommand::Open { db_path, respond_to } => {
                    let result = self.handle_open(db_path);
                    let _ = respond_to.send(result);
                }

                DbCommand::Upsert { batch, respond_to } => {
                    let result = self.handle_upsert(&batch);
                    self.notify_if_written(&result);
                    let _ = respond_to.send(result);
                }

                DbCommand::Delete {
                    entity_type,
                    ids,
                    respond_to,
                } => {
                    let result = self.handle_delete(entity_type, &ids);
                    self.notify_if_written(&result);
                    let _ = respond_to.send(result);
                }

                DbCommand::QueryNewsResources { query, respond_to } => {
                    let result = self
                        .conn()
                        .and_then(|conn| DaoFactory::news_resource_dao(conn).query(&query));
                    let _ = respond_to.send(result);
                }

                DbCommand::QueryNewsResourceIds { query, respond_to } => {
                    let result = self
                        .conn()
                        .and_then(|conn| DaoFactory::news_resource_dao(conn).query_ids(&query));
                    let _ = respond_to.send(result);
                }

                DbCommand::GetTopics { respond_to } => {
                    let result = self
                        .conn()
                        .and_then(|conn| DaoFactory::topic_dao(conn).get_all());
                    let _ = respond_to.send(result);
                }
            }
        }

        info!("✅ [Thread {:?}] DbActor 已停止", self.thread_id);
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| NiaSyncError::NotInitialized("数据库尚未打开".to_string()))
    }

    fn handle_open(&mut self, db_path: Option<PathBuf>) -> Result<()> {
        if self.conn.is_some() {
            warn!("⚠️  [DbActor Thread {:?}] 数据库已打开，跳过", self.thread_id);
            return Ok(());
        }
        let mut conn = match &db_path {
            Some(path) => {
                info!("🔨 [DbActor Thread {:?}] 打开数据库: {}", self.thread_id, path.display());
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        init_db(&mut conn)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn handle_upsert(&self, batch: &EntityBatch) -> Result<usize> {
        let conn = self.conn()?;
        if batch.is_empty() {
            return Ok(0);
        }
        debug!(
            "[DbActor] Upsert {} x{}",
            batch.entity_type(),
            batch.len()
        );
        TransactionManager::new(conn).execute(|c| match batch {
            EntityBatch::Topics(topics) => {
                let topics: Vec<Topic> = topics.iter().cloned().map(Into::into).collect();
                DaoFactory::topic_dao(c).upsert(&topics)
            }
            EntityBatch::Authors(authors) => {
                let authors: Vec<Author> = authors.iter().cloned().map(Into::into).collect();
                DaoFactory::author_dao(c).upsert(&authors)
            }
            EntityBatch::NewsResources(news) => DaoFactory::news_resource_dao(c).upsert(news),
        })
    }

    fn handle_delete(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<usize> {
        let conn = self.conn()?;
        if ids.is_empty() {
            return Ok(0);
        }
        debug!("[DbActor] Delete {} x{}", entity_type, ids.len());
        TransactionManager::new(conn).execute(|c| match entity_type {
            SyncEntityType::Topic => DaoFactory::topic_dao(c).delete_by_ids(ids),
            SyncEntityType::Author => DaoFactory::author_dao(c).delete_by_ids(ids),
            SyncEntityType::NewsResource => DaoFactory::news_resource_dao(c).delete_by_ids(ids),
        })
    }

    fn notify_if_written(&self, result: &Result<usize>) {
        match result {
            Ok(n) if *n > 0 => {
                self.changes.send_modify(|version| *version += 1);
            }
            Ok(_) => {}
            Err(e) => error!("❌ [DbActor Thread {:?}] 写入失败: {}", self.thread_id, e),
        }
    }
}

/// 数据库 Actor 句柄（用于异步调用）
#[derive(Clone)]
pub struct DbActorHandle {
    sender: Sender<DbCommand>,
    changes: watch::Receiver<u64>,
}

impl std::fmt::Debug for DbActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbActorHandle")
            .field("sender", &"<channel>")
            .field("changes", &*self.changes.borrow())
            .finish()
    }
}

impl DbActorHandle {
    /// 启动 DB Actor 线程
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = unbounded();
        let (changes_tx, changes_rx) = watch::channel(0u64);

        thread::Builder::new()
            .name("nia-db-actor".to_string())
            .spawn(move || {
                let actor = DbActor::new(receiver, changes_tx);
                actor.run();
            })
            .map_err(|e| NiaSyncError::Database(format!("无法启动 DB Actor 线程: {}", e)))?;

        Ok(Self {
            sender,
            changes: changes_rx,
        })
    }

    /// 写入计数订阅
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> DbCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .map_err(|_| NiaSyncError::Database("DB Actor 已停止".to_string()))?;
        rx.await
            .map_err(|_| NiaSyncError::Database("DB Actor 响应失败".to_string()))?
    }

    pub async fn open(&self, db_path: Option<PathBuf>) -> Result<()> {
        self.request(|respond_to| DbCommand::Open { db_path, respond_to })
            .await
    }

    pub async fn upsert(&self, batch: EntityBatch) -> Result<usize> {
        self.request(|respond_to| DbCommand::Upsert { batch, respond_to })
            .await
    }

    pub async fn delete(&self, entity_type: SyncEntityType, ids: Vec<String>) -> Result<usize> {
        self.request(|respond_to| DbCommand::Delete {
            entity_type,
            ids,
            respond_to,
        })
        .await
    }

    pub async fn query_news_resources(&self, query: NewsResourceQuery) -> Result<Vec<NewsResource>> {
        self.request(|respond_to| DbCommand::QueryNewsResources { query, respond_to })
            .await
    }

    pub async fn query_news_resource_ids(&self, query: NewsResourceQuery) -> Result<Vec<String>> {
        self.request(|respond_to| DbCommand::QueryNewsResourceIds { query, respond_to })
            .await
    }

    pub async fn get_topics(&self) -> Result<Vec<Topic>> {
        self.request(|respond_to| DbCommand::GetTopics { respond_to })
            .await
    }

    /// 停止 DB Actor
    pub fn shutdown(&self) {
        let _ = self.sender.send(DbCommand::Shutdown);
    }
}
