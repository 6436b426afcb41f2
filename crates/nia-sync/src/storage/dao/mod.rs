//! 数据访问层 (DAO) - 每张表一个专门的操作模块
//!
//! DAO 只在 DB Actor 线程内使用，跨表写入统一通过 [`TransactionManager`] 包在一个事务里。

pub mod author;
pub mod news_resource;
pub mod topic;

pub use author::AuthorDao;
pub use news_resource::NewsResourceDao;
pub use topic::TopicDao;

use rusqlite::Connection;

use crate::error::{NiaSyncError, Result};

/// DAO 工厂 - 统一创建各种 DAO 实例
pub struct DaoFactory;

impl DaoFactory {
    pub fn topic_dao(conn: &Connection) -> TopicDao<'_> {
        TopicDao::new(conn)
    }

    pub fn author_dao(conn: &Connection) -> AuthorDao<'_> {
        AuthorDao::new(conn)
    }

    pub fn news_resource_dao(conn: &Connection) -> NewsResourceDao<'_> {
        NewsResourceDao::new(conn)
    }
}

/// 事务管理器 - 统一管理跨表操作的事务
pub struct TransactionManager<'a> {
    conn: &'a Connection,
}

impl<'a> TransactionManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 执行事务操作；闭包返回错误时事务随 drop 回滚
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| NiaSyncError::Database(format!("开始事务失败: {}", e)))?;

        let result = f(self.conn)?;

        tx.commit()
            .map_err(|e| NiaSyncError::Database(format!("提交事务失败: {}", e)))?;

        Ok(result)
    }
}
