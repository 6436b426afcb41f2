//! 话题 DAO - topics 表

use rusqlite::{params, params_from_iter, Connection, Row};

use crate::error::Result;
use crate::model::Topic;

const TOPIC_COLUMNS: &str = "id, name, short_description, long_description, url, image_url";

pub struct TopicDao<'a> {
    conn: &'a Connection,
}

impl<'a> TopicDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 按 id 插入或整行更新。使用 DO UPDATE 而非 REPLACE，避免级联删除交叉引用。
    pub fn upsert(&self, topics: &[Topic]) -> Result<usize> {
        let sql = r#"
            INSERT INTO topics (id, name, short_description, long_description, url, image_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                short_description = excluded.short_description,
                long_description = excluded.long_description,
                url = excluded.url,
                image_url = excluded.image_url
        "#;
        let mut stmt = self.conn.prepare_cached(sql)?;
        for t in topics {
            stmt.execute(params![
                t.id,
                t.name,
                t.short_description,
                t.long_description,
                t.url,
                t.image_url,
            ])?;
        }
        Ok(topics.len())
    }

    /// 仅插入不存在的行（新闻引用了尚未同步的话题时写入占位行）
    pub fn insert_or_ignore(&self, topics: &[Topic]) -> Result<usize> {
        let sql = r#"
            INSERT OR IGNORE INTO topics (id, name, short_description, long_description, url, image_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut inserted = 0;
        for t in topics {
            inserted += stmt.execute(params![
                t.id,
                t.name,
                t.short_description,
                t.long_description,
                t.url,
                t.image_url,
            ])?;
        }
        Ok(inserted)
    }

    pub fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM topics WHERE id IN ({})", placeholders(ids.len()));
        Ok(self.conn.execute(&sql, params_from_iter(ids.iter()))?)
    }

    pub fn get_all(&self) -> Result<Vec<Topic>> {
        let sql = format!("SELECT {} FROM topics ORDER BY name", TOPIC_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row_to_topic(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// `?1, ?2, ...` 占位符
pub(crate) fn placeholders(n: usize) -> String {
    (0..n)
        .map(|i| format!("?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 从第 `offset` 列开始读取话题列（联表查询时前面可能有其他列）
pub(crate) fn row_to_topic(row: &Row, offset: usize) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        short_description: row.get(offset + 2)?,
        long_description: row.get(offset + 3)?,
        url: row.get(offset + 4)?,
        image_url: row.get(offset + 5)?,
    })
}
