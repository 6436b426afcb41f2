//! 新闻资源 DAO - news_resources 表及两张交叉引用表
//!
//! 写入顺序：话题/作者占位行 → 新闻行 → 交叉引用行，须在同一事务内调用。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use super::author::row_to_author;
use super::topic::{placeholders, row_to_topic};
use super::{AuthorDao, TopicDao};
use crate::error::Result;
use crate::model::{Author, NewsResource, NewsResourceQuery, NewsResourceType, Topic};
use crate::network::NetworkNewsResource;

pub struct NewsResourceDao<'a> {
    conn: &'a Connection,
}

/// news_resources 单行（未填充 topics / authors）
struct NewsResourceRow {
    id: String,
    title: String,
    content: String,
    url: String,
    header_image_url: Option<String>,
    publish_date: DateTime<Utc>,
    news_type: NewsResourceType,
}

impl<'a> NewsResourceDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 写入一批新闻：先补齐引用到的话题/作者占位行，再写新闻行，最后重建交叉引用
    pub fn upsert(&self, news_resources: &[NetworkNewsResource]) -> Result<usize> {
        let topic_shells: Vec<Topic> = news_resources
            .iter()
            .flat_map(|n| n.topics.iter().map(Topic::shell))
            .collect();
        let author_shells: Vec<Author> = news_resources
            .iter()
            .flat_map(|n| n.authors.iter().map(Author::shell))
            .collect();
        TopicDao::new(self.conn).insert_or_ignore(&topic_shells)?;
        AuthorDao::new(self.conn).insert_or_ignore(&author_shells)?;

        let upsert_sql = r#"
            INSERT INTO news_resources (id, title, content, url, header_image_url, publish_date, type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                url = excluded.url,
                header_image_url = excluded.header_image_url,
                publish_date = excluded.publish_date,
                type = excluded.type
        "#;
        let mut upsert = self.conn.prepare_cached(upsert_sql)?;
        let mut clear_topics =
            self.conn.prepare_cached("DELETE FROM news_resources_topics WHERE news_resource_id = ?1")?;
        let mut clear_authors =
            self.conn.prepare_cached("DELETE FROM news_resources_authors WHERE news_resource_id = ?1")?;
        let mut insert_topic = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO news_resources_topics (news_resource_id, topic_id) VALUES (?1, ?2)",
        )?;
        let mut insert_author = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO news_resources_authors (news_resource_id, author_id) VALUES (?1, ?2)",
        )?;

        for n in news_resources {
            upsert.execute(params![
                n.id,
                n.title,
                n.content,
                n.url,
                n.header_image_url,
                n.publish_date.timestamp_millis(),
                n.resource_type().serialized_name(),
            ])?;
            clear_topics.execute(params![n.id])?;
            clear_authors.execute(params![n.id])?;
            for topic_id in &n.topics {
                insert_topic.execute(params![n.id, topic_id])?;
            }
            for author_id in &n.authors {
                insert_author.execute(params![n.id, author_id])?;
            }
        }
        Ok(news_resources.len())
    }

    /// 删除新闻，交叉引用随外键级联删除
    pub fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM news_resources WHERE id IN ({})", placeholders(ids.len()));
        Ok(self.conn.execute(&sql, params_from_iter(ids.iter()))?)
    }

    /// 满足查询条件的新闻 id，按发布时间倒序
    pub fn query_ids(&self, query: &NewsResourceQuery) -> Result<Vec<String>> {
        let Some((where_clause, args)) = build_filter(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT n.id FROM news_resources n {} ORDER BY n.publish_date DESC, n.id",
            where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 满足查询条件的完整新闻（含 topics / authors），按发布时间倒序
    pub fn query(&self, query: &NewsResourceQuery) -> Result<Vec<NewsResource>> {
        let Some((where_clause, args)) = build_filter(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT n.id, n.title, n.content, n.url, n.header_image_url, n.publish_date, n.type
             FROM news_resources n {} ORDER BY n.publish_date DESC, n.id",
            where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| row_to_news_resource(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let mut topics = self.topics_for(&ids)?;
        let mut authors = self.authors_for(&ids)?;

        Ok(rows
            .into_iter()
            .map(|r| NewsResource {
                topics: topics.remove(&r.id).unwrap_or_default(),
                authors: authors.remove(&r.id).unwrap_or_default(),
                id: r.id,
                title: r.title,
                content: r.content,
                url: r.url,
                header_image_url: r.header_image_url,
                publish_date: r.publish_date,
                news_type: r.news_type,
            })
            .collect())
    }

    fn topics_for(&self, ids: &[&str]) -> Result<HashMap<String, Vec<Topic>>> {
        let sql = format!(
            "SELECT x.news_resource_id, t.id, t.name, t.short_description, t.long_description, t.url, t.image_url
             FROM news_resources_topics x JOIN topics t ON t.id = x.topic_id
             WHERE x.news_resource_id IN ({})
             ORDER BY x.news_resource_id, t.id",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(ids.iter()))?;
        let mut out: HashMap<String, Vec<Topic>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let news_id: String = row.get(0)?;
            let topic = row_to_topic(row, 1)?;
            out.entry(news_id).or_default().push(topic);
        }
        Ok(out)
    }

    fn authors_for(&self, ids: &[&str]) -> Result<HashMap<String, Vec<Author>>> {
        let sql = format!(
            "SELECT x.news_resource_id, a.id, a.name, a.image_url, a.twitter, a.medium_page, a.bio
             FROM news_resources_authors x JOIN authors a ON a.id = x.author_id
             WHERE x.news_resource_id IN ({})
             ORDER BY x.news_resource_id, a.id",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(ids.iter()))?;
        let mut out: HashMap<String, Vec<Author>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let news_id: String = row.get(0)?;
            let author = row_to_author(row, 1)?;
            out.entry(news_id).or_default().push(author);
        }
        Ok(out)
    }
}

/// 生成 WHERE 子句与参数；任一过滤集合为空时结果必为空，返回 None
fn build_filter(query: &NewsResourceQuery) -> Option<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(news_ids) = &query.filter_news_ids {
        if news_ids.is_empty() {
            return None;
        }
        let start = args.len();
        args.extend(news_ids.iter().cloned().map(Value::Text));
        clauses.push(format!("n.id IN ({})", numbered(start, news_ids.len())));
    }

    if let Some(topic_ids) = &query.filter_topic_ids {
        if topic_ids.is_empty() {
            return None;
        }
        let start = args.len();
        args.extend(topic_ids.iter().cloned().map(Value::Text));
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM news_resources_topics x WHERE x.news_resource_id = n.id AND x.topic_id IN ({}))",
            numbered(start, topic_ids.len())
        ));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    Some((where_clause, args))
}

/// 从 `start + 1` 开始编号的占位符
fn numbered(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_news_resource(row: &Row) -> rusqlite::Result<NewsResourceRow> {
    let type_name: String = row.get(6)?;
    Ok(NewsResourceRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        url: row.get(3)?,
        header_image_url: row.get(4)?,
        publish_date: DateTime::from_timestamp_millis(row.get(5)?).unwrap_or_default(),
        news_type: NewsResourceType::from_serialized(Some(&type_name)),
    })
}
