//! 作者 DAO - authors 表

use rusqlite::{params, params_from_iter, Connection, Row};

use super::topic::placeholders;
use crate::error::Result;
use crate::model::Author;

pub struct AuthorDao<'a> {
    conn: &'a Connection,
}

impl<'a> AuthorDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, authors: &[Author]) -> Result<usize> {
        let sql = r#"
            INSERT INTO authors (id, name, image_url, twitter, medium_page, bio)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                image_url = excluded.image_url,
                twitter = excluded.twitter,
                medium_page = excluded.medium_page,
                bio = excluded.bio
        "#;
        let mut stmt = self.conn.prepare_cached(sql)?;
        for a in authors {
            stmt.execute(params![a.id, a.name, a.image_url, a.twitter, a.medium_page, a.bio])?;
        }
        Ok(authors.len())
    }

    pub fn insert_or_ignore(&self, authors: &[Author]) -> Result<usize> {
        let sql = r#"
            INSERT OR IGNORE INTO authors (id, name, image_url, twitter, medium_page, bio)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut inserted = 0;
        for a in authors {
            inserted +=
                stmt.execute(params![a.id, a.name, a.image_url, a.twitter, a.medium_page, a.bio])?;
        }
        Ok(inserted)
    }

    pub fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM authors WHERE id IN ({})", placeholders(ids.len()));
        Ok(self.conn.execute(&sql, params_from_iter(ids.iter()))?)
    }
}

pub(crate) fn row_to_author(row: &Row, offset: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        image_url: row.get(offset + 2)?,
        twitter: row.get(offset + 3)?,
        medium_page: row.get(offset + 4)?,
        bio: row.get(offset + 5)?,
    })
}
