//! 静态数据源 - 内置 JSON 资源，无需后端即可运行完整同步流程
//!
//! change list 由数据顺序生成：第 i 条记录的版本为 i + 1，全部为非删除标记。

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::model::{
    ChangeList, EntityBatch, NetworkAuthor, NetworkChangeList, NetworkNewsResource, NetworkTopic,
};
use super::NiaNetworkDataSource;
use crate::error::{NiaSyncError, Result};
use crate::sync::SyncEntityType;

const TOPICS_ASSET: &str = include_str!("../../assets/topics.json");
const AUTHORS_ASSET: &str = include_str!("../../assets/authors.json");
const NEWS_ASSET: &str = include_str!("../../assets/news.json");

/// 内置数据源
#[derive(Debug, Clone)]
pub struct DemoNiaNetwork {
    topics: Vec<NetworkTopic>,
    authors: Vec<NetworkAuthor>,
    news_resources: Vec<NetworkNewsResource>,
}

impl DemoNiaNetwork {
    /// 加载内置资源
    pub fn new() -> Result<Self> {
        Self::from_json(TOPICS_ASSET, AUTHORS_ASSET, NEWS_ASSET)
    }

    /// 从自定义 JSON 数组构造
    pub fn from_json(topics: &str, authors: &str, news_resources: &str) -> Result<Self> {
        Ok(Self {
            topics: parse_asset("topics", topics)?,
            authors: parse_asset("authors", authors)?,
            news_resources: parse_asset("news", news_resources)?,
        })
    }

    fn ids(&self, entity_type: SyncEntityType) -> Vec<&str> {
        match entity_type {
            SyncEntityType::Topic => self.topics.iter().map(|t| t.id.as_str()).collect(),
            SyncEntityType::Author => self.authors.iter().map(|a| a.id.as_str()).collect(),
            SyncEntityType::NewsResource => {
                self.news_resources.iter().map(|n| n.id.as_str()).collect()
            }
        }
    }
}

fn parse_asset<T: DeserializeOwned>(name: &str, raw: &str) -> Result<Vec<T>> {
    serde_json::from_str(raw)
        .map_err(|e| NiaSyncError::InvalidData(format!("解析内置 {} 数据失败: {}", name, e)))
}

fn select<T: Clone>(items: &[T], ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| ids.iter().any(|id| id == id_of(item)))
        .cloned()
        .collect()
}

#[async_trait]
impl NiaNetworkDataSource for DemoNiaNetwork {
    async fn fetch_change_list(&self, entity_type: SyncEntityType, after: i64) -> Result<ChangeList> {
        let items = self
            .ids(entity_type)
            .into_iter()
            .enumerate()
            .map(|(index, id)| NetworkChangeList {
                id: id.to_string(),
                change_list_version: index as i64 + 1,
                is_delete: false,
            })
            .filter(|item| item.change_list_version > after)
            .collect();
        Ok(ChangeList::from_items(items, after))
    }

    async fn fetch_entities(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<EntityBatch> {
        Ok(match entity_type {
            SyncEntityType::Topic => EntityBatch::Topics(select(&self.topics, ids, |t| t.id.as_str())),
            SyncEntityType::Author => EntityBatch::Authors(select(&self.authors, ids, |a| a.id.as_str())),
            SyncEntityType::NewsResource => {
                EntityBatch::NewsResources(select(&self.news_resources, ids, |n| n.id.as_str()))
            }
        })
    }
}
