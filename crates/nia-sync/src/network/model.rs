//! 网络层数据结构（字段名与后端 JSON 一致，camelCase）

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Author, NewsResourceType, Topic};
use crate::sync::SyncEntityType;

/// change list 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkChangeList {
    /// 实体 id
    pub id: String,
    /// 该变更所在的版本
    pub change_list_version: i64,
    /// 是否为删除标记
    #[serde(default)]
    pub is_delete: bool,
}

/// 一次 change list 拉取结果：(after, latest_version] 区间内的变更
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    pub items: Vec<NetworkChangeList>,
    pub latest_version: i64,
}

impl ChangeList {
    /// 由后端原始数组构造：最新版本取条目中的最大版本，空列表时保持 `after`
    pub fn from_items(items: Vec<NetworkChangeList>, after: i64) -> Self {
        let latest_version = items
            .iter()
            .map(|item| item.change_list_version)
            .max()
            .map_or(after, |max| max.max(after));
        Self { items, latest_version }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 拆分为 (deleted_ids, changed_ids)，各自去重并保持首次出现顺序。
    ///
    /// 同一 id 同时出现删除与变更时两边都保留：先删后写，写入生效。
    pub fn partition(&self) -> (Vec<String>, Vec<String>) {
        let mut deleted = Vec::new();
        let mut changed = Vec::new();
        let mut seen_deleted = HashSet::new();
        let mut seen_changed = HashSet::new();
        for item in &self.items {
            if item.is_delete {
                if seen_deleted.insert(item.id.as_str()) {
                    deleted.push(item.id.clone());
                }
            } else if seen_changed.insert(item.id.as_str()) {
                changed.push(item.id.clone());
            }
        }
        (deleted, changed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTopic {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

impl From<NetworkTopic> for Topic {
    fn from(t: NetworkTopic) -> Self {
        Topic {
            id: t.id,
            name: t.name,
            short_description: t.short_description,
            long_description: t.long_description,
            url: t.url,
            image_url: t.image_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAuthor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub medium_page: String,
    #[serde(default)]
    pub bio: String,
}

impl From<NetworkAuthor> for Author {
    fn from(a: NetworkAuthor) -> Self {
        Author {
            id: a.id,
            name: a.name,
            image_url: a.image_url,
            twitter: a.twitter,
            medium_page: a.medium_page,
            bio: a.bio,
        }
    }
}

/// 新闻资源（topics / authors 为 id 列表，落库时拆成交叉引用行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNewsResource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub header_image_url: Option<String>,
    pub publish_date: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub news_type: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl NetworkNewsResource {
    pub fn resource_type(&self) -> NewsResourceType {
        NewsResourceType::from_serialized(self.news_type.as_deref())
    }
}

/// 按实体类型区分的拉取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityBatch {
    Topics(Vec<NetworkTopic>),
    Authors(Vec<NetworkAuthor>),
    NewsResources(Vec<NetworkNewsResource>),
}

impl EntityBatch {
    pub fn empty(entity_type: SyncEntityType) -> Self {
        match entity_type {
            SyncEntityType::Topic => Self::Topics(Vec::new()),
            SyncEntityType::Author => Self::Authors(Vec::new()),
            SyncEntityType::NewsResource => Self::NewsResources(Vec::new()),
        }
    }

    pub fn entity_type(&self) -> SyncEntityType {
        match self {
            Self::Topics(_) => SyncEntityType::Topic,
            Self::Authors(_) => SyncEntityType::Author,
            Self::NewsResources(_) => SyncEntityType::NewsResource,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Topics(v) => v.len(),
            Self::Authors(v) => v.len(),
            Self::NewsResources(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::Topics(v) => v.iter().map(|t| t.id.clone()).collect(),
            Self::Authors(v) => v.iter().map(|a| a.id.clone()).collect(),
            Self::NewsResources(v) => v.iter().map(|n| n.id.clone()).collect(),
        }
    }
}
