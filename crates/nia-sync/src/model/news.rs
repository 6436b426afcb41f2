use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 话题
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    pub url: String,
    pub image_url: String,
}

impl Topic {
    /// 仅有 id 的占位行（news 先于 topic 同步到达时用于满足外键）
    pub fn shell(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            short_description: String::new(),
            long_description: String::new(),
            url: String::new(),
            image_url: String::new(),
        }
    }
}

/// 作者
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub twitter: String,
    pub medium_page: String,
    pub bio: String,
}

impl Author {
    pub fn shell(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            image_url: String::new(),
            twitter: String::new(),
            medium_page: String::new(),
            bio: String::new(),
        }
    }
}

/// 新闻类型（serialized name 与后端一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsResourceType {
    Video,
    ApiChange,
    Article,
    Codelab,
    Podcast,
    Docs,
    Event,
    Dac,
    Unknown,
}

impl NewsResourceType {
    pub const ALL: [NewsResourceType; 9] = [
        Self::Video,
        Self::ApiChange,
        Self::Article,
        Self::Codelab,
        Self::Podcast,
        Self::Docs,
        Self::Event,
        Self::Dac,
        Self::Unknown,
    ];

    pub fn serialized_name(self) -> &'static str {
        match self {
            Self::Video => "Video 📺",
            Self::ApiChange => "API change",
            Self::Article => "Article 📚",
            Self::Codelab => "Codelab",
            Self::Podcast => "Podcast 🎙",
            Self::Docs => "Docs 📑",
            Self::Event => "Event 📆",
            Self::Dac => "DAC",
            Self::Unknown => "Unknown",
        }
    }

    /// 未识别的字符串（包括 None）一律归为 Unknown
    pub fn from_serialized(value: Option<&str>) -> Self {
        value
            .and_then(|s| Self::ALL.into_iter().find(|t| t.serialized_name() == s))
            .unwrap_or(Self::Unknown)
    }
}

impl FromStr for NewsResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_serialized(Some(s)))
    }
}

impl fmt::Display for NewsResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.serialized_name())
    }
}

/// 完整填充的新闻资源（含关联的 topics / authors）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsResource {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub header_image_url: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub news_type: NewsResourceType,
    pub topics: Vec<Topic>,
    pub authors: Vec<Author>,
}

/// 新闻查询条件
///
/// 两个过滤条件为 AND 关系；`None` 表示不过滤该维度。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewsResourceQuery {
    pub filter_topic_ids: Option<BTreeSet<String>>,
    pub filter_news_ids: Option<BTreeSet<String>>,
}

impl NewsResourceQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_topic_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_topic_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_news_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_news_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.filter_topic_ids.is_none() && self.filter_news_ids.is_none()
    }

    /// 资源是否满足查询：至少命中一个 topic（若有 topic 过滤）且 id 在集合中（若有 id 过滤）
    pub fn matches(&self, id: &str, topic_ids: impl IntoIterator<Item = impl AsRef<str>>) -> bool {
        if let Some(news_ids) = &self.filter_news_ids {
            if !news_ids.contains(id) {
                return false;
            }
        }
        match &self.filter_topic_ids {
            None => true,
            Some(filter) => topic_ids.into_iter().any(|t| filter.contains(t.as_ref())),
        }
    }
}
