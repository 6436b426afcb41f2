//! 可同步实体类型 - 受控枚举
//!
//! 新增类型需要后端 change list 接口同步提供。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 实体类型（每种类型一个 change list 与一个版本游标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncEntityType {
    Topic,
    Author,
    NewsResource,
}

impl SyncEntityType {
    /// 默认同步的全部类型
    pub const ALL: [SyncEntityType; 3] = [Self::Topic, Self::Author, Self::NewsResource];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Author => "author",
            Self::NewsResource => "news_resource",
        }
    }

    /// 后端 REST 路径片段（/topics、/changelists/topics ...）
    pub fn api_path(self) -> &'static str {
        match self {
            Self::Topic => "topics",
            Self::Author => "authors",
            Self::NewsResource => "newsresources",
        }
    }

    /// 去掉重复类型，保留首次出现的顺序
    pub fn unique<I: IntoIterator<Item = SyncEntityType>>(types: I) -> Vec<SyncEntityType> {
        let mut unique = Vec::new();
        for entity_type in types {
            if !unique.contains(&entity_type) {
                unique.push(entity_type);
            }
        }
        unique
    }
}

impl FromStr for SyncEntityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topic" => Ok(Self::Topic),
            "author" => Ok(Self::Author),
            "news_resource" => Ok(Self::NewsResource),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SyncEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// 序列化为 as_str 形式（配置文件与日志一致）
impl Serialize for SyncEntityType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SyncEntityType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown entity type: {}", s)))
    }
}
