use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::news::{Author, NewsResource, NewsResourceType, Topic};

/// 用户本地状态（仅由用户交互修改，同步流程只读；首次同步时批量标记已读除外）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub bookmarked_news_resources: BTreeSet<String>,
    #[serde(default)]
    pub viewed_news_resources: BTreeSet<String>,
    #[serde(default)]
    pub followed_topics: BTreeSet<String>,
    #[serde(default)]
    pub followed_authors: BTreeSet<String>,
    #[serde(default)]
    pub should_hide_onboarding: bool,
}

/// 带关注状态的话题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowableTopic {
    pub topic: Topic,
    pub is_followed: bool,
}

/// NewsResource 与 UserData 在读取时的联合投影
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNewsResource {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub header_image_url: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub news_type: NewsResourceType,
    pub followable_topics: Vec<FollowableTopic>,
    pub authors: Vec<Author>,
    pub is_saved: bool,
    pub has_been_viewed: bool,
}

impl UserNewsResource {
    pub fn new(news_resource: &NewsResource, user_data: &UserData) -> Self {
        Self {
            id: news_resource.id.clone(),
            title: news_resource.title.clone(),
            content: news_resource.content.clone(),
            url: news_resource.url.clone(),
            header_image_url: news_resource.header_image_url.clone(),
            publish_date: news_resource.publish_date,
            news_type: news_resource.news_type,
            followable_topics: news_resource
                .topics
                .iter()
                .map(|topic| FollowableTopic {
                    is_followed: user_data.followed_topics.contains(&topic.id),
                    topic: topic.clone(),
                })
                .collect(),
            authors: news_resource.authors.clone(),
            is_saved: user_data.bookmarked_news_resources.contains(&news_resource.id),
            has_been_viewed: user_data.viewed_news_resources.contains(&news_resource.id),
        }
    }

    /// 批量投影，保持原有顺序
    pub fn map_all(news_resources: &[NewsResource], user_data: &UserData) -> Vec<Self> {
        news_resources
            .iter()
            .map(|resource| Self::new(resource, user_data))
            .collect()
    }

    pub fn topic_ids(&self) -> impl Iterator<Item = &str> {
        self.followable_topics.iter().map(|t| t.topic.id.as_str())
    }

    /// 是否带有任意一个已关注的话题
    pub fn has_followed_topic(&self) -> bool {
        self.followable_topics.iter().any(|t| t.is_followed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: &str) -> Topic {
        Topic {
            id: id.to_string(),
            name: format!("Topic {}", id),
            short_description: String::new(),
            long_description: String::new(),
            url: String::new(),
            image_url: String::new(),
        }
    }

    #[test]
    fn user_news_resource_is_built_from_news_and_user_data() {
        let news = NewsResource {
            id: "N1".to_string(),
            title: "Test news title".to_string(),
            content: "Test news content".to_string(),
            url: "Test URL".to_string(),
            header_image_url: Some("Test image URL".to_string()),
            publish_date: Utc::now(),
            news_type: NewsResourceType::Article,
            topics: vec![topic("T1"), topic("T2")],
            authors: vec![],
        };
        let user_data = UserData {
            bookmarked_news_resources: ["N1".to_string()].into(),
            viewed_news_resources: ["N1".to_string()].into(),
            followed_topics: ["T1".to_string()].into(),
            should_hide_onboarding: true,
            ..Default::default()
        };

        let unr = UserNewsResource::new(&news, &user_data);

        assert_eq!(unr.id, news.id);
        assert_eq!(unr.title, news.title);
        assert_eq!(unr.publish_date, news.publish_date);
        assert_eq!(unr.followable_topics.len(), 2);
        assert!(unr.followable_topics[0].is_followed);
        assert!(!unr.followable_topics[1].is_followed);
        assert!(unr.is_saved);
        assert!(unr.has_been_viewed);
        assert!(unr.has_followed_topic());
        assert_eq!(unr.topic_ids().collect::<Vec<_>>(), vec!["T1", "T2"]);
    }
}
