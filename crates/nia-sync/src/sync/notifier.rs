//! 新内容通知
//!
//! 同步只负责挑出「新到达且带已关注话题」的新闻交给 [`Notifier`]；
//! 如何展示由宿主决定。通知失败不影响同步结果。

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::model::NewsResource;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_news_notifications(&self, news_resources: &[NewsResource]) -> Result<()>;
}

/// 默认实现：只写日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn post_news_notifications(&self, news_resources: &[NewsResource]) -> Result<()> {
        for resource in news_resources {
            info!("🔔 新内容: [{}] {}", resource.id, resource.title);
        }
        Ok(())
    }
}
