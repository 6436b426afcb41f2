//! 用户偏好存储 - UserData 持久化在 KV 的 `user_data` 键下
//!
//! 每次修改先以 CAS 写回 KV，再通过 watch 通道发布新值；读方只看到已落盘的状态。

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::error::Result;
use crate::model::UserData;
use crate::repository::UserDataSource;
use crate::storage::kv::{keys, KvStore};
use crate::utils::watch_stream;

pub struct UserDataStore {
    kv: Arc<KvStore>,
    tx: watch::Sender<UserData>,
    /// 串行化「写 KV + 发布」，保证发布顺序与落盘顺序一致
    write_lock: Mutex<()>,
}

impl UserDataStore {
    /// 从 KV 加载当前值（不存在时为默认值）
    pub async fn new(kv: Arc<KvStore>) -> Result<Self> {
        let initial: UserData = kv.get(keys::USER_DATA).await?.unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            kv,
            tx,
            write_lock: Mutex::new(()),
        })
    }

    /// 当前值快照
    pub fn user_data(&self) -> UserData {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UserData> {
        self.tx.subscribe()
    }

    async fn update<F>(&self, mut f: F) -> Result<UserData>
    where
        F: FnMut(&mut UserData),
    {
        let _guard = self.write_lock.lock().await;
        let updated = self
            .kv
            .update(keys::USER_DATA, |current: Option<UserData>| {
                let mut data = current.unwrap_or_default();
                f(&mut data);
                data
            })
            .await?;
        self.tx.send_if_modified(|published| {
            if *published == updated {
                false
            } else {
                *published = updated.clone();
                true
            }
        });
        Ok(updated)
    }

    pub async fn set_followed_topic_ids(&self, topic_ids: BTreeSet<String>) -> Result<()> {
        self.update(|data| {
            data.followed_topics = topic_ids.clone();
            reset_onboarding_if_nothing_followed(data);
        })
        .await?;
        Ok(())
    }

    pub async fn toggle_followed_topic_id(&self, topic_id: &str, followed: bool) -> Result<()> {
        self.update(|data| {
            toggle(&mut data.followed_topics, topic_id, followed);
            reset_onboarding_if_nothing_followed(data);
        })
        .await?;
        Ok(())
    }

    pub async fn set_followed_author_ids(&self, author_ids: BTreeSet<String>) -> Result<()> {
        self.update(|data| {
            data.followed_authors = author_ids.clone();
            reset_onboarding_if_nothing_followed(data);
        })
        .await?;
        Ok(())
    }

    pub async fn toggle_followed_author_id(&self, author_id: &str, followed: bool) -> Result<()> {
        self.update(|data| {
            toggle(&mut data.followed_authors, author_id, followed);
            reset_onboarding_if_nothing_followed(data);
        })
        .await?;
        Ok(())
    }

    pub async fn toggle_news_resource_bookmark(&self, news_resource_id: &str, bookmarked: bool) -> Result<()> {
        self.update(|data| toggle(&mut data.bookmarked_news_resources, news_resource_id, bookmarked))
            .await?;
        Ok(())
    }

    pub async fn set_news_resource_viewed(&self, news_resource_id: &str, viewed: bool) -> Result<()> {
        self.set_news_resources_viewed(&[news_resource_id.to_string()], viewed)
            .await
    }

    pub async fn set_news_resources_viewed(&self, news_resource_ids: &[String], viewed: bool) -> Result<()> {
        if news_resource_ids.is_empty() {
            return Ok(());
        }
        self.update(|data| {
            for id in news_resource_ids {
                toggle(&mut data.viewed_news_resources, id, viewed);
            }
        })
        .await?;
        debug!("标记 {} 条新闻 viewed={}", news_resource_ids.len(), viewed);
        Ok(())
    }

    pub async fn set_should_hide_onboarding(&self, should_hide: bool) -> Result<()> {
        self.update(|data| data.should_hide_onboarding = should_hide)
            .await?;
        Ok(())
    }
}

impl UserDataSource for UserDataStore {
    fn observe_user_data(&self) -> BoxStream<'static, UserData> {
        watch_stream(self.tx.subscribe())
    }
}

fn toggle(set: &mut BTreeSet<String>, id: &str, present: bool) {
    if present {
        set.insert(id.to_string());
    } else {
        set.remove(id);
    }
}

/// 没有任何关注时重新展示引导页
fn reset_onboarding_if_nothing_followed(data: &mut UserData) {
    if data.followed_topics.is_empty() && data.followed_authors.is_empty() {
        data.should_hide_onboarding = false;
    }
}
