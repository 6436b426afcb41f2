//! 实体同步引擎 - 单个实体类型的一次 change list 同步
//!
//! 流程：读游标 → 拉 change list → 先删后写 → 写游标。
//! 任一步失败即返回错误，游标保持不变，下次从同一位置重放。
//!
//! ## NOTE: Engine 不做重试
//!
//! 重试、退避与触发时机属于外部调度器；引擎与编排器都假定同一时刻只有一次 `sync()`。

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cursor_store::SyncCursorStore;
use super::SyncEntityType;
use crate::error::{NiaSyncError, Result};
use crate::model::NewsResourceQuery;
use crate::network::NiaNetworkDataSource;
use crate::storage::{LocalStore, UserDataStore};
use crate::sync::notifier::Notifier;

/// 一次成功同步的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySyncReport {
    pub entity_type: SyncEntityType,
    pub deleted: usize,
    /// 实际写入的条数（服务端遗漏的 id 不计入）
    pub upserted: usize,
    pub cursor: i64,
}

/// 实体同步引擎
pub struct EntitySyncEngine {
    network: Arc<dyn NiaNetworkDataSource>,
    store: Arc<dyn LocalStore>,
    cursor_store: SyncCursorStore,
    user_data: Arc<UserDataStore>,
    notifier: Arc<dyn Notifier>,
    news_batch_size: usize,
}

impl EntitySyncEngine {
    pub fn new(
        network: Arc<dyn NiaNetworkDataSource>,
        store: Arc<dyn LocalStore>,
        cursor_store: SyncCursorStore,
        user_data: Arc<UserDataStore>,
        notifier: Arc<dyn Notifier>,
        news_batch_size: usize,
    ) -> Self {
        Self {
            network,
            store,
            cursor_store,
            user_data,
            notifier,
            news_batch_size: news_batch_size.max(1),
        }
    }

    pub fn cursor_store(&self) -> &SyncCursorStore {
        &self.cursor_store
    }

    /// 对一个实体类型执行一次增量同步
    pub async fn run_entity_sync(&self, entity_type: SyncEntityType) -> Result<EntitySyncReport> {
        let cursor = self.cursor_store.get(entity_type).await?;
        let change_list = self.network.fetch_change_list(entity_type, cursor).await?;
        let (deleted, changed) = change_list.partition();
        debug!(
            "entity_sync {} after={} -> latest={}，删除 {} 条，变更 {} 条",
            entity_type,
            cursor,
            change_list.latest_version,
            deleted.len(),
            changed.len()
        );

        if !deleted.is_empty() {
            self.store.delete(entity_type, &deleted).await?;
        }

        let upserted = if changed.is_empty() {
            0
        } else {
            match entity_type {
                SyncEntityType::NewsResource => self.sync_news_resources(cursor, &changed).await?,
                _ => self.fetch_and_upsert(entity_type, &changed).await?,
            }
        };

        let stored = self
            .cursor_store
            .set(entity_type, change_list.latest_version)
            .await?;
        info!(
            "✅ entity_sync {} 完成: 删除 {} 条，写入 {} 条，游标 {}",
            entity_type,
            deleted.len(),
            upserted,
            stored
        );
        Ok(EntitySyncReport {
            entity_type,
            deleted: deleted.len(),
            upserted,
            cursor: stored,
        })
    }

    async fn fetch_and_upsert(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<usize> {
        let batch = self.network.fetch_entities(entity_type, ids).await?;
        if batch.entity_type() != entity_type {
            return Err(NiaSyncError::InvalidData(format!(
                "请求 {} 却收到 {}",
                entity_type,
                batch.entity_type()
            )));
        }
        if batch.len() < ids.len() {
            debug!(
                "entity_sync {} 服务端返回 {}/{} 条，缺失的 id 留待后续版本",
                entity_type,
                batch.len(),
                ids.len()
            );
        }
        let n = batch.len();
        if n > 0 {
            self.store.upsert(batch).await?;
        }
        Ok(n)
    }

    /// 新闻：分批拉取写入，首次同步标记已读，并为新到达的关注内容发通知
    async fn sync_news_resources(&self, cursor: i64, changed: &[String]) -> Result<usize> {
        let user_data = self.user_data.user_data();
        let has_onboarded = user_data.should_hide_onboarding;
        let followed_topics = user_data.followed_topics;

        // 写入前已存在的关注内容不算新内容
        let existing: HashSet<String> = if has_onboarded {
            self.store
                .news_resource_ids(&followed_changed_query(&followed_topics, changed.iter().cloned()))
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        if cursor <= 0 {
            self.user_data.set_news_resources_viewed(changed, true).await?;
        }

        let mut upserted = 0;
        for (i, chunk) in changed.chunks(self.news_batch_size).enumerate() {
            upserted += self.fetch_and_upsert(SyncEntityType::NewsResource, chunk).await?;
            debug!("entity_sync news_resource 第 {} 批完成，累计 {} 条", i + 1, upserted);
        }

        if has_onboarded {
            let added_ids = changed.iter().filter(|id| !existing.contains(*id)).cloned();
            let added = self
                .store
                .news_resources(&followed_changed_query(&followed_topics, added_ids))
                .await?;
            if !added.is_empty() {
                if let Err(e) = self.notifier.post_news_notifications(&added).await {
                    warn!("发送新内容通知失败（不影响同步）: {}", e);
                }
            }
        }

        Ok(upserted)
    }
}

fn followed_changed_query(
    followed_topics: &BTreeSet<String>,
    news_ids: impl IntoIterator<Item = String>,
) -> NewsResourceQuery {
    NewsResourceQuery::all()
        .with_topic_ids(followed_topics.iter().cloned())
        .with_news_ids(news_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ChangeList;
    use crate::test_support::{harness, news, topic, StoreCall};

    #[tokio::test]
    async fn pass_deletes_then_upserts_then_advances_cursor() {
        let h = harness(40).await;
        h.network.put_topics(vec![topic("1"), topic("2")]);
        h.network.push_change(SyncEntityType::Topic, "1", 1, false);
        h.network.push_change(SyncEntityType::Topic, "2", 2, false);
        h.network.push_change(SyncEntityType::Topic, "3", 3, true);

        let report = h.engine.run_entity_sync(SyncEntityType::Topic).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.cursor, 3);
        assert_eq!(
            h.store.calls(),
            vec![
                StoreCall::Delete(SyncEntityType::Topic, vec!["3".to_string()]),
                StoreCall::Upsert(SyncEntityType::Topic, vec!["1".to_string(), "2".to_string()]),
            ]
        );
        assert_eq!(h.store.inner().topics().await.unwrap().len(), 2);

        // 第二次从游标之后开始，没有新变更
        h.store.clear_calls();
        let report = h.engine.run_entity_sync(SyncEntityType::Topic).await.unwrap();
        assert_eq!(report.upserted, 0);
        assert!(h.store.calls().is_empty());
        assert_eq!(h.network.change_list_requests(SyncEntityType::Topic), vec![0, 3]);
    }

    #[tokio::test]
    async fn empty_change_list_advances_cursor_without_store_calls() {
        let h = harness(40).await;
        h.network.set_latest_version(SyncEntityType::Author, 12);

        let report = h.engine.run_entity_sync(SyncEntityType::Author).await.unwrap();
        assert_eq!(report.cursor, 12);
        assert!(h.store.calls().is_empty());
        assert!(h.network.entity_requests(SyncEntityType::Author).is_empty());
        assert_eq!(h.engine.cursor_store().get(SyncEntityType::Author).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn delete_and_change_for_same_id_keeps_upserted_content() {
        let h = harness(40).await;
        h.network.put_news(vec![news("n1", &["t1"])]);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 1, false);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 2, true);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 3, false);

        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        let ids = h.store.inner().news_resource_ids(&NewsResourceQuery::all()).await.unwrap();
        assert_eq!(ids, vec!["n1"]);
        assert!(matches!(h.store.calls()[0], StoreCall::Delete(..)));
    }

    #[tokio::test]
    async fn store_failure_keeps_cursor_and_retry_converges() {
        let h = harness(40).await;
        h.network.put_news(vec![news("n1", &["t1"]), news("n2", &["t2"])]);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 1, false);
        h.network.push_change(SyncEntityType::NewsResource, "n2", 2, false);

        h.store.fail_next_upsert();
        let err = h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(h.engine.cursor_store().get(SyncEntityType::NewsResource).await.unwrap(), 0);

        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        let ids = h.store.inner().news_resource_ids(&NewsResourceQuery::all()).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(h.engine.cursor_store().get(SyncEntityType::NewsResource).await.unwrap(), 2);
        // 两次都从 0 开始拉取，第三次从 2 开始
        assert_eq!(h.network.change_list_requests(SyncEntityType::NewsResource), vec![0, 0, 2]);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_cursor_untouched() {
        let h = harness(40).await;
        h.engine.cursor_store().set(SyncEntityType::Topic, 5).await.unwrap();
        h.network.fail_change_list(SyncEntityType::Topic, true);

        let err = h.engine.run_entity_sync(SyncEntityType::Topic).await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(h.engine.cursor_store().get(SyncEntityType::Topic).await.unwrap(), 5);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn lower_server_version_does_not_move_cursor_back() {
        let h = harness(40).await;
        h.engine.cursor_store().set(SyncEntityType::Topic, 9).await.unwrap();
        h.network.set_change_list(
            SyncEntityType::Topic,
            ChangeList {
                items: vec![],
                latest_version: 4,
            },
        );

        let report = h.engine.run_entity_sync(SyncEntityType::Topic).await.unwrap();
        assert_eq!(report.cursor, 9);
    }

    #[tokio::test]
    async fn news_changes_are_fetched_in_batches() {
        let h = harness(2).await;
        let ids: Vec<String> = (1..=5).map(|i| format!("n{}", i)).collect();
        h.network.put_news(ids.iter().map(|id| news(id, &[])).collect());
        for (i, id) in ids.iter().enumerate() {
            h.network.push_change(SyncEntityType::NewsResource, id, i as i64 + 1, false);
        }

        let report = h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert_eq!(report.upserted, 5);
        let sizes: Vec<usize> = h
            .network
            .entity_requests(SyncEntityType::NewsResource)
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn server_omissions_are_not_errors() {
        let h = harness(40).await;
        h.network.put_news(vec![news("n1", &[])]);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 1, false);
        h.network.push_change(SyncEntityType::NewsResource, "gone", 2, false);

        let report = h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert_eq!(report.upserted, 1);
        assert_eq!(report.cursor, 2);
    }

    #[tokio::test]
    async fn first_news_sync_marks_everything_viewed() {
        let h = harness(40).await;
        h.network.put_news(vec![news("n1", &[]), news("n2", &[])]);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 1, false);
        h.network.push_change(SyncEntityType::NewsResource, "n2", 2, false);
        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert_eq!(h.user_data.user_data().viewed_news_resources.len(), 2);

        // 之后到达的新闻保持未读
        h.network.put_news(vec![news("n3", &[])]);
        h.network.push_change(SyncEntityType::NewsResource, "n3", 3, false);
        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert!(!h.user_data.user_data().viewed_news_resources.contains("n3"));
    }

    #[tokio::test]
    async fn notifies_only_new_followed_content_after_onboarding() {
        let h = harness(40).await;
        h.network.put_news(vec![news("old", &["t1"]), news("other", &["t2"])]);
        h.network.push_change(SyncEntityType::NewsResource, "old", 1, false);
        h.network.push_change(SyncEntityType::NewsResource, "other", 2, false);
        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        // 未完成引导：不通知
        assert!(h.notifier.posted().is_empty());

        h.user_data.toggle_followed_topic_id("t1", true).await.unwrap();
        h.user_data.set_should_hide_onboarding(true).await.unwrap();
        h.network.put_news(vec![news("fresh", &["t1"]), news("unfollowed", &["t2"])]);
        h.network.push_change(SyncEntityType::NewsResource, "old", 3, false);
        h.network.push_change(SyncEntityType::NewsResource, "fresh", 4, false);
        h.network.push_change(SyncEntityType::NewsResource, "unfollowed", 5, false);
        h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();

        assert_eq!(h.notifier.posted(), vec![vec!["fresh".to_string()]]);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_the_pass() {
        let h = harness(40).await;
        h.user_data.toggle_followed_topic_id("t1", true).await.unwrap();
        h.user_data.set_should_hide_onboarding(true).await.unwrap();
        h.notifier.fail(true);
        h.network.put_news(vec![news("n1", &["t1"])]);
        h.network.push_change(SyncEntityType::NewsResource, "n1", 1, false);

        let report = h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert_eq!(report.cursor, 1);
        assert!(h.notifier.posted().is_empty());
    }
}
