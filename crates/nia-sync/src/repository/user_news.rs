//! UserNewsResource 合并流
//!
//! 一个仓库只有一条共享流水线：订阅一次全量新闻与用户状态，合并后发布快照。
//! 每个观察者在快照上套用自己的过滤条件，并对连续相同的结果去重。

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::debug;

use super::share::{Producer, SharedPipeline, Subscription};
use super::{NewsLoad, NewsResourceSource, UserDataSource};
use crate::config::ShareConfig;
use crate::error::Result;
use crate::model::{NewsResource, NewsResourceQuery, UserData, UserNewsResource};

/// 流水线发布的快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsSnapshot {
    pub user_data: Option<UserData>,
    /// None 表示新闻尚未加载
    pub resources: Option<Vec<UserNewsResource>>,
}

/// 观察者的过滤方式
#[derive(Debug, Clone)]
enum ObserverFilter {
    Query(NewsResourceQuery),
    FollowedTopics,
    Bookmarked,
}

impl ObserverFilter {
    /// None 表示当前快照还不足以给出结果
    fn apply(&self, snapshot: &NewsSnapshot) -> Option<Vec<UserNewsResource>> {
        match self {
            Self::Query(query) => {
                let resources = snapshot.resources.as_ref()?;
                if query.is_unfiltered() {
                    return Some(resources.clone());
                }
                Some(
                    resources
                        .iter()
                        .filter(|r| query.matches(&r.id, r.topic_ids()))
                        .cloned()
                        .collect(),
                )
            }
            Self::FollowedTopics => {
                let user_data = snapshot.user_data.as_ref()?;
                if user_data.followed_topics.is_empty() {
                    return Some(Vec::new());
                }
                let resources = snapshot.resources.as_ref()?;
                Some(
                    resources
                        .iter()
                        .filter(|r| r.has_followed_topic())
                        .cloned()
                        .collect(),
                )
            }
            Self::Bookmarked => {
                let user_data = snapshot.user_data.as_ref()?;
                if user_data.bookmarked_news_resources.is_empty() {
                    return Some(Vec::new());
                }
                let resources = snapshot.resources.as_ref()?;
                Some(
                    resources
                        .iter()
                        .filter(|r| user_data.bookmarked_news_resources.contains(&r.id))
                        .cloned()
                        .collect(),
                )
            }
        }
    }
}

enum Upstream {
    News(NewsLoad),
    User(UserData),
}

/// 合并任务：流水线内唯一的发送方
async fn combine(
    news: BoxStream<'static, NewsLoad>,
    user_data: BoxStream<'static, UserData>,
    tx: watch::Sender<NewsSnapshot>,
) {
    let mut upstream = stream::select(news.map(Upstream::News), user_data.map(Upstream::User));
    let mut latest_news: Option<Vec<NewsResource>> = None;
    let mut latest_user: Option<UserData> = None;

    while let Some(event) = upstream.next().await {
        match event {
            // 加载中的状态不覆盖已有结果
            Upstream::News(NewsLoad::Loading) => {
                debug!("新闻加载中，忽略");
                continue;
            }
            Upstream::News(NewsLoad::Loaded(list)) => latest_news = Some(list),
            Upstream::User(data) => latest_user = Some(data),
        }

        let resources = match (&latest_news, &latest_user) {
            (Some(news), Some(user)) => Some(UserNewsResource::map_all(news, user)),
            _ => None,
        };
        let next = NewsSnapshot {
            user_data: latest_user.clone(),
            resources,
        };
        tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    debug!("上游已结束，合并任务退出");
}

/// NewsResource + UserData 合并仓库
pub struct CompositeUserNewsResourceRepository {
    pipeline: SharedPipeline<NewsSnapshot>,
}

impl CompositeUserNewsResourceRepository {
    pub fn new(
        news: Arc<dyn NewsResourceSource>,
        user_data: Arc<dyn UserDataSource>,
        config: &ShareConfig,
    ) -> Result<Self> {
        let producer: Producer<NewsSnapshot> = Box::new(move |tx| {
            let news_stream = news.observe_news_resources(NewsResourceQuery::all());
            let user_stream = user_data.observe_user_data();
            combine(news_stream, user_stream, tx).boxed()
        });
        Ok(Self {
            pipeline: SharedPipeline::new("user_news_resources", config.stop_timeout(), producer)?,
        })
    }

    /// 满足查询条件的 UserNewsResource
    pub fn observe_all(&self, query: NewsResourceQuery) -> UserNewsResourceStream {
        self.observe(ObserverFilter::Query(query))
    }

    /// 带任一已关注话题的新闻；没有关注任何话题时为空列表
    pub fn observe_all_for_followed_topics(&self) -> UserNewsResourceStream {
        self.observe(ObserverFilter::FollowedTopics)
    }

    /// 已收藏的新闻；没有收藏时为空列表
    pub fn observe_all_bookmarked(&self) -> UserNewsResourceStream {
        self.observe(ObserverFilter::Bookmarked)
    }

    fn observe(&self, filter: ObserverFilter) -> UserNewsResourceStream {
        UserNewsResourceStream {
            subscription: self.pipeline.subscribe(),
            filter,
            last: None,
            primed: false,
        }
    }

    pub fn pipeline(&self) -> &SharedPipeline<NewsSnapshot> {
        &self.pipeline
    }

    /// 立即释放上游订阅
    pub fn shutdown(&self) {
        self.pipeline.stop();
    }
}

/// 单个观察者的流；drop 即取消订阅
pub struct UserNewsResourceStream {
    subscription: Subscription<NewsSnapshot>,
    filter: ObserverFilter,
    last: Option<Vec<UserNewsResource>>,
    primed: bool,
}

impl UserNewsResourceStream {
    /// 下一个与上次不同的结果；流水线结束时返回 None
    pub async fn next(&mut self) -> Option<Vec<UserNewsResource>> {
        loop {
            if self.primed && self.subscription.receiver_mut().changed().await.is_err() {
                return None;
            }
            self.primed = true;

            let candidate = {
                let snapshot = self.subscription.receiver_mut().borrow_and_update();
                self.filter.apply(&snapshot)
            };
            if let Some(list) = candidate {
                if self.last.as_ref() != Some(&list) {
                    self.last = Some(list.clone());
                    return Some(list);
                }
            }
        }
    }

    /// 当前快照上的结果，不等待；尚未加载时为 None
    pub fn current(&self) -> Option<Vec<UserNewsResource>> {
        self.filter.apply(&self.subscription.receiver().borrow())
    }

    pub fn into_stream(self) -> BoxStream<'static, Vec<UserNewsResource>> {
        stream::unfold(self, |mut observer| async move {
            let next = observer.next().await?;
            Some((next, observer))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewsResourceType, Topic};
    use crate::utils::watch_stream;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubNews {
        tx: watch::Sender<NewsLoad>,
        subscriptions: AtomicUsize,
    }

    impl StubNews {
        fn publish(&self, list: Vec<NewsResource>) {
            self.tx.send_replace(NewsLoad::Loaded(list));
        }
    }

    impl NewsResourceSource for StubNews {
        fn observe_news_resources(&self, _query: NewsResourceQuery) -> BoxStream<'static, NewsLoad> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            watch_stream(self.tx.subscribe())
        }
    }

    struct StubUserData {
        tx: watch::Sender<UserData>,
        subscriptions: AtomicUsize,
    }

    impl UserDataSource for StubUserData {
        fn observe_user_data(&self) -> BoxStream<'static, UserData> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            watch_stream(self.tx.subscribe())
        }
    }

    struct Fixture {
        news: Arc<StubNews>,
        user: Arc<StubUserData>,
        repository: CompositeUserNewsResourceRepository,
    }

    fn fixture(stop_timeout_ms: u64) -> Fixture {
        let news = Arc::new(StubNews {
            tx: watch::channel(NewsLoad::Loading).0,
            subscriptions: AtomicUsize::new(0),
        });
        let user = Arc::new(StubUserData {
            tx: watch::channel(UserData::default()).0,
            subscriptions: AtomicUsize::new(0),
        });
        let repository = CompositeUserNewsResourceRepository::new(
            news.clone(),
            user.clone(),
            &ShareConfig { stop_timeout_ms },
        )
        .unwrap();
        Fixture {
            news,
            user,
            repository,
        }
    }

    fn resource(id: &str, topics: &[&str]) -> NewsResource {
        NewsResource {
            id: id.to_string(),
            title: format!("title {}", id),
            content: String::new(),
            url: String::new(),
            header_image_url: None,
            publish_date: Utc.with_ymd_and_hms(2022, 10, 6, 0, 0, 0).unwrap(),
            news_type: NewsResourceType::Article,
            topics: topics.iter().map(|t| Topic::shell(*t)).collect(),
            authors: vec![],
        }
    }

    async fn next_within(stream: &mut UserNewsResourceStream) -> Option<Vec<UserNewsResource>> {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn user_data_changes_recompute_projection() {
        let f = fixture(5_000);
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());
        f.news.publish(vec![resource("n1", &["t1"]), resource("n2", &[])]);

        let first = next_within(&mut observer).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| !r.is_saved));

        f.user.tx.send_modify(|data| {
            data.bookmarked_news_resources.insert("n2".to_string());
            data.followed_topics.insert("t1".to_string());
        });
        let second = next_within(&mut observer).await.unwrap();
        assert!(second[1].is_saved);
        assert!(second[0].followable_topics[0].is_followed);
        assert_eq!(observer.current(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn loading_state_is_suppressed_until_news_loads() {
        let f = fixture(5_000);
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());

        // 加载中不发出任何结果
        assert!(next_within(&mut observer).await.is_none());
        f.news.tx.send_replace(NewsLoad::Loading);
        assert!(next_within(&mut observer).await.is_none());
        assert_eq!(observer.current(), None);

        f.news.publish(vec![resource("n1", &[])]);
        assert_eq!(next_within(&mut observer).await.unwrap().len(), 1);

        // 再次进入加载中不会覆盖已发出的结果
        f.news.tx.send_replace(NewsLoad::Loading);
        assert!(next_within(&mut observer).await.is_none());
        assert_eq!(observer.current().map(|l| l.len()), Some(1));

        // 加载之后的空列表是合法状态
        f.news.publish(Vec::new());
        assert_eq!(next_within(&mut observer).await, Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_empty_store_emits_empty_list() {
        let f = fixture(5_000);
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());
        f.news.publish(Vec::new());
        assert_eq!(next_within(&mut observer).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn empty_store_after_successful_sync_emits_empty_list() {
        use crate::sync::SyncEntityType;
        use crate::test_support::harness;

        let h = harness(40).await;
        h.network.set_latest_version(SyncEntityType::NewsResource, 5);
        let report = h.engine.run_entity_sync(SyncEntityType::NewsResource).await.unwrap();
        assert_eq!(report.cursor, 5);

        let repository = CompositeUserNewsResourceRepository::new(
            Arc::new(h.store.inner().clone()),
            h.user_data.clone(),
            &ShareConfig::default(),
        )
        .unwrap();
        let mut observer = repository.observe_all(NewsResourceQuery::all());
        let list = tokio::time::timeout(Duration::from_secs(2), observer.next())
            .await
            .unwrap();
        assert_eq!(list, Some(Vec::new()));
        repository.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_observers_share_upstream_subscriptions() {
        let f = fixture(5_000);
        let mut a = f.repository.observe_all(NewsResourceQuery::all());
        let mut b = f.repository.observe_all(NewsResourceQuery::all());
        f.news.publish(vec![resource("n1", &["t1"])]);

        let from_a = next_within(&mut a).await.unwrap();
        let from_b = next_within(&mut b).await.unwrap();
        assert_eq!(from_a, from_b);

        f.user.tx.send_modify(|data| {
            data.viewed_news_resources.insert("n1".to_string());
        });
        let from_a = next_within(&mut a).await.unwrap();
        let from_b = next_within(&mut b).await.unwrap();
        assert_eq!(from_a, from_b);
        assert!(from_a[0].has_been_viewed);

        assert_eq!(f.news.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(f.user.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(f.repository.pipeline().subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_observer_gets_latest_value_without_new_subscription() {
        let f = fixture(5_000);
        let mut a = f.repository.observe_all(NewsResourceQuery::all());
        f.news.publish(vec![resource("n1", &[])]);
        next_within(&mut a).await.unwrap();

        let mut late = f.repository.observe_all(NewsResourceQuery::all());
        assert_eq!(next_within(&mut late).await.unwrap().len(), 1);
        assert_eq!(f.news.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_sentinel_then_data_yields_single_emission() {
        let f = fixture(5_000);
        f.user.tx.send_modify(|data| {
            data.bookmarked_news_resources.insert("A".to_string());
        });
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());
        assert!(next_within(&mut observer).await.is_none());

        f.user.tx.send_modify(|data| {
            data.bookmarked_news_resources.insert("A".to_string());
        });
        f.news.publish(vec![resource("A", &[]), resource("B", &[])]);

        let list = next_within(&mut observer).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].is_saved);
        assert!(!list[1].is_saved);
        assert!(next_within(&mut observer).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn filters_apply_per_observer() {
        let f = fixture(5_000);
        let mut by_topic = f.repository.observe_all(NewsResourceQuery::all().with_topic_ids(["t1"]));
        let mut by_id = f.repository.observe_all(NewsResourceQuery::all().with_news_ids(["n2", "n3"]));
        f.news.publish(vec![
            resource("n1", &["t1"]),
            resource("n2", &["t2"]),
            resource("n3", &["t1", "t2"]),
        ]);

        let ids = |list: Vec<UserNewsResource>| list.into_iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(next_within(&mut by_topic).await.unwrap()), vec!["n1", "n3"]);
        assert_eq!(ids(next_within(&mut by_id).await.unwrap()), vec!["n2", "n3"]);

        // 只影响 by_id 的变化不会让 by_topic 重复发出
        f.user.tx.send_modify(|data| {
            data.bookmarked_news_resources.insert("n2".to_string());
        });
        assert!(next_within(&mut by_topic).await.is_none());
        assert!(next_within(&mut by_id).await.unwrap()[0].is_saved);
        assert_eq!(f.news.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn followed_topics_and_bookmarks_are_empty_when_unset() {
        let f = fixture(5_000);
        let mut followed = f.repository.observe_all_for_followed_topics();
        let mut bookmarked = f.repository.observe_all_bookmarked();

        // 新闻尚未加载也立即得到空列表
        assert_eq!(next_within(&mut followed).await, Some(Vec::new()));
        assert_eq!(next_within(&mut bookmarked).await, Some(Vec::new()));

        f.news.publish(vec![resource("n1", &["t1"]), resource("n2", &["t2"])]);
        f.user.tx.send_modify(|data| {
            data.followed_topics.insert("t2".to_string());
            data.bookmarked_news_resources.insert("n1".to_string());
        });
        let followed_ids: Vec<String> = next_within(&mut followed)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(followed_ids, vec!["n2"]);
        let saved = next_within(&mut bookmarked).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].is_saved);
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_restarts_after_grace_period() {
        let f = fixture(5_000);
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());
        f.news.publish(vec![resource("n1", &[])]);
        next_within(&mut observer).await.unwrap();
        drop(observer);

        // 宽限期内重新订阅：复用
        tokio::time::sleep(Duration::from_secs(2)).await;
        let observer = f.repository.observe_all(NewsResourceQuery::all());
        assert_eq!(f.news.subscriptions.load(Ordering::SeqCst), 1);
        drop(observer);

        // 超过宽限期：上游释放，下次订阅重新建立
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!f.repository.pipeline().is_running());
        let mut observer = f.repository.observe_all(NewsResourceQuery::all());
        assert_eq!(next_within(&mut observer).await.unwrap().len(), 1);
        assert_eq!(f.news.subscriptions.load(Ordering::SeqCst), 2);
        assert_eq!(f.user.subscriptions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn into_stream_yields_distinct_values() {
        let f = fixture(5_000);
        let mut stream = f.repository.observe_all(NewsResourceQuery::all()).into_stream();
        f.news.publish(vec![resource("n1", &[])]);
        assert_eq!(stream.next().await.unwrap().len(), 1);

        // 相同内容再次写入不会重复发出
        f.news.publish(vec![resource("n1", &[])]);
        f.news.publish(vec![resource("n1", &[]), resource("n2", &[])]);
        assert_eq!(stream.next().await.unwrap().len(), 2);
    }
}
