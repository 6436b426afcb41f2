//! 测试用替身：脚本化网络、可注入失败的本地存储、记录型通知器

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::error::{NiaSyncError, Result};
use crate::model::{NewsResource, NewsResourceQuery};
use crate::network::{
    ChangeList, EntityBatch, NetworkAuthor, NetworkChangeList, NetworkNewsResource, NetworkTopic,
    NiaNetworkDataSource,
};
use crate::storage::{KvStore, LocalStore, SqliteNewsStore, UserDataStore};
use crate::sync::{EntitySyncEngine, Notifier, SyncCursorStore, SyncEntityType};

pub fn topic(id: &str) -> NetworkTopic {
    NetworkTopic {
        id: id.to_string(),
        name: format!("Topic {}", id),
        short_description: String::new(),
        long_description: String::new(),
        url: String::new(),
        image_url: String::new(),
    }
}

pub fn author(id: &str) -> NetworkAuthor {
    NetworkAuthor {
        id: id.to_string(),
        name: format!("Author {}", id),
        image_url: String::new(),
        twitter: String::new(),
        medium_page: String::new(),
        bio: String::new(),
    }
}

pub fn news(id: &str, topics: &[&str]) -> NetworkNewsResource {
    NetworkNewsResource {
        id: id.to_string(),
        title: format!("News {}", id),
        content: String::new(),
        url: format!("https://example.com/{}", id),
        header_image_url: None,
        publish_date: Utc.with_ymd_and_hms(2022, 10, 6, 0, 0, 0).unwrap(),
        news_type: Some("Article 📚".to_string()),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        authors: vec![],
    }
}

#[derive(Default)]
struct NetworkState {
    changes: HashMap<SyncEntityType, Vec<NetworkChangeList>>,
    latest_versions: HashMap<SyncEntityType, i64>,
    overrides: HashMap<SyncEntityType, ChangeList>,
    failing: HashSet<SyncEntityType>,
    topics: Vec<NetworkTopic>,
    authors: Vec<NetworkAuthor>,
    news: Vec<NetworkNewsResource>,
    change_list_requests: HashMap<SyncEntityType, Vec<i64>>,
    entity_requests: HashMap<SyncEntityType, Vec<Vec<String>>>,
}

/// 内存中的远端：按脚本返回 change list 与实体，并记录所有请求
#[derive(Default)]
pub struct ScriptedNetwork {
    state: Mutex<NetworkState>,
}

fn put_by_id<T: Clone>(items: &mut Vec<T>, new_items: Vec<T>, id_of: impl Fn(&T) -> &str) {
    for item in new_items {
        match items.iter().position(|existing| id_of(existing) == id_of(&item)) {
            Some(i) => items[i] = item,
            None => items.push(item),
        }
    }
}

impl ScriptedNetwork {
    pub fn push_change(&self, entity_type: SyncEntityType, id: &str, version: i64, is_delete: bool) {
        self.state
            .lock()
            .changes
            .entry(entity_type)
            .or_default()
            .push(NetworkChangeList {
                id: id.to_string(),
                change_list_version: version,
                is_delete,
            });
    }

    pub fn clear_changes(&self, entity_type: SyncEntityType) {
        self.state.lock().changes.remove(&entity_type);
    }

    /// 没有条目时也报告的最新版本
    pub fn set_latest_version(&self, entity_type: SyncEntityType, version: i64) {
        self.state.lock().latest_versions.insert(entity_type, version);
    }

    /// 原样返回给定的 change list
    pub fn set_change_list(&self, entity_type: SyncEntityType, change_list: ChangeList) {
        self.state.lock().overrides.insert(entity_type, change_list);
    }

    pub fn fail_change_list(&self, entity_type: SyncEntityType, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(entity_type);
        } else {
            state.failing.remove(&entity_type);
        }
    }

    pub fn put_topics(&self, topics: Vec<NetworkTopic>) {
        put_by_id(&mut self.state.lock().topics, topics, |t| t.id.as_str());
    }

    pub fn put_authors(&self, authors: Vec<NetworkAuthor>) {
        put_by_id(&mut self.state.lock().authors, authors, |a| a.id.as_str());
    }

    pub fn put_news(&self, news: Vec<NetworkNewsResource>) {
        put_by_id(&mut self.state.lock().news, news, |n| n.id.as_str());
    }

    pub fn change_list_requests(&self, entity_type: SyncEntityType) -> Vec<i64> {
        self.state
            .lock()
            .change_list_requests
            .get(&entity_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn entity_requests(&self, entity_type: SyncEntityType) -> Vec<Vec<String>> {
        self.state
            .lock()
            .entity_requests
            .get(&entity_type)
            .cloned()
            .unwrap_or_default()
    }
}

fn select<T: Clone>(items: &[T], ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| ids.iter().any(|id| id == id_of(item)))
        .cloned()
        .collect()
}

#[async_trait]
impl NiaNetworkDataSource for ScriptedNetwork {
    async fn fetch_change_list(&self, entity_type: SyncEntityType, after: i64) -> Result<ChangeList> {
        let mut state = self.state.lock();
        state
            .change_list_requests
            .entry(entity_type)
            .or_default()
            .push(after);
        if state.failing.contains(&entity_type) {
            return Err(NiaSyncError::Network(format!("injected failure for {}", entity_type)));
        }
        if let Some(change_list) = state.overrides.get(&entity_type) {
            return Ok(change_list.clone());
        }
        let items: Vec<NetworkChangeList> = state
            .changes
            .get(&entity_type)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.change_list_version > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let mut change_list = ChangeList::from_items(items, after);
        if let Some(&latest) = state.latest_versions.get(&entity_type) {
            change_list.latest_version = change_list.latest_version.max(latest);
        }
        Ok(change_list)
    }

    async fn fetch_entities(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<EntityBatch> {
        let mut state = self.state.lock();
        state
            .entity_requests
            .entry(entity_type)
            .or_default()
            .push(ids.to_vec());
        Ok(match entity_type {
            SyncEntityType::Topic => EntityBatch::Topics(select(&state.topics, ids, |t| t.id.as_str())),
            SyncEntityType::Author => EntityBatch::Authors(select(&state.authors, ids, |a| a.id.as_str())),
            SyncEntityType::NewsResource => {
                EntityBatch::NewsResources(select(&state.news, ids, |n| n.id.as_str()))
            }
        })
    }
}

/// 写入调用记录（查询不记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upsert(SyncEntityType, Vec<String>),
    Delete(SyncEntityType, Vec<String>),
}

/// 包装真实 SQLite 存储，记录写入调用并可注入一次写入失败
pub struct RecordingStore {
    inner: SqliteNewsStore,
    calls: Mutex<Vec<StoreCall>>,
    fail_next_upsert: AtomicBool,
}

impl RecordingStore {
    pub async fn in_memory() -> Self {
        Self {
            inner: SqliteNewsStore::open_in_memory().await.unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_next_upsert: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteNewsStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_next_upsert(&self) {
        self.fail_next_upsert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalStore for RecordingStore {
    async fn upsert(&self, batch: EntityBatch) -> Result<()> {
        self.calls
            .lock()
            .push(StoreCall::Upsert(batch.entity_type(), batch.ids()));
        if self.fail_next_upsert.swap(false, Ordering::SeqCst) {
            return Err(NiaSyncError::Database("injected store failure".to_string()));
        }
        self.inner.upsert(batch).await
    }

    async fn delete(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<()> {
        self.calls.lock().push(StoreCall::Delete(entity_type, ids.to_vec()));
        self.inner.delete(entity_type, ids).await
    }

    async fn news_resource_ids(&self, query: &NewsResourceQuery) -> Result<Vec<String>> {
        self.inner.news_resource_ids(query).await
    }

    async fn news_resources(&self, query: &NewsResourceQuery) -> Result<Vec<NewsResource>> {
        self.inner.news_resources(query).await
    }
}

/// 记录每次通知的新闻 id
#[derive(Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn posted(&self) -> Vec<Vec<String>> {
        self.posted.lock().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_news_notifications(&self, news_resources: &[NewsResource]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NiaSyncError::Other("injected notifier failure".to_string()));
        }
        self.posted
            .lock()
            .push(news_resources.iter().map(|n| n.id.clone()).collect());
        Ok(())
    }
}

/// 同步引擎及其全部替身
pub struct Harness {
    pub network: Arc<ScriptedNetwork>,
    pub store: Arc<RecordingStore>,
    pub user_data: Arc<UserDataStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Arc<EntitySyncEngine>,
    _dir: TempDir,
}

pub async fn harness(news_batch_size: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let kv = Arc::new(KvStore::new(dir.path()).await.unwrap());
    let network = Arc::new(ScriptedNetwork::default());
    let store = Arc::new(RecordingStore::in_memory().await);
    let user_data = Arc::new(UserDataStore::new(kv.clone()).await.unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(EntitySyncEngine::new(
        network.clone(),
        store.clone(),
        SyncCursorStore::new(kv),
        user_data.clone(),
        notifier.clone(),
        news_batch_size,
    ));
    Harness {
        network,
        store,
        user_data,
        notifier,
        engine,
        _dir: dir,
    }
}
