//! NiaSync 主接口
//!
//! 采用分层架构，全部通过构造函数注入组装：
//! - 存储层：KvStore（游标 / 用户偏好）+ SqliteNewsStore（新闻缓存）
//! - 网络层：HttpNiaNetwork，或未配置 server_url 时的 DemoNiaNetwork
//! - 同步层：EntitySyncEngine + SyncOrchestrator
//! - 仓库层：CompositeUserNewsResourceRepository

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::NiaSyncConfig;
use crate::error::{NiaSyncError, Result};
use crate::logging;
use crate::model::{NewsResourceQuery, Topic, UserData};
use crate::network::{DemoNiaNetwork, HttpNiaNetwork, NiaNetworkDataSource};
use crate::repository::{CompositeUserNewsResourceRepository, UserNewsResourceStream};
use crate::storage::{KvStore, SqliteNewsStore, UserDataStore};
use crate::sync::{
    ChangeListVersions, EntitySyncEngine, LoggingNotifier, Notifier, SyncCursorStore,
    SyncOrchestrator,
};
use crate::version::{BUILD_TIME, SDK_VERSION};

pub struct NiaSync {
    config: NiaSyncConfig,
    kv: Arc<KvStore>,
    store: SqliteNewsStore,
    user_data: Arc<UserDataStore>,
    orchestrator: SyncOrchestrator,
    repository: CompositeUserNewsResourceRepository,
    shutting_down: AtomicBool,
}

impl NiaSync {
    /// 初始化（通知只写日志）
    pub async fn initialize(config: NiaSyncConfig) -> Result<Arc<Self>> {
        Self::initialize_with_notifier(config, Arc::new(LoggingNotifier)).await
    }

    /// 分层初始化：1. 存储层 → 2. 网络层 → 3. 同步层 → 4. 仓库层
    pub async fn initialize_with_notifier(
        config: NiaSyncConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        logging::init_logging(config.debug_mode);
        info!("🚀 正在初始化 nia-sync v{} (build {})", SDK_VERSION, BUILD_TIME);

        // === 第1层：存储 ===
        let kv = Arc::new(KvStore::new(&config.data_dir).await?);
        let store = SqliteNewsStore::open(&config.data_dir).await?;
        let user_data = Arc::new(UserDataStore::new(kv.clone()).await?);

        // === 第2层：网络 ===
        let network: Arc<dyn NiaNetworkDataSource> = match &config.server_url {
            Some(url) => {
                info!("使用后端数据源: {}", url);
                Arc::new(HttpNiaNetwork::new(&config.http_client_config, url.clone())?)
            }
            None => {
                info!("未配置 server_url，使用内置 demo 数据源");
                Arc::new(DemoNiaNetwork::new()?)
            }
        };

        // === 第3层：同步 ===
        let engine = Arc::new(EntitySyncEngine::new(
            network,
            Arc::new(store.clone()),
            SyncCursorStore::new(kv.clone()),
            user_data.clone(),
            notifier,
            config.sync_config.news_batch_size,
        ));
        let orchestrator = SyncOrchestrator::new(engine, config.sync_config.entity_types.clone());

        // === 第4层：仓库 ===
        let repository = CompositeUserNewsResourceRepository::new(
            Arc::new(store.clone()),
            user_data.clone(),
            &config.share_config,
        )?;

        info!("✅ nia-sync 初始化完成: {}", config.data_dir.display());
        Ok(Arc::new(Self {
            config,
            kv,
            store,
            user_data,
            orchestrator,
            repository,
            shutting_down: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &NiaSyncConfig {
        &self.config
    }

    /// 同步所有实体类型；交给外部调度器决定重试
    pub async fn sync(&self) -> bool {
        if self.is_shutting_down() {
            warn!("nia-sync 正在关闭，跳过同步");
            return false;
        }
        self.orchestrator.sync().await
    }

    pub fn is_syncing(&self) -> bool {
        self.orchestrator.is_syncing()
    }

    pub fn subscribe_syncing(&self) -> watch::Receiver<bool> {
        self.orchestrator.subscribe_syncing()
    }

    pub async fn versions(&self) -> Result<ChangeListVersions> {
        self.orchestrator.versions().await
    }

    /// 按话题 / id 过滤的 UserNewsResource 流；`None` 表示不过滤该维度
    pub fn observe_user_news_resources(
        &self,
        filter_topic_ids: Option<BTreeSet<String>>,
        filter_news_ids: Option<BTreeSet<String>>,
    ) -> UserNewsResourceStream {
        self.repository.observe_all(NewsResourceQuery {
            filter_topic_ids,
            filter_news_ids,
        })
    }

    pub fn observe_followed_user_news_resources(&self) -> UserNewsResourceStream {
        self.repository.observe_all_for_followed_topics()
    }

    pub fn observe_bookmarked_user_news_resources(&self) -> UserNewsResourceStream {
        self.repository.observe_all_bookmarked()
    }

    /// 用户偏好（关注、收藏、已读、引导页）
    pub fn user_data_store(&self) -> &Arc<UserDataStore> {
        &self.user_data
    }

    pub fn user_data(&self) -> UserData {
        self.user_data.user_data()
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.ensure_running()?;
        self.store.topics().await
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shutting_down() {
            return Err(NiaSyncError::ShuttingDown("nia-sync 已关闭".to_string()));
        }
        Ok(())
    }

    /// 释放共享流、刷盘并停止数据库线程
    pub async fn shutdown(&self) -> Result<()> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("正在关闭 nia-sync...");
        self.repository.shutdown();
        self.kv.flush().await?;
        self.store.shutdown();
        info!("nia-sync 关闭完成");
        Ok(())
    }
}
