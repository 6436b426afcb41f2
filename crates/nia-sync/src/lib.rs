//! nia-sync - 离线优先的新闻数据同步核心
//!
//! 本 crate 提供：
//! - 🔄 基于 change list + 版本游标的增量同步（话题、作者、新闻）
//! - 💾 本地缓存：SQLite（DB Actor 线程 + refinery 迁移）与 sled 键值存储
//! - 📡 可实时订阅的 UserNewsResource 视图（多订阅者共享一个上游，晚到者回放最新值）
//! - 🔔 新内容通知（已关注话题）
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use nia_sync::{NiaSync, NiaSyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NiaSyncConfig::builder()
//!         .data_dir("/path/to/data")
//!         .server_url("https://nia.example.com")
//!         .build();
//!
//!     let sdk = NiaSync::initialize(config).await?;
//!
//!     // 由外部调度器决定何时调用、失败后何时重试
//!     let ok = sdk.sync().await;
//!     println!("同步结果: {}", ok);
//!
//!     let mut news = sdk.observe_user_news_resources(None, None);
//!     if let Some(list) = news.next().await {
//!         println!("共 {} 条新闻", list.len());
//!     }
//!
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod network;
pub mod repository;
pub mod sdk;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出核心类型，方便使用
pub use config::{HttpClientConfig, NiaSyncConfig, NiaSyncConfigBuilder, ShareConfig, SyncConfig};
pub use error::{NiaSyncError, Result};
pub use model::{
    Author, FollowableTopic, NewsResource, NewsResourceQuery, NewsResourceType, Topic, UserData,
    UserNewsResource,
};
pub use network::{DemoNiaNetwork, HttpNiaNetwork, NiaNetworkDataSource};
pub use repository::{
    CompositeUserNewsResourceRepository, NewsLoad, NewsResourceSource, UserDataSource,
    UserNewsResourceStream,
};
pub use sdk::NiaSync;
pub use storage::{KvStore, LocalStore, SqliteNewsStore, UserDataStore};
pub use sync::{
    ChangeListVersions, EntitySyncEngine, LoggingNotifier, Notifier, SyncCursorStore,
    SyncEntityType, SyncOrchestrator,
};
pub use version::{BUILD_TIME, SDK_DB_VERSION, SDK_VERSION};
