//! 网络数据源 - change list 与实体拉取
//!
//! 同步引擎只依赖 [`NiaNetworkDataSource`] trait：
//! - `HttpNiaNetwork`: reqwest 实现，对接 NiA 后端 REST/JSON 接口
//! - `DemoNiaNetwork`: 静态 JSON 数据源（演示与测试用）

use async_trait::async_trait;

use crate::error::Result;
use crate::sync::SyncEntityType;

pub mod demo;
pub mod http;
pub mod model;

pub use demo::DemoNiaNetwork;
pub use http::HttpNiaNetwork;
pub use model::{
    ChangeList, EntityBatch, NetworkAuthor, NetworkChangeList, NetworkNewsResource, NetworkTopic,
};

/// 远端数据源（ChangeListFetcher + EntityFetcher）
#[async_trait]
pub trait NiaNetworkDataSource: Send + Sync {
    /// 拉取 `after` 之后的 change list 以及最新版本号
    async fn fetch_change_list(&self, entity_type: SyncEntityType, after: i64) -> Result<ChangeList>;

    /// 按 id 拉取完整实体；返回数量可能少于请求数量（服务端遗漏不视为错误）
    async fn fetch_entities(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<EntityBatch>;
}
