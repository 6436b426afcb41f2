//! HTTP 数据源 - 对接 NiA 后端 REST/JSON 接口
//!
//! 接口约定：
//! - `GET {base}/{topics|authors|newsresources}?id=..&id=..` 返回 `{"data": [...]}`
//! - `GET {base}/changelists/{topics|authors|newsresources}?after=N` 返回 change list 数组

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info};

use super::model::{
    ChangeList, EntityBatch, NetworkAuthor, NetworkChangeList, NetworkNewsResource, NetworkTopic,
};
use super::NiaNetworkDataSource;
use crate::config::HttpClientConfig;
use crate::error::{NiaSyncError, Result};
use crate::sync::SyncEntityType;

/// 实体接口的外层包装
#[derive(Debug, Deserialize)]
struct NetworkResponse<T> {
    data: T,
}

/// reqwest 实现的远端数据源
pub struct HttpNiaNetwork {
    client: Client,
    base_url: String,
}

impl HttpNiaNetwork {
    /// 创建新的 HTTP 数据源
    pub fn new(config: &HttpClientConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| NiaSyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("✅ HTTP 数据源已创建 (base_url: {})", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 实体请求；每个 id 作为一个 `id` 查询参数
    fn entities_request(&self, entity_type: SyncEntityType, ids: &[String]) -> RequestBuilder {
        let pairs: Vec<(&str, &str)> = ids.iter().map(|id| ("id", id.as_str())).collect();
        self.client
            .get(format!("{}/{}", self.base_url, entity_type.api_path()))
            .query(&pairs)
    }

    fn change_list_request(&self, entity_type: SyncEntityType, after: i64) -> RequestBuilder {
        self.client
            .get(format!("{}/changelists/{}", self.base_url, entity_type.api_path()))
            .query(&[("after", after)])
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = request
            .build()
            .map_err(|e| NiaSyncError::Network(format!("构建请求失败: {}", e)))?;
        let url = request.url().to_string();
        debug!("GET {}", url);
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| NiaSyncError::Network(format!("请求失败 {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ 请求失败，HTTP 状态码: {}, url: {}", status, url);
            return Err(NiaSyncError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NiaSyncError::Network(format!("解析响应失败 {}: {}", url, e)))
    }
}

#[async_trait]
impl NiaNetworkDataSource for HttpNiaNetwork {
    async fn fetch_change_list(&self, entity_type: SyncEntityType, after: i64) -> Result<ChangeList> {
        let request = self.change_list_request(entity_type, after);
        let items: Vec<NetworkChangeList> = self.get_json(request).await?;
        Ok(ChangeList::from_items(items, after))
    }

    async fn fetch_entities(&self, entity_type: SyncEntityType, ids: &[String]) -> Result<EntityBatch> {
        if ids.is_empty() {
            return Ok(EntityBatch::empty(entity_type));
        }
        let request = self.entities_request(entity_type, ids);
        let batch = match entity_type {
            SyncEntityType::Topic => {
                let resp: NetworkResponse<Vec<NetworkTopic>> = self.get_json(request).await?;
                EntityBatch::Topics(resp.data)
            }
            SyncEntityType::Author => {
                let resp: NetworkResponse<Vec<NetworkAuthor>> = self.get_json(request).await?;
                EntityBatch::Authors(resp.data)
            }
            SyncEntityType::NewsResource => {
                let resp: NetworkResponse<Vec<NetworkNewsResource>> = self.get_json(request).await?;
                EntityBatch::NewsResources(resp.data)
            }
        };
        Ok(batch)
    }
}
