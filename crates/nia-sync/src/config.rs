//! 配置 - NiaSyncConfig 与 builder

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NiaSyncError, Result};
use crate::sync::SyncEntityType;

/// 新闻批量拉取大小（兼顾客户端与服务端序列化开销的经验值）
pub const DEFAULT_NEWS_BATCH_SIZE: usize = 40;

/// 共享流在最后一个订阅者离开后的保活时间
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NiaSyncConfig {
    /// 数据存储目录（{data_dir}/nia.db 与 {data_dir}/kv）
    pub data_dir: PathBuf,
    /// 后端基础 URL；None 时使用内置 demo 数据源
    pub server_url: Option<String>,
    /// HTTP 客户端配置
    #[serde(default)]
    pub http_client_config: HttpClientConfig,
    /// 同步配置
    #[serde(default)]
    pub sync_config: SyncConfig,
    /// 共享流配置
    #[serde(default)]
    pub share_config: ShareConfig,
    /// 调试模式（日志级别 debug）
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for NiaSyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./nia_data"),
            server_url: None,
            http_client_config: HttpClientConfig::default(),
            sync_config: SyncConfig::default(),
            share_config: ShareConfig::default(),
            debug_mode: false,
        }
    }
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
        }
    }
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 新闻按批拉取与写入的大小
    pub news_batch_size: usize,
    /// 参与 `sync()` 的实体类型
    pub entity_types: Vec<SyncEntityType>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            news_batch_size: DEFAULT_NEWS_BATCH_SIZE,
            entity_types: SyncEntityType::ALL.to_vec(),
        }
    }
}

/// 共享流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// 最后一个订阅者离开后保持上游订阅的毫秒数
    pub stop_timeout_ms: u64,
}

impl ShareConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl NiaSyncConfig {
    pub fn builder() -> NiaSyncConfigBuilder {
        NiaSyncConfigBuilder::new()
    }

    /// 从 JSON 文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NiaSyncError::Config(format!("读取配置文件失败: {}", e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| NiaSyncError::Config(format!("解析配置文件失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync_config.news_batch_size == 0 {
            return Err(NiaSyncError::Config("news_batch_size 必须大于 0".to_string()));
        }
        let entity_types = &self.sync_config.entity_types;
        if SyncEntityType::unique(entity_types.iter().copied()).len() != entity_types.len() {
            return Err(NiaSyncError::Config(format!("entity_types 不能重复: {:?}", entity_types)));
        }
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(NiaSyncError::Config(format!("server_url 必须是 http(s) 地址: {}", url)));
            }
        }
        Ok(())
    }
}

pub struct NiaSyncConfigBuilder {
    config: NiaSyncConfig,
}

impl Default for NiaSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NiaSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: NiaSyncConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn news_batch_size(mut self, size: usize) -> Self {
        self.config.sync_config.news_batch_size = size;
        self
    }

    /// 重复的类型只保留一次
    pub fn entity_types<I: IntoIterator<Item = SyncEntityType>>(mut self, types: I) -> Self {
        self.config.sync_config.entity_types = SyncEntityType::unique(types);
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.share_config.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> NiaSyncConfig {
        self.config
    }
}
