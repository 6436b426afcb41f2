use thiserror::Error;

/// nia-sync 统一错误类型
///
/// 同步引擎按类别处理错误：`is_fetch_failure()` 与 `is_store_failure()` 都只会让
/// 当前实体类型的同步失败，不会推进游标，也不会向 `sync()` 之外传播。
#[derive(Debug, Error)]
pub enum NiaSyncError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("KV store error: {0}")]
    KvStore(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    IO(String),
    /// 网络请求失败（连接、超时、解码）
    #[error("Network error: {0}")]
    Network(String),
    /// 服务端返回非 2xx
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Not initialized: {0}")]
    NotInitialized(String),
    #[error("Shutting down: {0}")]
    ShuttingDown(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl NiaSyncError {
    /// 拉取 change list 或实体失败（FetchFailure）
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpStatus { .. })
    }

    /// 本地写入失败（StoreFailure）
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Database(_) | Self::KvStore(_) | Self::Migration(_)
        )
    }
}

impl From<serde_json::Error> for NiaSyncError {
    fn from(error: serde_json::Error) -> Self {
        NiaSyncError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for NiaSyncError {
    fn from(error: std::io::Error) -> Self {
        NiaSyncError::IO(error.to_string())
    }
}

impl From<sled::Error> for NiaSyncError {
    fn from(error: sled::Error) -> Self {
        NiaSyncError::KvStore(error.to_string())
    }
}

impl From<reqwest::Error> for NiaSyncError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => NiaSyncError::HttpStatus {
                status: status.as_u16(),
                url: error.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => NiaSyncError::Network(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NiaSyncError>;
