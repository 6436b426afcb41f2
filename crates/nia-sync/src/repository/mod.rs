//! 读取侧仓库 - 把本地新闻与用户状态合并为 UserNewsResource 实时流
//!
//! 上游只依赖两个可订阅的数据源 trait，具体实现见 `storage`。

use futures::stream::BoxStream;

use crate::model::{NewsResource, NewsResourceQuery, UserData};

pub mod share;
pub mod user_news;

pub use share::{Producer, SharedPipeline, Subscription};
pub use user_news::{CompositeUserNewsResourceRepository, NewsSnapshot, UserNewsResourceStream};

/// 新闻查询的加载状态
#[derive(Debug, Clone, PartialEq)]
pub enum NewsLoad {
    /// 尚未读到本地数据
    Loading,
    /// 一次真实的查询结果，空列表表示确实没有数据
    Loaded(Vec<NewsResource>),
}

/// 本地新闻实时查询
pub trait NewsResourceSource: Send + Sync {
    /// 先发出当前结果，之后每次本地数据变化都发出完整的新结果
    fn observe_news_resources(&self, query: NewsResourceQuery) -> BoxStream<'static, NewsLoad>;
}

/// 用户状态实时流
pub trait UserDataSource: Send + Sync {
    /// 先发出当前值，之后每次修改发出新值
    fn observe_user_data(&self) -> BoxStream<'static, UserData>;
}
