//! 领域模型 - 外部数据层表示
//!
//! - `news`: Topic / Author / NewsResource 以及查询条件
//! - `user`: UserData 与派生的 UserNewsResource（只读投影，不落库）

mod news;
mod user;

pub use news::{Author, NewsResource, NewsResourceQuery, NewsResourceType, Topic};
pub use user::{FollowableTopic, UserData, UserNewsResource};
