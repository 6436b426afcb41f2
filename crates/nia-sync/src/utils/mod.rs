//! 通用工具

pub mod stream;

pub use stream::watch_stream;
