//! 日志初始化
//!
//! `RUST_LOG` 优先；未设置时默认 `nia_sync=info`，调试模式为 `nia_sync=debug`。
//! 宿主已安装全局 subscriber 时不覆盖。

use tracing_subscriber::EnvFilter;

pub fn default_directive(debug_mode: bool) -> &'static str {
    if debug_mode {
        "nia_sync=debug"
    } else {
        "nia_sync=info"
    }
}

/// 安装 fmt subscriber；返回是否由本次调用安装
pub fn init_logging(debug_mode: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_mode)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
