//! watch 通道到 Stream 的适配

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

/// 先发出当前值，之后每次变更发出最新值；发送端关闭后结束。
///
/// 同一轮内多次变更只会看到最后一次（watch 语义）。
pub fn watch_stream<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let value = rx.borrow_and_update().clone();
        Some((value, (rx, false)))
    })
    .boxed()
}
