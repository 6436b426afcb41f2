//! 共享流水线 - 多订阅者共用一个上游订阅
//!
//! - 首个订阅者到来时启动生产任务，之后的订阅者直接复用（watch 通道回放最新值）
//! - 最后一个订阅者离开后保留 `stop_timeout`，期间重新订阅不会重启上游
//! - 超时后中止生产任务（上游订阅随之释放），下一个订阅者重新启动

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{NiaSyncError, Result};

/// 生产者：拿到发送端后持续发布，直到上游结束
pub type Producer<T> = Box<dyn Fn(watch::Sender<T>) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct SharedPipeline<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    name: &'static str,
    producer: Producer<T>,
    stop_timeout: Duration,
    runtime: Handle,
    state: Mutex<State<T>>,
}

enum State<T> {
    Idle { next_generation: u64 },
    Running(Running<T>),
}

struct Running<T> {
    generation: u64,
    rx: watch::Receiver<T>,
    subscribers: usize,
    task: JoinHandle<()>,
    teardown: Option<JoinHandle<()>>,
}

impl<T> SharedPipeline<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// 需在 tokio runtime 内调用（记录 runtime 句柄供 drop 时调度回收）
    pub fn new(name: &'static str, stop_timeout: Duration, producer: Producer<T>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| NiaSyncError::NotInitialized(format!("共享流需要 tokio runtime: {}", e)))?;
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                producer,
                stop_timeout,
                runtime,
                state: Mutex::new(State::Idle { next_generation: 0 }),
            }),
        })
    }

    /// 订阅；返回的句柄 drop 时释放引用
    pub fn subscribe(&self) -> Subscription<T> {
        let mut state = self.inner.state.lock();

        if let State::Running(running) = &mut *state {
            // 上游已结束（发送端关闭）时重新启动
            if !running.task.is_finished() {
                if let Some(teardown) = running.teardown.take() {
                    debug!("[{}] 宽限期内重新订阅，复用流水线", self.inner.name);
                    teardown.abort();
                }
                running.subscribers += 1;
                return Subscription {
                    rx: running.rx.clone(),
                    generation: running.generation,
                    inner: self.inner.clone(),
                };
            }
        }

        let generation = match &*state {
            State::Idle { next_generation } => *next_generation,
            State::Running(running) => {
                running.task.abort();
                if let Some(teardown) = &running.teardown {
                    teardown.abort();
                }
                running.generation + 1
            }
        };

        let (tx, rx) = watch::channel(T::default());
        let task = self.inner.runtime.spawn((self.inner.producer)(tx));
        debug!("[{}] 启动流水线 generation={}", self.inner.name, generation);
        *state = State::Running(Running {
            generation,
            rx: rx.clone(),
            subscribers: 1,
            task,
            teardown: None,
        });

        Subscription {
            rx,
            generation,
            inner: self.inner.clone(),
        }
    }

    /// 当前订阅者数量（Idle 时为 0）
    pub fn subscriber_count(&self) -> usize {
        match &*self.inner.state.lock() {
            State::Idle { .. } => 0,
            State::Running(running) => running.subscribers,
        }
    }

    /// 生产任务是否仍在运行（包括宽限期内）
    pub fn is_running(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Running(running) if !running.task.is_finished())
    }

    /// 立即停止（忽略宽限期）
    pub fn stop(&self) {
        self.inner.stop_if(|_| true);
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn release(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        let State::Running(running) = &mut *state else {
            return;
        };
        if running.generation != generation {
            return;
        }
        running.subscribers = running.subscribers.saturating_sub(1);
        if running.subscribers > 0 {
            return;
        }

        if self.stop_timeout.is_zero() {
            drop(state);
            self.stop_if(|running| running.generation == generation && running.subscribers == 0);
            return;
        }

        let inner = Arc::clone(self);
        let timeout = self.stop_timeout;
        running.teardown = Some(self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            inner.stop_if(|running| running.generation == generation && running.subscribers == 0);
        }));
    }

    fn stop_if(&self, should_stop: impl FnOnce(&Running<T>) -> bool) {
        let mut state = self.state.lock();
        let State::Running(running) = &*state else {
            return;
        };
        if !should_stop(running) {
            return;
        }
        running.task.abort();
        let next_generation = running.generation + 1;
        debug!("[{}] 流水线已停止 generation={}", self.name, running.generation);
        *state = State::Idle { next_generation };
    }
}

/// 单个订阅者持有的句柄
pub struct Subscription<T: Send + Sync + 'static> {
    rx: watch::Receiver<T>,
    generation: u64,
    inner: Arc<Inner<T>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn receiver(&self) -> &watch::Receiver<T> {
        &self.rx
    }

    pub fn receiver_mut(&mut self) -> &mut watch::Receiver<T> {
        &mut self.rx
    }
}

impl<T: Send + Sync + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.release(self.generation);
    }
}
