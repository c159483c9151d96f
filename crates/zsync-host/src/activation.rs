//! 文档激活信号
//!
//! 宿主的文档激活是异步完成的：请求激活后，依赖新活动文档的
//! 操作必须等激活完成通知，然后立刻注销等待者。这里用按文档
//! 路径键控的一次性 oneshot 信号建模，从不保留长期订阅。

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use zsync_core::identity::normalize_path;

use crate::error::HostError;

/// 激活完成总线
///
/// 宿主适配器在激活完成事件里调用 [`notify`](Self::notify)；
/// 等待方用 [`wait_for`](Self::wait_for) 注册一次性等待者，
/// 触发或超时后等待者一定被移除。
#[derive(Debug, Default)]
pub struct ActivationBus {
    waiters: Mutex<Vec<(String, oneshot::Sender<()>)>>,
}

impl ActivationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 宿主侧：指定文档激活完成
    pub fn notify(&self, document_path: &str) {
        let key = normalize_path(document_path);
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());

        let mut remaining = Vec::with_capacity(waiters.len());
        for (waiter_key, sender) in waiters.drain(..) {
            if waiter_key == key {
                // 接收端可能已超时放弃，发送失败直接丢弃
                let _ = sender.send(());
            } else if !sender.is_closed() {
                remaining.push((waiter_key, sender));
            }
        }
        *waiters = remaining;
    }

    /// 等待指定文档激活完成，超时返回错误
    ///
    /// 无论结果如何，等待者在返回时都已注销。
    pub async fn wait_for(&self, document_path: &str, timeout: Duration) -> Result<(), HostError> {
        let key = normalize_path(document_path);
        let (sender, receiver) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.push((key, sender));
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(())) => Ok(()),
            // 发送端被总线丢弃或超时：等待者已失效，清理后报超时
            _ => {
                self.prune_closed();
                Err(HostError::ActivationTimeout(document_path.to_string()))
            }
        }
    }

    fn prune_closed(&self) {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.retain(|(_, sender)| !sender.is_closed());
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_completes_on_notify() {
        let bus = std::sync::Arc::new(ActivationBus::new());

        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.wait_for("c:/plant.dwg", Duration::from_secs(1)).await
            })
        };

        // 等待者注册后再通知
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.notify(r"C:\Plant.DWG"); // 路径归一化后匹配

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(bus.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_and_deregisters() {
        let bus = ActivationBus::new();
        let result = bus.wait_for("c:/plant.dwg", Duration::from_millis(30)).await;
        assert!(matches!(result, Err(HostError::ActivationTimeout(_))));
        assert_eq!(bus.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_is_one_shot() {
        let bus = std::sync::Arc::new(ActivationBus::new());

        let first = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("c:/a.dwg", Duration::from_secs(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.notify("c:/a.dwg");
        assert!(first.await.unwrap().is_ok());

        // 再次通知不会影响后续无关等待；旧等待者已被移除
        bus.notify("c:/a.dwg");
        let late = bus.wait_for("c:/a.dwg", Duration::from_millis(30)).await;
        assert!(late.is_err());
    }
}
