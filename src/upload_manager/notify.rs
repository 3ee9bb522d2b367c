//! 观察者断开后使用的被动通知。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// 一条自动消失的系统通知。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub message_html: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

/// 系统通知能力；具体平台的实现通过该 trait 接入。
pub trait Notifier: Send + Sync {
    fn show(&self, notification: &Notification) -> NotificationId;
    fn dismiss(&self, id: NotificationId);
}

/// 默认实现：把通知写成结构化日志。
#[derive(Default)]
pub struct TracingNotifier {
    next_id: AtomicU64,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for TracingNotifier {
    fn show(&self, notification: &Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            target: "drivedrop::notification",
            id = id.0,
            title = %notification.title,
            "{}",
            notification.message
        );
        id
    }

    fn dismiss(&self, id: NotificationId) {
        info!(target: "drivedrop::notification", id = id.0, "notification dismissed");
    }
}
