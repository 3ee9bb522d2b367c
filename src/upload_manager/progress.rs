//! 进度通道：把进度与最终结果转发给当前挂载的观察者。
//!
//! 观察者一旦断开，通道永久切换到被动通知模式：之后的进度直接丢弃，
//! 最终结果改用自动消失的系统通知展示。重新连接不会切回直接转发。

use super::notify::{Notification, Notifier};
use crate::api::drive::models::{ProgressTick, UploadOutcome};
use crate::messages::{ChannelEvent, OutcomePayload};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tracing::{debug, trace, warn};

pub const DEFAULT_PROGRESS_CAPACITY: usize = 64;
pub const DEFAULT_NOTIFICATION_DISMISS: Duration = Duration::from_millis(7500);
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Drive Uploader";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Direct,
    Fallback,
}

/// 观察者挂载标记，只能从挂载单向变为断开。
///
/// 直接转发必须在持有 `mode` 锁时完成，`detach` 也要拿同一把锁，
/// 因此 `detach` 返回之后不会再有任何事件进入观察者队列。
#[derive(Clone, Debug)]
pub struct Attachment {
    state: Arc<AttachmentState>,
}

#[derive(Debug)]
struct AttachmentState {
    mode: Mutex<DeliveryMode>,
    /// 只用来唤醒等待中的 `finish`。
    detached: watch::Sender<bool>,
}

impl Default for Attachment {
    fn default() -> Self {
        Self::new()
    }
}

impl Attachment {
    pub fn new() -> Self {
        let (detached, _rx) = watch::channel(false);
        Attachment {
            state: Arc::new(AttachmentState {
                mode: Mutex::new(DeliveryMode::Direct),
                detached,
            }),
        }
    }

    pub fn detach(&self) {
        let previous = {
            let mut mode = self.lock_mode();
            std::mem::replace(&mut *mode, DeliveryMode::Fallback)
        };
        if previous == DeliveryMode::Direct {
            debug!("observer detached; switching to notification delivery");
        }
        self.state.detached.send_replace(true);
    }

    pub fn mode(&self) -> DeliveryMode {
        *self.lock_mode()
    }

    /// 仍处于挂载状态时在锁内执行 `relay`；已断开则返回 None。
    fn relay_if_attached<R>(&self, relay: impl FnOnce() -> R) -> Option<R> {
        let mode = self.lock_mode();
        match *mode {
            DeliveryMode::Direct => Some(relay()),
            DeliveryMode::Fallback => None,
        }
    }

    fn lock_mode(&self) -> std::sync::MutexGuard<'_, DeliveryMode> {
        self.state.mode.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn wait_detached(&self) {
        let mut rx = self.state.detached.subscribe();
        // Sender 由自身持有，wait_for 不会因通道关闭而返回错误。
        let _ = rx.wait_for(|detached| *detached).await;
    }
}

#[derive(Clone, Debug)]
pub struct ChannelSettings {
    pub capacity: usize,
    pub dismiss_after: Duration,
    pub title: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        ChannelSettings {
            capacity: DEFAULT_PROGRESS_CAPACITY,
            dismiss_after: DEFAULT_NOTIFICATION_DISMISS,
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
        }
    }
}

/// 上传端持有的一侧。
pub struct ProgressChannel {
    sender: mpsc::Sender<ChannelEvent>,
    attachment: Attachment,
    notifier: Arc<dyn Notifier>,
    dismiss_after: Duration,
    title: String,
    last_tick: Mutex<Option<ProgressTick>>,
    finished: AtomicBool,
}

/// 观察者（UI）持有的一侧；drop 即视为断开。
pub struct ObserverHandle {
    events: mpsc::Receiver<ChannelEvent>,
    attachment: Attachment,
}

/// 创建一对进度通道端点。
pub fn progress_channel(
    settings: ChannelSettings,
    notifier: Arc<dyn Notifier>,
) -> (ProgressChannel, ObserverHandle) {
    let (sender, events) = mpsc::channel(settings.capacity.max(1));
    let attachment = Attachment::new();
    let channel = ProgressChannel {
        sender,
        attachment: attachment.clone(),
        notifier,
        dismiss_after: settings.dismiss_after,
        title: settings.title,
        last_tick: Mutex::new(None),
        finished: AtomicBool::new(false),
    };
    (channel, ObserverHandle { events, attachment })
}

impl ProgressChannel {
    pub fn mode(&self) -> DeliveryMode {
        self.attachment.mode()
    }

    /// 转发一次进度。观察者处理不过来时丢弃该次进度，顺序不受影响。
    pub fn tick(&self, tick: ProgressTick) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        if !self.admit(tick) {
            return;
        }
        let sent = self
            .attachment
            .relay_if_attached(|| self.sender.try_send(ChannelEvent::Progress(tick.into())));
        match sent {
            None => {
                trace!(
                    sent = tick.bytes_sent,
                    total = tick.bytes_total,
                    "progress dropped in fallback mode"
                );
            }
            Some(Ok(())) => {}
            Some(Err(TrySendError::Full(_))) => {
                trace!(sent = tick.bytes_sent, "observer lagging; progress tick dropped");
            }
            Some(Err(TrySendError::Closed(_))) => self.attachment.detach(),
        }
    }

    /// 交付最终结果，每个通道只会成功一次；重复调用返回 None。
    ///
    /// 先等到队列有空位，再在挂载锁内提交；等待期间断开则改走通知。
    pub async fn finish(&self, outcome: &UploadOutcome) -> Option<DeliveryMode> {
        if self.finished.swap(true, Ordering::SeqCst) {
            warn!("outcome already delivered; ignoring duplicate");
            return None;
        }

        if self.mode() == DeliveryMode::Direct {
            let permit = tokio::select! {
                biased;
                _ = self.attachment.wait_detached() => None,
                permit = self.sender.reserve() => permit.ok(),
            };
            if let Some(permit) = permit {
                let event = ChannelEvent::Outcome(OutcomePayload::from(outcome));
                if self
                    .attachment
                    .relay_if_attached(move || permit.send(event))
                    .is_some()
                {
                    return Some(DeliveryMode::Direct);
                }
            } else {
                self.attachment.detach();
            }
        }

        self.notify(outcome);
        Some(DeliveryMode::Fallback)
    }

    /// 同一阶段内拒绝回退或越界的进度。
    fn admit(&self, tick: ProgressTick) -> bool {
        if tick.bytes_sent > tick.bytes_total {
            return false;
        }
        let mut last = self.last_tick.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = *last {
            if prev.phase == tick.phase && tick.bytes_sent < prev.bytes_sent {
                return false;
            }
        }
        *last = Some(tick);
        true
    }

    fn notify(&self, outcome: &UploadOutcome) {
        let notification = Notification {
            title: self.title.clone(),
            message: outcome.message.clone(),
            message_html: outcome.message_html.clone(),
        };
        let id = self.notifier.show(&notification);
        let notifier = Arc::clone(&self.notifier);
        let dismiss_after = self.dismiss_after;
        tokio::spawn(async move {
            tokio::time::sleep(dismiss_after).await;
            notifier.dismiss(id);
        });
    }
}

impl ObserverHandle {
    /// 等待下一条事件；上传端结束后返回 None。
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    /// 供 UI 在别处（例如窗口关闭回调）标记断开。
    pub fn attachment(&self) -> Attachment {
        self.attachment.clone()
    }

    pub fn detach(self) {}
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.attachment.detach();
    }
}
