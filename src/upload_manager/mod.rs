pub mod core;
pub mod notify;
pub mod orchestrator;
pub mod progress;

pub use core::{UploadManager, UploadTicket};
pub use notify::{Notification, NotificationId, Notifier, TracingNotifier};
pub use orchestrator::UploadOrchestrator;
pub use progress::{
    progress_channel, Attachment, ChannelSettings, DeliveryMode, ObserverHandle, ProgressChannel,
};
