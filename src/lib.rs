//! 把一个 URL 指向的文件抓下来，再通过可续传上传推进 Google Drive。
//! 进度通过 [`upload_manager::ObserverHandle`] 转发给 UI，UI 断开后改走系统通知。

pub mod api;
pub mod config;
pub mod error;
pub mod messages;
pub mod upload_manager;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::UploadError;
pub use messages::{ChannelEvent, FileRef, InboundCommand, OutcomePayload, ProgressEvent};
pub use upload_manager::{UploadManager, UploadOrchestrator, UploadTicket};
