//! 与 UI 协作方交换的消息格式。
//!
//! 字段命名沿用浏览器扩展时期的 JSON 约定（camelCase + `action` 标签），
//! 这样旧的前端无需改动即可接入。

use crate::api::drive::fetch::{derive_file_name, escape_html};
use crate::api::drive::models::{ProgressTick, UploadOutcome};
use serde::{Deserialize, Serialize};
use url::Url;

pub const SUCCESS_SUFFIX: &str = " has been uploaded to your Drive.";
pub const FAILURE_MESSAGE: &str = "Ouch, an error occurs during the upload :-(";
pub const FAILURE_MESSAGE_HTML: &str = "<strong>Ouch</strong>, an error occurs during the upload :-(";

/// 请求上传的文件引用：展示名 + 源地址。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
}

impl FileRef {
    /// 按源地址的最后一段路径生成文件名，与弹窗里的 basename 行为一致。
    pub fn for_url(url: &Url) -> Self {
        FileRef {
            name: derive_file_name(url),
            path: url.to_string(),
        }
    }
}

/// UI 发来的唯一一种命令。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundCommand {
    PutFileOnGoogleDrive { file: FileRef },
}

impl InboundCommand {
    pub fn file(&self) -> &FileRef {
        match self {
            InboundCommand::PutFileOnGoogleDrive { file } => file,
        }
    }
}

/// 对命令的异步应答。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomePayload {
    pub status: u16,
    pub file: FileRef,
    pub message: String,
    pub message_html: String,
}

impl From<&UploadOutcome> for OutcomePayload {
    fn from(outcome: &UploadOutcome) -> Self {
        OutcomePayload {
            status: outcome.http_status,
            file: outcome.file.clone(),
            message: outcome.message.clone(),
            message_html: outcome.message_html.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl From<ProgressTick> for ProgressEvent {
    fn from(tick: ProgressTick) -> Self {
        ProgressEvent {
            bytes_sent: tick.bytes_sent,
            bytes_total: tick.bytes_total,
        }
    }
}

/// 观察者从进度通道收到的事件。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ChannelEvent {
    #[serde(rename = "updateProgressInformation")]
    Progress(ProgressEvent),
    #[serde(rename = "uploadOutcome")]
    Outcome(OutcomePayload),
}

/// 生成结果提示的纯文本与 HTML 两个版本。
pub fn outcome_messages(succeeded: bool, file_name: &str) -> (String, String) {
    if succeeded {
        (
            format!("{file_name}{SUCCESS_SUFFIX}"),
            format!("<strong>{}</strong>{SUCCESS_SUFFIX}", escape_html(file_name)),
        )
    } else {
        (FAILURE_MESSAGE.to_string(), FAILURE_MESSAGE_HTML.to_string())
    }
}
