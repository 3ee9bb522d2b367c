//! 上传流程中所有可能出现的错误。

use crate::api::drive::models::UploadPhase;

/// 一次上传运行中的错误；每个错误最终都会被折叠成唯一的失败结果。
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("authorization denied: {0}")]
    AuthDenied(String),

    #[error("failed to fetch source{}: {reason}", status_suffix(.status))]
    Fetch { status: Option<u16>, reason: String },

    #[error("failed to resolve destination folder{}: {reason}", status_suffix(.status))]
    FolderResolution { status: Option<u16>, reason: String },

    #[error("{phase} phase failed{}: {reason}", status_suffix(.status))]
    UploadPhase {
        phase: UploadPhase,
        status: Option<u16>,
        reason: String,
    },

    #[error("upload session response carried no usable Location header")]
    MissingLocation,

    #[error("unexpected {context} response: {source}")]
    Schema {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl UploadError {
    /// 该错误对应的 HTTP 状态码；没有收到 HTTP 响应时为 0。
    pub fn http_status(&self) -> u16 {
        match self {
            UploadError::Fetch { status, .. }
            | UploadError::FolderResolution { status, .. }
            | UploadError::UploadPhase { status, .. } => status.unwrap_or(0),
            _ => 0,
        }
    }

    pub(crate) fn fetch_transport(err: reqwest::Error) -> Self {
        UploadError::Fetch {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }

    pub(crate) fn folder_transport(err: reqwest::Error) -> Self {
        UploadError::FolderResolution {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }

    pub(crate) fn phase_transport(phase: UploadPhase, err: reqwest::Error) -> Self {
        UploadError::UploadPhase {
            phase,
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (HTTP {code})"))
        .unwrap_or_default()
}
