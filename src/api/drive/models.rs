use crate::messages::FileRef;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// 从源地址抓取到内存中的文件，上传器只消费一次。
#[derive(Clone)]
pub struct SourceFile {
    pub name: String,
    /// 已做 HTML 转义的文件名，只用于拼接富文本提示。
    pub name_html: String,
    pub path: Url,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceFile {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("path", &self.path.as_str())
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// 目标文件夹的标识，在一次运行内一经解析即视为权威值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderHandle {
    pub id: String,
}

/// 第一阶段返回的上传会话；只能被 stream 阶段消费一次。
#[derive(Debug)]
pub struct UploadSession {
    pub resumable_endpoint: Url,
    pub content_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UploadPhase {
    Initiate,
    Stream,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Initiate => f.write_str("initiate"),
            UploadPhase::Stream => f.write_str("stream"),
        }
    }
}

/// 单次网络请求的传输进度。同一阶段内 bytes_sent 单调不减且不超过 bytes_total。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressTick {
    pub phase: UploadPhase,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

/// 进度回调；会在传输层线程/任务中同步调用，必须足够轻量。
pub type ProgressSink = Arc<dyn Fn(ProgressTick) + Send + Sync>;

/// 一次运行经过的阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStage {
    Init,
    Authenticated,
    Fetched,
    FolderResolved,
    SessionOpened,
    Streaming,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::Init => "init",
            RunStage::Authenticated => "authenticated",
            RunStage::Fetched => "fetched",
            RunStage::FolderResolved => "folder-resolved",
            RunStage::SessionOpened => "session-opened",
            RunStage::Streaming => "streaming",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// 运行的终态结果，每次运行恰好产生一个。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub succeeded: bool,
    pub http_status: u16,
    pub file: FileRef,
    pub message: String,
    pub message_html: String,
    /// 成功时为 Done；失败时为出错前最后到达的阶段。
    pub stage: RunStage,
}
