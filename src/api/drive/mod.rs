pub mod client;
pub mod fetch;
pub mod folder;
pub mod models;
pub mod upload;

pub use client::{build_client, DriveEndpoints};
pub use fetch::Fetcher;
pub use folder::FolderResolver;
pub use models::{
    FolderHandle, ProgressSink, ProgressTick, RunStage, SourceFile, UploadOutcome, UploadPhase,
    UploadSession,
};
pub use upload::ResumableUploader;

/// Drive v2 元数据接口。
pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v2/files";
/// Drive v2 可续传上传入口。
pub const DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v2/files?uploadType=resumable";
/// Drive 用来标记“文件夹”的 mimeType。
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// 两个上传阶段以及元数据接口期望的成功状态码。
pub const EXPECTED_STATUS: u16 = 200;
