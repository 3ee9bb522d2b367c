use crate::api::auth::TokenProvider;
use crate::api::drive::fetch::{derive_file_name, escape_html};
use crate::api::drive::{
    DriveEndpoints, Fetcher, FolderHandle, FolderResolver, ProgressSink, ResumableUploader,
    RunStage, UploadOutcome,
};
use crate::config::Config;
use crate::error::UploadError;
use crate::messages::{outcome_messages, FileRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

/// 串起 鉴权 → 抓取 → 解析文件夹 → 上传 的完整流程。
/// 每次 `run` 相互独立，互不协调；任何一步失败都折叠为唯一的失败结果。
pub struct UploadOrchestrator {
    tokens: Arc<dyn TokenProvider>,
    fetcher: Fetcher,
    folders: FolderResolver,
    uploader: ResumableUploader,
    folder_name: Option<String>,
}

impl UploadOrchestrator {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        fetcher: Fetcher,
        folders: FolderResolver,
        uploader: ResumableUploader,
        folder_name: Option<String>,
    ) -> Self {
        UploadOrchestrator {
            tokens,
            fetcher,
            folders,
            uploader,
            folder_name: folder_name.filter(|name| !name.trim().is_empty()),
        }
    }

    pub fn from_config(config: &Config, tokens: Arc<dyn TokenProvider>) -> Result<Self, UploadError> {
        let endpoints = DriveEndpoints::parse(&config.api_url, &config.upload_url)?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let transfer_timeout = Duration::from_secs(config.transfer_timeout_secs);
        Ok(Self::new(
            tokens,
            Fetcher::new(transfer_timeout)?,
            FolderResolver::new(endpoints.api_url, request_timeout)?,
            ResumableUploader::new(endpoints.upload_url, transfer_timeout)?,
            config.folder_name.clone(),
        ))
    }

    /// 执行一次完整上传，恰好返回一个结果；本身不会失败。
    pub async fn run(&self, file: FileRef, progress: ProgressSink) -> UploadOutcome {
        let span = info_span!("upload_run", run_id = %Uuid::new_v4(), url = %file.path);
        async move {
            let file = with_display_name(file);
            let mut stage = RunStage::Init;
            match self.execute(&file, progress, &mut stage).await {
                Ok(status) => {
                    let (message, message_html) = outcome_messages(true, &file.name);
                    info!(file = %file.name, status, "upload finished");
                    UploadOutcome {
                        succeeded: true,
                        http_status: status,
                        file,
                        message,
                        message_html,
                        stage: RunStage::Done,
                    }
                }
                Err(err) => {
                    let (message, message_html) = outcome_messages(false, &file.name);
                    warn!(error = %err, stage = %stage, "upload failed");
                    UploadOutcome {
                        succeeded: false,
                        http_status: err.http_status(),
                        file,
                        message,
                        message_html,
                        stage,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        file: &FileRef,
        progress: ProgressSink,
        stage: &mut RunStage,
    ) -> Result<u16, UploadError> {
        let source_url = Url::parse(file.path.trim())?;

        let credential = self.tokens.get_token(true).await?;
        advance(stage, RunStage::Authenticated);

        let mut source = self.fetcher.fetch(&source_url).await?;
        if source.name != file.name {
            source.name_html = escape_html(&file.name);
            source.name = file.name.clone();
        }
        advance(stage, RunStage::Fetched);

        let folder: Option<FolderHandle> = match &self.folder_name {
            Some(name) => Some(self.folders.resolve(name, &credential).await?),
            None => None,
        };
        advance(stage, RunStage::FolderResolved);

        let session = self
            .uploader
            .initiate(&source, folder.as_ref(), &credential, progress.clone())
            .await?;
        advance(stage, RunStage::SessionOpened);

        advance(stage, RunStage::Streaming);
        let receipt = self
            .uploader
            .stream(session, &source, &credential, progress)
            .await?;
        Ok(receipt.status)
    }
}

/// 命令没带文件名时，按源地址的最后一段路径补上。
fn with_display_name(mut file: FileRef) -> FileRef {
    if file.name.trim().is_empty() {
        if let Ok(url) = Url::parse(file.path.trim()) {
            file.name = derive_file_name(&url);
        }
    }
    file
}

fn advance(stage: &mut RunStage, next: RunStage) {
    debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
}
