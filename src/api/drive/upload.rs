use super::{
    client::build_client,
    folder::ParentRefDto,
    models::{FolderHandle, ProgressSink, ProgressTick, SourceFile, UploadPhase, UploadSession},
    EXPECTED_STATUS,
};
use crate::api::auth::Credential;
use crate::error::UploadError;
use futures_util::{stream, StreamExt};
use reqwest::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    Body, Client,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// 每次交给传输层的块大小，也就是进度回调的粒度。
const STREAM_CHUNK_BYTES: usize = 64 * 1024;
const METADATA_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// 两阶段可续传上传：先用元数据换会话地址，再把文件字节推到会话地址。
/// 两个阶段都不重试；任一阶段状态码不是 200 即视为失败。
#[derive(Clone)]
pub struct ResumableUploader {
    http: Client,
    upload_url: Url,
}

/// stream 阶段结束时的回执。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamReceipt {
    pub status: u16,
    pub bytes_sent: u64,
}

impl ResumableUploader {
    pub fn new(upload_url: Url, timeout: Duration) -> Result<Self, UploadError> {
        Ok(ResumableUploader {
            http: build_client(timeout)?,
            upload_url,
        })
    }

    pub fn with_client(http: Client, upload_url: Url) -> Self {
        ResumableUploader { http, upload_url }
    }

    /// 依次执行 initiate 与 stream。初始化失败时直接返回，不会进入第二阶段。
    pub async fn upload(
        &self,
        file: &SourceFile,
        folder: Option<&FolderHandle>,
        credential: &Credential,
        progress: ProgressSink,
    ) -> Result<StreamReceipt, UploadError> {
        let session = self
            .initiate(file, folder, credential, progress.clone())
            .await?;
        self.stream(session, file, credential, progress).await
    }

    /// 第一阶段：提交标题与父目录，返回响应头 Location 指向的会话。
    pub async fn initiate(
        &self,
        file: &SourceFile,
        folder: Option<&FolderHandle>,
        credential: &Credential,
        progress: ProgressSink,
    ) -> Result<UploadSession, UploadError> {
        let metadata = SessionMetadata::new(&file.name, folder);
        let payload = serde_json::to_vec(&metadata).map_err(|source| UploadError::Schema {
            context: "session metadata",
            source,
        })?;
        let payload_len = payload.len();

        let response = self
            .http
            .post(self.upload_url.clone())
            .bearer_auth(credential.secret())
            .header(CONTENT_TYPE, METADATA_CONTENT_TYPE)
            .header(CONTENT_LENGTH, payload_len)
            .header("X-Upload-Content-Type", file.mime_type.as_str())
            .header("X-Upload-Content-Length", file.len())
            .body(progress_body(payload, UploadPhase::Initiate, progress))
            .send()
            .await
            .map_err(|e| UploadError::phase_transport(UploadPhase::Initiate, e))?;

        let status = response.status().as_u16();
        if status != EXPECTED_STATUS {
            warn!(status, file = %file.name, "upload session initiation rejected");
            return Err(UploadError::UploadPhase {
                phase: UploadPhase::Initiate,
                status: Some(status),
                reason: format!("upload endpoint returned HTTP {status}"),
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Url::parse(value.trim()).ok())
            .ok_or(UploadError::MissingLocation)?;

        debug!(session = %location, "upload session opened");
        Ok(UploadSession {
            resumable_endpoint: location,
            content_type: file.mime_type.clone(),
        })
    }

    /// 第二阶段：把文件字节推到会话地址。会话按值传入，用完即弃。
    pub async fn stream(
        &self,
        session: UploadSession,
        file: &SourceFile,
        credential: &Credential,
        progress: ProgressSink,
    ) -> Result<StreamReceipt, UploadError> {
        let total_len = file.len();
        let response = self
            .http
            .post(session.resumable_endpoint)
            .bearer_auth(credential.secret())
            .header(CONTENT_TYPE, session.content_type.as_str())
            .header(CONTENT_LENGTH, total_len)
            .body(progress_body(file.bytes.clone(), UploadPhase::Stream, progress))
            .send()
            .await
            .map_err(|e| UploadError::phase_transport(UploadPhase::Stream, e))?;

        let status = response.status().as_u16();
        if status != EXPECTED_STATUS {
            warn!(status, file = %file.name, "upload stream rejected");
            return Err(UploadError::UploadPhase {
                phase: UploadPhase::Stream,
                status: Some(status),
                reason: format!("session endpoint returned HTTP {status}"),
            });
        }

        info!(file = %file.name, bytes = total_len, "upload stream completed");
        Ok(StreamReceipt {
            status,
            bytes_sent: total_len,
        })
    }
}

#[derive(Debug, Serialize)]
struct SessionMetadata<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<ParentRefDto>,
}

impl<'a> SessionMetadata<'a> {
    fn new(title: &'a str, folder: Option<&FolderHandle>) -> Self {
        SessionMetadata {
            title,
            parents: folder
                .map(|handle| ParentRefDto {
                    id: handle.id.clone(),
                })
                .into_iter()
                .collect(),
        }
    }
}

/// 把请求体切块包装成流，每个块交给传输层时回调一次进度。
/// bytes_sent 在同一阶段内单调递增，且不会超过 bytes_total。
fn progress_body(payload: Vec<u8>, phase: UploadPhase, progress: ProgressSink) -> Body {
    let total = payload.len() as u64;
    let chunks: Vec<Vec<u8>> = payload
        .chunks(STREAM_CHUNK_BYTES)
        .map(<[u8]>::to_vec)
        .collect();

    let mut sent = 0u64;
    let body_stream = stream::iter(chunks).map(move |chunk| {
        sent = sent.saturating_add(chunk.len() as u64).min(total);
        progress(ProgressTick {
            phase,
            bytes_sent: sent,
            bytes_total: total,
        });
        Ok::<_, std::io::Error>(chunk)
    });
    Body::wrap_stream(body_stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockResponse, MockServer};
    use std::sync::{Arc, Mutex};

    fn uploader(server: &MockServer) -> ResumableUploader {
        let upload_url =
            Url::parse(&server.url("/upload/drive/v2/files?uploadType=resumable")).unwrap();
        ResumableUploader::new(upload_url, Duration::from_secs(5)).unwrap()
    }

    fn source(len: usize) -> SourceFile {
        SourceFile {
            name: "report.pdf".into(),
            name_html: "report.pdf".into(),
            path: Url::parse("https://example.com/report.pdf").unwrap(),
            bytes: (0..len).map(|i| (i % 251) as u8).collect(),
            mime_type: "application/pdf".into(),
        }
    }

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressTick>>>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink_ticks = Arc::clone(&ticks);
        let sink: ProgressSink =
            Arc::new(move |tick: ProgressTick| sink_ticks.lock().unwrap().push(tick));
        (sink, ticks)
    }

    fn session_ok() -> MockResponse {
        MockResponse::new(200).header("Location", "{base}/upload/session123")
    }

    #[tokio::test]
    async fn upload_runs_both_phases() {
        let server = MockServer::start(vec![
            session_ok(),
            MockResponse::json(200, r#"{"id":"file-1"}"#),
        ])
        .await;
        let file = source(200 * 1024);
        let (sink, ticks) = recording_sink();
        let folder = FolderHandle { id: "F1".into() };

        let receipt = uploader(&server)
            .upload(&file, Some(&folder), &Credential::new("tok"), sink)
            .await
            .unwrap();

        assert_eq!(
            receipt,
            StreamReceipt {
                status: 200,
                bytes_sent: 200 * 1024
            }
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 2);

        let init = &requests[0];
        assert_eq!(init.method, "POST");
        assert_eq!(init.path(), "/upload/drive/v2/files");
        assert_eq!(init.query("uploadType").as_deref(), Some("resumable"));
        assert_eq!(init.header("authorization"), Some("Bearer tok"));
        assert_eq!(init.header("x-upload-content-type"), Some("application/pdf"));
        let metadata = init.json();
        assert_eq!(metadata["title"], "report.pdf");
        assert_eq!(metadata["parents"][0]["id"], "F1");

        let stream = &requests[1];
        assert_eq!(stream.method, "POST");
        assert_eq!(stream.path(), "/upload/session123");
        assert_eq!(stream.header("content-type"), Some("application/pdf"));
        assert_eq!(stream.header("authorization"), Some("Bearer tok"));
        assert_eq!(stream.body, file.bytes);

        let ticks = ticks.lock().unwrap();
        let init_ticks: Vec<_> = ticks
            .iter()
            .filter(|t| t.phase == UploadPhase::Initiate)
            .collect();
        assert_eq!(init_ticks.len(), 1);
        assert_eq!(init_ticks[0].bytes_sent, init_ticks[0].bytes_total);

        let stream_ticks: Vec<_> = ticks
            .iter()
            .filter(|t| t.phase == UploadPhase::Stream)
            .collect();
        // 200 KiB / 64 KiB => 4 块
        assert_eq!(stream_ticks.len(), 4);
        for pair in stream_ticks.windows(2) {
            assert!(pair[0].bytes_sent <= pair[1].bytes_sent);
        }
        for tick in &stream_ticks {
            assert!(tick.bytes_sent <= tick.bytes_total);
            assert_eq!(tick.bytes_total, 200 * 1024);
        }
        assert_eq!(stream_ticks.last().unwrap().bytes_sent, 200 * 1024);
    }

    #[tokio::test]
    async fn metadata_omits_parents_without_folder() {
        let server = MockServer::start(vec![session_ok(), MockResponse::new(200)]).await;
        let (sink, _) = recording_sink();

        uploader(&server)
            .upload(&source(10), None, &Credential::new("tok"), sink)
            .await
            .unwrap();

        let metadata = server.requests()[0].json();
        assert!(metadata.get("parents").is_none());
    }

    #[tokio::test]
    async fn initiate_failure_halts_before_stream() {
        let server = MockServer::start(vec![MockResponse::json(401, r#"{"error":"auth"}"#)]).await;
        let (sink, ticks) = recording_sink();

        let err = uploader(&server)
            .upload(&source(1024), None, &Credential::new("stale"), sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::UploadPhase {
                phase: UploadPhase::Initiate,
                status: Some(401),
                ..
            }
        ));
        assert_eq!(server.requests().len(), 1, "stream phase must not run");
        assert!(ticks
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.phase == UploadPhase::Initiate));
    }

    #[tokio::test]
    async fn missing_location_is_rejected() {
        let server = MockServer::start(vec![MockResponse::new(200)]).await;
        let (sink, _) = recording_sink();

        let err = uploader(&server)
            .upload(&source(8), None, &Credential::new("tok"), sink)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MissingLocation));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn stream_failure_reports_status() {
        let server = MockServer::start(vec![
            session_ok(),
            MockResponse::json(503, r#"{"error":"busy"}"#),
        ])
        .await;
        let (sink, _) = recording_sink();

        let err = uploader(&server)
            .upload(&source(8), None, &Credential::new("tok"), sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::UploadPhase {
                phase: UploadPhase::Stream,
                status: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_file_streams_without_ticks() {
        let server = MockServer::start(vec![session_ok(), MockResponse::new(200)]).await;
        let (sink, ticks) = recording_sink();

        let receipt = uploader(&server)
            .upload(&source(0), None, &Credential::new("tok"), sink)
            .await
            .unwrap();

        assert_eq!(receipt.bytes_sent, 0);
        assert!(ticks
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.phase == UploadPhase::Initiate));
        assert!(server.requests()[1].body.is_empty());
    }
}
