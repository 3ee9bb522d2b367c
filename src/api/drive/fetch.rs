use super::{client::build_client, models::SourceFile};
use crate::error::UploadError;
use percent_encoding::percent_decode_str;
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const FALLBACK_FILE_NAME: &str = "download.bin";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// 负责把源地址的内容完整读入内存。
#[derive(Clone)]
pub struct Fetcher {
    http: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        Ok(Fetcher {
            http: build_client(timeout)?,
        })
    }

    pub fn with_client(http: Client) -> Self {
        Fetcher { http }
    }

    /// GET 源地址并读出完整响应体与 Content-Type。
    /// - 不做重试；网络错误或非 2xx 状态都以 `Fetch` 错误返回。
    /// - 文件名取自 URL 最后一段路径。
    pub async fn fetch(&self, url: &Url) -> Result<SourceFile, UploadError> {
        debug!(url = %url, "fetching source");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(UploadError::fetch_transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "source responded with error status");
            return Err(UploadError::Fetch {
                status: Some(status.as_u16()),
                reason: format!("source returned HTTP {status}"),
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(UploadError::fetch_transport)?
            .to_vec();

        let name = derive_file_name(url);
        debug!(name = %name, size = bytes.len(), mime_type = %mime_type, "source fetched");

        Ok(SourceFile {
            name_html: escape_html(&name),
            name,
            path: url.clone(),
            bytes,
            mime_type,
        })
    }
}

/// 取 URL 最后一个非空路径段并做百分号解码；拿不到时退回主机名或默认名。
pub fn derive_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().trim().to_string())
        .filter(|name| !name.is_empty());

    segment
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// 把文件名中的 HTML 特殊字符转义，防止拼进富文本提示时被当作标签。
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
