use super::{client::build_client, models::FolderHandle, FOLDER_MIME_TYPE};
use crate::api::auth::Credential;
use crate::error::UploadError;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// 按名称查找或创建目标文件夹。
///
/// 先查后建不是原子操作：同名的两次并发解析可能各自创建一个文件夹。
/// 这里接受该竞争，不在本地加锁，因为远端并不认这把锁。
#[derive(Clone)]
pub struct FolderResolver {
    http: Client,
    api_url: Url,
}

impl FolderResolver {
    pub fn new(api_url: Url, timeout: Duration) -> Result<Self, UploadError> {
        Ok(FolderResolver {
            http: build_client(timeout)?,
            api_url,
        })
    }

    pub fn with_client(http: Client, api_url: Url) -> Self {
        FolderResolver { http, api_url }
    }

    /// 返回名为 `name` 的未删除文件夹；不存在时在根目录下新建。
    /// 找到多个时取后端返回的第一个，不做额外排序。
    pub async fn resolve(
        &self,
        name: &str,
        credential: &Credential,
    ) -> Result<FolderHandle, UploadError> {
        if name.trim().is_empty() {
            return Err(UploadError::FolderResolution {
                status: None,
                reason: "folder name cannot be empty".to_string(),
            });
        }

        if let Some(existing) = self.find(name, credential).await? {
            debug!(folder = %name, id = %existing.id, "reusing existing folder");
            return Ok(existing);
        }

        let created = self.create(name, credential).await?;
        info!(folder = %name, id = %created.id, "created destination folder");
        Ok(created)
    }

    async fn find(
        &self,
        name: &str,
        credential: &Credential,
    ) -> Result<Option<FolderHandle>, UploadError> {
        let query = folder_query(name);
        let response = self
            .http
            .get(self.api_url.clone())
            .bearer_auth(credential.secret())
            .header("Accept", "application/json")
            .query(&[("maxResults", "1"), ("q", query.as_str())])
            .send()
            .await
            .map_err(UploadError::folder_transport)?;

        let payload: FolderListResponse = read_json(response, "folder lookup").await?;
        Ok(payload
            .items
            .into_iter()
            .next()
            .map(|item| FolderHandle { id: item.id }))
    }

    async fn create(&self, name: &str, credential: &Credential) -> Result<FolderHandle, UploadError> {
        let body = CreateFolderRequest {
            title: name,
            parents: vec![ParentRefDto {
                id: "root".to_string(),
            }],
            mime_type: FOLDER_MIME_TYPE,
        };
        let response = self
            .http
            .post(self.api_url.clone())
            .bearer_auth(credential.secret())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(UploadError::folder_transport)?;

        let payload: FolderItemDto = read_json(response, "folder create").await?;
        Ok(FolderHandle { id: payload.id })
    }
}

/// 构造 Drive v2 的查询表达式；名称中的 `\` 与 `'` 需要转义。
fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("title = '{escaped}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false")
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: &'static str,
) -> Result<T, UploadError> {
    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::FolderResolution {
            status: Some(status.as_u16()),
            reason: format!("{context} returned HTTP {status}"),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(UploadError::folder_transport)?;
    serde_json::from_slice(&body).map_err(|source| UploadError::Schema { context, source })
}

#[derive(Debug, Deserialize)]
struct FolderListResponse {
    items: Vec<FolderItemDto>,
}

#[derive(Debug, Deserialize)]
struct FolderItemDto {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderRequest<'a> {
    title: &'a str,
    parents: Vec<ParentRefDto>,
    mime_type: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParentRefDto {
    pub(crate) id: String,
}
