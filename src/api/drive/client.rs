use super::{DRIVE_API_URL, DRIVE_UPLOAD_URL};
use crate::error::UploadError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// 构建带统一超时与重定向策略的异步 HTTP 客户端。
/// 抓取、文件夹解析、上传都应复用该函数，避免重复配置。
pub fn build_client(timeout: Duration) -> Result<Client, UploadError> {
    let builder = Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(10));
    // 测试只访问本机的模拟服务器，不能被环境中的代理设置劫持。
    #[cfg(test)]
    let builder = builder.no_proxy();
    builder
        .build()
        .map_err(|e| UploadError::Config(format!("failed to build HTTP client: {e}")))
}

/// 上传流程依赖的两个远端入口。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveEndpoints {
    /// 文件元数据接口（查询 / 创建文件夹）。
    pub api_url: Url,
    /// 可续传上传的会话初始化入口。
    pub upload_url: Url,
}

impl DriveEndpoints {
    pub fn parse(api_url: &str, upload_url: &str) -> Result<Self, UploadError> {
        Ok(DriveEndpoints {
            api_url: Url::parse(api_url)?,
            upload_url: Url::parse(upload_url)?,
        })
    }

    /// Google Drive v2 的官方入口。
    pub fn google() -> Result<Self, UploadError> {
        Self::parse(DRIVE_API_URL, DRIVE_UPLOAD_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_point_at_drive_v2() {
        let endpoints = DriveEndpoints::google().unwrap();
        assert_eq!(endpoints.api_url.path(), "/drive/v2/files");
        assert_eq!(endpoints.upload_url.query(), Some("uploadType=resumable"));
    }

    #[test]
    fn parse_rejects_relative_url() {
        let err = DriveEndpoints::parse("/drive/v2/files", DRIVE_UPLOAD_URL).unwrap_err();
        assert!(matches!(err, UploadError::InvalidUrl(_)));
    }
}
