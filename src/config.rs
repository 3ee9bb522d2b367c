//! 运行配置，存为 TOML：
//! - Linux: `~/.config/drivedrop/config.toml`
//! - macOS: `~/Library/Application Support/com.Drivedrop.drivedrop/config.toml`
//! - Windows: `%APPDATA%\Drivedrop\drivedrop\config\config.toml`
//!
//! 所有字段都有默认值，文件缺失或只写了部分字段时其余取默认。

use crate::api::auth::{
    ChainTokenProvider, EnvTokenProvider, RefreshTokenProvider, TokenProvider, GOOGLE_TOKEN_URL,
};
use crate::api::drive::{DriveEndpoints, DRIVE_API_URL, DRIVE_UPLOAD_URL};
use crate::error::UploadError;
use crate::upload_manager::ChannelSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "Drivedrop";
const APPLICATION: &str = "drivedrop";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// 被动通知的标题。
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// 目标文件夹名；空字符串表示直接传到根目录。
    #[serde(default = "default_folder_name")]
    pub folder_name: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// 鉴权与文件夹接口的请求超时。
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// 抓取源文件与推送文件字节的超时，按整次请求计时（含完整请求体与响应体），
    /// 不是空闲超时。超过该时长的传输会以 HTTP 状态 0 失败，大文件需相应调大。
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,

    #[serde(default = "default_dismiss_ms")]
    pub notification_dismiss_ms: u64,

    /// 观察者队列长度，满了以后进度会被丢弃。
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 存放现成 access token 的环境变量名。
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_app_name() -> String {
    "Drive Uploader".into()
}

fn default_folder_name() -> Option<String> {
    Some("Chrome Upload".into())
}

fn default_api_url() -> String {
    DRIVE_API_URL.into()
}

fn default_upload_url() -> String {
    DRIVE_UPLOAD_URL.into()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_transfer_timeout() -> u64 {
    600
}

fn default_dismiss_ms() -> u64 {
    7500
}

fn default_progress_capacity() -> usize {
    64
}

fn default_access_token_env() -> String {
    "DRIVEDROP_ACCESS_TOKEN".into()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            folder_name: default_folder_name(),
            api_url: default_api_url(),
            upload_url: default_upload_url(),
            request_timeout_secs: default_request_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
            notification_dismiss_ms: default_dismiss_ms(),
            progress_capacity: default_progress_capacity(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_env: default_access_token_env(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            token_url: default_token_url(),
        }
    }
}

impl Config {
    /// 从平台配置目录读取；文件不存在时返回默认配置，不会写盘。
    pub fn load() -> Result<Self, UploadError> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "no configuration file; using defaults");
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        DriveEndpoints::parse(&self.api_url, &self.upload_url)?;
        url::Url::parse(&self.auth.token_url)?;
        if self.request_timeout_secs == 0 || self.transfer_timeout_secs == 0 {
            return Err(UploadError::Config("timeouts must be greater than zero".into()));
        }
        if self.progress_capacity == 0 {
            return Err(UploadError::Config(
                "progress_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            capacity: self.progress_capacity,
            dismiss_after: Duration::from_millis(self.notification_dismiss_ms),
            title: self.app_name.clone(),
        }
    }

    /// 先读环境变量里的 access token；配置了 refresh token 时再退回到刷新流程。
    pub fn token_provider(&self) -> Result<Arc<dyn TokenProvider>, UploadError> {
        let mut providers: Vec<Arc<dyn TokenProvider>> =
            vec![Arc::new(EnvTokenProvider::new(self.auth.access_token_env.clone()))];

        let client_id = self.auth.client_id.as_deref().filter(|v| !v.trim().is_empty());
        let refresh_token = self
            .auth
            .refresh_token
            .as_deref()
            .filter(|v| !v.trim().is_empty());
        if let (Some(client_id), Some(refresh_token)) = (client_id, refresh_token) {
            providers.push(Arc::new(RefreshTokenProvider::new(
                self.auth.token_url.clone(),
                client_id,
                self.auth.client_secret.clone(),
                refresh_token,
                Duration::from_secs(self.request_timeout_secs),
            )?));
        }

        Ok(Arc::new(ChainTokenProvider::new(providers)))
    }
}

/// 平台相关的配置文件路径。
pub fn config_path() -> Result<PathBuf, UploadError> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| UploadError::Config("failed to resolve configuration directory".into()))?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}
