use crate::error::UploadError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 不透明的 bearer 凭证；只在一次运行内持有，不落盘，Debug 输出会打码。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// 原始 token，仅用于拼接 Authorization 头。
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// 外部提供的凭证能力。`interactive=true` 时允许实现弹出人机交互。
/// 用户拒绝或身份服务不可达时返回 `AuthDenied`。
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, interactive: bool) -> Result<Credential, UploadError>;
}

/// 固定凭证，适合宿主程序自己管理 token 或测试场景。
pub struct StaticTokenProvider {
    credential: Credential,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        StaticTokenProvider {
            credential: Credential::new(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _interactive: bool) -> Result<Credential, UploadError> {
        Ok(self.credential.clone())
    }
}

/// 每次调用时从环境变量读取 access token。
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        EnvTokenProvider { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self, _interactive: bool) -> Result<Credential, UploadError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(Credential::new(value.trim())),
            _ => Err(UploadError::AuthDenied(format!(
                "environment variable {} is not set",
                self.var
            ))),
        }
    }
}

/// 依次尝试多个来源，返回第一个成功的凭证；全部失败时返回最后一个错误。
pub struct ChainTokenProvider {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainTokenProvider {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>) -> Self {
        ChainTokenProvider { providers }
    }
}

#[async_trait]
impl TokenProvider for ChainTokenProvider {
    async fn get_token(&self, interactive: bool) -> Result<Credential, UploadError> {
        let mut last_err = UploadError::AuthDenied("no token provider configured".to_string());
        for provider in &self.providers {
            match provider.get_token(interactive).await {
                Ok(credential) => return Ok(credential),
                Err(err) => {
                    debug!(error = %err, "token provider declined; trying next");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}
