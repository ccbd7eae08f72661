//! # CRM WebHook 客户端
//!
//! 以 JSON POST 方式将负载发送到 `Livechat_webhookUrl`，不做重试。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value as JsonValue;
use sha2::Sha256;

use crate::config::WebhookConfig;
use crate::config::settings::{self as keys, SettingsStore};
use crate::crm::payload::CrmPayload;
use crate::error::{ErrorBuilder, ErrorCode, Result};

pub const TOKEN_HEADER: &str = "X-RocketChat-Livechat-Token";
pub const SIGNATURE_HEADER: &str = "X-Livechat-Signature";

/// CRM 响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    /// JSON 响应体，空或无法解析时为 None
    pub body: Option<JsonValue>,
}

impl WebhookResponse {
    /// 响应体中的 `data` 字段（CRM 侧引用）
    pub fn crm_data(&self) -> Option<&JsonValue> {
        self.body
            .as_ref()
            .and_then(|body| body.get("data"))
            .filter(|data| !data.is_null())
    }
}

#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn send(&self, payload: &CrmPayload) -> Result<WebhookResponse>;
}

/// 客户端选项（端点与令牌从设置中实时读取）
#[derive(Debug, Clone)]
pub struct WebhookClientOptions {
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub signing_secret: Option<String>,
}

impl Default for WebhookClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            headers: HashMap::new(),
            signing_secret: None,
        }
    }
}

impl From<&WebhookConfig> for WebhookClientOptions {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            headers: config.headers.clone(),
            signing_secret: config.signing_secret.clone(),
        }
    }
}

pub struct ReqwestWebhookClient {
    client: Client,
    settings: Arc<dyn SettingsStore>,
    options: WebhookClientOptions,
}

impl ReqwestWebhookClient {
    pub fn new(settings: Arc<dyn SettingsStore>, options: WebhookClientOptions) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(options.timeout)
            .build()
            .map_err(|err| {
                ErrorBuilder::new(ErrorCode::ConfigurationError, "failed to build http client")
                    .details(err.to_string())
                    .build_error()
            })?;
        Ok(Self {
            client,
            settings,
            options,
        })
    }
}

/// 计算请求体的 HMAC-SHA256 签名，格式 `sha256=<hex>`
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|err| {
        ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid webhook signing secret")
            .details(err.to_string())
            .build_error()
    })?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[async_trait]
impl WebhookClient for ReqwestWebhookClient {
    async fn send(&self, payload: &CrmPayload) -> Result<WebhookResponse> {
        let endpoint = self.settings.get_string(keys::WEBHOOK_URL).ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "webhook url not configured")
                .build_error()
        })?;

        let body = serde_json::to_vec(payload).map_err(|err| {
            ErrorBuilder::new(ErrorCode::SerializationError, "failed to encode crm payload")
                .details(err.to_string())
                .build_error()
        })?;

        let mut builder = self
            .client
            .post(&endpoint)
            .header("content-type", "application/json");
        if let Some(token) = self.settings.get_string(keys::SECRET_TOKEN) {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if let Some(secret) = &self.options.signing_secret {
            builder = builder.header(SIGNATURE_HEADER, sign_body(secret, &body)?);
        }
        for (key, value) in &self.options.headers {
            builder = builder.header(key, value);
        }

        let response = builder.body(body).send().await.map_err(|err| {
            ErrorBuilder::new(ErrorCode::ServiceUnavailable, "webhook request failed")
                .details(format!("endpoint={endpoint}, err={err}"))
                .build_error()
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ErrorBuilder::new(ErrorCode::WebhookRejected, "webhook returned error status")
                    .details(format!("endpoint={endpoint}, status={status}"))
                    .build_error(),
            );
        }

        let bytes = response.bytes().await.map_err(|err| {
            ErrorBuilder::new(ErrorCode::ServiceUnavailable, "failed to read webhook response")
                .details(err.to_string())
                .build_error()
        })?;
        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice::<JsonValue>(&bytes) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(%endpoint, "webhook response is not json: {err}");
                    None
                }
            }
        };

        Ok(WebhookResponse {
            status: status.as_u16(),
            body,
        })
    }
}
