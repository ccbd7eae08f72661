//! Livechat CRM 桥接库
//!
//! 监听 livechat 生命周期事件，将会话与消息推送到外部 CRM 的 WebHook，
//! 并提供客户端 OTR 加密消息的拦截层。

pub mod bootstrap;
pub mod config;
pub mod crm;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod otr;
pub mod tracing;
pub mod webhook;

pub use bootstrap::{
    CrmBridge, LivechatRepositories, init_from_config, init_global, init_with_client,
};
pub use config::{
    BridgeConfig, ConfigManager, InMemorySettings, SettingValue, SettingsStore, bridge_config,
    load_config,
};
pub use crm::{CrmEventType, CrmForwarder, CrmPayload, IncludeMessages, install_crm_callbacks};
pub use error::*;
pub use hooks::*;
pub use webhook::{ReqwestWebhookClient, WebhookClient, WebhookClientOptions, WebhookResponse};
