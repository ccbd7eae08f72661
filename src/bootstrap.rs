//! CRM 桥接初始化
//!
//! 从配置构建设置存储、WebHook 客户端与 CRM 转发器，并将回调注册到回调中心。

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::settings as keys;
use crate::config::{BridgeConfig, InMemorySettings, SettingsStore};
use crate::crm::{
    CrmForwarder, GuestInfoBuilder, SiteUrlFileUploadNormalizer, install_crm_callbacks,
};
use crate::domain::{
    InMemoryLivechatStore, MessageRepository, RoomRepository, UserRepository, VisitorRepository,
};
use crate::hooks::{CallbackRegistry, GlobalCallbackRegistry, HookDispatcher};
use crate::webhook::{ReqwestWebhookClient, WebhookClient, WebhookClientOptions};

/// 宿主平台的数据访问
#[derive(Clone)]
pub struct LivechatRepositories {
    pub rooms: Arc<dyn RoomRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub visitors: Arc<dyn VisitorRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl LivechatRepositories {
    pub fn from_store(store: Arc<InMemoryLivechatStore>) -> Self {
        Self {
            rooms: store.clone(),
            messages: store.clone(),
            visitors: store.clone(),
            users: store,
        }
    }
}

/// 已装配的桥接组件
pub struct CrmBridge {
    pub settings: Arc<InMemorySettings>,
    pub forwarder: Arc<CrmForwarder>,
    pub dispatcher: HookDispatcher,
}

impl CrmBridge {
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        self.dispatcher.registry()
    }
}

/// 使用默认的 reqwest 客户端初始化
pub async fn init_from_config(
    config: &BridgeConfig,
    repositories: LivechatRepositories,
    registry: Arc<CallbackRegistry>,
) -> Result<CrmBridge> {
    let settings = Arc::new(config.settings_store());
    let client = ReqwestWebhookClient::new(
        settings.clone(),
        WebhookClientOptions::from(&config.webhook),
    )
    .context("Failed to build CRM webhook client")?;
    Ok(init_with_client(settings, repositories, registry, Arc::new(client)).await)
}

/// 使用进程级回调中心初始化
pub async fn init_global(
    config: &BridgeConfig,
    repositories: LivechatRepositories,
) -> Result<CrmBridge> {
    let registry = GlobalCallbackRegistry::get();
    init_from_config(config, repositories, registry).await
}

/// 使用指定的 WebHook 客户端初始化
pub async fn init_with_client(
    settings: Arc<InMemorySettings>,
    repositories: LivechatRepositories,
    registry: Arc<CallbackRegistry>,
    client: Arc<dyn WebhookClient>,
) -> CrmBridge {
    let store: Arc<dyn SettingsStore> = settings.clone();
    let guest_info = GuestInfoBuilder::new(repositories.visitors, repositories.users);
    let forwarder = Arc::new(CrmForwarder::new(
        store.clone(),
        repositories.rooms,
        repositories.messages,
        guest_info,
        Arc::new(SiteUrlFileUploadNormalizer::new(store)),
        client,
    ));

    install_crm_callbacks(&registry, forwarder.clone()).await;
    tracing::info!(
        webhook_configured = settings.get_string(keys::WEBHOOK_URL).is_some(),
        "livechat crm bridge initialized"
    );

    CrmBridge {
        settings,
        forwarder,
        dispatcher: HookDispatcher::new(registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookKind;

    #[tokio::test]
    async fn config_settings_reach_the_forwarder() {
        let mut config = BridgeConfig::default();
        config.webhook.url = Some("https://crm.example.com/hook".into());
        config.webhook.on_close = true;

        let bridge = init_from_config(
            &config,
            LivechatRepositories::from_store(Arc::new(InMemoryLivechatStore::new())),
            CallbackRegistry::new(),
        )
        .await
        .unwrap();

        assert!(bridge.forwarder.settings().get_bool(keys::WEBHOOK_ON_CLOSE));
        assert_eq!(
            bridge
                .settings
                .get_string(keys::WEBHOOK_URL)
                .as_deref(),
            Some("https://crm.example.com/hook")
        );
        for kind in HookKind::ALL {
            assert_eq!(bridge.registry().names(kind).await.len(), 1);
        }
    }
}
