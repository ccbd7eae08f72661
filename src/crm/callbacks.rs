//! 将 CRM 转发挂到宿主平台的生命周期事件上

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::settings as keys;
use crate::domain::models::{Message, Room};
use crate::error::Result;
use crate::hooks::{
    CallbackRegistry, HookErrorPolicy, HookKind, HookMetadata, HookOutcome, HookPriority,
    LivechatCallback, LivechatEvent,
};

use super::filter::send_message_type;
use super::forwarder::{CrmForwarder, IncludeMessages};
use super::payload::CrmEventType;

/// 回调名称，与事件一一对应
pub fn callback_name(kind: HookKind) -> &'static str {
    match kind {
        HookKind::CloseRoom => "livechat-send-crm-close-room",
        HookKind::NewRoom => "livechat-send-crm-start-room",
        HookKind::AfterTakeInquiry => "livechat-send-crm-room-taken",
        HookKind::ChatQueued => "livechat-send-crm-room-queued",
        HookKind::AfterForwardChatToAgent => "livechat-send-crm-room-forwarded-to-agent",
        HookKind::AfterForwardChatToDepartment => {
            "livechat-send-crm-room-forwarded-to-department"
        }
        HookKind::SaveInfo => "livechat-send-crm-save-info",
        HookKind::AfterSaveMessage => "livechat-send-crm-message",
        HookKind::LeadCapture => "livechat-send-crm-lead-capture",
    }
}

/// 为全部事件注册 CRM 回调（MEDIUM 优先级，失败不影响宿主事件）
pub async fn install_crm_callbacks(registry: &CallbackRegistry, forwarder: Arc<CrmForwarder>) {
    let handler: Arc<dyn LivechatCallback> = Arc::new(CrmCallback::new(forwarder));
    for kind in HookKind::ALL {
        let metadata = HookMetadata::new(kind, callback_name(kind))
            .with_priority(HookPriority::MEDIUM)
            .with_error_policy(HookErrorPolicy::Ignore);
        registry.register(metadata, handler.clone()).await;
    }
    tracing::info!(count = HookKind::ALL.len(), "crm callbacks installed");
}

pub struct CrmCallback {
    forwarder: Arc<CrmForwarder>,
}

impl CrmCallback {
    pub fn new(forwarder: Arc<CrmForwarder>) -> Self {
        Self { forwarder }
    }

    fn enabled(&self, key: &str) -> bool {
        self.forwarder.settings().get_bool(key)
    }

    async fn send(
        &self,
        event_type: CrmEventType,
        room: Room,
        include: IncludeMessages,
    ) -> HookOutcome {
        self.forwarder
            .send_to_crm(event_type, room, include)
            .await
            .map(|_| ())
            .into()
    }

    async fn load_room(&self, rid: &str) -> Result<Option<Room>> {
        let room = self.forwarder.rooms().find_one_by_id(rid).await?;
        if room.is_none() {
            tracing::warn!(room_id = %rid, "room not found, skip crm");
        }
        Ok(room)
    }

    async fn on_message(&self, message: &Message, room: &Room) -> HookOutcome {
        if !room.is_livechat_with_visitor() {
            return HookOutcome::Skipped("not a livechat room with visitor");
        }

        // 带 token 的消息来自访客，否则来自坐席
        let key = if message.token.as_deref().is_some_and(|t| !t.is_empty()) {
            keys::WEBHOOK_ON_VISITOR_MESSAGE
        } else {
            keys::WEBHOOK_ON_AGENT_MESSAGE
        };
        if !self.enabled(key) {
            return HookOutcome::Skipped("message webhook disabled");
        }
        if message
            .message_type()
            .is_some_and(|t| !send_message_type(self.forwarder.settings(), t))
        {
            return HookOutcome::Skipped("special message type");
        }

        self.send(
            CrmEventType::Message,
            room.clone(),
            IncludeMessages::Only(vec![message.clone()]),
        )
        .await
    }
}

#[async_trait]
impl LivechatCallback for CrmCallback {
    async fn handle(&self, event: &LivechatEvent) -> HookOutcome {
        match event {
            LivechatEvent::CloseRoom(room) => {
                if !self.enabled(keys::WEBHOOK_ON_CLOSE) {
                    return HookOutcome::Skipped("close webhook disabled");
                }
                self.send(CrmEventType::Session, room.clone(), IncludeMessages::All)
                    .await
            }
            LivechatEvent::NewRoom(room) => {
                if !self.enabled(keys::WEBHOOK_ON_START) {
                    return HookOutcome::Skipped("start webhook disabled");
                }
                self.send(CrmEventType::SessionStart, room.clone(), IncludeMessages::All)
                    .await
            }
            LivechatEvent::AfterTakeInquiry(inquiry) => {
                if !self.enabled(keys::WEBHOOK_ON_CHAT_TAKEN) {
                    return HookOutcome::Skipped("chat taken webhook disabled");
                }
                match self.load_room(&inquiry.rid).await {
                    Ok(Some(room)) => {
                        self.send(CrmEventType::SessionTaken, room, IncludeMessages::All)
                            .await
                    }
                    Ok(None) => HookOutcome::Skipped("room not found"),
                    Err(err) => HookOutcome::Failed(err),
                }
            }
            LivechatEvent::ChatQueued(room) => {
                if !self.enabled(keys::WEBHOOK_ON_CHAT_QUEUED) {
                    return HookOutcome::Skipped("chat queued webhook disabled");
                }
                self.send(CrmEventType::SessionQueued, room.clone(), IncludeMessages::All)
                    .await
            }
            LivechatEvent::AfterForwardChatToAgent(params) => {
                if !self.enabled(keys::WEBHOOK_ON_FORWARD) {
                    return HookOutcome::Skipped("forward webhook disabled");
                }
                match self.load_room(&params.rid).await {
                    Ok(Some(mut room)) => {
                        room.old_served_by = params.old_served_by.clone();
                        self.send(CrmEventType::SessionForwarded, room, IncludeMessages::All)
                            .await
                    }
                    Ok(None) => HookOutcome::Skipped("room not found"),
                    Err(err) => HookOutcome::Failed(err),
                }
            }
            LivechatEvent::AfterForwardChatToDepartment(params) => {
                if !self.enabled(keys::WEBHOOK_ON_FORWARD) {
                    return HookOutcome::Skipped("forward webhook disabled");
                }
                match self.load_room(&params.rid).await {
                    Ok(Some(mut room)) => {
                        room.old_department_id = params.old_department_id.clone();
                        self.send(CrmEventType::SessionForwarded, room, IncludeMessages::All)
                            .await
                    }
                    Ok(None) => HookOutcome::Skipped("room not found"),
                    Err(err) => HookOutcome::Failed(err),
                }
            }
            LivechatEvent::SaveInfo(room) => {
                if room.open {
                    return HookOutcome::Skipped("room still open");
                }
                self.send(CrmEventType::Edit, room.clone(), IncludeMessages::All)
                    .await
            }
            LivechatEvent::AfterSaveMessage { message, room } => {
                self.on_message(message, room).await
            }
            LivechatEvent::LeadCapture(room) => {
                if !self.enabled(keys::WEBHOOK_ON_CAPTURE) {
                    return HookOutcome::Skipped("lead capture webhook disabled");
                }
                self.send(CrmEventType::LeadCapture, room.clone(), IncludeMessages::None)
                    .await
            }
        }
    }
}
