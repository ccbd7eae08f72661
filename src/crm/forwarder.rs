use std::sync::Arc;
use std::time::Instant;

use crate::config::settings::{self as keys, SettingsStore};
use crate::domain::models::{Message, Room};
use crate::domain::repositories::{MessageRepository, RoomRepository};
use crate::error::Result;
use crate::metrics::CRM_METRICS;
use crate::webhook::WebhookClient;

use super::file_upload::FileUploadNormalizer;
use super::filter::{MSG_CLOSING_TYPE, MSG_NAVIGATION_TYPE, send_message_type};
use super::guest_info::GuestInfoBuilder;
use super::payload::{AdditionalFields, CrmEventType, CrmMessage, CrmPayload};

/// 负载中包含哪些消息
#[derive(Debug, Clone)]
pub enum IncludeMessages {
    /// 房间内全部可见消息
    All,
    /// 仅包含给定消息
    Only(Vec<Message>),
    None,
}

/// CRM 转发器
pub struct CrmForwarder {
    settings: Arc<dyn SettingsStore>,
    rooms: Arc<dyn RoomRepository>,
    messages: Arc<dyn MessageRepository>,
    guest_info: GuestInfoBuilder,
    normalizer: Arc<dyn FileUploadNormalizer>,
    client: Arc<dyn WebhookClient>,
}

impl CrmForwarder {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        rooms: Arc<dyn RoomRepository>,
        messages: Arc<dyn MessageRepository>,
        guest_info: GuestInfoBuilder,
        normalizer: Arc<dyn FileUploadNormalizer>,
        client: Arc<dyn WebhookClient>,
    ) -> Self {
        Self {
            settings,
            rooms,
            messages,
            guest_info,
            normalizer,
            client,
        }
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    pub fn rooms(&self) -> &Arc<dyn RoomRepository> {
        &self.rooms
    }

    /// 组装负载（不发送）
    pub async fn build_payload(
        &self,
        event_type: CrmEventType,
        room: &Room,
        include: IncludeMessages,
    ) -> Result<CrmPayload> {
        let mut payload = self.guest_info.build(event_type, room).await?;

        let include = if self.full_history() {
            IncludeMessages::All
        } else {
            include
        };
        let messages = match include {
            IncludeMessages::All => self.messages.find_visible_by_room_id(&room.id).await?,
            IncludeMessages::Only(list) => list,
            IncludeMessages::None => Vec::new(),
        };

        let visitor_username = payload.visitor.username.clone();
        for message in messages {
            if let Some(crm_message) = self.render_message(message, visitor_username.as_deref())
            {
                payload
                    .messages
                    .push(self.normalizer.normalize(crm_message).await?);
            }
        }

        payload.additional = AdditionalFields::for_event(event_type, room);
        Ok(payload)
    }

    /// 发送到 CRM；返回的房间在 CRM 回传数据时已更新 `crm_data`
    pub async fn send_to_crm(
        &self,
        event_type: CrmEventType,
        mut room: Room,
        include: IncludeMessages,
    ) -> Result<Room> {
        if self.settings.get_string(keys::WEBHOOK_URL).is_none() {
            tracing::trace!(room_id = %room.id, "webhook url not set, skip crm");
            return Ok(room);
        }

        let payload = self.build_payload(event_type, &room, include).await?;

        let started = Instant::now();
        let response = self.client.send(&payload).await;
        CRM_METRICS
            .webhook_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                CRM_METRICS.record(event_type.as_str(), "failed");
                tracing::error!(
                    room_id = %room.id,
                    event_type = %event_type,
                    "failed to send crm webhook: {err}"
                );
                return Err(err);
            }
        };
        CRM_METRICS.record(event_type.as_str(), "sent");
        tracing::info!(
            room_id = %room.id,
            event_type = %event_type,
            status = response.status,
            messages = payload.messages.len(),
            "crm webhook sent"
        );

        if let Some(crm_data) = response.crm_data() {
            self.rooms
                .save_crm_data_by_room_id(&room.id, crm_data.clone())
                .await?;
            room.crm_data = Some(crm_data.clone());
        }

        Ok(room)
    }

    /// 未配置时默认开启
    fn full_history(&self) -> bool {
        self.settings
            .get(keys::WEBHOOK_FULL_HISTORY)
            .map(|value| value.is_truthy())
            .unwrap_or(true)
    }

    fn render_message(&self, message: Message, visitor_username: Option<&str>) -> Option<CrmMessage> {
        let message_type = message.message_type().map(str::to_string);
        if message_type
            .as_deref()
            .is_some_and(|t| !send_message_type(self.settings.as_ref(), t))
        {
            return None;
        }

        let agent_id = (message.u.username.as_deref() != visitor_username)
            .then(|| message.u.id.clone());
        let navigation = match message_type.as_deref() {
            Some(MSG_NAVIGATION_TYPE) => message.navigation,
            _ => None,
        };
        let (file, attachments) = match message.file {
            Some(file) => (Some(file), message.attachments),
            None => (None, None),
        };

        Some(CrmMessage {
            id: message.id,
            username: message.u.username.clone(),
            msg: message.msg,
            ts: message.ts,
            edited_at: message.edited_at,
            u: message.u,
            agent_id,
            navigation,
            closing_message: message_type.as_deref() == Some(MSG_CLOSING_TYPE),
            file,
            attachments,
            file_upload: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::config::InMemorySettings;
    use crate::crm::file_upload::SiteUrlFileUploadNormalizer;
    use crate::domain::InMemoryLivechatStore;
    use crate::domain::models::{MessageFile, MessageUser, RoomVisitor, UserRef, Visitor};
    use crate::error::{ErrorBuilder, ErrorCode};
    use crate::webhook::WebhookResponse;

    #[derive(Default)]
    struct FakeClient {
        sent: Mutex<Vec<CrmPayload>>,
        reply: Option<serde_json::Value>,
        fail: bool,
    }

    #[async_trait]
    impl WebhookClient for FakeClient {
        async fn send(&self, payload: &CrmPayload) -> Result<WebhookResponse> {
            self.sent.lock().unwrap().push(payload.clone());
            if self.fail {
                return Err(ErrorBuilder::new(ErrorCode::ServiceUnavailable, "down").build_error());
            }
            Ok(WebhookResponse {
                status: 200,
                body: self.reply.clone(),
            })
        }
    }

    fn visitor_user() -> MessageUser {
        MessageUser {
            id: "v1".into(),
            username: Some("guest-1".into()),
            name: None,
        }
    }

    fn agent_user() -> MessageUser {
        MessageUser {
            id: "a1".into(),
            username: Some("agent".into()),
            name: None,
        }
    }

    fn room() -> Room {
        let mut room = Room::new("r1");
        room.visitor = Some(RoomVisitor {
            id: "v1".into(),
            token: Some("tok-1".into()),
            username: Some("guest-1".into()),
        });
        room.department_id = Some("d1".into());
        room.served_by = Some(UserRef::new("a1", "agent"));
        room
    }

    struct Fixture {
        settings: Arc<InMemorySettings>,
        store: Arc<InMemoryLivechatStore>,
        client: Arc<FakeClient>,
        forwarder: CrmForwarder,
    }

    async fn fixture(client: FakeClient) -> Fixture {
        let settings = Arc::new(InMemorySettings::new());
        settings.set(keys::WEBHOOK_URL, "https://crm.example.com/hook");
        let store = Arc::new(InMemoryLivechatStore::new());
        store.insert_room(room()).await;
        store
            .insert_visitor(Visitor {
                id: "v1".into(),
                token: "tok-1".into(),
                username: Some("guest-1".into()),
                ..Default::default()
            })
            .await;

        let now = Utc::now();
        let messages = [
            Message::new("m1", "r1", "hello", visitor_user()).with_ts(now - Duration::seconds(30)),
            Message::new("m2", "r1", "hi, how can I help?", agent_user())
                .with_ts(now - Duration::seconds(20)),
            Message::new("m3", "r1", "", visitor_user())
                .with_type(MSG_NAVIGATION_TYPE)
                .with_ts(now - Duration::seconds(15)),
            Message::new("m4", "r1", "user joined", agent_user())
                .with_type("uj")
                .with_ts(now - Duration::seconds(10)),
            Message::new("m5", "r1", "bye", agent_user())
                .with_type(MSG_CLOSING_TYPE)
                .with_ts(now),
        ];
        for message in messages {
            store.insert_message(message).await.unwrap();
        }

        let client = Arc::new(client);
        let forwarder = CrmForwarder::new(
            settings.clone(),
            store.clone(),
            store.clone(),
            GuestInfoBuilder::new(store.clone(), store.clone()),
            Arc::new(SiteUrlFileUploadNormalizer::new(settings.clone())),
            client.clone(),
        );
        Fixture {
            settings,
            store,
            client,
            forwarder,
        }
    }

    #[tokio::test]
    async fn no_request_without_webhook_url() {
        let fx = fixture(FakeClient::default()).await;
        fx.settings.set(keys::WEBHOOK_URL, "");

        let returned = fx
            .forwarder
            .send_to_crm(CrmEventType::Session, room(), IncludeMessages::All)
            .await
            .unwrap();
        assert_eq!(returned, room());
        assert!(fx.client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_and_annotates_history() {
        let fx = fixture(FakeClient::default()).await;
        fx.forwarder
            .send_to_crm(CrmEventType::Session, room(), IncludeMessages::All)
            .await
            .unwrap();

        let sent = fx.client.sent.lock().unwrap();
        let payload = &sent[0];
        let ids: Vec<_> = payload.messages.iter().map(|m| m.id.as_str()).collect();
        // 导航消息（设置未开启）与 "uj" 类型被过滤
        assert_eq!(ids, vec!["m1", "m2", "m5"]);

        assert!(payload.messages[0].agent_id.is_none());
        assert_eq!(payload.messages[1].agent_id.as_deref(), Some("a1"));
        assert!(payload.messages[2].closing_message);
        assert_eq!(payload.additional.department_id.as_deref(), Some("d1"));
        assert_eq!(payload.additional.served_by.as_ref().unwrap().id, "a1");
    }

    #[tokio::test]
    async fn navigation_is_forwarded_when_enabled() {
        let fx = fixture(FakeClient::default()).await;
        fx.settings.set(keys::NAVIGATION_AS_MESSAGE, true);
        fx.settings.set(keys::SEND_NAVIGATION_HISTORY, true);

        let mut nav = Message::new("m6", "r1", "", visitor_user()).with_type(MSG_NAVIGATION_TYPE);
        nav.navigation = Some(json!({ "page": { "location": { "href": "https://shop/" } } }));
        fx.store.insert_message(nav).await.unwrap();

        let payload = fx
            .forwarder
            .build_payload(CrmEventType::Session, &room(), IncludeMessages::All)
            .await
            .unwrap();
        let nav = payload.messages.iter().find(|m| m.id == "m6").unwrap();
        assert!(nav.navigation.is_some());
        assert!(!nav.closing_message);
    }

    #[tokio::test]
    async fn full_history_overrides_selection_by_default() {
        let fx = fixture(FakeClient::default()).await;
        let only = Message::new("m2", "r1", "hi", agent_user());

        let payload = fx
            .forwarder
            .build_payload(CrmEventType::Message, &room(), IncludeMessages::Only(vec![only.clone()]))
            .await
            .unwrap();
        assert_eq!(payload.messages.len(), 3);

        fx.settings.set(keys::WEBHOOK_FULL_HISTORY, false);
        let payload = fx
            .forwarder
            .build_payload(CrmEventType::Message, &room(), IncludeMessages::Only(vec![only]))
            .await
            .unwrap();
        assert_eq!(payload.messages.len(), 1);

        let payload = fx
            .forwarder
            .build_payload(CrmEventType::LeadCapture, &room(), IncludeMessages::None)
            .await
            .unwrap();
        assert!(payload.messages.is_empty());
    }

    #[tokio::test]
    async fn file_messages_are_normalized() {
        let fx = fixture(FakeClient::default()).await;
        fx.settings.set(keys::WEBHOOK_FULL_HISTORY, false);
        fx.settings.set(keys::SITE_URL, "https://chat.example.com");

        let mut upload = Message::new("m7", "r1", "", visitor_user());
        upload.file = Some(MessageFile {
            id: "f1".into(),
            name: "invoice.pdf".into(),
            content_type: Some("application/pdf".into()),
            size: Some(10),
        });
        upload.attachments = Some(vec![json!({ "title": "invoice.pdf" })]);

        let payload = fx
            .forwarder
            .build_payload(CrmEventType::Message, &room(), IncludeMessages::Only(vec![upload]))
            .await
            .unwrap();
        let message = &payload.messages[0];
        assert_eq!(message.attachments.as_ref().unwrap().len(), 1);
        assert_eq!(
            message.file_upload.as_ref().unwrap().public_file_path,
            "https://chat.example.com/file-upload/f1/invoice.pdf"
        );
    }

    #[tokio::test]
    async fn crm_reference_is_saved_on_room() {
        let fx = fixture(FakeClient {
            reply: Some(json!({ "data": { "ticket": "T-9" } })),
            ..Default::default()
        })
        .await;

        let returned = fx
            .forwarder
            .send_to_crm(CrmEventType::SessionTaken, room(), IncludeMessages::All)
            .await
            .unwrap();
        assert_eq!(returned.crm_data, Some(json!({ "ticket": "T-9" })));

        let stored = RoomRepository::find_one_by_id(fx.store.as_ref(), "r1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.crm_data, Some(json!({ "ticket": "T-9" })));
    }

    #[tokio::test]
    async fn transport_errors_are_returned() {
        let fx = fixture(FakeClient {
            fail: true,
            ..Default::default()
        })
        .await;
        let err = fx
            .forwarder
            .send_to_crm(CrmEventType::Session, room(), IncludeMessages::None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
