use std::sync::Arc;

use crate::domain::models::Room;
use crate::domain::repositories::{UserRepository, VisitorRepository};
use crate::error::Result;

use super::payload::{AdditionalFields, CrmAgent, CrmEventType, CrmPayload, CrmVisitor};
use super::user_agent::{KeywordUserAgentInspector, UserAgentInspector};

/// 根据房间组装访客、坐席信息，生成不含消息的基础负载
pub struct GuestInfoBuilder {
    visitors: Arc<dyn VisitorRepository>,
    users: Arc<dyn UserRepository>,
    inspector: Arc<dyn UserAgentInspector>,
}

impl GuestInfoBuilder {
    pub fn new(visitors: Arc<dyn VisitorRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            visitors,
            users,
            inspector: Arc::new(KeywordUserAgentInspector),
        }
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn UserAgentInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub async fn build(&self, event_type: CrmEventType, room: &Room) -> Result<CrmPayload> {
        let visitor = self.visitor_info(room).await?;
        let agent = self.agent_info(room).await?;

        Ok(CrmPayload {
            id: room.id.clone(),
            label: room.fname.clone().or_else(|| room.label.clone()),
            event_type,
            topic: room.topic.clone(),
            created_at: room.ts,
            last_message_at: room.lm,
            tags: room.tags.clone(),
            custom_fields: room.livechat_data.clone(),
            messages: Vec::new(),
            visitor,
            agent,
            crm_data: room.crm_data.clone(),
            additional: AdditionalFields::default(),
        })
    }

    async fn visitor_info(&self, room: &Room) -> Result<CrmVisitor> {
        let room_visitor = room.visitor.clone().unwrap_or_default();
        let stored = match room.visitor_id() {
            Some(id) => self.visitors.find_one_by_id(id).await?,
            None => None,
        };

        let Some(visitor) = stored else {
            // 访客记录缺失时退化为房间上的访客引用
            tracing::warn!(room_id = %room.id, "visitor record not found, using room reference");
            return Ok(CrmVisitor {
                id: room_visitor.id,
                token: room_visitor.token,
                username: room_visitor.username,
                ..Default::default()
            });
        };

        let ua = visitor
            .user_agent
            .as_deref()
            .map(|ua| self.inspector.inspect(ua))
            .unwrap_or_default();

        Ok(CrmVisitor {
            id: visitor.id,
            token: Some(visitor.token),
            name: visitor.name,
            username: visitor.username,
            email: (!visitor.visitor_emails.is_empty()).then_some(visitor.visitor_emails),
            phone: (!visitor.phone.is_empty()).then_some(visitor.phone),
            department: visitor.department,
            ip: visitor.ip,
            os: ua.os,
            browser: ua.browser,
            custom_fields: visitor.livechat_data,
        })
    }

    async fn agent_info(&self, room: &Room) -> Result<Option<CrmAgent>> {
        let Some(agent_id) = room.served_by_id() else {
            return Ok(None);
        };
        let agent = self.users.find_one_by_id(agent_id).await?;
        Ok(agent.map(|user| CrmAgent {
            email: user.emails.first().map(|e| e.address.clone()),
            id: user.id,
            username: user.username,
            name: user.name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::InMemoryLivechatStore;
    use crate::domain::models::{
        RoomVisitor, User, UserEmail, UserRef, Visitor, VisitorEmail, VisitorPhone,
    };

    async fn store() -> Arc<InMemoryLivechatStore> {
        let store = Arc::new(InMemoryLivechatStore::new());
        store
            .insert_visitor(Visitor {
                id: "v1".into(),
                token: "tok-1".into(),
                name: Some("Jane".into()),
                username: Some("guest-1".into()),
                visitor_emails: vec![VisitorEmail {
                    address: "jane@example.com".into(),
                }],
                phone: vec![VisitorPhone {
                    phone_number: "+15550100".into(),
                }],
                ip: Some("10.0.0.1".into()),
                user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".into()),
                ..Default::default()
            })
            .await;
        store
            .insert_user(User {
                id: "a1".into(),
                username: Some("agent".into()),
                name: Some("Agent Smith".into()),
                emails: vec![
                    UserEmail {
                        address: "smith@example.com".into(),
                        verified: true,
                    },
                    UserEmail {
                        address: "other@example.com".into(),
                        verified: false,
                    },
                ],
            })
            .await;
        store
    }

    fn room() -> Room {
        let mut room = Room::new("r1");
        room.fname = Some("Jane".into());
        room.label = Some("ignored".into());
        room.visitor = Some(RoomVisitor {
            id: "v1".into(),
            token: Some("tok-1".into()),
            username: Some("guest-1".into()),
        });
        room.served_by = Some(UserRef::new("a1", "agent"));
        room.crm_data = Some(json!({ "leadId": 42 }));
        room
    }

    #[tokio::test]
    async fn builds_visitor_and_agent_sections() {
        let store = store().await;
        let builder = GuestInfoBuilder::new(store.clone(), store.clone());
        let payload = builder.build(CrmEventType::Session, &room()).await.unwrap();

        assert_eq!(payload.label.as_deref(), Some("Jane"));
        assert_eq!(payload.visitor.token.as_deref(), Some("tok-1"));
        assert_eq!(payload.visitor.os.as_deref(), Some("Linux"));
        assert_eq!(payload.visitor.browser.as_deref(), Some("Firefox 121.0"));
        assert_eq!(payload.visitor.email.as_ref().unwrap()[0].address, "jane@example.com");

        let agent = payload.agent.unwrap();
        assert_eq!(agent.email.as_deref(), Some("smith@example.com"));
        assert_eq!(payload.crm_data, Some(json!({ "leadId": 42 })));
    }

    #[tokio::test]
    async fn missing_visitor_falls_back_to_room_reference() {
        let store = Arc::new(InMemoryLivechatStore::new());
        let builder = GuestInfoBuilder::new(store.clone(), store.clone());
        let mut room = room();
        room.served_by = None;

        let payload = builder.build(CrmEventType::Message, &room).await.unwrap();
        assert_eq!(payload.visitor.id, "v1");
        assert_eq!(payload.visitor.username.as_deref(), Some("guest-1"));
        assert!(payload.visitor.email.is_none());
        assert!(payload.agent.is_none());

        let value = serde_json::to_value(&payload.visitor).unwrap();
        assert_eq!(value["email"], serde_json::Value::Null);
    }
}
