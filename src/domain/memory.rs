//! 内存实现的 livechat 存储，供嵌入场景与测试使用

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::error::{ErrorBuilder, ErrorCode, Result};

use super::models::{Message, Room, User, Visitor};
use super::repositories::{MessageRepository, RoomRepository, UserRepository, VisitorRepository};

#[derive(Default)]
pub struct InMemoryLivechatStore {
    rooms: RwLock<HashMap<String, Room>>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
    visitors: RwLock<HashMap<String, Visitor>>,
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryLivechatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_room(&self, room: Room) {
        self.rooms.write().await.insert(room.id.clone(), room);
    }

    pub async fn insert_visitor(&self, visitor: Visitor) {
        self.visitors.write().await.insert(visitor.id.clone(), visitor);
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// 追加消息；消息必须带有 `rid`
    pub async fn insert_message(&self, message: Message) -> Result<()> {
        let Some(rid) = message.rid.clone() else {
            crate::bail_bridge!(
                ErrorCode::InvalidParameter,
                "message without room id",
                format!("message_id={}", message.id)
            );
        };
        self.messages.write().await.entry(rid).or_default().push(message);
        Ok(())
    }
}

#[async_trait]
impl RoomRepository for InMemoryLivechatStore {
    async fn find_one_by_id(&self, rid: &str) -> Result<Option<Room>> {
        Ok(self.rooms.read().await.get(rid).cloned())
    }

    async fn save_crm_data_by_room_id(&self, rid: &str, crm_data: JsonValue) -> Result<()> {
        let mut guard = self.rooms.write().await;
        let room = guard.get_mut(rid).ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::NotFound, "room not found")
                .details(format!("room_id={rid}"))
                .build_error()
        })?;
        room.crm_data = Some(crm_data);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryLivechatStore {
    async fn find_visible_by_room_id(&self, rid: &str) -> Result<Vec<Message>> {
        let guard = self.messages.read().await;
        let mut visible: Vec<Message> = guard
            .get(rid)
            .map(|list| list.iter().filter(|m| !m.hidden).cloned().collect())
            .unwrap_or_default();
        visible.sort_by(|a, b| a.ts.cmp(&b.ts));
        Ok(visible)
    }
}

#[async_trait]
impl VisitorRepository for InMemoryLivechatStore {
    async fn find_one_by_id(&self, id: &str) -> Result<Option<Visitor>> {
        Ok(self.visitors.read().await.get(id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryLivechatStore {
    async fn find_one_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }
}
