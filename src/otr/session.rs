use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::domain::models::Message;
use crate::error::Result;

/// 解密后的消息内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecryptedEnvelope {
    pub id: String,
    pub text: String,
    pub ack: String,
    pub ts: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
}

/// `otr` 用户通知流中的数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStreamData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 握手相关的其余字段，原样转交给房间会话
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl UserStreamData {
    pub fn new<T: Into<String>>(room_id: T, user_id: T) -> Self {
        Self {
            room_id: Some(room_id.into()),
            user_id: Some(user_id.into()),
            extra: Map::new(),
        }
    }
}

/// 单个房间的端到端加密会话，由外部加密实现提供
#[async_trait]
pub trait OtrRoomSession: Send + Sync {
    fn is_established(&self) -> bool;

    async fn encrypt(&self, message: &Message) -> Result<String>;

    async fn encrypt_text(&self, text: &str) -> Result<String>;

    async fn decrypt(&self, payload: &str) -> Result<DecryptedEnvelope>;

    async fn on_user_stream(&self, kind: &str, data: &UserStreamData) -> Result<()>;
}

pub trait OtrDirectory: Send + Sync {
    fn instance_for_room(&self, rid: &str) -> Option<Arc<dyn OtrRoomSession>>;
}

/// 基于 DashMap 的房间会话目录
#[derive(Default)]
pub struct InMemoryOtrDirectory {
    sessions: DashMap<String, Arc<dyn OtrRoomSession>>,
}

impl InMemoryOtrDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Into<String>>(&self, rid: T, session: Arc<dyn OtrRoomSession>) {
        self.sessions.insert(rid.into(), session);
    }

    pub fn remove(&self, rid: &str) -> Option<Arc<dyn OtrRoomSession>> {
        self.sessions.remove(rid).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl OtrDirectory for InMemoryOtrDirectory {
    fn instance_for_room(&self, rid: &str) -> Option<Arc<dyn OtrRoomSession>> {
        self.sessions.get(rid).map(|entry| entry.value().clone())
    }
}

/// 回执更新（服务端调用）
#[async_trait]
pub trait AckUpdater: Send + Sync {
    async fn update_ack(&self, message: &Message, encrypted_ack: &str) -> Result<()>;
}

pub trait CurrentUser: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// 可登录/登出的当前用户
#[derive(Debug, Default)]
pub struct SessionUser {
    user_id: RwLock<Option<String>>,
}

impl SessionUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in<T: Into<String>>(user_id: T) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn login<T: Into<String>>(&self, user_id: T) {
        let mut guard = self.user_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(user_id.into());
    }

    pub fn logout(&self) {
        let mut guard = self.user_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl CurrentUser for SessionUser {
    fn user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
