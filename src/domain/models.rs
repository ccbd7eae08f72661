//! # Livechat 领域模型
//!
//! 房间、访客、坐席与消息的数据结构。字段名沿用宿主平台的 JSON 形态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Livechat 房间类型标识
pub const LIVECHAT_ROOM_TYPE: &str = "l";

/// 自定义字段（JSON 对象）
pub type CustomFields = Map<String, JsonValue>;

/// 用户引用（坐席、关闭人等）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl UserRef {
    pub fn new<T: Into<String>, U: Into<String>>(id: T, username: U) -> Self {
        Self {
            id: id.into(),
            username: Some(username.into()),
            ts: None,
        }
    }
}

/// 房间内的访客引用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomVisitor {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// 会话房间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "t", default)]
    pub room_type: String,
    #[serde(default)]
    pub fname: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lm: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub livechat_data: Option<CustomFields>,
    #[serde(rename = "v", default)]
    pub visitor: Option<RoomVisitor>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub served_by: Option<UserRef>,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_by: Option<UserRef>,
    #[serde(default)]
    pub closer: Option<String>,
    #[serde(default)]
    pub crm_data: Option<JsonValue>,
    /// 转接前的坐席（仅在转接事件中临时赋值）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_served_by: Option<UserRef>,
    /// 转接前的部门（仅在转接事件中临时赋值）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_department_id: Option<String>,
}

impl Room {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self {
            id: id.into(),
            room_type: LIVECHAT_ROOM_TYPE.to_string(),
            open: true,
            ..Default::default()
        }
    }

    /// 是否为带访客令牌的 livechat 房间
    pub fn is_livechat_with_visitor(&self) -> bool {
        self.room_type == LIVECHAT_ROOM_TYPE
            && self
                .visitor
                .as_ref()
                .map(|v| v.token.is_some())
                .unwrap_or(false)
    }

    pub fn visitor_id(&self) -> Option<&str> {
        self.visitor.as_ref().map(|v| v.id.as_str())
    }

    pub fn served_by_id(&self) -> Option<&str> {
        self.served_by.as_ref().map(|u| u.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorEmail {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorPhone {
    pub phone_number: String,
}

/// 访客
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    #[serde(rename = "_id")]
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub visitor_emails: Vec<VisitorEmail>,
    #[serde(default)]
    pub phone: Vec<VisitorPhone>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub livechat_data: Option<CustomFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEmail {
    pub address: String,
    #[serde(default)]
    pub verified: bool,
}

/// 平台用户（坐席）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub emails: Vec<UserEmail>,
}

/// 消息作者
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 消息附带的文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// 聊天消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub rid: Option<String>,
    #[serde(default)]
    pub msg: String,
    pub ts: DateTime<Utc>,
    pub u: MessageUser,
    /// 特殊消息类型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    /// 访客发送的消息带有访客令牌
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<MessageFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub notification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otr_ack: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl Message {
    pub fn new<T: Into<String>>(id: T, rid: T, msg: T, u: MessageUser) -> Self {
        Self {
            id: id.into(),
            rid: Some(rid.into()),
            msg: msg.into(),
            ts: Utc::now(),
            u,
            ..Default::default()
        }
    }

    pub fn with_type<T: Into<String>>(mut self, t: T) -> Self {
        self.t = Some(t.into());
        self
    }

    pub fn with_token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = ts;
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.t.as_deref().filter(|t| !t.is_empty())
    }
}

/// 排队中的咨询
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    #[serde(rename = "_id")]
    pub id: String,
    pub rid: String,
}

/// 转接至坐席的事件参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardToAgentParams {
    pub rid: String,
    #[serde(default)]
    pub old_served_by: Option<UserRef>,
}

/// 转接至部门的事件参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardToDepartmentParams {
    pub rid: String,
    #[serde(default)]
    pub old_department_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_deserializes_from_platform_shape() {
        let room: Room = serde_json::from_value(json!({
            "_id": "r1",
            "t": "l",
            "fname": "Guest 1",
            "v": { "_id": "v1", "token": "tok", "username": "guest-1" },
            "departmentId": "d1",
            "servedBy": { "_id": "a1", "username": "agent" },
            "open": true,
            "livechatData": { "plan": "pro" }
        }))
        .unwrap();

        assert!(room.is_livechat_with_visitor());
        assert_eq!(room.served_by_id(), Some("a1"));
        assert_eq!(room.department_id.as_deref(), Some("d1"));
        assert_eq!(room.livechat_data.unwrap()["plan"], "pro");
    }

    #[test]
    fn room_without_visitor_token_is_not_forwardable() {
        let mut room = Room::new("r1");
        room.visitor = Some(RoomVisitor {
            id: "v1".into(),
            token: None,
            username: None,
        });
        assert!(!room.is_livechat_with_visitor());

        let mut direct = Room::new("r2");
        direct.room_type = "d".into();
        assert!(!direct.is_livechat_with_visitor());
    }

    #[test]
    fn empty_message_type_counts_as_untyped() {
        let user = MessageUser {
            id: "u1".into(),
            username: Some("guest".into()),
            name: None,
        };
        let msg = Message::new("m1", "r1", "hi", user).with_type("");
        assert_eq!(msg.message_type(), None);
    }
}
