//! # CRM 请求负载
//!
//! 字段名与既有 CRM 集成保持一致（camelCase，`_id`）。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::models::{CustomFields, MessageUser, Room, UserRef, VisitorEmail, VisitorPhone};

/// 发送到 CRM 的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrmEventType {
    #[serde(rename = "LivechatSessionStart")]
    SessionStart,
    #[serde(rename = "LivechatSessionQueued")]
    SessionQueued,
    /// 会话结束
    #[serde(rename = "LivechatSession")]
    Session,
    #[serde(rename = "LivechatSessionTaken")]
    SessionTaken,
    #[serde(rename = "LivechatSessionForwarded")]
    SessionForwarded,
    #[serde(rename = "LivechatEdit")]
    Edit,
    Message,
    LeadCapture,
}

impl CrmEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrmEventType::SessionStart => "LivechatSessionStart",
            CrmEventType::SessionQueued => "LivechatSessionQueued",
            CrmEventType::Session => "LivechatSession",
            CrmEventType::SessionTaken => "LivechatSessionTaken",
            CrmEventType::SessionForwarded => "LivechatSessionForwarded",
            CrmEventType::Edit => "LivechatEdit",
            CrmEventType::Message => "Message",
            CrmEventType::LeadCapture => "LeadCapture",
        }
    }
}

impl fmt::Display for CrmEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmVisitor {
    #[serde(rename = "_id")]
    pub id: String,
    pub token: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<Vec<VisitorEmail>>,
    pub phone: Option<Vec<VisitorPhone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<CustomFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmAgent {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// 规范化后的文件信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadInfo {
    pub public_file_path: String,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: Option<String>,
    pub msg: String,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    pub u: MessageUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<JsonValue>,
    pub closing_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<crate::domain::models::MessageFile>,
    pub attachments: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_upload: Option<FileUploadInfo>,
}

/// 按事件类型附加的房间字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_served_by: Option<UserRef>,
}

impl AdditionalFields {
    pub fn for_event(event_type: CrmEventType, room: &Room) -> Self {
        let department_id = room.department_id.clone();
        match event_type {
            CrmEventType::SessionStart | CrmEventType::SessionQueued => Self {
                department_id,
                ..Default::default()
            },
            CrmEventType::Session => Self {
                department_id,
                served_by: room.served_by.clone(),
                closed_at: room.closed_at,
                closed_by: room.closed_by.clone(),
                closer: room.closer.clone(),
                ..Default::default()
            },
            CrmEventType::SessionTaken => Self {
                department_id,
                served_by: room.served_by.clone(),
                ..Default::default()
            },
            CrmEventType::SessionForwarded => Self {
                department_id,
                served_by: room.served_by.clone(),
                old_department_id: room.old_department_id.clone(),
                old_served_by: room.old_served_by.clone(),
                ..Default::default()
            },
            CrmEventType::Edit | CrmEventType::Message | CrmEventType::LeadCapture => {
                Self::default()
            }
        }
    }
}

/// 完整的 CRM 请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmPayload {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub event_type: CrmEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<CustomFields>,
    pub messages: Vec<CrmMessage>,
    pub visitor: CrmVisitor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<CrmAgent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crm_data: Option<JsonValue>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn closed_room() -> Room {
        let mut room = Room::new("r1");
        room.department_id = Some("d1".into());
        room.served_by = Some(UserRef::new("a1", "agent"));
        room.closer = Some("visitor".into());
        room.old_department_id = Some("d0".into());
        room
    }

    #[test]
    fn close_event_carries_closing_fields() {
        let fields = AdditionalFields::for_event(CrmEventType::Session, &closed_room());
        assert_eq!(fields.department_id.as_deref(), Some("d1"));
        assert_eq!(fields.closer.as_deref(), Some("visitor"));
        assert!(fields.old_department_id.is_none());
    }

    #[test]
    fn start_event_only_carries_department() {
        let fields = AdditionalFields::for_event(CrmEventType::SessionStart, &closed_room());
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({ "departmentId": "d1" })
        );
    }

    #[test]
    fn message_and_edit_events_carry_nothing_extra() {
        for event_type in [CrmEventType::Message, CrmEventType::Edit, CrmEventType::LeadCapture] {
            assert_eq!(
                AdditionalFields::for_event(event_type, &closed_room()),
                AdditionalFields::default()
            );
        }
    }

    #[test]
    fn forwarded_event_includes_previous_assignment() {
        let fields = AdditionalFields::for_event(CrmEventType::SessionForwarded, &closed_room());
        assert_eq!(fields.old_department_id.as_deref(), Some("d0"));
        assert_eq!(fields.served_by.unwrap().id, "a1");
    }

    #[test]
    fn event_type_serializes_with_wire_name() {
        assert_eq!(
            serde_json::to_value(CrmEventType::Session).unwrap(),
            json!("LivechatSession")
        );
        assert_eq!(
            serde_json::to_value(CrmEventType::LeadCapture).unwrap(),
            json!("LeadCapture")
        );
    }
}
