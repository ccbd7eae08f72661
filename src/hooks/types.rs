use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::{
    ForwardToAgentParams, ForwardToDepartmentParams, Inquiry, Message, Room,
};
use crate::error::{BridgeError, ErrorBuilder, ErrorCode, Result};

/// 宿主平台的生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    CloseRoom,
    NewRoom,
    AfterTakeInquiry,
    ChatQueued,
    AfterForwardChatToAgent,
    AfterForwardChatToDepartment,
    SaveInfo,
    AfterSaveMessage,
    LeadCapture,
}

impl HookKind {
    pub const ALL: [HookKind; 9] = [
        HookKind::CloseRoom,
        HookKind::NewRoom,
        HookKind::AfterTakeInquiry,
        HookKind::ChatQueued,
        HookKind::AfterForwardChatToAgent,
        HookKind::AfterForwardChatToDepartment,
        HookKind::SaveInfo,
        HookKind::AfterSaveMessage,
        HookKind::LeadCapture,
    ];

    /// 宿主平台中的事件名
    pub fn event_name(&self) -> &'static str {
        match self {
            HookKind::CloseRoom => "livechat.closeRoom",
            HookKind::NewRoom => "livechat.newRoom",
            HookKind::AfterTakeInquiry => "livechat.afterTakeInquiry",
            HookKind::ChatQueued => "livechat.chatQueued",
            HookKind::AfterForwardChatToAgent => "livechat.afterForwardChatToAgent",
            HookKind::AfterForwardChatToDepartment => "livechat.afterForwardChatToDepartment",
            HookKind::SaveInfo => "livechat.saveInfo",
            HookKind::AfterSaveMessage => "afterSaveMessage",
            HookKind::LeadCapture => "livechat.leadCapture",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        HookKind::ALL
            .into_iter()
            .find(|kind| kind.event_name() == name)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// 回调优先级，数值越小越先执行
pub struct HookPriority;

impl HookPriority {
    pub const HIGH: i32 = -1000;
    pub const MEDIUM: i32 = 0;
    pub const LOW: i32 = 1000;
}

/// Hook 执行策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookErrorPolicy {
    /// 失败时终止后续回调并返回错误
    #[default]
    FailFast,
    /// 失败时记录告警并继续
    Ignore,
}

/// 事件及其负载
#[derive(Debug, Clone)]
pub enum LivechatEvent {
    CloseRoom(Room),
    NewRoom(Room),
    AfterTakeInquiry(Inquiry),
    ChatQueued(Room),
    AfterForwardChatToAgent(ForwardToAgentParams),
    AfterForwardChatToDepartment(ForwardToDepartmentParams),
    SaveInfo(Room),
    AfterSaveMessage { message: Message, room: Room },
    LeadCapture(Room),
}

impl LivechatEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            LivechatEvent::CloseRoom(_) => HookKind::CloseRoom,
            LivechatEvent::NewRoom(_) => HookKind::NewRoom,
            LivechatEvent::AfterTakeInquiry(_) => HookKind::AfterTakeInquiry,
            LivechatEvent::ChatQueued(_) => HookKind::ChatQueued,
            LivechatEvent::AfterForwardChatToAgent(_) => HookKind::AfterForwardChatToAgent,
            LivechatEvent::AfterForwardChatToDepartment(_) => {
                HookKind::AfterForwardChatToDepartment
            }
            LivechatEvent::SaveInfo(_) => HookKind::SaveInfo,
            LivechatEvent::AfterSaveMessage { .. } => HookKind::AfterSaveMessage,
            LivechatEvent::LeadCapture(_) => HookKind::LeadCapture,
        }
    }

    /// 事件关联的房间 ID
    pub fn room_id(&self) -> &str {
        match self {
            LivechatEvent::CloseRoom(room)
            | LivechatEvent::NewRoom(room)
            | LivechatEvent::ChatQueued(room)
            | LivechatEvent::SaveInfo(room)
            | LivechatEvent::LeadCapture(room)
            | LivechatEvent::AfterSaveMessage { room, .. } => &room.id,
            LivechatEvent::AfterTakeInquiry(inquiry) => &inquiry.rid,
            LivechatEvent::AfterForwardChatToAgent(params) => &params.rid,
            LivechatEvent::AfterForwardChatToDepartment(params) => &params.rid,
        }
    }
}

/// Hook 执行结果
#[derive(Debug)]
pub enum HookOutcome {
    Completed,
    /// 未满足执行条件（设置关闭、房间不符合等）
    Skipped(&'static str),
    Failed(BridgeError),
}

impl HookOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, HookOutcome::Completed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, HookOutcome::Skipped(_))
    }

    pub fn into_result(self, metadata: &HookMetadata) -> Result<()> {
        match self {
            HookOutcome::Completed => Ok(()),
            HookOutcome::Skipped(reason) => {
                tracing::trace!(hook = %metadata.name, reason, "hook skipped");
                Ok(())
            }
            HookOutcome::Failed(err) => {
                if metadata.error_policy == HookErrorPolicy::Ignore {
                    tracing::warn!(
                        hook = %metadata.name,
                        "hook failed but configured to ignore: {err}"
                    );
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

impl From<Result<()>> for HookOutcome {
    fn from(value: Result<()>) -> Self {
        match value {
            Ok(_) => HookOutcome::Completed,
            Err(err) => HookOutcome::Failed(err),
        }
    }
}

/// 生命周期回调
#[async_trait]
pub trait LivechatCallback: Send + Sync {
    async fn handle(&self, event: &LivechatEvent) -> HookOutcome;
}

#[async_trait]
impl<T> LivechatCallback for Arc<T>
where
    T: LivechatCallback + ?Sized,
{
    async fn handle(&self, event: &LivechatEvent) -> HookOutcome {
        (**self).handle(event).await
    }
}

/// Hook 注册元信息
#[derive(Debug, Clone)]
pub struct HookMetadata {
    /// 回调 ID，同一事件内唯一
    pub name: Arc<str>,
    pub description: Option<Arc<str>>,
    pub kind: HookKind,
    pub priority: i32,
    pub timeout: Duration,
    pub error_policy: HookErrorPolicy,
}

impl Default for HookMetadata {
    fn default() -> Self {
        Self {
            name: Arc::from("anonymous"),
            description: None,
            kind: HookKind::NewRoom,
            priority: HookPriority::MEDIUM,
            timeout: Duration::from_millis(15_000),
            error_policy: HookErrorPolicy::FailFast,
        }
    }
}

impl HookMetadata {
    pub fn new<T: Into<Arc<str>>>(kind: HookKind, name: T) -> Self {
        Self::default().with_kind(kind).with_name(name)
    }

    pub fn with_kind(mut self, kind: HookKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name<T: Into<Arc<str>>>(mut self, name: T) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description<T: Into<Arc<str>>>(mut self, description: Option<T>) -> Self {
        self.description = description.map(Into::into);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_policy(mut self, policy: HookErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn build_error(&self, code: ErrorCode, message: &str) -> BridgeError {
        ErrorBuilder::new(code, message)
            .details(format!("hook={}, event={}", self.name, self.kind))
            .build_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for kind in HookKind::ALL {
            assert_eq!(HookKind::from_event_name(kind.event_name()), Some(kind));
        }
        assert_eq!(HookKind::from_event_name("livechat.unknown"), None);
    }

    #[test]
    fn ignore_policy_swallows_failures() {
        let metadata = HookMetadata::new(HookKind::CloseRoom, "crm")
            .with_error_policy(HookErrorPolicy::Ignore);
        let outcome = HookOutcome::Failed(
            ErrorBuilder::new(ErrorCode::ServiceUnavailable, "down").build_error(),
        );
        assert!(outcome.into_result(&metadata).is_ok());

        let strict = HookMetadata::new(HookKind::CloseRoom, "crm");
        let outcome = HookOutcome::Failed(
            ErrorBuilder::new(ErrorCode::ServiceUnavailable, "down").build_error(),
        );
        assert!(outcome.into_result(&strict).is_err());
    }

    #[test]
    fn forward_events_report_their_room() {
        let event = LivechatEvent::AfterForwardChatToDepartment(ForwardToDepartmentParams {
            rid: "r9".into(),
            old_department_id: Some("d1".into()),
        });
        assert_eq!(event.kind(), HookKind::AfterForwardChatToDepartment);
        assert_eq!(event.room_id(), "r9");
    }
}
