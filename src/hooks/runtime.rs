use std::sync::Arc;

use crate::domain::models::{
    ForwardToAgentParams, ForwardToDepartmentParams, Inquiry, Message, Room,
};
use crate::error::Result;

use super::registry::CallbackRegistry;
use super::types::LivechatEvent;

/// Hook 调度器，封装各事件的触发入口
#[derive(Clone)]
pub struct HookDispatcher {
    registry: Arc<CallbackRegistry>,
}

impl HookDispatcher {
    pub fn new(registry: Arc<CallbackRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, event: LivechatEvent) -> Result<()> {
        self.registry.run(&event).await
    }

    pub async fn close_room(&self, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::CloseRoom(room)).await
    }

    pub async fn new_room(&self, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::NewRoom(room)).await
    }

    pub async fn after_take_inquiry(&self, inquiry: Inquiry) -> Result<()> {
        self.dispatch(LivechatEvent::AfterTakeInquiry(inquiry)).await
    }

    pub async fn chat_queued(&self, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::ChatQueued(room)).await
    }

    pub async fn after_forward_chat_to_agent(&self, params: ForwardToAgentParams) -> Result<()> {
        self.dispatch(LivechatEvent::AfterForwardChatToAgent(params))
            .await
    }

    pub async fn after_forward_chat_to_department(
        &self,
        params: ForwardToDepartmentParams,
    ) -> Result<()> {
        self.dispatch(LivechatEvent::AfterForwardChatToDepartment(params))
            .await
    }

    pub async fn save_info(&self, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::SaveInfo(room)).await
    }

    pub async fn after_save_message(&self, message: Message, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::AfterSaveMessage { message, room })
            .await
    }

    pub async fn lead_capture(&self, room: Room) -> Result<()> {
        self.dispatch(LivechatEvent::LeadCapture(room)).await
    }
}
