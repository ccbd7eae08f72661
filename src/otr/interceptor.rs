use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::OtrConfig;
use crate::domain::models::Message;
use crate::error::Result;

use super::pipeline::{MessagePipeline, MessageTransform};
use super::session::{AckUpdater, CurrentUser, OtrDirectory, OtrRoomSession, UserStreamData};

/// 加密消息类型
pub const MSG_OTR_TYPE: &str = "otr";
/// 已确认回执的加密消息类型
pub const MSG_OTR_ACK_TYPE: &str = "otr-ack";

/// 用户通知流事件：`(kind, data)`
pub type UserStreamEvent = (String, UserStreamData);

/// 在已建立 OTR 会话的房间中加解密消息
pub struct OtrInterceptor {
    directory: Arc<dyn OtrDirectory>,
    current_user: Arc<dyn CurrentUser>,
    ack_updater: Arc<dyn AckUpdater>,
    encrypted_placeholder: String,
}

impl OtrInterceptor {
    pub fn new(
        directory: Arc<dyn OtrDirectory>,
        current_user: Arc<dyn CurrentUser>,
        ack_updater: Arc<dyn AckUpdater>,
    ) -> Self {
        Self {
            directory,
            current_user,
            ack_updater,
            encrypted_placeholder: OtrConfig::default().encrypted_placeholder,
        }
    }

    pub fn with_config(mut self, config: &OtrConfig) -> Self {
        self.encrypted_placeholder = config.encrypted_placeholder.clone();
        self
    }

    /// 将拦截器挂到管道的两条链上
    pub async fn install(self: Arc<Self>, pipeline: &MessagePipeline) {
        pipeline
            .use_before_send(Arc::new(BeforeSend(self.clone())))
            .await;
        pipeline.use_on_received(Arc::new(OnReceived(self))).await;
    }

    fn established_session(&self, message: &Message) -> Option<Arc<dyn OtrRoomSession>> {
        let rid = message.rid.as_deref()?;
        self.directory
            .instance_for_room(rid)
            .filter(|session| session.is_established())
    }

    pub async fn before_send(&self, mut message: Message) -> Result<Message> {
        let Some(session) = self.established_session(&message) else {
            return Ok(message);
        };
        message.msg = session.encrypt(&message).await?;
        message.t = Some(MSG_OTR_TYPE.to_string());
        Ok(message)
    }

    pub async fn on_received(&self, mut message: Message) -> Result<Message> {
        let Some(session) = self.established_session(&message) else {
            if message.message_type() == Some(MSG_OTR_TYPE) {
                message.msg.clear();
            }
            return Ok(message);
        };

        if message.notification {
            message.msg = self.encrypted_placeholder.clone();
            return Ok(message);
        }

        let envelope = session.decrypt(&message.msg).await?;
        if let Some(ts) = envelope.ts {
            message.ts = ts;
        }

        if let Some(otr_ack) = message.otr_ack.as_deref() {
            let acked = session.decrypt(otr_ack).await?;
            if acked.text == envelope.ack {
                message.t = Some(MSG_OTR_ACK_TYPE.to_string());
            }
        } else if envelope.user_id != self.current_user.user_id() {
            let encrypted_ack = session.encrypt_text(&envelope.ack).await?;
            if let Err(err) = self.ack_updater.update_ack(&message, &encrypted_ack).await {
                tracing::warn!(room_id = ?message.rid, "failed to update otr ack: {err}");
            }
        }

        message.id = envelope.id;
        message.msg = envelope.text;
        Ok(message)
    }

    /// 处理 `otr` 用户通知；自己发出的或缺少房间/用户的通知被忽略
    pub async fn handle_user_stream(&self, kind: &str, data: &UserStreamData) -> Result<()> {
        let room_id = data.room_id.as_deref().filter(|s| !s.is_empty());
        let user_id = data.user_id.as_deref().filter(|s| !s.is_empty());
        let (Some(room_id), Some(user_id)) = (room_id, user_id) else {
            return Ok(());
        };
        if self.current_user.user_id().as_deref() == Some(user_id) {
            return Ok(());
        }

        match self.directory.instance_for_room(room_id) {
            Some(session) => session.on_user_stream(kind, data).await,
            None => {
                tracing::debug!(room_id, kind, "no otr session for room, drop user stream");
                Ok(())
            }
        }
    }

    /// 消费用户通知流直到通道关闭；未登录期间的通知被丢弃
    pub async fn run_user_stream(&self, mut rx: mpsc::Receiver<UserStreamEvent>) {
        while let Some((kind, data)) = rx.recv().await {
            if self.current_user.user_id().is_none() {
                tracing::trace!(kind = %kind, "no user logged in, skip otr stream");
                continue;
            }
            if let Err(err) = self.handle_user_stream(&kind, &data).await {
                tracing::warn!(kind = %kind, "failed to handle otr user stream: {err}");
            }
        }
        tracing::debug!("otr user stream closed");
    }
}

struct BeforeSend(Arc<OtrInterceptor>);

#[async_trait]
impl MessageTransform for BeforeSend {
    async fn apply(&self, message: Message) -> Result<Message> {
        self.0.before_send(message).await
    }
}

struct OnReceived(Arc<OtrInterceptor>);

#[async_trait]
impl MessageTransform for OnReceived {
    async fn apply(&self, message: Message) -> Result<Message> {
        self.0.on_received(message).await
    }
}
