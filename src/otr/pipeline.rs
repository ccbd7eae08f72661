use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::Message;
use crate::error::Result;

/// 消息变换，按注册顺序串行执行
#[async_trait]
pub trait MessageTransform: Send + Sync {
    async fn apply(&self, message: Message) -> Result<Message>;
}

#[async_trait]
impl<T> MessageTransform for Arc<T>
where
    T: MessageTransform + ?Sized,
{
    async fn apply(&self, message: Message) -> Result<Message> {
        (**self).apply(message).await
    }
}

/// 客户端消息管道：发送前与接收后两条变换链
#[derive(Default)]
pub struct MessagePipeline {
    before_send: RwLock<Vec<Arc<dyn MessageTransform>>>,
    on_received: RwLock<Vec<Arc<dyn MessageTransform>>>,
}

impl MessagePipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn use_before_send(&self, transform: Arc<dyn MessageTransform>) {
        self.before_send.write().await.push(transform);
    }

    pub async fn use_on_received(&self, transform: Arc<dyn MessageTransform>) {
        self.on_received.write().await.push(transform);
    }

    pub async fn before_send(&self, message: Message) -> Result<Message> {
        let chain = self.before_send.read().await.clone();
        run_chain(&chain, message).await
    }

    pub async fn on_received(&self, message: Message) -> Result<Message> {
        let chain = self.on_received.read().await.clone();
        run_chain(&chain, message).await
    }
}

async fn run_chain(chain: &[Arc<dyn MessageTransform>], mut message: Message) -> Result<Message> {
    for transform in chain {
        message = transform.apply(message).await?;
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessageUser;
    use crate::error::{ErrorBuilder, ErrorCode};

    struct Append(&'static str);

    #[async_trait]
    impl MessageTransform for Append {
        async fn apply(&self, mut message: Message) -> Result<Message> {
            message.msg.push_str(self.0);
            Ok(message)
        }
    }

    struct Reject;

    #[async_trait]
    impl MessageTransform for Reject {
        async fn apply(&self, _message: Message) -> Result<Message> {
            Err(ErrorBuilder::new(ErrorCode::InvalidParameter, "rejected").build_error())
        }
    }

    fn message() -> Message {
        Message::new("m1", "r1", "x", MessageUser::default())
    }

    #[tokio::test]
    async fn transforms_run_in_registration_order() {
        let pipeline = MessagePipeline::new();
        pipeline.use_before_send(Arc::new(Append("a"))).await;
        pipeline.use_before_send(Arc::new(Append("b"))).await;
        pipeline.use_on_received(Arc::new(Append("c"))).await;

        assert_eq!(pipeline.before_send(message()).await.unwrap().msg, "xab");
        assert_eq!(pipeline.on_received(message()).await.unwrap().msg, "xc");
    }

    #[tokio::test]
    async fn errors_stop_the_chain() {
        let pipeline = MessagePipeline::new();
        pipeline.use_on_received(Arc::new(Reject)).await;
        pipeline.use_on_received(Arc::new(Append("never"))).await;

        let err = pipeline.on_received(message()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
    }
}
