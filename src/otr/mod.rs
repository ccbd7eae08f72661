//! # OTR 加密消息层
//!
//! 客户端在已建立端到端会话的房间里对发送的消息加密、对收到的消息解密，
//! 并把 `otr` 用户通知转交给对应房间的会话。加密算法本身由外部实现提供。

mod interceptor;
mod pipeline;
mod session;

pub use interceptor::{MSG_OTR_ACK_TYPE, MSG_OTR_TYPE, OtrInterceptor, UserStreamEvent};
pub use pipeline::{MessagePipeline, MessageTransform};
pub use session::{
    AckUpdater, CurrentUser, DecryptedEnvelope, InMemoryOtrDirectory, OtrDirectory,
    OtrRoomSession, SessionUser, UserStreamData,
};
