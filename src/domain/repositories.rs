//! # 仓储接口
//!
//! 房间、消息、访客与用户的持久化由宿主平台提供，这里只声明所需的查询与写入。

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;

use super::models::{Message, Room, User, Visitor};

/// 房间仓储
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn find_one_by_id(&self, rid: &str) -> Result<Option<Room>>;

    /// 保存 CRM 返回的数据到房间记录
    async fn save_crm_data_by_room_id(&self, rid: &str, crm_data: JsonValue) -> Result<()>;
}

/// 消息仓储
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 按时间升序返回房间内可见消息
    async fn find_visible_by_room_id(&self, rid: &str) -> Result<Vec<Message>>;
}

#[async_trait]
pub trait VisitorRepository: Send + Sync {
    async fn find_one_by_id(&self, id: &str) -> Result<Option<Visitor>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_one_by_id(&self, id: &str) -> Result<Option<User>>;
}
