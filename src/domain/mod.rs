//! # Livechat 领域层
//!
//! 定义会话相关的领域模型与仓储接口

pub mod memory;
pub mod models;
pub mod repositories;

pub use memory::InMemoryLivechatStore;
pub use models::*;
pub use repositories::{MessageRepository, RoomRepository, UserRepository, VisitorRepository};
