//! # CRM 转发
//!
//! 将 livechat 会话与消息以 WebHook 形式推送到外部 CRM，并保存 CRM 回传的引用数据。

mod callbacks;
pub mod file_upload;
pub mod filter;
mod forwarder;
mod guest_info;
pub mod payload;
pub mod user_agent;

pub use callbacks::{CrmCallback, callback_name, install_crm_callbacks};
pub use file_upload::{FileUploadNormalizer, SiteUrlFileUploadNormalizer};
pub use filter::{MSG_CLOSING_TYPE, MSG_NAVIGATION_TYPE, send_message_type};
pub use forwarder::{CrmForwarder, IncludeMessages};
pub use guest_info::GuestInfoBuilder;
pub use payload::{
    AdditionalFields, CrmAgent, CrmEventType, CrmMessage, CrmPayload, CrmVisitor, FileUploadInfo,
};
pub use user_agent::{KeywordUserAgentInspector, UserAgentInfo, UserAgentInspector};
