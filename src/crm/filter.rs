use crate::config::settings::{self as keys, SettingsStore};

/// 访客浏览轨迹消息类型
pub const MSG_NAVIGATION_TYPE: &str = "livechat_navigation_history";
/// 会话结束消息类型
pub const MSG_CLOSING_TYPE: &str = "livechat-close";

/// 带类型的特殊消息是否需要发送到 CRM
pub fn send_message_type(settings: &dyn SettingsStore, message_type: &str) -> bool {
    match message_type {
        MSG_CLOSING_TYPE => true,
        MSG_NAVIGATION_TYPE => {
            settings.get_bool(keys::NAVIGATION_AS_MESSAGE)
                && settings.get_bool(keys::SEND_NAVIGATION_HISTORY)
        }
        _ => false,
    }
}
