//! 设置存储
//!
//! 宿主平台的设置项以键值形式读取，键名与既有部署保持一致。

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

pub const WEBHOOK_URL: &str = "Livechat_webhookUrl";
pub const SECRET_TOKEN: &str = "Livechat_secret_token";
pub const WEBHOOK_ON_START: &str = "Livechat_webhook_on_start";
pub const WEBHOOK_ON_CLOSE: &str = "Livechat_webhook_on_close";
pub const WEBHOOK_ON_CHAT_TAKEN: &str = "Livechat_webhook_on_chat_taken";
pub const WEBHOOK_ON_CHAT_QUEUED: &str = "Livechat_webhook_on_chat_queued";
pub const WEBHOOK_ON_FORWARD: &str = "Livechat_webhook_on_forward";
pub const WEBHOOK_ON_VISITOR_MESSAGE: &str = "Livechat_webhook_on_visitor_message";
pub const WEBHOOK_ON_AGENT_MESSAGE: &str = "Livechat_webhook_on_agent_message";
pub const WEBHOOK_ON_CAPTURE: &str = "Livechat_webhook_on_capture";
pub const WEBHOOK_FULL_HISTORY: &str = "Livechat_webhook_full_history";
pub const NAVIGATION_AS_MESSAGE: &str = "Livechat_Visitor_navigation_as_a_message";
pub const SEND_NAVIGATION_HISTORY: &str =
    "Send_visitor_navigation_history_livechat_webhook_request";
pub const SITE_URL: &str = "Site_Url";

/// 设置值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    /// 真值判断：空字符串与 0 视为 false
    pub fn is_truthy(&self) -> bool {
        match self {
            SettingValue::Bool(value) => *value,
            SettingValue::Integer(value) => *value != 0,
            SettingValue::Float(value) => *value != 0.0,
            SettingValue::String(value) => !value.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

/// 设置存储接口
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// 未设置时返回 false
    fn get_bool(&self, key: &str) -> bool {
        self.get(key).map(|v| v.is_truthy()).unwrap_or(false)
    }

    /// 未设置或为空字符串时返回 None
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|v| !v.is_empty())
    }
}

/// 可运行时修改的内存设置
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<HashMap<String, SettingValue>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<String, SettingValue>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn set<K: Into<String>, V: Into<SettingValue>>(&self, key: K, value: V) {
        let mut guard = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        let mut guard = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(key);
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        let guard = match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_are_falsy() {
        let settings = InMemorySettings::new();
        assert!(!settings.get_bool(WEBHOOK_ON_CLOSE));
        assert_eq!(settings.get_string(WEBHOOK_URL), None);
    }

    #[test]
    fn empty_url_is_treated_as_unset() {
        let settings = InMemorySettings::new();
        settings.set(WEBHOOK_URL, "");
        assert_eq!(settings.get_string(WEBHOOK_URL), None);
        assert!(!settings.get_bool(WEBHOOK_URL));

        settings.set(WEBHOOK_URL, "https://crm.example.com/hook");
        assert_eq!(
            settings.get_string(WEBHOOK_URL).as_deref(),
            Some("https://crm.example.com/hook")
        );
    }

    #[test]
    fn untagged_values_parse_from_toml() {
        let parsed: HashMap<String, SettingValue> =
            toml::from_str("a = true\nb = \"x\"\nc = 0").unwrap();
        assert_eq!(parsed["a"], SettingValue::Bool(true));
        assert_eq!(parsed["b"], SettingValue::String("x".into()));
        assert!(!parsed["c"].is_truthy());
    }
}
