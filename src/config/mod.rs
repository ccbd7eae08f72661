//! 配置模块
//!
//! - 配置文件加载和解析（单文件或 `base.toml` + 覆盖目录）
//! - 环境特定配置覆盖
//! - 将配置转换为运行时设置存储

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use toml::Value;
use tracing::warn;

mod manager;
pub mod settings;

pub use manager::ConfigManager;
pub use settings::{InMemorySettings, SettingValue, SettingsStore};

/// 全局配置实例，使用 OnceLock 确保只初始化一次
static BRIDGE_CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 优先）
    pub level: String,
    pub json: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// CRM WebHook 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// CRM 端点，为空时不发送任何请求
    pub url: Option<String>,
    /// 随请求发送的令牌
    pub secret_token: Option<String>,
    /// 请求体签名密钥（HMAC-SHA256）
    pub signing_secret: Option<String>,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    /// 额外请求头
    pub headers: HashMap<String, String>,
    pub on_start: bool,
    pub on_close: bool,
    pub on_chat_taken: bool,
    pub on_chat_queued: bool,
    pub on_forward: bool,
    pub on_visitor_message: bool,
    pub on_agent_message: bool,
    pub on_capture: bool,
    /// 每次发送都附带完整的房间历史
    pub full_history: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret_token: None,
            signing_secret: None,
            timeout_ms: 10_000,
            headers: HashMap::new(),
            on_start: false,
            on_close: false,
            on_chat_taken: false,
            on_chat_queued: false,
            on_forward: false,
            on_visitor_message: false,
            on_agent_message: false,
            on_capture: false,
            full_history: true,
        }
    }
}

/// 访客浏览轨迹配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// 浏览轨迹以消息形式保存
    pub as_message: bool,
    /// 将浏览轨迹发送到 CRM
    pub send_history: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// 站点根地址，用于生成文件链接
    pub url: Option<String>,
}

/// OTR 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtrConfig {
    /// 通知类加密消息的占位文本
    pub encrypted_placeholder: String,
}

impl Default for OtrConfig {
    fn default() -> Self {
        Self {
            encrypted_placeholder: "Encrypted message".to_string(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub logging: LoggingConfig,
    pub webhook: WebhookConfig,
    pub navigation: NavigationConfig,
    pub site: SiteConfig,
    pub otr: OtrConfig,
    /// 原始设置覆盖，键名与宿主平台一致
    pub settings: HashMap<String, SettingValue>,
}

impl BridgeConfig {
    /// 将类型化配置展开为设置项，`[settings]` 中的同名键优先
    pub fn to_settings_map(&self) -> HashMap<String, SettingValue> {
        let webhook = &self.webhook;
        let mut map: HashMap<String, SettingValue> = HashMap::new();
        if let Some(url) = &webhook.url {
            map.insert(settings::WEBHOOK_URL.into(), url.clone().into());
        }
        if let Some(token) = &webhook.secret_token {
            map.insert(settings::SECRET_TOKEN.into(), token.clone().into());
        }
        if let Some(site_url) = &self.site.url {
            map.insert(settings::SITE_URL.into(), site_url.clone().into());
        }
        let toggles = [
            (settings::WEBHOOK_ON_START, webhook.on_start),
            (settings::WEBHOOK_ON_CLOSE, webhook.on_close),
            (settings::WEBHOOK_ON_CHAT_TAKEN, webhook.on_chat_taken),
            (settings::WEBHOOK_ON_CHAT_QUEUED, webhook.on_chat_queued),
            (settings::WEBHOOK_ON_FORWARD, webhook.on_forward),
            (settings::WEBHOOK_ON_VISITOR_MESSAGE, webhook.on_visitor_message),
            (settings::WEBHOOK_ON_AGENT_MESSAGE, webhook.on_agent_message),
            (settings::WEBHOOK_ON_CAPTURE, webhook.on_capture),
            (settings::WEBHOOK_FULL_HISTORY, webhook.full_history),
            (settings::NAVIGATION_AS_MESSAGE, self.navigation.as_message),
            (settings::SEND_NAVIGATION_HISTORY, self.navigation.send_history),
        ];
        for (key, value) in toggles {
            map.insert(key.to_string(), value.into());
        }
        map.extend(self.settings.clone());
        map
    }

    pub fn settings_store(&self) -> InMemorySettings {
        InMemorySettings::from_map(self.to_settings_map())
    }
}

/// 加载配置（只初始化一次）
pub fn load_config(path: Option<&str>) -> &'static BridgeConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config/bridge.toml")],
    };

    BRIDGE_CONFIG.get_or_init(|| {
        let mut cfg = load_with_fallback(&candidates);
        if let Err(e) = ConfigManager::load_environment_config(&mut cfg) {
            warn!("failed to load environment config: {}", e);
        }
        cfg
    })
}

/// 获取已加载的配置
pub fn bridge_config() -> Option<&'static BridgeConfig> {
    BRIDGE_CONFIG.get()
}

fn load_with_fallback(candidates: &[PathBuf]) -> BridgeConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    BridgeConfig::default()
}

/// 从文件或目录加载配置（不缓存）
pub fn load_config_from_source(path: &Path) -> Result<BridgeConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    if path.is_dir() {
        load_config_from_directory(path)
    } else {
        load_config_from_file(path)
    }
}

fn load_config_from_file(path: &Path) -> Result<BridgeConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("invalid config format: {}", path.display()))
}

/// 目录结构：`base.toml` 为基础，`overrides/*.toml` 按文件名顺序覆盖
fn load_config_from_directory(path: &Path) -> Result<BridgeConfig> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;
    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("overrides"))?;

    merged
        .try_into()
        .with_context(|| format!("invalid configuration after merging {}", path.display()))
}

/// `overrides/` 下的 `.toml` 片段，按路径排序
fn override_fragments(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut fragments: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("unable to list bridge config overrides in {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
        })
        .collect();
    fragments.sort();
    Ok(fragments)
}

fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    for fragment in override_fragments(dir)? {
        tracing::debug!(fragment = %fragment.display(), "applying bridge config override");
        merge_value(root, load_toml_value(&fragment)?);
    }
    Ok(())
}

fn load_toml_value(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("unable to read bridge config fragment {}", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("invalid bridge config fragment {}", path.display()))
}

/// 递归合并：表按键合并，其余值直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            merge_tables(base_table, overlay_table)
        }
        (slot, value) => *slot = value,
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
