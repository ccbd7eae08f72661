//! 配置管理器 - 负责处理不同环境下的配置覆盖
//!
//! - 加载 `config/environments/{environment}.toml` 并合并到基础配置
//! - 读取环境变量中的 WebHook 端点与令牌

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::{BridgeConfig, merge_value};

pub const ENV_NAME: &str = "LIVECHAT_ENV";
pub const ENV_WEBHOOK_URL: &str = "LIVECHAT_WEBHOOK_URL";
pub const ENV_SECRET_TOKEN: &str = "LIVECHAT_SECRET_TOKEN";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 当前环境名称，未设置时为 "development"
    pub fn get_environment() -> String {
        env::var(ENV_NAME).unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置，随后应用环境变量覆盖
    pub fn load_environment_config(base_config: &mut BridgeConfig) -> Result<()> {
        let env_config_path = format!("config/environments/{}.toml", Self::get_environment());
        Self::merge_file(base_config, Path::new(&env_config_path))?;
        Self::apply_env_overrides(base_config);
        Ok(())
    }

    /// 将指定 TOML 文件合并到配置中，文件不存在时忽略
    pub fn merge_file(base_config: &mut BridgeConfig, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("unable to read environment config: {}", path.display()))?;
        let overlay: Value = toml::from_str(&content)
            .with_context(|| format!("invalid environment config format: {}", path.display()))?;

        let mut merged = Value::try_from(&*base_config)
            .context("unable to serialize base configuration")?;
        merge_value(&mut merged, overlay);
        *base_config = merged
            .try_into()
            .with_context(|| format!("invalid configuration after merging {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(config: &mut BridgeConfig) {
        if let Ok(url) = env::var(ENV_WEBHOOK_URL) {
            config.webhook.url = Some(url);
        }
        if let Ok(token) = env::var(ENV_SECRET_TOKEN) {
            config.webhook.secret_token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_file_overrides_base() {
        let dir = std::env::temp_dir().join(format!("livechat-bridge-env-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("production.toml");
        fs::write(
            &file,
            "[webhook]\nurl = \"https://prod\"\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let mut cfg = BridgeConfig::default();
        cfg.webhook.on_close = true;
        ConfigManager::merge_file(&mut cfg, &file).unwrap();

        assert_eq!(cfg.webhook.url.as_deref(), Some("https://prod"));
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.webhook.on_close);
    }

    #[test]
    fn missing_environment_file_is_ignored() {
        let mut cfg = BridgeConfig::default();
        ConfigManager::merge_file(&mut cfg, Path::new("/nonexistent/env.toml")).unwrap();
        assert!(cfg.webhook.url.is_none());
    }
}
