//! 文件消息规范化：为附带文件的消息生成可公开访问的链接

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::settings::{self as keys, SettingsStore};
use crate::error::{ErrorBuilder, ErrorCode, Result};

use super::payload::{CrmMessage, FileUploadInfo};

#[async_trait]
pub trait FileUploadNormalizer: Send + Sync {
    async fn normalize(&self, message: CrmMessage) -> Result<CrmMessage>;
}

/// 以 `Site_Url` 为根生成 `/file-upload/<id>/<name>` 链接
pub struct SiteUrlFileUploadNormalizer {
    settings: Arc<dyn SettingsStore>,
}

impl SiteUrlFileUploadNormalizer {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    fn public_path(&self, file_id: &str, file_name: &str) -> Result<String> {
        let site_url = self.settings.get_string(keys::SITE_URL);
        let base = site_url.as_deref().unwrap_or("http://localhost/");
        let mut url = Url::parse(base).map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid site url")
                .details(format!("url={base}, err={err}"))
                .build_error()
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ErrorBuilder::new(ErrorCode::ConfigurationError, "site url cannot be a base")
                    .details(format!("url={base}"))
                    .build_error()
            })?
            .pop_if_empty()
            .push("file-upload")
            .push(file_id)
            .push(file_name);

        // 未配置站点地址时只返回路径部分
        if site_url.is_none() {
            return Ok(url.path().to_string());
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl FileUploadNormalizer for SiteUrlFileUploadNormalizer {
    async fn normalize(&self, mut message: CrmMessage) -> Result<CrmMessage> {
        if message.file_upload.is_some() {
            return Ok(message);
        }
        let Some(file) = &message.file else {
            return Ok(message);
        };

        let public_file_path = if file.name.is_empty() {
            String::new()
        } else {
            self.public_path(&file.id, &file.name)?
        };
        message.file_upload = Some(FileUploadInfo {
            public_file_path,
            content_type: file.content_type.clone(),
            size: file.size,
        });
        Ok(message)
    }
}
