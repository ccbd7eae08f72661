//! # Prometheus 指标收集模块
//!
//! CRM 转发的请求计数与耗时。

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// CRM 转发指标
pub static CRM_METRICS: Lazy<CrmMetrics> = Lazy::new(|| {
    let metrics = CrmMetrics::new();
    metrics.register(&REGISTRY);
    metrics
});

pub struct CrmMetrics {
    /// CRM 请求总数（按事件类型与结果）
    pub requests_total: IntCounterVec,
    /// WebHook 请求耗时（秒）
    pub webhook_duration_seconds: Histogram,
}

impl CrmMetrics {
    pub fn new() -> Self {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "livechat_crm_requests_total",
                "Total number of CRM webhook requests",
            ),
            &["event_type", "outcome"],
        )
        .expect("Failed to create livechat_crm_requests_total metric");

        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "livechat_crm_webhook_duration_seconds",
                "CRM webhook request duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("Failed to create livechat_crm_webhook_duration_seconds metric");

        Self {
            requests_total,
            webhook_duration_seconds,
        }
    }

    fn register(&self, registry: &Registry) {
        if let Err(err) = registry.register(Box::new(self.requests_total.clone())) {
            tracing::warn!("failed to register livechat_crm_requests_total: {err}");
        }
        if let Err(err) = registry.register(Box::new(self.webhook_duration_seconds.clone())) {
            tracing::warn!("failed to register livechat_crm_webhook_duration_seconds: {err}");
        }
    }

    pub fn record(&self, event_type: &str, outcome: &str) {
        self.requests_total
            .with_label_values(&[event_type, outcome])
            .inc();
    }
}

impl Default for CrmMetrics {
    fn default() -> Self {
        Self::new()
    }
}
