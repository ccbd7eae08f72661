use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::RwLock;

use crate::error::{ErrorCode, Result};

use super::types::{HookKind, HookMetadata, HookOutcome, LivechatCallback, LivechatEvent};

#[derive(Clone)]
struct RegistryEntry {
    metadata: HookMetadata,
    handler: Arc<dyn LivechatCallback>,
}

/// 回调注册中心：按事件分组，组内按优先级升序执行
#[derive(Default)]
pub struct CallbackRegistry {
    entries: RwLock<HashMap<HookKind, Vec<RegistryEntry>>>,
}

impl CallbackRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册回调；同一事件下同名回调会被替换
    pub async fn register(&self, metadata: HookMetadata, handler: Arc<dyn LivechatCallback>) {
        let mut guard = self.entries.write().await;
        let list = guard.entry(metadata.kind).or_default();
        let entry = RegistryEntry { metadata, handler };
        match list
            .iter_mut()
            .find(|existing| existing.metadata.name == entry.metadata.name)
        {
            Some(existing) => *existing = entry,
            None => list.push(entry),
        }
        // 稳定排序，保证同优先级按注册顺序
        list.sort_by_key(|entry| entry.metadata.priority);
    }

    pub async fn remove(&self, kind: HookKind, name: &str) -> bool {
        let mut guard = self.entries.write().await;
        let Some(list) = guard.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| &*entry.metadata.name != name);
        before != list.len()
    }

    /// 返回指定事件已注册的回调名（按执行顺序）
    pub async fn names(&self, kind: HookKind) -> Vec<Arc<str>> {
        let guard = self.entries.read().await;
        guard
            .get(&kind)
            .map(|list| list.iter().map(|e| Arc::clone(&e.metadata.name)).collect())
            .unwrap_or_default()
    }

    /// 执行事件的全部回调，每个回调受各自超时约束
    pub async fn run(&self, event: &LivechatEvent) -> Result<()> {
        let plan: Vec<RegistryEntry> = {
            let guard = self.entries.read().await;
            guard.get(&event.kind()).cloned().unwrap_or_default()
        };

        for entry in plan {
            let fut = entry.handler.handle(event);
            let outcome = match tokio::time::timeout(entry.metadata.timeout, fut).await {
                Ok(outcome) => outcome,
                Err(_) => HookOutcome::Failed(
                    entry
                        .metadata
                        .build_error(ErrorCode::OperationTimeout, "livechat callback timed out"),
                ),
            };
            tracing::debug!(
                hook = %entry.metadata.name,
                event = %event.kind(),
                room_id = %event.room_id(),
                completed = outcome.is_completed(),
                "livechat callback executed"
            );
            outcome.into_result(&entry.metadata)?;
        }
        Ok(())
    }
}

static GLOBAL_REGISTRY: OnceCell<Arc<CallbackRegistry>> = OnceCell::new();

/// 进程级回调注册中心
pub struct GlobalCallbackRegistry;

impl GlobalCallbackRegistry {
    pub fn init(registry: Arc<CallbackRegistry>) -> Arc<CallbackRegistry> {
        GLOBAL_REGISTRY.get_or_init(|| registry).clone()
    }

    pub fn get() -> Arc<CallbackRegistry> {
        GLOBAL_REGISTRY.get_or_init(CallbackRegistry::new).clone()
    }
}
