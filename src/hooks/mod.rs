//! 生命周期 Hook 模块
//!
//! - 统一的事件、回调与执行结果定义
//! - 按事件分组、按优先级排序的回调注册中心

mod registry;
mod runtime;
mod types;

pub use registry::{CallbackRegistry, GlobalCallbackRegistry};
pub use runtime::HookDispatcher;
pub use types::{
    HookErrorPolicy, HookKind, HookMetadata, HookOutcome, HookPriority, LivechatCallback,
    LivechatEvent,
};
