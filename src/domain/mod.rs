//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod build;
pub mod container;
pub mod endpoint;
pub mod launch;
pub mod service;

// Re-exports for convenience
pub use build::{
    BuildEvent, BuildOptions, BuildOutcome, BuildSummary, LogLevel, ProgressUpdate,
    ServiceBuildSummary,
};
pub use container::{ContainerInfo, HistoryEntry, LifecycleStatus};
pub use endpoint::{EndpointAddress, EndpointKind, Platform, SocketBinding};
pub use launch::{ContainerLaunchSpec, HostConfig};
pub use service::{Service, ServiceRegistry, TargetError};
