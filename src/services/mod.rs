//! 业务服务模块

pub mod build;
pub mod launch;
pub mod snapshot;
pub mod socket;

pub use build::{BuildOrchestrator, BuildPlan, BuildReporter, LaunchOverrides};
pub use launch::ContainerOptionsBuilder;
pub use snapshot::{ServiceSnapshot, SnapshotOptions, StateAggregator};
pub use socket::{resolve_binding, EndpointDetector, SystemEndpointDetector};
