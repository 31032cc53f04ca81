//! 服务状态聚合

use serde::Serialize;
use std::sync::Arc;

use crate::domain::container::{ContainerInfo, HistoryEntry};
use crate::domain::service::{Service, ServiceRegistry};
use crate::infra::engine::{EngineClient, EngineError};
use crate::state::HistoryLog;

/// 快照选项
#[derive(Clone, Copy, Debug)]
pub struct SnapshotOptions {
    pub include_containers: bool,
    pub include_history: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_containers: true,
            include_history: true,
        }
    }
}

/// 注册表 + 容器 + 历史，每次调用重新计算
#[derive(Clone, Debug, Serialize)]
pub struct ServiceSnapshot {
    pub ok: bool,
    pub services: Vec<Service>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<ContainerInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

pub struct StateAggregator {
    registry: Arc<ServiceRegistry>,
    engine: Arc<dyn EngineClient>,
    history: Arc<HistoryLog>,
}

impl StateAggregator {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        engine: Arc<dyn EngineClient>,
        history: Arc<HistoryLog>,
    ) -> Self {
        Self {
            registry,
            engine,
            history,
        }
    }

    pub async fn snapshot(&self, options: SnapshotOptions) -> Result<ServiceSnapshot, EngineError> {
        let containers = if options.include_containers {
            Some(self.engine.list_containers().await?)
        } else {
            None
        };

        let history = if options.include_history {
            Some(self.history.entries().await)
        } else {
            None
        };

        Ok(ServiceSnapshot {
            ok: true,
            services: self.registry.all().to_vec(),
            containers,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::container::LifecycleStatus;
    use crate::domain::launch::ContainerLaunchSpec;
    use crate::infra::engine::{BuildJob, BuildReport, ProgressSink};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct ListingEngine {
        containers: Option<Vec<ContainerInfo>>,
    }

    #[async_trait]
    impl EngineClient for ListingEngine {
        async fn list_containers(&self) -> Result<Vec<ContainerInfo>, EngineError> {
            self.containers
                .clone()
                .ok_or_else(|| EngineError::Unavailable("engine down".to_string()))
        }

        async fn create_container(
            &self,
            _name: &str,
            _spec: &ContainerLaunchSpec,
        ) -> Result<String, EngineError> {
            unreachable!()
        }

        async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
            unreachable!()
        }

        async fn inspect_container(&self, _id: &str) -> Result<ContainerInfo, EngineError> {
            unreachable!()
        }

        async fn build(
            &self,
            _job: BuildJob<'_>,
            _sink: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<BuildReport, EngineError> {
            unreachable!()
        }
    }

    fn registry() -> Arc<ServiceRegistry> {
        Arc::new(ServiceRegistry::new(vec![
            Service::new("warden", "core", "stack/warden"),
            Service::new("relay", "edge", "stack/relay"),
        ]))
    }

    #[tokio::test]
    async fn test_snapshot_passes_through_in_order() {
        let containers = vec![
            ContainerInfo::from_ps_line("b|relay|stack/relay|Exited (0)|exited||"),
            ContainerInfo::from_ps_line("a|warden|stack/warden|Up|running||"),
        ];
        let history = Arc::new(HistoryLog::new());
        history.push("relay", LifecycleStatus::Launched, None).await;
        history.push("warden", LifecycleStatus::BuildFailed, None).await;

        let aggregator = StateAggregator::new(
            registry(),
            Arc::new(ListingEngine {
                containers: Some(containers.clone()),
            }),
            history.clone(),
        );
        let snapshot = aggregator.snapshot(SnapshotOptions::default()).await.unwrap();

        assert_eq!(snapshot.services, registry().all().to_vec());
        assert_eq!(snapshot.containers, Some(containers));
        assert_eq!(snapshot.history, Some(history.entries().await));
    }

    #[tokio::test]
    async fn test_snapshot_without_containers_skips_engine() {
        let aggregator = StateAggregator::new(
            registry(),
            Arc::new(ListingEngine { containers: None }),
            Arc::new(HistoryLog::new()),
        );

        let snapshot = aggregator
            .snapshot(SnapshotOptions {
                include_containers: false,
                include_history: false,
            })
            .await
            .unwrap();
        assert!(snapshot.containers.is_none());
        assert!(snapshot.history.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("containers").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_engine_failure() {
        let aggregator = StateAggregator::new(
            registry(),
            Arc::new(ListingEngine { containers: None }),
            Arc::new(HistoryLog::new()),
        );
        assert!(aggregator.snapshot(SnapshotOptions::default()).await.is_err());
    }
}
