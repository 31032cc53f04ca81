//! 应用状态

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{env::EnvConfig, load_registry};
use crate::domain::service::ServiceRegistry;
use crate::infra::engine::{DockerCli, EngineClient};
use crate::infra::settings_store::{JsonFileSettingsStore, SettingsStore};
use crate::services::launch::ContainerOptionsBuilder;
use crate::services::snapshot::StateAggregator;
use crate::services::socket::{EndpointDetector, SystemEndpointDetector};

use super::build_locks::BuildLocks;
use super::history::HistoryLog;

/// 应用状态
pub struct AppState {
    /// 环境配置
    pub config: EnvConfig,
    /// 服务注册表（启动后不变）
    pub registry: Arc<ServiceRegistry>,
    pub engine: Arc<dyn EngineClient>,
    pub settings: Arc<dyn SettingsStore>,
    pub history: Arc<HistoryLog>,
    pub build_locks: Arc<BuildLocks>,
    pub detector: Arc<dyn EndpointDetector>,
}

impl AppState {
    /// 从环境变量创建
    pub fn from_env() -> anyhow::Result<Self> {
        let config = EnvConfig::from_env();
        let registry = load_registry(config.services_file.as_deref())?;

        info!(
            services = registry.len(),
            groups = ?registry.groups(),
            platform = config.platform.as_str(),
            settings = %config.settings_path.display(),
            "Loaded service registry"
        );
        if registry.is_empty() {
            tracing::warn!("No services configured. Set STACK_SERVICES_FILE or SERVICE_<NAME>_IMAGE");
        }

        let engine = Arc::new(
            DockerCli::new(config.docker_bin.clone())
                .with_timeout(Duration::from_secs(config.engine_timeout_secs)),
        );
        let settings = Arc::new(JsonFileSettingsStore::new(config.settings_path.clone()));
        let detector = Arc::new(SystemEndpointDetector::new(config.platform.clone()));

        Ok(Self::new(config, registry, engine, settings, detector))
    }

    pub fn new(
        config: EnvConfig,
        registry: ServiceRegistry,
        engine: Arc<dyn EngineClient>,
        settings: Arc<dyn SettingsStore>,
        detector: Arc<dyn EndpointDetector>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            engine,
            settings,
            history: Arc::new(HistoryLog::new()),
            build_locks: Arc::new(BuildLocks::new()),
            detector,
        }
    }

    /// 容器启动规格构造器
    ///
    /// `settings_override` 来自运行时设置，优先于环境变量
    pub fn launcher(&self, settings_override: Option<String>) -> ContainerOptionsBuilder {
        ContainerOptionsBuilder::new(self.detector.clone(), self.config.platform.clone())
            .with_override(settings_override.or_else(|| self.config.engine_socket.clone()))
    }

    pub fn aggregator(&self) -> StateAggregator {
        StateAggregator::new(
            self.registry.clone(),
            self.engine.clone(),
            self.history.clone(),
        )
    }
}
