//! 按服务的构建锁
//!
//! 同一服务同时最多一个构建；租约在 Drop 时释放

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Default)]
pub struct BuildLocks {
    building: Mutex<HashSet<String>>,
}

/// 一次构建请求持有的锁
pub struct BuildLease {
    locks: Arc<BuildLocks>,
    services: Vec<String>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一次性获取全部服务的锁
    ///
    /// 任一服务正在构建时整体失败，返回冲突的服务名
    pub fn try_acquire(
        self: &Arc<Self>,
        services: &[String],
    ) -> Result<BuildLease, Vec<String>> {
        let mut building = self.building.lock().unwrap_or_else(|e| e.into_inner());

        let busy: Vec<String> = services
            .iter()
            .filter(|s| building.contains(*s))
            .cloned()
            .collect();
        if !busy.is_empty() {
            return Err(busy);
        }

        for service in services {
            building.insert(service.clone());
        }
        debug!(services = ?services, "Build locks acquired");

        Ok(BuildLease {
            locks: Arc::clone(self),
            services: services.to_vec(),
        })
    }

    pub fn is_building(&self, service: &str) -> bool {
        self.building
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(service)
    }
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        let mut building = self
            .locks
            .building
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for service in &self.services {
            building.remove(service);
        }
        debug!(services = ?self.services, "Build locks released");
    }
}
