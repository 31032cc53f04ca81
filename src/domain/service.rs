//! 栈服务注册表模型

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 服务注册项
///
/// 启动时从静态配置加载，运行期不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// 构建分组
    pub group: String,
    /// 目标镜像
    pub image: String,
}

impl Service {
    pub fn new(name: impl Into<String>, group: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            image: image.into(),
        }
    }
}

/// 有序的服务注册表
#[derive(Clone, Debug, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
}

/// 无法识别的构建目标
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// 未选择任何服务
    #[error("No services selected")]
    Empty,
    /// 既不是服务名也不是分组名
    #[error("Unknown service or group: {}", .0.join(", "))]
    Unknown(Vec<String>),
}

impl ServiceRegistry {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn all(&self) -> &[Service] {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// 所有分组名（按首次出现顺序）
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for service in &self.services {
            if !groups.contains(&service.group.as_str()) {
                groups.push(&service.group);
            }
        }
        groups
    }

    /// 解析构建目标
    ///
    /// 每个目标可以是服务名或分组名；分组按注册表顺序展开，结果去重并保持首次出现顺序
    pub fn resolve_targets(&self, targets: &[String]) -> Result<Vec<Service>, TargetError> {
        let mut resolved: Vec<Service> = Vec::new();
        let mut unknown = Vec::new();

        for target in targets {
            let target = target.trim();
            if let Some(service) = self.get(target) {
                push_unique(&mut resolved, service);
                continue;
            }

            let members: Vec<&Service> =
                self.services.iter().filter(|s| s.group == target).collect();
            if members.is_empty() {
                unknown.push(target.to_string());
            } else {
                for service in members {
                    push_unique(&mut resolved, service);
                }
            }
        }

        if !unknown.is_empty() {
            return Err(TargetError::Unknown(unknown));
        }
        if resolved.is_empty() {
            return Err(TargetError::Empty);
        }
        Ok(resolved)
    }
}

fn push_unique(list: &mut Vec<Service>, service: &Service) {
    if !list.iter().any(|s| s.name == service.name) {
        list.push(service.clone());
    }
}
