//! 服务注册表加载
//!
//! 优先读取 `STACK_SERVICES_FILE` 指定的 JSON 文件，否则扫描 `SERVICE_<NAME>_IMAGE` 环境变量

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use thiserror::Error;

use crate::domain::service::{Service, ServiceRegistry};

/// 未配置分组时使用的分组名
pub const DEFAULT_GROUP: &str = "default";

/// 注册表加载错误
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read services file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid services file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate service name: {0}")]
    Duplicate(String),

    #[error("Service '{0}' has an empty image reference")]
    MissingImage(String),
}

/// 加载服务注册表
pub fn load_registry(services_file: Option<&Path>) -> Result<ServiceRegistry, RegistryError> {
    let services = match services_file {
        Some(path) => load_from_file(path)?,
        None => load_from_vars(env::vars()),
    };
    validate(&services)?;
    Ok(ServiceRegistry::new(services))
}

/// 从 JSON 文件加载（`[{"name", "group", "image"}]`）
pub fn load_from_file(path: &Path) -> Result<Vec<Service>, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_services(&content).map_err(|source| RegistryError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// 解析 JSON 注册表，`group` 可省略
pub fn parse_services(content: &str) -> Result<Vec<Service>, serde_json::Error> {
    #[derive(serde::Deserialize)]
    struct RawService {
        name: String,
        #[serde(default)]
        group: Option<String>,
        image: String,
    }

    let raw: Vec<RawService> = serde_json::from_str(content)?;
    Ok(raw
        .into_iter()
        .map(|r| Service {
            name: r.name,
            group: r.group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            image: r.image,
        })
        .collect())
}

/// 从 `SERVICE_<NAME>_IMAGE` / `SERVICE_<NAME>_GROUP` 变量加载
///
/// 服务名取 `<NAME>` 转小写并把 `_` 换成 `-`，结果按服务名排序
pub fn load_from_vars<I>(vars: I) -> Vec<Service>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = vars.into_iter().collect();
    let mut services = Vec::new();

    for (key, image) in &vars {
        let Some(raw_name) = key
            .strip_prefix("SERVICE_")
            .and_then(|s| s.strip_suffix("_IMAGE"))
        else {
            continue;
        };
        if raw_name.is_empty() {
            continue;
        }

        let group = vars
            .get(&format!("SERVICE_{}_GROUP", raw_name))
            .filter(|g| !g.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());

        services.push(Service {
            name: raw_name.to_lowercase().replace('_', "-"),
            group,
            image: image.clone(),
        });
    }

    services
}

fn validate(services: &[Service]) -> Result<(), RegistryError> {
    for (i, service) in services.iter().enumerate() {
        if service.image.trim().is_empty() {
            return Err(RegistryError::MissingImage(service.name.clone()));
        }
        if services[..i].iter().any(|s| s.name == service.name) {
            return Err(RegistryError::Duplicate(service.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services_default_group() {
        let services = parse_services(
            r#"[{"name":"warden","group":"core","image":"stack/warden"},{"name":"relay","image":"stack/relay"}]"#,
        )
        .unwrap();
        assert_eq!(services[0], Service::new("warden", "core", "stack/warden"));
        assert_eq!(services[1].group, DEFAULT_GROUP);
    }

    #[test]
    fn test_load_from_vars() {
        let vars = vec![
            ("SERVICE_WARDEN_IMAGE".to_string(), "stack/warden:dev".to_string()),
            ("SERVICE_WARDEN_GROUP".to_string(), "core".to_string()),
            ("SERVICE_EDGE_RELAY_IMAGE".to_string(), "stack/relay:dev".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];
        let services = load_from_vars(vars);
        assert_eq!(
            services,
            vec![
                Service::new("edge-relay", DEFAULT_GROUP, "stack/relay:dev"),
                Service::new("warden", "core", "stack/warden:dev"),
            ]
        );
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let services = vec![
            Service::new("warden", "core", "a"),
            Service::new("warden", "edge", "b"),
        ];
        assert!(matches!(
            validate(&services),
            Err(RegistryError::Duplicate(name)) if name == "warden"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let services = vec![Service::new("warden", "core", " ")];
        assert!(matches!(
            validate(&services),
            Err(RegistryError::MissingImage(_))
        ));
    }
}
