//! 容器启动规格

use serde::Serialize;
use std::collections::BTreeMap;

use super::endpoint::SocketBinding;

/// 宿主机配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostConfig {
    #[serde(rename = "Binds")]
    pub binds: Vec<String>,
}

/// 单个服务的容器启动规格
///
/// 每次请求现场构造，由调用方独占，用完即弃
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLaunchSpec {
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub host_config: HostConfig,
    /// 构造 bind 时使用的引擎 socket
    #[serde(skip)]
    pub socket: SocketBinding,
}

impl ContainerLaunchSpec {
    /// `KEY=VALUE` 形式的环境变量列表（按 key 排序）
    pub fn env_pairs(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::endpoint::EndpointAddress;

    #[test]
    fn test_serialized_shape() {
        let socket = SocketBinding::new(&EndpointAddress::unix_socket("/var/run/docker.sock"));
        let spec = ContainerLaunchSpec {
            image: "stack/warden:latest".to_string(),
            env: BTreeMap::from([("A".to_string(), "1".to_string())]),
            host_config: HostConfig {
                binds: vec![socket.to_bind()],
            },
            socket,
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["image"], "stack/warden:latest");
        assert_eq!(json["env"]["A"], "1");
        assert_eq!(
            json["hostConfig"]["Binds"][0],
            "/var/run/docker.sock:/var/run/docker.sock"
        );
        assert!(json.get("socket").is_none());
        assert_eq!(spec.env_pairs(), vec!["A=1".to_string()]);
    }
}
