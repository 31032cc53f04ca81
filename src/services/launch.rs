//! 容器启动规格构造

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::env::constants::{LEGACY_SOCKET_CANDIDATES_ENV, SOCKET_CANDIDATES_ENV};
use crate::domain::endpoint::{EndpointAddress, Platform, SocketBinding};
use crate::domain::launch::{ContainerLaunchSpec, HostConfig};

use super::socket::{resolve_binding, EndpointDetector};

/// 为单个服务构造 `ContainerLaunchSpec`
///
/// 每次调用都会重新探测端点，不做缓存
#[derive(Clone)]
pub struct ContainerOptionsBuilder {
    detector: Arc<dyn EndpointDetector>,
    platform: Platform,
    host_override: Option<String>,
}

impl ContainerOptionsBuilder {
    pub fn new(detector: Arc<dyn EndpointDetector>, platform: Platform) -> Self {
        Self {
            detector,
            platform,
            host_override: None,
        }
    }

    /// 显式指定宿主端点，空字符串视为未指定
    pub fn with_override(mut self, host_override: Option<String>) -> Self {
        self.host_override = host_override.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn build(
        &self,
        service_name: &str,
        image: &str,
        caller_env: &BTreeMap<String, String>,
    ) -> ContainerLaunchSpec {
        let detected: Vec<EndpointAddress> = self
            .detector
            .detect()
            .iter()
            .map(|raw| EndpointAddress::parse(raw))
            .collect();

        let override_addr = self
            .host_override
            .as_deref()
            .map(EndpointAddress::parse_override);

        let primary = match &override_addr {
            Some(addr) => addr.clone(),
            None => {
                let raw: Vec<String> = detected.iter().map(|a| a.path.clone()).collect();
                resolve_binding(&self.platform, &raw)
            }
        };

        let candidates = override_addr
            .iter()
            .chain(detected.iter())
            .map(|a| a.path.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut env = caller_env.clone();
        for key in [SOCKET_CANDIDATES_ENV, LEGACY_SOCKET_CANDIDATES_ENV] {
            env.entry(key.to_string())
                .or_insert_with(|| candidates.clone());
        }

        let socket = SocketBinding::new(&primary);
        debug!(
            service = service_name,
            socket = %primary,
            candidates = %candidates,
            "Built container launch spec"
        );

        ContainerLaunchSpec {
            image: image.to_string(),
            env,
            host_config: HostConfig {
                binds: vec![socket.to_bind()],
            },
            socket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::endpoint::EndpointKind;

    fn builder(detected: Vec<&'static str>, platform: Platform) -> ContainerOptionsBuilder {
        let detector = move || detected.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        ContainerOptionsBuilder::new(Arc::new(detector), platform)
    }

    fn platforms() -> Vec<Platform> {
        vec![Platform::Windows, Platform::Linux, Platform::MacOs]
    }

    #[test]
    fn test_single_bind_to_primary() {
        let spec = builder(vec!["/home/dev/.docker/run/docker.sock"], Platform::MacOs).build(
            "warden",
            "stack/warden:latest",
            &BTreeMap::new(),
        );

        assert_eq!(spec.image, "stack/warden:latest");
        assert_eq!(
            spec.host_config.binds,
            vec!["/home/dev/.docker/run/docker.sock:/var/run/docker.sock"]
        );
        assert_eq!(spec.socket.host_path, "/home/dev/.docker/run/docker.sock");
        assert_eq!(
            spec.env.get(SOCKET_CANDIDATES_ENV).map(String::as_str),
            Some("/home/dev/.docker/run/docker.sock")
        );
    }

    #[test]
    fn test_no_detection_falls_back_to_platform_default() {
        let spec = builder(vec![], Platform::Windows).build("warden", "img", &BTreeMap::new());
        assert_eq!(spec.socket.kind, EndpointKind::NamedPipe);
        assert_eq!(
            spec.host_config.binds,
            vec!["//./pipe/docker_engine:/var/run/docker.sock"]
        );
        assert_eq!(spec.env.get(SOCKET_CANDIDATES_ENV).map(String::as_str), Some(""));
    }

    #[test]
    fn test_override_wins_and_leads_candidates() {
        for platform in platforms() {
            let spec = builder(
                vec!["npipe:////./pipe/docker_engine", "/var/run/docker.sock"],
                platform,
            )
            .with_override(Some("unix:///tmp/custom.sock".to_string()))
            .build("warden", "img", &BTreeMap::new());

            assert_eq!(spec.socket.host_path, "/tmp/custom.sock");
            assert_eq!(
                spec.env.get(SOCKET_CANDIDATES_ENV).map(String::as_str),
                Some("/tmp/custom.sock,//./pipe/docker_engine,/var/run/docker.sock")
            );
            assert_eq!(
                spec.env.get(LEGACY_SOCKET_CANDIDATES_ENV),
                spec.env.get(SOCKET_CANDIDATES_ENV)
            );
        }
    }

    #[test]
    fn test_caller_candidates_preserved() {
        let detected_sets: Vec<Vec<&'static str>> = vec![
            vec![],
            vec!["/var/run/docker.sock"],
            vec!["npipe:////./pipe/docker_engine", "/run/user/1000/docker.sock"],
        ];
        for detected in detected_sets {
            let caller = BTreeMap::from([
                (SOCKET_CANDIDATES_ENV.to_string(), "caller-value".to_string()),
                ("RUST_LOG".to_string(), "debug".to_string()),
            ]);
            let spec = builder(detected, Platform::Linux).build("warden", "img", &caller);

            assert_eq!(
                spec.env.get(SOCKET_CANDIDATES_ENV).map(String::as_str),
                Some("caller-value")
            );
            assert_eq!(spec.env.get("RUST_LOG").map(String::as_str), Some("debug"));
            // 旧变量独立处理
            assert!(spec.env.contains_key(LEGACY_SOCKET_CANDIDATES_ENV));
        }
    }

    #[test]
    fn test_npipe_normalizes_same_as_override_or_detected() {
        let detected = builder(vec!["npipe:////./pipe/docker_engine"], Platform::Linux).build(
            "warden",
            "img",
            &BTreeMap::new(),
        );
        let overridden = builder(vec![], Platform::Linux)
            .with_override(Some("npipe:////./pipe/docker_engine".to_string()))
            .build("warden", "img", &BTreeMap::new());

        assert_eq!(detected.socket, overridden.socket);
        assert_eq!(detected.socket.kind, EndpointKind::NamedPipe);
        assert_eq!(detected.host_config.binds, overridden.host_config.binds);
    }

    #[test]
    fn test_detection_evaluated_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let detector = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        };
        let builder = ContainerOptionsBuilder::new(Arc::new(detector), Platform::Linux);

        builder.build("a", "img", &BTreeMap::new());
        builder.build("b", "img", &BTreeMap::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
