//! 引擎 socket 解析
//!
//! `resolve_binding` 是纯函数；`SystemEndpointDetector` 负责探测本机实际存在的端点

use std::path::Path;

use crate::domain::endpoint::{EndpointAddress, Platform, NPIPE_SCHEME, UNIX_SCHEME};

/// 选出主连接端点
///
/// 探测列表非空时取第一个（规范化后），否则回退到平台默认值
pub fn resolve_binding(platform: &Platform, detected: &[String]) -> EndpointAddress {
    detected
        .first()
        .map(|raw| EndpointAddress::parse(raw))
        .unwrap_or_else(|| EndpointAddress::platform_default(platform))
}

/// 端点探测器
///
/// 返回按优先级排序的端点地址（原始形式，可带 `npipe://`）
pub trait EndpointDetector: Send + Sync {
    fn detect(&self) -> Vec<String>;
}

impl<F> EndpointDetector for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn detect(&self) -> Vec<String> {
        self()
    }
}

/// 探测本机端点
pub struct SystemEndpointDetector {
    platform: Platform,
}

impl SystemEndpointDetector {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl EndpointDetector for SystemEndpointDetector {
    fn detect(&self) -> Vec<String> {
        let docker_host = std::env::var("DOCKER_HOST").ok();
        let home = std::env::var("HOME").ok();
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR").ok();

        let mut found = Vec::new();
        if let Some(host) = docker_host.as_deref().and_then(docker_host_endpoint) {
            found.push(host);
        }
        for location in well_known_locations(&self.platform, home.as_deref(), runtime_dir.as_deref())
        {
            if endpoint_exists(&location) && !found.contains(&location) {
                found.push(location);
            }
        }
        found
    }
}

/// 从 `DOCKER_HOST` 取出本地端点；`unix://` 只保留路径，TCP 地址忽略
fn docker_host_endpoint(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(path) = value.strip_prefix(UNIX_SCHEME) {
        (!path.is_empty()).then(|| path.to_string())
    } else if value.starts_with(NPIPE_SCHEME) {
        Some(value.to_string())
    } else {
        None
    }
}

/// 平台上引擎 socket 的常见位置
pub fn well_known_locations(
    platform: &Platform,
    home: Option<&str>,
    runtime_dir: Option<&str>,
) -> Vec<String> {
    if platform.is_windows() {
        return vec![
            "npipe:////./pipe/docker_engine".to_string(),
            "npipe:////./pipe/dockerDesktopLinuxEngine".to_string(),
        ];
    }

    let mut locations = vec!["/var/run/docker.sock".to_string()];
    if let Some(home) = home.filter(|h| !h.is_empty()) {
        locations.push(format!("{}/.docker/run/docker.sock", home));
        locations.push(format!("{}/.docker/desktop/docker.sock", home));
    }
    if let Some(dir) = runtime_dir.filter(|d| !d.is_empty()) {
        locations.push(format!("{}/docker.sock", dir));
        locations.push(format!("{}/podman/podman.sock", dir));
    }
    locations
}

fn endpoint_exists(location: &str) -> bool {
    match location.strip_prefix(NPIPE_SCHEME) {
        // 命名管道需要反斜杠形式才能被文件系统 API 识别
        Some(pipe) => Path::new(&pipe.replace('/', "\\")).exists(),
        None => Path::new(location).exists(),
    }
}
