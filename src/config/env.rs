//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::domain::endpoint::Platform;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 数据目录
    pub data_dir: PathBuf,
    /// 设置文件路径
    pub settings_path: PathBuf,
    /// 控制台页面（前端构建产物）
    pub dashboard_path: PathBuf,
    /// 服务注册表文件（可选）
    pub services_file: Option<PathBuf>,
    /// 构建容器镜像
    pub builder_image: String,
    /// 引擎 socket 显式覆盖
    pub engine_socket: Option<String>,
    /// 宿主平台
    pub platform: Platform,
    /// 引擎 CLI 可执行文件
    pub docker_bin: String,
    /// 非构建类引擎命令超时（秒）
    pub engine_timeout_secs: u64,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let host = env::var("STACK_DECK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = load_with_fallback("STACK_DECK_PORT", "PORT")
            .and_then(|v| match v.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!(value = %v, "Ignoring invalid port");
                    None
                }
            })
            .unwrap_or(constants::DEFAULT_PORT);

        let data_dir = env::var("STACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let settings_path = env::var("STACK_SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join(constants::SETTINGS_FILE_NAME));

        let dashboard_path = env::var("STACK_DASHBOARD_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("dashboard/dist/index.html"));

        let services_file = env::var("STACK_SERVICES_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let builder_image = env::var("STACK_BUILDER_IMAGE")
            .unwrap_or_else(|_| constants::DEFAULT_BUILDER_IMAGE.to_string());

        let engine_socket =
            load_with_fallback("STACK_ENGINE_SOCKET", "ENGINE_SOCKET").filter(|s| !s.is_empty());
        if env::var("ENGINE_SOCKET").is_ok() && env::var("STACK_ENGINE_SOCKET").is_err() {
            warn!("Deprecated ENGINE_SOCKET detected. Please use STACK_ENGINE_SOCKET");
        }

        let platform = env::var("STACK_PLATFORM")
            .map(|v| Platform::from_id(&v))
            .unwrap_or_else(|_| Platform::current());

        let docker_bin = env::var("STACK_DOCKER_BIN").unwrap_or_else(|_| "docker".to_string());

        let engine_timeout_secs = env::var("STACK_ENGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    warn!(value = %v, "Ignoring invalid engine timeout");
                    None
                }
            })
            .unwrap_or(constants::ENGINE_COMMAND_TIMEOUT_SECS);

        Self {
            host,
            port,
            data_dir,
            settings_path,
            dashboard_path,
            services_file,
            builder_image,
            engine_socket,
            platform,
            docker_bin,
            engine_timeout_secs,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            host: "127.0.0.1".to_string(),
            port: constants::DEFAULT_PORT,
            settings_path: data_dir.join(constants::SETTINGS_FILE_NAME),
            data_dir,
            dashboard_path: PathBuf::from("dashboard/dist/index.html"),
            services_file: None,
            builder_image: constants::DEFAULT_BUILDER_IMAGE.to_string(),
            engine_socket: None,
            platform: Platform::current(),
            docker_bin: "docker".to_string(),
            engine_timeout_secs: constants::ENGINE_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 7070;

    /// 设置文件名
    pub const SETTINGS_FILE_NAME: &str = "settings.json";

    /// 默认构建容器镜像
    pub const DEFAULT_BUILDER_IMAGE: &str = "stack-builder:latest";

    /// 全部已知 socket 的环境变量
    pub const SOCKET_CANDIDATES_ENV: &str = "ENGINE_SOCKET_CANDIDATES";

    /// 旧版名称，值与上面保持一致
    pub const LEGACY_SOCKET_CANDIDATES_ENV: &str = "DOCKER_SOCKET_CANDIDATES";

    /// 生命周期历史最大保存数量
    pub const MAX_HISTORY_ENTRIES: usize = 200;

    /// 单个构建请求的事件通道容量
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;

    /// 非构建类引擎命令超时（秒）
    pub const ENGINE_COMMAND_TIMEOUT_SECS: u64 = 30;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
