//! 基础设施模块
//!
//! 封装外部依赖（容器引擎、命令执行、设置文件）

pub mod command;
pub mod engine;
pub mod settings_store;

pub use command::CommandRunner;
pub use engine::{BuildJob, BuildReport, DockerCli, EngineClient, EngineError, ProgressSink};
pub use settings_store::{
    JsonFileSettingsStore, MemorySettingsStore, SettingsEnvelope, SettingsError, SettingsStore,
};
