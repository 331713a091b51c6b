use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::{exception::Exception, param::*};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_stats_port")]
    stats_port: u16,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_log_config")]
    log_config: String,
}

fn default_port() -> u16 {
    DEFAULT_PROXY_PORT
}

fn default_stats_port() -> u16 {
    DEFAULT_STATS_PORT
}

fn default_log_config() -> String {
    "config/log4rs.yaml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            stats_port: default_stats_port(),
            local: false,
            worker_threads: num_cpus::get(),
            log_config: default_log_config(),
        }
    }

    /// 解析 TOML 文本
    pub fn parse(text: &str) -> Result<Self, Exception> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| Exception::Config(e.to_string()))?;
        if config.worker_threads == 0 {
            config.worker_threads = num_cpus::get();
        }
        Ok(config)
    }

    /// 从文件载入配置。文件不存在或无法解析时使用默认配置。
    pub fn from_toml(filename: impl AsRef<Path>) -> Self {
        let filename = filename.as_ref();
        let text = match fs::read_to_string(filename) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("配置文件{}不存在，使用默认配置", filename.display());
                return Self::parse("").unwrap_or_default();
            }
            Err(e) => {
                error!("无法读取配置文件{}：{}，使用默认配置", filename.display(), e);
                return Self::parse("").unwrap_or_default();
            }
        };
        match Self::parse(&text) {
            Ok(config) => config,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象：{}，使用默认配置", e);
                Self::parse("").unwrap_or_default()
            }
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn stats_port(&self) -> u16 {
        self.stats_port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn log_config(&self) -> &str {
        &self.log_config
    }
}
