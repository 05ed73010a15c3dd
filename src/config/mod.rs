// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::powershell::DEFAULT_PROGRAM;
use crate::server::DEFAULT_DRAIN_TIMEOUT;
use crate::system::{DEFAULT_CHECK_INTERVAL, DEFAULT_CHECK_TIMEOUT};

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const DEBUG: &str = "debug";
#[allow(dead_code)]
pub const TEST: &str = "test";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Proxy {
    #[serde(rename = "proxy")]
    pub proxy: ProxyBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub api: Option<Api>,
    pub service: Option<Service>,
    pub powershell: Option<PowerShell>,
    pub shutdown: Option<Shutdown>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Api {
    /// `<group>/<version>` -> `host:port`
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    #[serde(rename = "request_timeout", default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    /// Upper bound for in-flight requests once an endpoint is stopped.
    #[serde(rename = "drain_timeout", default, with = "humantime_serde")]
    pub drain_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    #[serde(rename = "check_interval", default, with = "humantime_serde")]
    pub check_interval: Option<Duration>,
    #[serde(rename = "check_timeout", default, with = "humantime_serde")]
    pub check_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerShell {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_debug(&self) -> bool;
    #[allow(dead_code)]
    fn is_dev(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn runtime(&self) -> &Runtime;
    fn endpoints(&self) -> HashMap<String, String>;
    fn request_timeout(&self) -> Duration;
    fn drain_timeout(&self) -> Duration;
    fn check_interval(&self) -> Duration;
    fn check_timeout(&self) -> Duration;
    fn powershell_path(&self) -> &str;
    fn shutdown_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Proxy;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.proxy.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.proxy.env == PROD
    }

    fn is_debug(&self) -> bool {
        self.proxy.env == DEBUG
    }

    fn is_dev(&self) -> bool {
        self.proxy.env == DEV
    }

    fn is_test(&self) -> bool {
        self.proxy.env == TEST
    }

    fn runtime(&self) -> &Runtime {
        const ALL_CORES: Runtime = Runtime { num_cpus: 0 };
        self.proxy.runtime.as_ref().unwrap_or(&ALL_CORES)
    }

    fn endpoints(&self) -> HashMap<String, String> {
        self.proxy
            .api
            .as_ref()
            .map(|api| api.endpoints.clone())
            .unwrap_or_default()
    }

    fn request_timeout(&self) -> Duration {
        self.proxy
            .api
            .as_ref()
            .and_then(|api| api.request_timeout)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    fn drain_timeout(&self) -> Duration {
        self.proxy
            .api
            .as_ref()
            .and_then(|api| api.drain_timeout)
            .unwrap_or(DEFAULT_DRAIN_TIMEOUT)
    }

    fn check_interval(&self) -> Duration {
        self.proxy
            .service
            .as_ref()
            .and_then(|s| s.check_interval)
            .unwrap_or(DEFAULT_CHECK_INTERVAL)
    }

    fn check_timeout(&self) -> Duration {
        self.proxy
            .service
            .as_ref()
            .and_then(|s| s.check_timeout)
            .unwrap_or(DEFAULT_CHECK_TIMEOUT)
    }

    fn powershell_path(&self) -> &str {
        self.proxy
            .powershell
            .as_ref()
            .and_then(|p| p.path.as_deref())
            .unwrap_or(DEFAULT_PROGRAM)
    }

    fn shutdown_timeout(&self) -> Duration {
        self.proxy
            .shutdown
            .as_ref()
            .and_then(|s| s.timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        // Read file
        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Parses and validates a YAML document.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Proxy = serde_yaml::from_str(data)?;

        if cfg.check_interval().is_zero() {
            anyhow::bail!("service.check_interval must be positive");
        }
        if cfg.check_timeout() < cfg.check_interval() {
            anyhow::bail!("service.check_timeout must not be shorter than service.check_interval");
        }
        if cfg.drain_timeout() >= cfg.shutdown_timeout() {
            anyhow::bail!("api.drain_timeout must be shorter than shutdown.timeout");
        }
        for (key, address) in cfg.endpoints() {
            if key.split_once('/').map_or(true, |(g, v)| g.is_empty() || v.is_empty()) {
                anyhow::bail!("invalid endpoint key {:?}, expected <group>/<version>", key);
            }
            if address.trim().is_empty() {
                anyhow::bail!("endpoint {} has an empty address", key);
            }
        }

        Ok(cfg)
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
