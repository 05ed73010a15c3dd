use super::{Api, Config, Logs, PowerShell, ProxyBox, Runtime, Service, Shutdown};
use std::collections::HashMap;
use std::time::Duration;

/// Creates a new test configuration. Every endpoint binds an ephemeral loopback port.
pub fn new_test_config() -> Config {
    let endpoints: HashMap<String, String> = ["system/v1", "iscsi/v1", "smb/v1"]
        .iter()
        .map(|key| (key.to_string(), "127.0.0.1:0".to_string()))
        .collect();

    Config {
        proxy: ProxyBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(Runtime { num_cpus: 2 }),
            api: Some(Api {
                endpoints,
                request_timeout: Some(Duration::from_secs(5)),
                drain_timeout: Some(Duration::from_millis(500)),
            }),
            service: Some(Service {
                check_interval: Some(Duration::from_millis(10)),
                check_timeout: Some(Duration::from_secs(1)),
            }),
            powershell: Some(PowerShell {
                path: Some("powershell.exe".to_string()),
            }),
            shutdown: Some(Shutdown {
                timeout: Some(Duration::from_secs(2)),
            }),
        },
    }
}
