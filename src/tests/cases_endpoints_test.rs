// Integration tests for the HTTP API endpoints.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::app::App;
use crate::cim::{Record, NAMESPACE_CIMV2, NAMESPACE_SMB, NAMESPACE_STORAGE};
use crate::config::new_test_config;
use crate::server::{Server, ServerError};
use crate::support::{FakeClient, FakeShell};

const SHARE: &str = r"\\fileserver\share";

struct Harness {
    server: Arc<Server>,
    serving: JoinHandle<Vec<ServerError>>,
    client: Arc<FakeClient>,
    shell: Arc<FakeShell>,
    http: reqwest::Client,
}

impl Harness {
    async fn start(client: FakeClient) -> Self {
        let client = Arc::new(client);
        let shell = Arc::new(FakeShell::new(""));
        let app = App::with_collaborators(&new_test_config(), client.clone(), shell.clone());
        let server = app.server();

        let (tx, rx) = oneshot::channel();
        let serving = tokio::spawn(async move { app.serve(Some(tx)).await });
        rx.await.expect("server should start listening");

        Self {
            server,
            serving,
            client,
            shell,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, group: &str, path: &str) -> String {
        let addr: SocketAddr = self.server.local_addr(group, "v1").expect("endpoint should be bound");
        format!("http://{}{}", addr, path)
    }

    async fn stop(self) -> Vec<ServerError> {
        self.server.stop().unwrap();
        self.serving.await.unwrap()
    }
}

fn service(name: &str, state: &str) -> Record {
    Record::new(NAMESPACE_CIMV2, "Win32_Service")
        .with("Name", name)
        .with("DisplayName", format!("{} service", name))
        .with("State", state)
        .with("StartMode", "Auto")
}

fn bios() -> Record {
    Record::new(NAMESPACE_CIMV2, "CIM_BIOSElement").with("SerialNumber", "SN-0042")
}

fn portal(address: &str) -> Record {
    Record::new(NAMESPACE_STORAGE, "MSFT_iSCSITargetPortal")
        .with("TargetPortalAddress", address)
        .with("TargetPortalPortNumber", 3260)
}

fn mapping(remote_path: &str) -> Record {
    Record::new(NAMESPACE_SMB, "MSFT_SmbGlobalMapping").with("RemotePath", remote_path)
}

#[tokio::test]
async fn test_every_group_is_served_on_its_own_endpoint() {
    let h = Harness::start(FakeClient::new()).await;

    let system = h.server.local_addr("system", "v1").unwrap();
    let iscsi = h.server.local_addr("iscsi", "v1").unwrap();
    let smb = h.server.local_addr("smb", "v1").unwrap();
    assert_ne!(system, iscsi);
    assert_ne!(iscsi, smb);

    // Routes of one group are not reachable through another group's endpoint.
    let resp = h
        .http
        .get(h.url("iscsi", "/v1/system/bios/serial-number"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    assert!(h.stop().await.is_empty());
}

#[tokio::test]
async fn test_system_endpoints() {
    let client = FakeClient::new().with_instances([bios(), service("svc", "Running"), service("idle", "Stopped")]);
    let h = Harness::start(client).await;

    let body: Value = h
        .http
        .get(h.url("system", "/v1/system/bios/serial-number"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "serial_number": "SN-0042" }));

    let body: Value = h
        .http
        .get(h.url("system", "/v1/system/services/svc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "display_name": "svc service", "start_type": 2, "status": 4 }));

    // Already in the desired state: no transition is requested.
    let resp = h.http.post(h.url("system", "/v1/system/services/svc/start")).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    let resp = h.http.post(h.url("system", "/v1/system/services/idle/stop")).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    assert!(h.client.calls().is_empty());

    assert!(h.stop().await.is_empty());
}

#[tokio::test]
async fn test_system_error_replies() {
    let client = FakeClient::new()
        .with_instances([service("parent", "Running")])
        .with_method_result("Win32_Service", "StopService", 3);
    let h = Harness::start(client).await;

    let resp = h.http.get(h.url("system", "/v1/system/services/missing")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["message"].as_str().unwrap().contains("Win32_Service"));

    let resp = h.http.post(h.url("system", "/v1/system/services/parent/stop")).send().await.unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 409);
    assert!(body["message"].as_str().unwrap().contains("parent"));

    let resp = h.http.get(h.url("system", "/v1/system/bios/serial-number")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    assert!(h.stop().await.is_empty());
}

#[tokio::test]
async fn test_iscsi_endpoints() {
    let h = Harness::start(FakeClient::new().with_instances([portal("10.0.0.1")])).await;

    let body: Value = h
        .http
        .get(h.url("iscsi", "/v1/iscsi/target-portals"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!([{ "address": "10.0.0.1", "port": 3260 }]));

    // The fake accepts the creation; the new portal becomes visible once the host lists it.
    h.client.add_instance(portal("10.0.0.2"));
    let resp = h
        .http
        .post(h.url("iscsi", "/v1/iscsi/target-portals"))
        .json(&json!({ "address": "10.0.0.2", "port": 3260 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "address": "10.0.0.2", "port": 3260 }));

    let resp = h
        .http
        .post(h.url("iscsi", "/v1/iscsi/targets/connect"))
        .json(&json!({
            "portal_address": "10.0.0.1",
            "portal_port": 3260,
            "node_address": "iqn.2024-01.test:t1",
            "auth_type": "ONEWAYCHAP",
            "chap_username": "u",
            "chap_secret": "s"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let calls = h.client.calls();
    let connect = calls.iter().find(|c| c.method == "Connect").unwrap();
    assert_eq!(connect.params["AuthenticationType"], "ONEWAYCHAP");

    let resp = h
        .http
        .get(h.url("iscsi", "/v1/iscsi/targets?address=10.9.9.9&port=3260"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    assert!(h.stop().await.is_empty());
}

#[tokio::test]
async fn test_smb_endpoints() {
    let h = Harness::start(FakeClient::new().with_instances([mapping(SHARE)])).await;

    let body: Value = h
        .http
        .get(h.url("smb", "/v1/smb/global-mappings"))
        .query(&[("remote_path", SHARE)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "remote_path": SHARE, "mapped": true }));

    let resp = h
        .http
        .post(h.url("smb", "/v1/smb/global-mappings"))
        .json(&json!({ "remote_path": r"\\fileserver\other", "username": "user", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = h
        .http
        .post(h.url("smb", "/v1/smb/links"))
        .json(&json!({ "remote_path": SHARE, "local_path": r"C:\mnt\share" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let runs = h.shell.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].var("smbpassword"), Some("secret"));
    assert!(!runs[0].script.contains("secret"));
    assert_eq!(runs[1].var("smblocalpath"), Some(r"C:\mnt\share"));

    let resp = h
        .http
        .delete(h.url("smb", "/v1/smb/global-mappings"))
        .query(&[("remote_path", SHARE)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = h
        .http
        .delete(h.url("smb", "/v1/smb/global-mappings"))
        .query(&[("remote_path", r"\\fileserver\missing")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    assert!(h.stop().await.is_empty());
}
