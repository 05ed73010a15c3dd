//! Tests for the system API.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cim::{Record, NAMESPACE_CIMV2};
    use crate::support::{FakeClient, FakeServiceGraph};
    use crate::system::service::{DEPENDENT_SERVICE_ASSOCIATION, SERVICE_CLASS};
    use crate::system::{
        service_status, start_type, CimServiceFactory, LifecycleError, ServiceFactory, ServiceInfo, SystemApi,
    };

    fn service(name: &str, state: &str, start_mode: &str) -> Record {
        Record::new(NAMESPACE_CIMV2, SERVICE_CLASS)
            .with("Name", name)
            .with("DisplayName", format!("{} display", name))
            .with("State", state)
            .with("StartMode", start_mode)
    }

    fn api(client: FakeClient, graph: FakeServiceGraph) -> SystemApi {
        SystemApi::new(
            Arc::new(client),
            Arc::new(graph),
            Duration::from_millis(10),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_code_mappings() {
        assert_eq!(start_type("Boot"), 0);
        assert_eq!(start_type("Auto"), 2);
        assert_eq!(start_type("Disabled"), 4);
        assert_eq!(start_type("Whatever"), 0);
        assert_eq!(service_status("Stopped"), 1);
        assert_eq!(service_status("Running"), 4);
        assert_eq!(service_status("Paused"), 7);
        assert_eq!(service_status("Unknown"), 0);
    }

    #[tokio::test]
    async fn test_bios_serial_number() {
        let client = FakeClient::new()
            .with_instances([Record::new(NAMESPACE_CIMV2, "CIM_BIOSElement").with("SerialNumber", "ABC-123")]);
        let sys = api(client, FakeServiceGraph::new());
        assert_eq!(sys.bios_serial_number().await.unwrap(), "ABC-123");

        let empty = api(FakeClient::new(), FakeServiceGraph::new());
        assert!(empty.bios_serial_number().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_service_maps_codes() {
        let client = FakeClient::new().with_instances([
            service("csiproxy", "Running", "Auto"),
            service("other", "Stopped", "Manual"),
        ]);
        let sys = api(client, FakeServiceGraph::new());

        assert_eq!(
            sys.get_service("csiproxy").await.unwrap(),
            ServiceInfo {
                display_name: "csiproxy display".to_string(),
                start_type: 2,
                status: 4,
            }
        );
        assert!(sys.get_service("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_service_waits_for_running() {
        let graph = FakeServiceGraph::new().with_service("svc", "Stopped", &[]);
        let sys = api(FakeClient::new(), graph.clone());

        sys.start_service("svc").await.unwrap();
        assert_eq!(graph.state_of("svc").as_deref(), Some("Running"));
        assert_eq!(graph.started(), vec!["svc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_running_service_is_a_noop() {
        let graph = FakeServiceGraph::new().with_service("svc", "Running", &[]);
        let sys = api(FakeClient::new(), graph.clone());

        sys.start_service("svc").await.unwrap();
        assert!(graph.started().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_service_refused() {
        let graph = FakeServiceGraph::new()
            .with_service("svc", "Stopped", &[])
            .with_start_code("svc", 2);
        let sys = api(FakeClient::new(), graph);

        let err = sys.start_service("svc").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Transition { .. }), "got {:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_service_times_out() {
        let graph = FakeServiceGraph::new().with_service("svc", "Stopped", &[]).stuck("svc");
        let sys = api(FakeClient::new(), graph);

        match sys.start_service("svc").await.unwrap_err() {
            LifecycleError::Timeout { state } => assert_eq!(state, "Stopped"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_service_blocked_by_dependents() {
        let graph = FakeServiceGraph::new()
            .with_service("A", "Running", &["B"])
            .with_service("B", "Running", &[]);
        let sys = api(FakeClient::new(), graph.clone());

        match sys.stop_service("A", false).await.unwrap_err() {
            LifecycleError::DependentBlocked { name } => assert_eq!(name, "A"),
            other => panic!("expected dependent blocked, got {:?}", other),
        }
        assert!(graph.stopped().is_empty());
        assert_eq!(graph.state_of("B").as_deref(), Some("Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_stop_cascades_leaves_first() {
        let graph = FakeServiceGraph::new()
            .with_service("A", "Running", &["B", "X"])
            .with_service("B", "Running", &["C"])
            .with_service("C", "Running", &[])
            .with_service("X", "Stopped", &[]);
        let sys = api(FakeClient::new(), graph.clone());

        sys.stop_service("A", true).await.unwrap();
        assert_eq!(graph.stopped(), vec!["C", "B", "A"]);
        assert_eq!(graph.state_of("A").as_deref(), Some("Stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_stop_does_not_cascade_other_failures() {
        let graph = FakeServiceGraph::new()
            .with_service("A", "Running", &["B"])
            .with_service("B", "Running", &[])
            .with_stop_code("A", 2);
        let sys = api(FakeClient::new(), graph.clone());

        let err = sys.stop_service("A", true).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Transition { .. }), "got {:?}", err);
        assert!(graph.stopped().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_stopped_service_is_a_noop() {
        let graph = FakeServiceGraph::new().with_service("svc", "Stopped", &[]);
        let sys = api(FakeClient::new(), graph.clone());

        sys.stop_service("svc", false).await.unwrap();
        assert!(graph.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_win32_service_handle() {
        let client = Arc::new(
            FakeClient::new()
                .with_instances([service("a", "Running", "Auto"), service("b", "Running", "Manual")])
                .with_associated(DEPENDENT_SERVICE_ASSOCIATION, "a", [service("b", "Running", "Manual")])
                .with_method_result(SERVICE_CLASS, "StartService", 10),
        );
        let factory = CimServiceFactory::new(client.clone());

        let a = factory.get_service("a").await.unwrap();
        assert_eq!(a.name().await.unwrap(), "a");
        assert_eq!(a.state().await.unwrap(), "Running");
        assert_eq!(a.start_mode().await.unwrap(), "Auto");
        assert_eq!(a.display_name().await.unwrap(), "a display");

        let dependents = a.dependents().await.unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].name().await.unwrap(), "b");

        let b = factory.get_service("b").await.unwrap();
        assert!(b.dependents().await.unwrap().is_empty());

        assert_eq!(a.start_service().await.unwrap(), 10);
        assert_eq!(a.stop_service().await.unwrap(), 0);
        let methods: Vec<String> = client.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["StartService", "StopService"]);

        assert!(matches!(factory.get_service("zzz").await, Err(e) if e.is_not_found()));
    }
}
