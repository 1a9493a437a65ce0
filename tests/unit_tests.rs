use fill_station::{
    link::mock::{MockBackend, MockPort, MockTransport},
    telemetry::{EventHistory, FillLog, Presence, PumpState},
    BandState, CommandRequest, ConnectionStatus, FillEvent, FillPhase, Station, StationConfig,
};
use std::time::Duration;

fn fast_config(port: &str) -> StationConfig {
    StationConfig::default()
        .with_port(port)
        .with_settle_delay(Duration::from_millis(1))
        .with_retry_backoff(Duration::from_millis(5))
        .with_poll_interval(Duration::from_millis(2))
        .with_command_repeats(3, Duration::from_millis(1))
}

fn connected(station: &Station) -> bool {
    station.connection_status().state == ConnectionStatus::Connected
}

/// Poll `check` until it holds or two seconds pass
async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Test the full cup cycle: placement, pump run and fill completion
#[test]
fn test_fill_cycle_end_to_end() {
    let station = Station::new(StationConfig::default()).unwrap();

    station.ingest_line(r#"{"IR":1,"ULTRA":15,"TEMP":21.7,"BOMBA":"OFF"}"#);
    assert!(station.report().events.is_empty());
    assert_eq!(station.telemetry().presence, "No cup");

    station.ingest_line(r#"{"IR":0,"ULTRA":4,"TEMP":21.9,"BOMBA":"OFF"}"#);
    let report = station.report();
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].phase, FillPhase::Placed);
    assert_eq!(report.events[0].level, "4 cm");
    assert_eq!(report.events[0].temperature, "21.9 °C");
    assert_eq!(report.fill_count, 0);
    assert_eq!(station.telemetry().presence, "Cup detected");

    station.ingest_line(r#"{"IR":0,"ULTRA":2,"TEMP":22.0,"BOMBA":"ON"}"#);
    assert_eq!(station.report().events.len(), 1);
    assert_eq!(station.telemetry().presence, "Cup detected");
    assert_eq!(station.telemetry().pump, "On");

    station.ingest_line(r#"{"IR":0,"ULTRA":2,"TEMP":22.0,"BOMBA":"OFF"}"#);
    let report = station.report();
    assert_eq!(report.fill_count, 1);
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.events[1].phase, FillPhase::Completed);
    assert_eq!(report.events[1].level, "2 cm");
    assert_eq!(station.telemetry().presence, "Cup detected");
}

/// Test that the same cycle in the legacy format yields the same report
#[test]
fn test_legacy_fill_cycle_matches_structured() {
    let structured = Station::new(StationConfig::default()).unwrap();
    let legacy = Station::new(StationConfig::default()).unwrap();

    for (json, text) in [
        (r#"{"IR":1,"ULTRA":15,"TEMP":21.7,"BOMBA":"OFF"}"#, "IR:1,ULTRA:15,TEMP:21.7,BOMBA:0"),
        (r#"{"IR":0,"ULTRA":4,"TEMP":21.9,"BOMBA":"OFF"}"#, "IR:0,ULTRA:4,TEMP:21.9,BOMBA:0"),
        (r#"{"IR":0,"ULTRA":2,"TEMP":22.0,"BOMBA":"ON"}"#, "BOMBA:1,IR:0,TEMP:22.0,ULTRA:2"),
        (r#"{"IR":0,"ULTRA":2,"TEMP":22.0,"BOMBA":"OFF"}"#, "IR:0,ULTRA:2,TEMP:22.0,BOMBA:0"),
    ] {
        structured.ingest_line(json);
        legacy.ingest_line(text);
        assert_eq!(structured.telemetry(), legacy.telemetry());
    }

    let a = structured.report();
    let b = legacy.report();
    assert_eq!(a.fill_count, b.fill_count);
    let phases = |events: &[FillEvent]| events.iter().map(|e| e.phase).collect::<Vec<_>>();
    assert_eq!(phases(&a.events), phases(&b.events));
}

/// Test that repeated absent readings still produce a single placement
#[test]
fn test_presence_and_pump_edges() {
    let station = Station::new(StationConfig::default()).unwrap();
    for line in [
        "IR:1,ULTRA:9,TEMP:20,BOMBA:0",
        "IR:1,ULTRA:9,TEMP:20,BOMBA:0",
        "IR:1,ULTRA:9,TEMP:20,BOMBA:0",
        "IR:0,ULTRA:9,TEMP:20,BOMBA:0",
        "IR:1,ULTRA:9,TEMP:20,BOMBA:0",
        "IR:1,ULTRA:9,TEMP:20,BOMBA:1",
        "IR:1,ULTRA:9,TEMP:20,BOMBA:1",
    ] {
        station.ingest_line(line);
    }
    let report = station.report();
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].phase, FillPhase::Placed);
    assert_eq!(report.fill_count, 0);

    station.ingest_line("IR:1,ULTRA:9,TEMP:20,BOMBA:0");
    assert_eq!(station.report().fill_count, 1);
}

/// Test the history keeps only the most recent events
#[test]
fn test_history_boundedness() {
    let mut log = FillLog::with_capacity(100);
    for i in 0..150 {
        log.record(FillEvent::cup(FillPhase::Completed, format!("{} cm", i), "Error"));
    }

    let report = log.report();
    assert_eq!(report.events.len(), 100);
    assert_eq!(report.fill_count, 150);
    assert_eq!(report.events.first().unwrap().level, "50 cm");
    assert_eq!(report.events.last().unwrap().level, "149 cm");

    assert_eq!(EventHistory::default().capacity(), 100);
}

/// Test temperature rendering and channel degradation
#[test]
fn test_temperature_formatting() {
    let station = Station::new(StationConfig::default()).unwrap();
    station.ingest_line(r#"{"IR":0,"ULTRA":7,"TEMP":23.456,"BOMBA":"ON"}"#);
    assert_eq!(station.telemetry().temperature, "23.5 °C");

    station.ingest_line(r#"{"IR":0,"ULTRA":8,"TEMP":"abc","BOMBA":"ON"}"#);
    let snapshot = station.telemetry();
    assert_eq!(snapshot.temperature, "Error");
    assert_eq!(snapshot.distance, "8 cm");
    assert_eq!(snapshot.presence, Presence::Detected.to_string());
    assert_eq!(snapshot.pump, PumpState::On.to_string());
}

/// Test that querying never writes or changes the band state
#[tokio::test]
async fn test_query_is_idempotent() {
    let station = Station::new(fast_config("SIM")).unwrap();
    station.ingest_line("BANDA:ON");

    for _ in 0..10 {
        let outcome = station.send_command(CommandRequest::Query).await;
        assert!(outcome.success);
        assert_eq!(outcome.state, BandState::On);
        assert_eq!(outcome.message, "Current state queried.");
    }
    assert_eq!(station.band_state(), BandState::On);
}

/// Test failover to the next discovered port after an access-denied error
#[tokio::test]
async fn test_permission_denied_failover() {
    let mock = MockTransport::new();
    let backend = MockBackend::new(["A", "B"])
        .with_port("A", MockPort::Denied)
        .with_port("B", MockPort::Ready(mock.clone()));

    let station = Station::new(fast_config("A")).unwrap();
    let manager = tokio::spawn(station.link_manager(backend.clone()).run());

    assert!(wait_for(|| connected(&station)).await);
    let status = station.connection_status();
    assert_eq!(status.state, ConnectionStatus::Connected);
    assert_eq!(status.active_port, "B");
    assert_eq!(status.discovered_ports, vec!["A", "B"]);
    assert_eq!(backend.attempts(), vec!["A", "B"]);
    assert_eq!(station.link().device().as_deref(), Some("B"));
    assert!(mock.clear_count() >= 1);

    manager.abort();
}

/// Test that a generic open failure keeps retrying the same port
#[tokio::test]
async fn test_transient_error_retries_same_port() {
    let backend = MockBackend::new(["A", "B"]).with_port("A", MockPort::Failing("busy".into()));
    let station = Station::new(fast_config("A").with_max_attempts(Some(3))).unwrap();

    station.link_manager(backend.clone()).run().await;

    assert_eq!(backend.attempts(), vec!["A", "A", "A"]);
    let status = station.connection_status();
    assert_eq!(status.active_port, "A");
    assert!(matches!(status.state, ConnectionStatus::Error(_)));
    assert!(status.status.starts_with("Error: "));
}

/// Test the running station reads lines and forwards band commands
#[tokio::test]
async fn test_spawned_station_reads_and_commands() {
    let mock = MockTransport::new();
    let backend = MockBackend::new(["SIM"]).with_port("SIM", MockPort::Ready(mock.clone()));
    let station = Station::new(fast_config("SIM")).unwrap();
    let tasks = station.spawn(backend);

    assert!(wait_for(|| connected(&station)).await);

    mock.inject_line(r#"{"IR":1,"ULTRA":15,"TEMP":21.7,"BOMBA":"OFF"}"#);
    mock.inject_line(r#"{"IR":0,"ULTRA":4,"TEMP":21.9,"BOMBA":"OFF"}"#);
    mock.inject_line("BANDA:ON");
    assert!(wait_for(|| station.band_state() == BandState::On).await);
    assert_eq!(station.telemetry().distance, "4 cm");
    assert_eq!(station.report().events.len(), 1);

    let outcome = station.send_command(CommandRequest::Off).await;
    assert!(outcome.success);
    assert_eq!(outcome.message, "Band OFF - command sent");
    assert_eq!(mock.get_written(), b"0\n0\n0\n".to_vec());
    assert_eq!(station.band_state(), BandState::Off);

    tasks.reader.abort();
    tasks.link_manager.abort();
}

/// Test that a read failure drops the link and the manager reconnects
#[tokio::test]
async fn test_read_failure_triggers_reconnect() {
    let mock = MockTransport::new();
    let backend = MockBackend::new(["SIM"]).with_port("SIM", MockPort::Ready(mock.clone()));
    let station = Station::new(fast_config("SIM")).unwrap();
    let tasks = station.spawn(backend.clone());

    assert!(wait_for(|| connected(&station)).await);
    mock.fail_next_read(std::io::ErrorKind::BrokenPipe);

    assert!(wait_for(|| backend.attempts().len() >= 2 && connected(&station)).await);
    assert!(mock.is_closed());
    assert!(station.link().last_error().is_some());
    assert!(station.link().is_open());

    tasks.reader.abort();
    tasks.link_manager.abort();
}

/// Test commands from synchronous callers without a link
#[test]
fn test_command_without_device_blocking_caller() {
    let station = Station::new(fast_config("SIM")).unwrap();

    let outcome = tokio_test::block_on(station.send_command(CommandRequest::On));
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Device not available");
    assert_eq!(outcome.state, BandState::Off);
}

/// Test that access denied while reading an open port moves the link to the next port
#[tokio::test]
async fn test_runtime_permission_denied_fails_over() {
    let a = MockTransport::new();
    let b = MockTransport::new();
    let backend = MockBackend::new(["A", "B"])
        .with_port("A", MockPort::Ready(a.clone()))
        .with_port("B", MockPort::Ready(b.clone()));
    let station = Station::new(fast_config("A")).unwrap();
    let tasks = station.spawn(backend.clone());

    assert!(wait_for(|| connected(&station)).await);
    assert_eq!(station.connection_status().active_port, "A");

    a.fail_next_read(std::io::ErrorKind::PermissionDenied);

    assert!(
        wait_for(|| connected(&station) && station.connection_status().active_port == "B").await
    );
    assert_eq!(backend.attempts(), vec!["A", "B"]);
    assert!(a.is_closed());
    assert!(station.link().last_error().unwrap().permission_denied);
    assert_eq!(station.link().device().as_deref(), Some("B"));

    b.inject_line("IR:0,ULTRA:3,TEMP:20.5,BOMBA:0");
    assert!(wait_for(|| station.telemetry().distance == "3 cm").await);

    tasks.reader.abort();
    tasks.link_manager.abort();
}
