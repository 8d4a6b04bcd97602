//! End-to-end cycles over a scripted transport and an in-memory sink.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use fieldscan::prelude::*;

const FLEET: &str = r#"
log level: 20
scan rate: 100
table: plant
devices:
  - name: alpha
    active: true
    connection:
      transport: TCP
      src: 10.0.0.1
      config: { address: 1, timeout: 1000 }
    registers:
      01 Read Coils:
        10:
          name: Burner on
          active: true
          format: Unsigned
          type: SMALLINT
      03 Read Holding Registers:
        100:
          name: Mode
          active: true
          format: Unsigned
          type: SMALLINT
        101:
          name: Temp
          active: true
          format: Float AB CD
          type: REAL
  - name: beta
    active: true
    connection:
      transport: TCP
      src: 10.0.0.2
      config: { address: 7, timeout: 1000 }
    registers:
      04 Read Input Registers:
        5:
          name: Level
          active: true
          format: Signed
          type: REAL
          adjustments:
            - "*": "2"
  - name: ghost
    active: false
    connection:
      transport: TCP
      src: 10.0.0.9
      config: { address: 2, timeout: 1000 }
"#;

fn fleet() -> Config {
    Config::from_yaml(FLEET).unwrap()
}

fn healthy_transport() -> FakeTransport {
    FakeTransport::default()
        .endpoint(
            "10.0.0.1",
            FakeEndpoint::new()
                .bits(FunctionCode::Coils, 10, vec![true])
                .words(
                    FunctionCode::HoldingRegisters,
                    100,
                    vec![7, 0x4048, 0xF5C3],
                ),
        )
        .endpoint(
            "10.0.0.2",
            FakeEndpoint::new().words(FunctionCode::InputRegisters, 5, vec![0xFFFE]),
        )
}

fn assert_close(value: &Value, expected: f64) {
    match value {
        Value::Float(x) => assert!((x - expected).abs() < 1e-5, "{x} != {expected}"),
        other => panic!("expected float, got {other:?}"),
    }
}

#[tokio::test]
async fn a_cycle_yields_one_sample_per_active_register_in_catalog_order() {
    let config = fleet();
    let catalog = Catalog::from_config(&config).unwrap();
    let engine = Engine::new(&config, healthy_transport(), MemorySink::new());

    assert_eq!(engine.point_count(), catalog.len());
    assert_eq!(engine.point_count(), 4);

    let row = engine.scan().await;
    assert_eq!(row.len(), 4);
    // alpha fn1 @10, alpha fn3 @100, alpha fn3 @101, beta fn4 @5.
    assert_eq!(row[0], Value::Int(1));
    assert_eq!(row[1], Value::Int(7));
    assert_close(&row[2], 3.14);
    assert_eq!(row[3], Value::Float(-4.0));

    // Same fleet, same responses: the next cycle is identical.
    assert_eq!(engine.scan().await, row);
}

#[tokio::test]
async fn an_unreachable_device_does_not_block_the_rest_of_the_fleet() {
    let transport = FakeTransport::default()
        .endpoint("10.0.0.1", FakeEndpoint::new().refuse_connect())
        .endpoint(
            "10.0.0.2",
            FakeEndpoint::new().words(FunctionCode::InputRegisters, 5, vec![0xFFFE]),
        );
    let engine = Engine::new(&fleet(), transport, MemorySink::new());

    let row = engine.scan().await;
    assert_eq!(row[0], Value::Null);
    assert_eq!(row[1], Value::Null);
    assert_eq!(row[2], Value::Null);
    assert_eq!(row[3], Value::Float(-4.0));
}

#[tokio::test]
async fn a_short_response_nulls_only_the_windows_it_starves() {
    let transport = healthy_transport().endpoint(
        "10.0.0.1",
        FakeEndpoint::new()
            .bits(FunctionCode::Coils, 10, vec![true])
            // One word for a three-word request.
            .words(FunctionCode::HoldingRegisters, 100, vec![7]),
    );
    let engine = Engine::new(&fleet(), transport, MemorySink::new());

    let row = engine.scan().await;
    assert_eq!(row[0], Value::Int(1));
    assert_eq!(row[1], Value::Int(7));
    assert_eq!(row[2], Value::Null);
    assert_eq!(row[3], Value::Float(-4.0));
}

#[tokio::test]
async fn a_faulted_link_reconnects_on_the_next_cycle() {
    let transport = healthy_transport().endpoint(
        "10.0.0.1",
        FakeEndpoint::new()
            .bits(FunctionCode::Coils, 10, vec![true])
            .fault(FunctionCode::HoldingRegisters, 100, "illegal data address"),
    );
    let counts = transport.connect_counts();
    let engine = Engine::new(&fleet(), transport, MemorySink::new());

    let row = engine.scan().await;
    assert_eq!(row[0], Value::Int(1));
    assert_eq!(row[1], Value::Null);
    assert_eq!(row[2], Value::Null);

    // The exception faulted the link after the coil read; the second
    // cycle must open a fresh connection.
    let row = engine.scan().await;
    assert_eq!(row[0], Value::Int(1));
    assert_eq!(
        *counts.lock().expect("poisoned").get("10.0.0.1").unwrap(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn cycles_are_paced_by_the_scan_rate() {
    let sink = MemorySink::new();
    let mut engine = Engine::new(&fleet(), healthy_transport(), sink.clone());
    let (stop, stop_rx) = watch::channel(false);

    let started = Instant::now();
    let run = tokio::spawn(async move { engine.run(stop_rx).await });
    while sink.rows().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let elapsed = started.elapsed();

    // Rows land at 0, 100 and 200 ms.
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");

    stop.send(true).unwrap();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn an_overrunning_cycle_starts_the_next_one_immediately() {
    let transport = healthy_transport().endpoint(
        "10.0.0.2",
        FakeEndpoint::new()
            .delay(Duration::from_millis(250))
            .words(FunctionCode::InputRegisters, 5, vec![0xFFFE]),
    );
    let sink = MemorySink::new();
    let mut engine = Engine::new(&fleet(), transport, sink.clone());
    let (stop, stop_rx) = watch::channel(false);

    let started = Instant::now();
    let run = tokio::spawn(async move { engine.run(stop_rx).await });
    while sink.rows().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let elapsed = started.elapsed();

    // Each cycle takes 250 ms against a 100 ms scan rate: the sleep is
    // zero, three rows in ~750 ms, no catch-up bursts.
    assert!(elapsed >= Duration::from_millis(750), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");

    stop.send(true).unwrap();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn a_failing_sink_drops_rows_but_not_the_loop() {
    let sink = MemorySink::new();
    sink.set_failing(true);
    let mut engine = Engine::new(&fleet(), healthy_transport(), sink.clone());
    let (stop, stop_rx) = watch::channel(false);
    let run = tokio::spawn(async move { engine.run(stop_rx).await });

    // Let a few failing cycles pass, then heal the sink.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(sink.rows().is_empty());
    sink.set_failing(false);
    while sink.rows().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    stop.send(true).unwrap();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn a_stop_signal_interrupts_the_sleep_and_drains() {
    let sink = MemorySink::new();
    let mut engine = Engine::new(&fleet(), healthy_transport(), sink.clone());
    let (stop, stop_rx) = watch::channel(false);
    let run = tokio::spawn(async move { engine.run(stop_rx).await });

    while sink.rows().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // The loop is now asleep until the next cycle; the stop signal must
    // cut that sleep short rather than wait it out.
    stop.send(true).unwrap();
    run.await.unwrap();
    assert!(!sink.rows().is_empty());
}
