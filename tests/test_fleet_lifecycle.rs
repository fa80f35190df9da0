//! Start/stop lifecycle against loopback fake controllers

mod common;

use common::{closed_port, degrees, test_config, wait_until, FakeController, RecordingActuation};
use robofleet::config::{FleetConfig, RobotConfig};
use robofleet::ingest::{
    CollectingDiagnostics, FleetDiagnostic, FleetSupervisor, ManualClock, SessionState,
    SimulationClock, TICK_HOOK_NAME,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Harness {
    fleet: FleetSupervisor,
    clock: Arc<ManualClock>,
    actuation: Arc<RecordingActuation>,
    diagnostics: Arc<CollectingDiagnostics>,
}

fn harness(config: FleetConfig) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let actuation = Arc::new(RecordingActuation::default());
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let fleet = FleetSupervisor::new(
        config,
        clock.clone(),
        actuation.clone(),
        diagnostics.clone(),
    );
    Harness {
        fleet,
        clock,
        actuation,
        diagnostics,
    }
}

#[tokio::test]
async fn single_robot_with_missing_health_endpoint_delivers_first_sample() {
    let controller = FakeController::start("TM5-900");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut h = harness(test_config());

    let report = h.fleet.start(&robots).await.unwrap();
    assert_eq!(report.registered, vec!["R1".to_string()]);
    assert_eq!(report.live, vec!["R1".to_string()]);
    assert_eq!(report.failed, None);
    assert_eq!(h.fleet.state(), SessionState::Running);
    assert!(h.clock.has_tick_callback(TICK_HOOK_NAME));
    assert_eq!(h.fleet.channel_stats().unwrap().capacity, 1);
    assert_eq!(h.fleet.reported_model("R1"), Some("TM5-900"));

    let diagnostics = h.diagnostics.diagnostics();
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        FleetDiagnostic::HealthEndpointUnreachable { robot, .. } if robot == "R1"
    )));
    assert!(diagnostics.contains(&FleetDiagnostic::ModelMismatch {
        robot: "R1".to_string(),
        expected: "TM12S".to_string(),
        actual: "TM5-900".to_string(),
    }));
    assert!(!diagnostics
        .iter()
        .any(|d| matches!(d, FleetDiagnostic::Unreachable { .. })));

    controller.send_burst(&[
        degrees(10.0),
        degrees(20.0),
        degrees(30.0),
        degrees(40.0),
        degrees(50.0),
    ]);
    let fleet = &h.fleet;
    assert!(
        wait_until(Duration::from_secs(2), || fleet
            .channel_stats()
            .map_or(false, |s| s.offered == 5))
        .await
    );
    let stats = h.fleet.channel_stats().unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.dropped, 4);

    h.clock.tick();
    let applied = h.actuation.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, "R1");
    assert!((applied[0].1[0] - 10.0_f64.to_radians()).abs() < 1e-12);

    // backlog was capped by the channel, nothing left to apply
    h.clock.tick();
    assert_eq!(h.actuation.applied().len(), 1);
    assert_eq!(h.fleet.tick_stats().idle, 1);

    let stop = h.fleet.stop().await.unwrap();
    assert_eq!(stop.signalled, 1);
    assert_eq!(h.fleet.state(), SessionState::Idle);
    assert!(!h.clock.has_tick_callback(TICK_HOOK_NAME));
    assert!(h.fleet.registered_robots().is_empty());
    assert!(h.fleet.channel().is_none());
}

#[tokio::test]
async fn unreachable_first_robot_aborts_before_the_second() {
    let second = FakeController::start("TM12S");
    let robots = vec![
        RobotConfig::new("R1", "127.0.0.1", "TM12S")
            .with_motion_port(closed_port())
            .with_health_port(closed_port()),
        second.robot("R2", "TM12S"),
    ];
    let mut h = harness(test_config());

    let report = h.fleet.start(&robots).await.unwrap();
    assert_eq!(report.failed.as_deref(), Some("R1"));
    assert_eq!(report.aborted, vec!["R2".to_string()]);
    assert!(report.registered.is_empty());
    assert!(h.fleet.live_workers().is_empty());
    assert_eq!(h.fleet.state(), SessionState::Idle);
    assert!(!h.clock.has_tick_callback(TICK_HOOK_NAME));
    assert_eq!(second.connections(), 0);

    assert!(h
        .diagnostics
        .diagnostics()
        .contains(&FleetDiagnostic::PartialStartAborted {
            failed: "R1".to_string(),
            remaining: vec!["R2".to_string()],
        }));
}

#[tokio::test]
async fn partial_start_keeps_robots_validated_before_the_failure() {
    let r1 = FakeController::start("TM12S");
    let r2 = FakeController::start("TM12S");
    let r4 = FakeController::start("TM12S");
    let robots = vec![
        r1.robot("R1", "TM12S"),
        r2.robot("R2", "TM12S"),
        RobotConfig::new("R3", "127.0.0.1", "TM12S")
            .with_motion_port(closed_port())
            .with_health_port(closed_port()),
        r4.robot("R4", "TM12S"),
    ];
    let mut h = harness(test_config());

    let report = h.fleet.start(&robots).await.unwrap();
    assert_eq!(report.registered, vec!["R1".to_string(), "R2".to_string()]);
    assert_eq!(report.failed.as_deref(), Some("R3"));
    assert_eq!(report.aborted, vec!["R4".to_string()]);
    assert_eq!(h.fleet.state(), SessionState::Running);
    assert_eq!(h.fleet.live_workers(), vec!["R1".to_string(), "R2".to_string()]);
    assert_eq!(h.fleet.channel_stats().unwrap().capacity, 2);
    assert_eq!(r4.connections(), 0);

    h.fleet.stop().await.unwrap();
}

#[tokio::test]
async fn deactivated_robots_are_skipped() {
    let r1 = FakeController::start("TM12S");
    let r2 = FakeController::start("TM12S");
    let mut config = test_config();
    config.robots = vec![r1.robot("R1", "TM12S"), r2.robot("R2", "TM12S").deactivated()];
    let mut h = harness(config.clone());

    let report = h.fleet.start(&config).await.unwrap();
    assert_eq!(report.registered, vec!["R1".to_string()]);
    assert_eq!(r2.connections(), 0);
    h.fleet.stop().await.unwrap();
}

#[tokio::test]
async fn start_while_running_reports_and_changes_nothing() {
    let controller = FakeController::start("TM12S");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut h = harness(test_config());

    h.fleet.start(&robots).await.unwrap();
    let again = h.fleet.start(&robots).await.unwrap();
    assert!(again.already_running);
    assert_eq!(again.registered, vec!["R1".to_string()]);
    assert_eq!(controller.sessions(), 1);
    assert!(h
        .diagnostics
        .diagnostics()
        .contains(&FleetDiagnostic::AlreadyRunning));

    h.fleet.stop().await.unwrap();
    let idle = h.fleet.stop().await.unwrap();
    assert!(idle.already_idle);
    assert!(h.diagnostics.diagnostics().contains(&FleetDiagnostic::AlreadyIdle));
}

#[tokio::test]
async fn stop_start_cycles_never_duplicate_workers() {
    let r1 = FakeController::start("TM12S");
    let r2 = FakeController::start("TM12S");
    let robots = vec![r1.robot("R1", "TM12S"), r2.robot("R2", "TM12S")];
    let mut h = harness(test_config());

    for _ in 0..5 {
        let report = h.fleet.start(&robots).await.unwrap();
        assert_eq!(report.registered.len(), 2);

        let live = h.fleet.live_workers();
        let unique: HashSet<&String> = live.iter().collect();
        assert_eq!(unique.len(), live.len());
        assert_eq!(live.len(), 2);

        let started = Instant::now();
        h.fleet.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(h.fleet.live_workers().is_empty());
        assert_eq!(h.fleet.state(), SessionState::Idle);
    }

    assert_eq!(r1.sessions(), 5);
    assert_eq!(r2.sessions(), 5);

    // fire-and-forget stop: workers notice cancellation within a read timeout
    assert!(
        wait_until(Duration::from_secs(2), || r1.active_sessions() == 0
            && r2.active_sessions() == 0)
        .await
    );
}

#[tokio::test]
async fn bounded_join_reaps_workers_before_returning() {
    let controller = FakeController::start("TM12S");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut config = test_config();
    config.timeouts.stop_join_timeout_ms = 1000;
    let mut h = harness(config);

    h.fleet.start(&robots).await.unwrap();
    let report = h.fleet.stop().await.unwrap();
    assert_eq!(report.signalled, 1);
    assert_eq!(report.joined, 1);
    assert_eq!(report.detached, 0);
}

#[tokio::test]
async fn lost_session_only_affects_that_robot() {
    let r1 = FakeController::start("TM12S");
    let r2 = FakeController::start("TM12S");
    let robots = vec![r1.robot("R1", "TM12S"), r2.robot("R2", "TM12S")];
    let mut h = harness(test_config());

    h.fleet.start(&robots).await.unwrap();
    drop(r1);

    let fleet = &h.fleet;
    assert!(wait_until(Duration::from_secs(2), || !fleet.is_live("R1")).await);
    assert!(h.fleet.is_live("R2"));
    assert_eq!(h.fleet.state(), SessionState::Running);
    assert_eq!(h.fleet.registered_robots().len(), 2);

    let diagnostics = &h.diagnostics;
    assert!(
        wait_until(Duration::from_secs(1), || diagnostics.diagnostics().iter().any(
            |d| matches!(d, FleetDiagnostic::WorkerTerminated { robot, .. } if robot == "R1")
        ))
        .await
    );

    r2.send_burst(&[degrees(5.0)]);
    assert!(
        wait_until(Duration::from_secs(2), || fleet
            .channel_stats()
            .map_or(false, |s| s.accepted == 1))
        .await
    );
    h.clock.tick();
    assert_eq!(h.actuation.applied()[0].0, "R2");

    h.fleet.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_releases_the_tick_hook() {
    let controller = FakeController::start("TM12S");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut h = harness(test_config());

    h.fleet.start(&robots).await.unwrap();
    assert_eq!(h.clock.callback_count(), 1);

    h.fleet.shutdown().await.unwrap();
    assert_eq!(h.fleet.state(), SessionState::Idle);
    assert_eq!(h.clock.callback_count(), 0);
    assert_eq!(h.clock.tick(), 0);
}

#[tokio::test]
async fn session_closed_before_model_answer_stays_registered_but_not_live() {
    let controller = FakeController::start_closing_sessions("TM12S");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut h = harness(test_config());

    let report = h.fleet.start(&robots).await.unwrap();
    assert_eq!(report.registered, vec!["R1".to_string()]);
    assert!(report.live.is_empty());
    assert_eq!(report.failed, None);
    assert_eq!(h.fleet.state(), SessionState::Running);
    assert_eq!(h.fleet.channel_stats().unwrap().capacity, 1);
    assert!(!h.fleet.is_live("R1"));
    assert_eq!(h.fleet.reported_model("R1"), None);
    assert!(h
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| matches!(d, FleetDiagnostic::WorkerTerminated { robot, .. } if robot == "R1")));

    let stop = h.fleet.stop().await.unwrap();
    assert_eq!(stop.signalled, 1);
    assert_eq!(h.fleet.state(), SessionState::Idle);
}

#[tokio::test]
async fn capacity_override_replaces_robot_count_sizing() {
    let controller = FakeController::start("TM12S");
    let robots = vec![controller.robot("R1", "TM12S")];
    let mut config = test_config();
    config.channel.capacity_override = Some(3);
    let mut h = harness(config);

    h.fleet.start(&robots).await.unwrap();
    assert_eq!(h.fleet.channel_stats().unwrap().capacity, 3);

    controller.send_burst(&[degrees(1.0), degrees(2.0), degrees(3.0), degrees(4.0)]);
    let fleet = &h.fleet;
    assert!(
        wait_until(Duration::from_secs(2), || fleet
            .channel_stats()
            .map_or(false, |s| s.offered == 4))
        .await
    );
    let stats = h.fleet.channel_stats().unwrap();
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.dropped, 1);

    h.fleet.stop().await.unwrap();
}
