//! Loopback fake controller and test doubles shared by the integration tests
#![allow(dead_code)]

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use robofleet::config::{FleetConfig, RobotConfig};
use robofleet::ingest::protocol;
use robofleet::ingest::{ActuationError, ActuationSink, JointAngles};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Short timeouts so lifecycle tests run quickly
pub fn test_config() -> FleetConfig {
    let mut config = FleetConfig::default();
    config.timeouts.probe_timeout_ms = 300;
    config.timeouts.read_timeout_ms = 20;
    config.timeouts.model_query_timeout_ms = 300;
    config.timeouts.stop_join_timeout_ms = 0;
    config
}

pub fn degrees(first_joint: f64) -> [f64; 6] {
    [first_joint, 0.0, 0.0, 0.0, 0.0, 0.0]
}

pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[derive(Default)]
struct Counters {
    connections: AtomicUsize,
    sessions: AtomicUsize,
    active: AtomicUsize,
}

/// Speaks just enough of the controller protocol: answers the model query,
/// then forwards queued telemetry to whichever session is open.
///
/// A connection that closes before sending anything is a reachability probe.
pub struct FakeController {
    port: u16,
    frames: Sender<Vec<u8>>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl FakeController {
    pub fn start(model: &str) -> Self {
        Self::spawn(model, true)
    }

    /// Accepts connections but hangs up on every model query unanswered
    pub fn start_closing_sessions(model: &str) -> Self {
        Self::spawn(model, false)
    }

    fn spawn(model: &str, answer_model: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let (frames, frames_rx) = unbounded();
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_thread = {
            let model = model.to_string();
            let counters = Arc::clone(&counters);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::Acquire) {
                    match listener.accept() {
                        Ok((conn, _)) => {
                            counters.connections.fetch_add(1, Ordering::SeqCst);
                            let model = model.clone();
                            let frames_rx = frames_rx.clone();
                            let counters = Arc::clone(&counters);
                            let shutdown = Arc::clone(&shutdown);
                            thread::spawn(move || {
                                if answer_model {
                                    serve_connection(conn, &model, &frames_rx, &counters, &shutdown)
                                } else {
                                    drop(conn);
                                }
                            });
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(2));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            port,
            frames,
            counters,
            shutdown,
            accept_thread: Some(accept_thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Robot pointing at this controller with an unreachable health port
    pub fn robot(&self, name: &str, model: &str) -> RobotConfig {
        RobotConfig::new(name, "127.0.0.1", model)
            .with_motion_port(self.port)
            .with_health_port(closed_port())
    }

    /// Queue telemetry frames; all of them go out in a single write
    pub fn send_burst(&self, joint_degrees: &[[f64; 6]]) {
        let bytes: Vec<u8> = joint_degrees
            .iter()
            .flat_map(|joints| protocol::encode_telemetry(joints, None))
            .collect();
        self.frames.send(bytes).unwrap();
    }

    pub fn send_raw(&self, bytes: Vec<u8>) {
        self.frames.send(bytes).unwrap();
    }

    /// Every accepted TCP connection, probes included
    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Connections that completed the model query
    pub fn sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::SeqCst)
    }

    pub fn active_sessions(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve_connection(
    mut conn: TcpStream,
    model: &str,
    frames: &Receiver<Vec<u8>>,
    counters: &Counters,
    shutdown: &AtomicBool,
) {
    conn.set_nonblocking(false).unwrap();
    conn.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
    let mut buf = [0u8; 1024];
    let mut received = Vec::new();

    // wait for the model query; EOF first means a probe
    loop {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        match conn.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                received.extend_from_slice(&buf[..n]);
                if String::from_utf8_lossy(&received).contains(protocol::ITEM_ROBOT_MODEL) {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(_) => return,
        }
    }

    // counted before the answer goes out
    counters.sessions.fetch_add(1, Ordering::SeqCst);
    counters.active.fetch_add(1, Ordering::SeqCst);
    if conn.write_all(&protocol::encode_model_response(model)).is_err() {
        counters.active.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    while !shutdown.load(Ordering::Acquire) {
        if let Ok(bytes) = frames.try_recv() {
            if conn.write_all(&bytes).is_err() {
                break;
            }
        }
        match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(_) => break,
        }
    }

    counters.active.fetch_sub(1, Ordering::SeqCst);
}

/// Actuation sink that records every applied target
#[derive(Default)]
pub struct RecordingActuation {
    applied: Mutex<Vec<(String, JointAngles)>>,
}

impl RecordingActuation {
    pub fn applied(&self) -> Vec<(String, JointAngles)> {
        self.applied.lock().clone()
    }
}

impl ActuationSink for RecordingActuation {
    fn apply_joint_target(&self, robot_name: &str, joints: &JointAngles) -> Result<(), ActuationError> {
        self.applied.lock().push((robot_name.to_string(), *joints));
        Ok(())
    }
}
