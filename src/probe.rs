#![allow(clippy::module_name_repetitions)]
//! Port-wait poller: block until a TCP service answers with data.
//!
//! A probe is READY only when the connect succeeds and the peer sends at least
//! one byte (sshd's banner) within the per-attempt timeout. Every network-level
//! failure keeps the poller WAITING. Without a deadline or cancel token it
//! waits forever.

use std::fmt;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const RETRY_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Waiting,
    Ready,
}

/// Result of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Ready,
    /// Network failure; back off before the next attempt.
    Failed,
    /// The attempt used up its timeout; retry straight away.
    TimedOut,
}

impl Probe {
    pub fn state(self) -> ProbeState {
        match self {
            Probe::Ready => ProbeState::Ready,
            Probe::Failed | Probe::TimedOut => ProbeState::Waiting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub connect_timeout: Duration,
    pub retry_interval: Duration,
    pub deadline: Option<Duration>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            retry_interval: RETRY_INTERVAL,
            deadline: None,
            cancel: None,
        }
    }
}

impl WaitOptions {
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    Deadline {
        host: String,
        port: u16,
        waited: Duration,
    },
    Cancelled {
        host: String,
        port: u16,
    },
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Deadline { host, port, waited } => write!(
                f,
                "{host}:{port} did not become reachable within {}s",
                waited.as_secs()
            ),
            WaitError::Cancelled { host, port } => {
                write!(f, "waiting for {host}:{port} was cancelled")
            }
        }
    }
}

impl std::error::Error for WaitError {}

fn classify(e: &io::Error) -> Probe {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => Probe::TimedOut,
        _ => Probe::Failed,
    }
}

fn probe_addr(addr: &SocketAddr, timeout: Duration) -> Probe {
    let stream = match TcpStream::connect_timeout(addr, timeout) {
        Ok(s) => s,
        Err(e) => return classify(&e),
    };
    if let Err(e) = stream.set_read_timeout(Some(timeout)) {
        return classify(&e);
    }
    let mut buf = [0u8; 1];
    match stream.peek(&mut buf) {
        Ok(n) if n > 0 => Probe::Ready,
        // Accepted then closed: a port proxy with nothing behind it yet.
        Ok(_) => Probe::Failed,
        Err(e) => classify(&e),
    }
}

/// One attempt against every address `host` resolves to.
pub fn probe_once(host: &str, port: u16, timeout: Duration) -> Probe {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(a) => a,
        Err(_) => return Probe::Failed,
    };
    let mut outcome = Probe::Failed;
    for addr in addrs {
        match probe_addr(&addr, timeout) {
            Probe::Ready => return Probe::Ready,
            Probe::TimedOut => outcome = Probe::TimedOut,
            Probe::Failed => {}
        }
    }
    outcome
}

/// Poll until `host:port` is READY. `on_wait` runs once per WAITING tick.
pub fn wait_for_port(
    host: &str,
    port: u16,
    opts: &WaitOptions,
    mut on_wait: impl FnMut(),
) -> Result<(), WaitError> {
    let started = Instant::now();
    loop {
        if let Some(cancel) = &opts.cancel {
            if cancel.load(Ordering::SeqCst) {
                return Err(WaitError::Cancelled {
                    host: host.to_string(),
                    port,
                });
            }
        }
        let probe = probe_once(host, port, opts.connect_timeout);
        if probe.state() == ProbeState::Ready {
            tracing::debug!("{host}:{port} ready after {:?}", started.elapsed());
            return Ok(());
        }
        if let Some(deadline) = opts.deadline {
            if started.elapsed() >= deadline {
                return Err(WaitError::Deadline {
                    host: host.to_string(),
                    port,
                    waited: deadline,
                });
            }
        }
        on_wait();
        if probe == Probe::Failed {
            thread::sleep(opts.retry_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn closed_port() -> u16 {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        l.local_addr().unwrap().port()
    }

    fn quick() -> WaitOptions {
        WaitOptions {
            connect_timeout: Duration::from_millis(200),
            retry_interval: Duration::from_millis(10),
            ..WaitOptions::default()
        }
    }

    #[test]
    fn test_probe_ready_when_banner_sent() {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = l.local_addr().unwrap().port();
        let h = thread::spawn(move || {
            let (mut s, _) = l.accept().unwrap();
            let _ = s.write_all(b"SSH-2.0-test\r\n");
            thread::sleep(Duration::from_millis(100));
        });
        assert_eq!(
            probe_once("127.0.0.1", port, Duration::from_secs(2)),
            Probe::Ready
        );
        h.join().unwrap();
    }

    #[test]
    fn test_probe_refused_is_waiting() {
        let p = probe_once("127.0.0.1", closed_port(), Duration::from_millis(200));
        assert_eq!(p.state(), ProbeState::Waiting);
    }

    #[test]
    fn test_probe_silent_peer_is_waiting() {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = l.local_addr().unwrap().port();
        let h = thread::spawn(move || {
            let (_s, _) = l.accept().unwrap();
            thread::sleep(Duration::from_millis(400));
        });
        let p = probe_once("127.0.0.1", port, Duration::from_millis(100));
        assert_eq!(p, Probe::TimedOut);
        h.join().unwrap();
    }

    #[test]
    fn test_probe_closed_without_data_is_waiting() {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = l.local_addr().unwrap().port();
        let h = thread::spawn(move || {
            let (s, _) = l.accept().unwrap();
            drop(s);
        });
        let p = probe_once("127.0.0.1", port, Duration::from_secs(2));
        assert_eq!(p.state(), ProbeState::Waiting);
        h.join().unwrap();
    }

    #[test]
    fn test_probe_unresolvable_host_is_waiting() {
        let p = probe_once("no-such-host.invalid", 22, Duration::from_millis(100));
        assert_eq!(p, Probe::Failed);
    }

    #[test]
    fn test_wait_retries_until_listener_appears() {
        let port = closed_port();
        let mut ticks = 0;
        let mut listener = None;
        let opts = quick().with_deadline(Some(Duration::from_secs(10)));
        let result = wait_for_port("127.0.0.1", port, &opts, || {
            ticks += 1;
            if ticks == 3 {
                let l = TcpListener::bind(("127.0.0.1", port)).expect("rebind");
                let h = thread::spawn(move || {
                    let (mut s, _) = l.accept().unwrap();
                    let _ = s.write_all(b"SSH-2.0-late\r\n");
                    thread::sleep(Duration::from_millis(100));
                });
                listener = Some(h);
            }
        });
        assert!(result.is_ok(), "{result:?}");
        assert!(ticks >= 3);
        listener.expect("listener thread").join().unwrap();
    }

    #[test]
    fn test_wait_deadline_expires() {
        let port = closed_port();
        let opts = quick().with_deadline(Some(Duration::from_millis(100)));
        let err = wait_for_port("127.0.0.1", port, &opts, || {}).unwrap_err();
        assert!(matches!(err, WaitError::Deadline { .. }));
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    #[test]
    fn test_wait_cancel_token_stops_loop() {
        let port = closed_port();
        let cancel = Arc::new(AtomicBool::new(false));
        let opts = quick().with_cancel(cancel.clone());
        let mut ticks = 0;
        let err = wait_for_port("127.0.0.1", port, &opts, || {
            ticks += 1;
            if ticks == 2 {
                cancel.store(true, Ordering::SeqCst);
            }
        })
        .unwrap_err();
        assert_eq!(
            err,
            WaitError::Cancelled {
                host: "127.0.0.1".to_string(),
                port
            }
        );
        assert_eq!(ticks, 2);
    }
}
