// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const LISTENING_MARKER: &str = "listening on ";

/// Handle to a running bigstatsd process.
pub struct DaemonHandle {
    child: Child,
    log_lines: Arc<Mutex<Vec<String>>>,
    _stdout_thread: std::thread::JoinHandle<()>,
    _stderr_thread: std::thread::JoinHandle<()>,
}

fn capture<R: Read + Send + 'static>(
    stream: R,
    lines: Arc<Mutex<Vec<String>>>,
    tag: &'static str,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    eprintln!("[{tag}] {l}");
                    lines.lock().unwrap().push(l);
                }
                Err(_) => break,
            }
        }
    })
}

impl DaemonHandle {
    /// Start the daemon on an ephemeral port, storing its configuration in
    /// `config_file` and polling the management API at `management_url`.
    pub fn start(config_file: &Path, management_url: &str) -> Self {
        let bin = env!("CARGO_BIN_EXE_bigstatsd");
        let mut child = Command::new(bin)
            .env("BIGSTATS_LISTEN", "127.0.0.1:0")
            .env("BIGSTATS_CONFIG_FILE", config_file)
            .env("BIGSTATS_MANAGEMENT_URL", management_url)
            .env("BIGSTATS_LOG_LEVEL", "debug")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start bigstatsd");

        let stdout = child.stdout.take().expect("failed to capture stdout");
        let stderr = child.stderr.take().expect("failed to capture stderr");
        let log_lines = Arc::new(Mutex::new(Vec::<String>::new()));

        // The logger writes every level to stderr.
        let stdout_thread = capture(stdout, Arc::clone(&log_lines), "daemon:out");
        let stderr_thread = capture(stderr, Arc::clone(&log_lines), "daemon");

        Self {
            child,
            log_lines,
            _stdout_thread: stdout_thread,
            _stderr_thread: stderr_thread,
        }
    }

    /// Wait until a log line containing `pattern` appears, or timeout.
    pub fn wait_for_log(&self, pattern: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let lines = self.log_lines.lock().unwrap();
                if lines.iter().any(|l| l.contains(pattern)) {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn wait_for_log_default(&self, pattern: &str) -> bool {
        self.wait_for_log(pattern, DEFAULT_TIMEOUT)
    }

    pub fn count_log_matches(&self, pattern: &str) -> usize {
        let lines = self.log_lines.lock().unwrap();
        lines.iter().filter(|l| l.contains(pattern)).count()
    }

    /// Port of the control surface, read from the "listening on" line.
    pub fn port(&self) -> u16 {
        assert!(
            self.wait_for_log_default(LISTENING_MARKER),
            "daemon never started listening"
        );
        let lines = self.log_lines.lock().unwrap();
        lines
            .iter()
            .find_map(|l| {
                let (_, addr) = l.split_once(LISTENING_MARKER)?;
                addr.trim().rsplit(':').next()?.parse().ok()
            })
            .expect("no port in listening line")
    }

    /// Send one request to the control surface, returning status and body.
    pub fn request(&self, method: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port()))
            .expect("failed to connect to control surface");
        stream.set_read_timeout(Some(DEFAULT_TIMEOUT)).unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        let status = response
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("malformed status line");
        let body = response
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (status, body)
    }

    pub fn send_signal(&self, sig: Signal) {
        let pid = self.child.id() as i32;
        signal::kill(Pid::from_raw(pid), sig).expect("failed to send signal to daemon");
    }

    /// Send SIGTERM and wait for the daemon to exit.
    pub fn stop(&mut self) -> std::process::ExitStatus {
        self.send_signal(Signal::SIGTERM);
        self.wait_with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn wait_with_timeout(&mut self, timeout: Duration) -> std::process::ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            match self
                .child
                .try_wait()
                .expect("failed to check daemon status")
            {
                Some(status) => return status,
                None => {
                    if Instant::now() >= deadline {
                        self.child.kill().ok();
                        return self.child.wait().expect("failed to wait on killed daemon");
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Minimal management API: one partition, one virtual service at
/// `10.0.0.1:80` with three current connections.
pub struct FakeManagementApi {
    pub base_url: String,
    _thread: std::thread::JoinHandle<()>,
}

fn canned_response(request_line: &str) -> (u16, String) {
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let body = if path.starts_with("/mgmt/tm/sys/global-settings") {
        r#"{"hostname":"bigip-e2e.example.com"}"#.to_string()
    } else if path.starts_with("/mgmt/tm/sys/version") {
        r#"{"entries":{"https://localhost/mgmt/tm/sys/version/0":{"nestedStats":{"entries":{"Version":{"description":"15.1.0"}}}}}}"#.to_string()
    } else if path.starts_with("/mgmt/tm/sys/host-info") {
        r#"{"entries":{"https://localhost/mgmt/tm/sys/host-info/0":{"nestedStats":{"entries":{"memoryTotal":{"value":1000},"memoryUsed":{"value":250}}}}}}"#.to_string()
    } else if path.starts_with("/mgmt/tm/ltm/virtual/~Common~vs1/stats") {
        r#"{"entries":{"https://localhost/mgmt/tm/ltm/virtual/~Common~vs1/~Common~vs1/stats":{"nestedStats":{"entries":{"clientside.curConns":{"value":3}}}}}}"#.to_string()
    } else if path.starts_with("/mgmt/tm/ltm/virtual") {
        r#"{"items":[{"name":"vs1","partition":"Common","destination":"/Common/10.0.0.1:80","selfLink":"https://localhost/mgmt/tm/ltm/virtual/~Common~vs1?ver=15.1.0"}]}"#.to_string()
    } else {
        return (404, r#"{"code":404}"#.to_string());
    };
    (200, body)
}

impl FakeManagementApi {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let thread = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                // Drain headers; every request here is a bodiless GET.
                let mut header = String::new();
                while reader.read_line(&mut header).is_ok() && header != "\r\n" && !header.is_empty() {
                    header.clear();
                }
                let (status, body) = canned_response(&request_line);
                let mut stream = reader.into_inner();
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
            }
        });
        Self {
            base_url,
            _thread: thread,
        }
    }
}
