//! Local command service speaking the terminal wire contract.
//!
//! Bridges the channel to `docker exec`: `terminal_start` probes the Docker
//! daemon and the named container, `terminal_input` runs one command inside
//! it. Each command executes on its own worker thread so the service loop
//! keeps accepting events while a command is still running; from the
//! client's perspective everything is fire and forget.
//!
//! Input starting with `:` is a special local command handled by the
//! service itself: `:history` lists the session command log, `:clear` asks
//! the client to wipe its pane, `:start` starts a stopped container.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    CommandResult, CommandStarted, EventSink, ServiceEndpoint, StartRequest, StatusReport,
    TextData, WireEvent, EV_COMMAND_RESULT, EV_COMMAND_STARTED, EV_HISTORY_FULL,
    EV_TERMINAL_CLEAR, EV_TERMINAL_INPUT, EV_TERMINAL_OUTPUT, EV_TERMINAL_START,
    EV_TERMINAL_STATUS,
};

/// Exit code reported when a command exceeds the timeout.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Poll interval while waiting for a child process.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Session command log cap, oldest entries evicted first.
const MAX_HISTORY: usize = 200;

/// One executed command in the session log, backing `:history`.
#[derive(Debug, Clone)]
struct LogEntry {
    id: u64,
    command: String,
    /// `None` while the command is still running.
    exit_code: Option<i32>,
}

/// Session command log, shared with the per-command worker threads.
type SessionLog = Arc<Mutex<Vec<LogEntry>>>;

fn log_entries(log: &SessionLog) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
    match log.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn append_entry(log: &SessionLog, entry: LogEntry) {
    let mut entries = log_entries(log);
    entries.push(entry);
    if entries.len() > MAX_HISTORY {
        let excess = entries.len() - MAX_HISTORY;
        entries.drain(..excess);
    }
}

fn finish_entry(log: &SessionLog, id: u64, exit_code: i32) {
    let mut entries = log_entries(log);
    if let Some(entry) = entries.iter_mut().rev().find(|entry| entry.id == id) {
        entry.exit_code = Some(exit_code);
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Shell invoked inside the container, as `<shell> -lc <command>`.
    pub shell: String,
    /// Per-command wall clock limit.
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// The docker-exec backed command service.
pub struct ExecService;

impl ExecService {
    /// Spawn the service loop on its own thread. The loop exits when the
    /// client side of the channel is dropped.
    pub fn spawn(endpoint: ServiceEndpoint, opts: ExecOptions) -> JoinHandle<()> {
        thread::spawn(move || service_loop(endpoint, opts))
    }
}

fn service_loop(endpoint: ServiceEndpoint, opts: ExecOptions) {
    let mut target: Option<String> = None;
    let log: SessionLog = Arc::new(Mutex::new(Vec::new()));

    while let Some(event) = endpoint.recv() {
        match event.name.as_str() {
            EV_TERMINAL_START => match parse_start(&event) {
                Some(request) => {
                    info!("session start for container {}", request.container_id);
                    log_entries(&log).clear();
                    handle_start(&endpoint, &request.container_id);
                    target = Some(request.container_id);
                }
                None => warn!("malformed {} payload: {}", EV_TERMINAL_START, event.payload),
            },
            EV_TERMINAL_INPUT => {
                let data = event.payload["data"].as_str().unwrap_or_default().to_string();
                handle_input(endpoint.sink(), target.clone(), data, &opts, &log);
            }
            other => debug!("ignoring client event {other}"),
        }
    }
    info!("client detached, service loop exiting");
}

fn parse_start(event: &WireEvent) -> Option<StartRequest> {
    serde_json::from_value(event.payload.clone()).ok()
}

fn handle_start(endpoint: &ServiceEndpoint, name: &str) {
    let _ = endpoint.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: format!("=== Attaching to {name} ===\n"),
        },
    );

    let status = probe_docker(name);

    let docker_line = if status.docker == "up" {
        "Docker: OK\n".to_string()
    } else {
        match &status.error {
            Some(err) => format!("Docker: unavailable ({err})\n"),
            None => "Docker: unavailable\n".to_string(),
        }
    };
    let _ = endpoint.send(EV_TERMINAL_OUTPUT, &TextData { data: docker_line });

    let container_line = match status.container.as_str() {
        "present" if status.container_running == Some(true) => match &status.image {
            Some(image) => format!("Container: running (image={image})\n"),
            None => "Container: running\n".to_string(),
        },
        "present" => "Container: found but not running. Use :start to start it.\n".to_string(),
        "missing" => "Container: not found\n".to_string(),
        _ => "Container: unknown\n".to_string(),
    };
    let _ = endpoint.send(EV_TERMINAL_OUTPUT, &TextData { data: container_line });

    let _ = endpoint.send(EV_TERMINAL_STATUS, &status);
    let _ = endpoint.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: "Special commands: :history, :clear, :start (start the container if stopped)\n"
                .to_string(),
        },
    );
    let _ = endpoint.send(EV_HISTORY_FULL, &json!({ "history": [] }));
    let _ = endpoint.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: format!("root@{name}:~$ "),
        },
    );
}

/// Check daemon reachability and container state by shelling out to the
/// docker CLI.
fn probe_docker(name: &str) -> StatusReport {
    let mut report = StatusReport {
        docker: "down".to_string(),
        error: None,
        container: "unknown".to_string(),
        container_running: None,
        image: None,
    };

    let version = Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .output();
    match version {
        Ok(out) if out.status.success() => report.docker = "up".to_string(),
        Ok(out) => {
            report.error = Some(String::from_utf8_lossy(&out.stderr).trim().to_string());
            return report;
        }
        Err(err) => {
            report.error = Some(err.to_string());
            return report;
        }
    }

    let inspect = Command::new("docker")
        .args([
            "inspect",
            "--format",
            "{{.State.Running}}|{{.Config.Image}}",
            name,
        ])
        .output();
    match inspect {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            let mut parts = text.trim().splitn(2, '|');
            report.container = "present".to_string();
            report.container_running = Some(parts.next() == Some("true"));
            report.image = parts.next().map(|s| s.to_string());
        }
        Ok(_) => report.container = "missing".to_string(),
        Err(err) => report.error = Some(err.to_string()),
    }
    report
}

fn handle_input(
    sink: EventSink,
    target: Option<String>,
    data: String,
    opts: &ExecOptions,
    log: &SessionLog,
) {
    let command = data.trim().to_string();

    let Some(target) = target else {
        let _ = sink.send(
            EV_TERMINAL_OUTPUT,
            &TextData {
                data: "No session. Send terminal_start first.\n".to_string(),
            },
        );
        return;
    };

    if command.is_empty() {
        let _ = sink.send(
            EV_TERMINAL_OUTPUT,
            &TextData {
                data: format!("root@{target}:~$ "),
            },
        );
        return;
    }

    // Special local commands, never forwarded to the container.
    match command.as_str() {
        ":history" => {
            send_history(&sink, &target, log);
            return;
        }
        ":clear" => {
            let _ = sink.send(EV_TERMINAL_CLEAR, &json!({}));
            let _ = sink.send(
                EV_TERMINAL_OUTPUT,
                &TextData {
                    data: format!("root@{target}:~$ "),
                },
            );
            return;
        }
        ":start" => {
            start_container(&sink, &target);
            return;
        }
        _ => {}
    }

    let id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    append_entry(
        log,
        LogEntry {
            id,
            command: command.clone(),
            exit_code: None,
        },
    );
    let _ = sink.send(
        EV_COMMAND_STARTED,
        &CommandStarted {
            id,
            command: command.clone(),
        },
    );

    let shell = opts.shell.clone();
    let timeout = opts.timeout;
    let log = Arc::clone(log);
    thread::spawn(move || {
        let started = Instant::now();
        let (stdout, stderr, exit_code) = run_exec(&target, &shell, &command, timeout);
        debug!("command {id} finished with exit code {exit_code}");
        finish_entry(&log, id, exit_code);

        let _ = sink.send(
            EV_COMMAND_RESULT,
            &CommandResult {
                id,
                command,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                exit_code,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        );

        if !stdout.is_empty() {
            let _ = sink.send(EV_TERMINAL_OUTPUT, &TextData { data: stdout });
        }
        if !stderr.is_empty() {
            let _ = sink.send(
                EV_TERMINAL_OUTPUT,
                &TextData {
                    data: format!("! {stderr}"),
                },
            );
        }
        let _ = sink.send(
            EV_TERMINAL_OUTPUT,
            &TextData {
                data: format!("root@{target}:~$ "),
            },
        );
    });
}

/// `:history` lists the session command log with ids and exit codes. A
/// command still running shows `exit=?`.
fn send_history(sink: &EventSink, target: &str, log: &SessionLog) {
    let entries = log_entries(log).clone();
    let _ = sink.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: "\nCommand history (recent):\n".to_string(),
        },
    );
    for entry in &entries {
        let exit = entry
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = sink.send(
            EV_TERMINAL_OUTPUT,
            &TextData {
                data: format!("[{}] {} (exit={exit})\n", entry.id, entry.command),
            },
        );
    }
    let _ = sink.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: format!("\nroot@{target}:~$ "),
        },
    );
}

/// `:start` runs `docker start` for a stopped container and reports the
/// resulting state.
fn start_container(sink: &EventSink, target: &str) {
    let line = match container_running(target) {
        Ok(Some(true)) => "Container already running\n".to_string(),
        Ok(Some(false)) => {
            match Command::new("docker").args(["start", target]).output() {
                Ok(out) if out.status.success() => {
                    let _ = sink.send(
                        EV_TERMINAL_OUTPUT,
                        &TextData {
                            data: "Container starting...\n".to_string(),
                        },
                    );
                    thread::sleep(Duration::from_secs(1));
                    match container_running(target) {
                        Ok(Some(true)) => "Status: running\n".to_string(),
                        Ok(Some(false)) => "Status: stopped\n".to_string(),
                        Ok(None) | Err(_) => "Status: unknown\n".to_string(),
                    }
                }
                Ok(out) => format!(
                    "Docker error: {}\n",
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                Err(err) => format!("Start failed: {err}\n"),
            }
        }
        Ok(None) => "Cannot start: container not found\n".to_string(),
        Err(err) => format!("Docker error: {err}\n"),
    };
    let _ = sink.send(EV_TERMINAL_OUTPUT, &TextData { data: line });
    let _ = sink.send(
        EV_TERMINAL_OUTPUT,
        &TextData {
            data: format!("root@{target}:~$ "),
        },
    );
}

/// `Ok(None)` means the container does not exist.
fn container_running(target: &str) -> std::io::Result<Option<bool>> {
    let out = Command::new("docker")
        .args(["inspect", "--format", "{{.State.Running}}", target])
        .output()?;
    if !out.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&out.stdout).trim() == "true"))
}

/// Run one command inside the container, enforcing the timeout by polling
/// `try_wait` and killing the child once the deadline passes.
fn run_exec(target: &str, shell: &str, command: &str, timeout: Duration) -> (String, String, i32) {
    let child = Command::new("docker")
        .args(["exec", target, shell, "-lc", command])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => return (String::new(), format!("exec failed: {err}\n"), 1),
    };

    // Drain pipes on their own threads so a chatty command cannot stall on
    // a full pipe buffer.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_all(stdout_pipe));
    let stderr_reader = thread::spawn(move || read_all(stderr_pipe));

    let deadline = Instant::now() + timeout;
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code().unwrap_or(1),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break TIMEOUT_EXIT_CODE;
                }
                thread::sleep(WAIT_POLL);
            }
            Err(err) => {
                warn!("wait on docker exec failed: {err}");
                break 1;
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let mut stderr = stderr_reader.join().unwrap_or_default();
    if exit_code == TIMEOUT_EXIT_CODE {
        stderr.push_str(&format!("Timeout ({}s)\n", timeout.as_secs()));
    }
    (stdout, stderr, exit_code)
}

fn read_all(pipe: Option<impl Read>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes);
    String::from_utf8_lossy(&bytes).into_owned()
}
