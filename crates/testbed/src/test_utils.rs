//! In-process stand-ins for the fleet, for testing code built on this crate
//! without VMs.
//!
//! - [`ScriptedRunner`] answers shell commands from a script and records
//!   what was sent.
//! - [`FakeProvider`] is an in-memory VM fleet that counts lifecycle calls.
//! - [`StubHttpServer`] serves canned JSON on localhost and records requests.

use crate::host::HostSession;
use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use testbed_core::{CommandOutput, CommandRunner, Error, Result, Timings, VmProvider, VmStatus};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// ScriptedRunner
// ============================================================================

struct Rule {
    needle: String,
    output: CommandOutput,
    once: bool,
}

/// [`CommandRunner`] that answers from substring rules.
///
/// The first rule whose needle occurs in the command wins. Commands that
/// match no rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    target: String,
    rules: Mutex<Vec<Rule>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Answers every command containing `needle` with `output`.
    pub fn on(self, needle: impl Into<String>, output: CommandOutput) -> Self {
        self.push_rule(needle.into(), output, false);
        self
    }

    /// Answers the next command containing `needle` with `output`, then
    /// forgets the rule.
    pub fn on_once(self, needle: impl Into<String>, output: CommandOutput) -> Self {
        self.push_rule(needle.into(), output, true);
        self
    }

    /// Adds a rule after the runner is shared.
    pub fn add_rule(&self, needle: impl Into<String>, output: CommandOutput) {
        self.push_rule(needle.into(), output, false);
    }

    /// Every command received, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    /// Number of commands received that contain `needle`.
    pub fn count(&self, needle: &str) -> usize {
        lock(&self.commands)
            .iter()
            .filter(|command| command.contains(needle))
            .count()
    }

    /// A host session over this runner, with every wait zeroed.
    pub fn session(self: &Arc<Self>) -> HostSession {
        let runner: Arc<dyn CommandRunner> = Arc::clone(self) as Arc<dyn CommandRunner>;
        HostSession::new(self.target.clone(), runner).with_timings(Timings::none())
    }

    fn push_rule(&self, needle: String, output: CommandOutput, once: bool) {
        lock(&self.rules).push(Rule {
            needle,
            output,
            once,
        });
    }

    fn answer(&self, command: &str) -> CommandOutput {
        lock(&self.commands).push(command.to_string());
        let mut rules = lock(&self.rules);
        let Some(index) = rules.iter().position(|rule| command.contains(&rule.needle)) else {
            return CommandOutput::success("");
        };
        if rules[index].once {
            rules.remove(index).output
        } else {
            rules[index].output.clone()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    fn target(&self) -> &str {
        &self.target
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.answer(command))
    }

    fn run_blocking(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.answer(command))
    }
}

// ============================================================================
// FakeProvider
// ============================================================================

#[derive(Default)]
struct Fleet {
    vms: BTreeMap<String, bool>,
    up_calls: Vec<String>,
    halt_calls: Vec<String>,
    status_calls: usize,
}

/// In-memory [`VmProvider`]. Clones share the same fleet.
#[derive(Clone, Default)]
pub struct FakeProvider {
    fleet: Arc<Mutex<Fleet>>,
}

impl FakeProvider {
    /// A fleet of `(name, running)` VMs.
    pub fn new(vms: &[(&str, bool)]) -> Self {
        let provider = Self::default();
        lock(&provider.fleet).vms = vms
            .iter()
            .map(|(name, running)| (name.to_string(), *running))
            .collect();
        provider
    }

    /// Changes a VM behind the cache's back.
    pub fn set_running(&self, vm: &str, running: bool) {
        lock(&self.fleet).vms.insert(vm.to_string(), running);
    }

    pub fn is_running(&self, vm: &str) -> bool {
        lock(&self.fleet).vms.get(vm).copied().unwrap_or(false)
    }

    pub fn up_calls(&self) -> Vec<String> {
        lock(&self.fleet).up_calls.clone()
    }

    pub fn halt_calls(&self) -> Vec<String> {
        lock(&self.fleet).halt_calls.clone()
    }

    pub fn status_calls(&self) -> usize {
        lock(&self.fleet).status_calls
    }

    fn set(&self, vm: &str, running: bool) -> Result<()> {
        let mut fleet = lock(&self.fleet);
        let Some(state) = fleet.vms.get_mut(vm) else {
            return Err(Error::Provider(format!("The machine with the name '{vm}' was not found")));
        };
        *state = running;
        if running {
            fleet.up_calls.push(vm.to_string());
        } else {
            fleet.halt_calls.push(vm.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl VmProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn status(&self) -> Result<Vec<VmStatus>> {
        let mut fleet = lock(&self.fleet);
        fleet.status_calls += 1;
        Ok(fleet
            .vms
            .iter()
            .map(|(name, running)| VmStatus {
                name: name.clone(),
                state: (if *running { "running" } else { "poweroff" }).to_string(),
                running: *running,
            })
            .collect())
    }

    async fn up(&self, vm: &str) -> Result<()> {
        self.set(vm, true)
    }

    async fn halt(&self, vm: &str) -> Result<()> {
        self.set(vm, false)
    }
}

// ============================================================================
// StubHttpServer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

struct StubRoute {
    method: String,
    path: String,
    status: u16,
    body: String,
}

#[derive(Default)]
struct StubState {
    routes: Vec<StubRoute>,
    requests: Vec<RecordedRequest>,
}

/// axum server on `127.0.0.1` with canned JSON responses.
///
/// Unrouted requests get a 404 with an empty body. Every request is
/// recorded. The server stops when dropped.
pub struct StubHttpServer {
    addr: SocketAddr,
    state: SharedState,
    task: JoinHandle<()>,
}

type SharedState = Arc<Mutex<StubState>>;

impl StubHttpServer {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let state = SharedState::default();
        let app = Router::new()
            .fallback(answer)
            .with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!("stub HTTP server stopped: {}", e);
            }
        });
        Ok(Self { addr, state, task })
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::LOCALHOST
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answers `method path` with `status` and `body`. Later routes for the
    /// same request win.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        lock(&self.state).routes.push(StubRoute {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.into(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }
}

impl Drop for StubHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    body: String,
) -> impl IntoResponse {
    let method = method.as_str().to_string();
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let mut state = lock(&state);
    let (status, response_body) = state
        .routes
        .iter()
        .rev()
        .find(|route| route.method == method && route.path == path)
        .map(|route| (route.status, route.body.clone()))
        .unwrap_or((404, String::new()));
    state.requests.push(RecordedRequest { method, path, body });

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response_body,
    )
}
