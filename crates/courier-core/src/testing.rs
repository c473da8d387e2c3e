//! Test doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::domain::RequestTarget;
use crate::ports::Sender;
use crate::transport::{HttpResponse, TransportError};

/// One scripted reaction of the fake server.
#[derive(Debug, Clone)]
pub enum Step {
    Status(u16),
    Body(u16, &'static str),
    NetworkDown,
    /// Never answers (exercises the per-attempt timeout).
    Hang,
}

struct Script {
    steps: VecDeque<Step>,
    last: Step,
}

impl Script {
    fn new(steps: Vec<Step>) -> Self {
        let last = steps.last().cloned().unwrap_or(Step::Status(200));
        Self {
            steps: steps.into(),
            last,
        }
    }

    /// Replays the steps in order, then keeps repeating the final one.
    fn next(&mut self) -> Step {
        self.steps.pop_front().unwrap_or_else(|| self.last.clone())
    }
}

/// `Sender` that replays scripted statuses, optionally per URL, and records
/// every dispatched URL in order.
pub struct ScriptedSender {
    default: Mutex<Script>,
    routes: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl ScriptedSender {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            default: Mutex::new(Script::new(steps)),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![step])
    }

    /// Script the responses for one URL; other URLs use the default script.
    pub fn route(self, url: &str, steps: Vec<Step>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::new(steps));
        self
    }

    /// Hold every dispatch (after recording it) until `open_gate` releases it.
    pub fn with_gate(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_gate(&self, dispatches: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(dispatches);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_step(&self, url: &str) -> Step {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(script) => script.next(),
            None => self.default.lock().unwrap().next(),
        }
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn send(&self, request: &RequestTarget) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.url.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.next_step(&request.url) {
            Step::Status(status) => Ok(HttpResponse::new(status, Vec::new())),
            Step::Body(status, body) => Ok(HttpResponse::new(status, body.as_bytes().to_vec())),
            Step::NetworkDown => Err(TransportError::Network("connection refused".into())),
            Step::Hang => std::future::pending().await,
        }
    }
}
