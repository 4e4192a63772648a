use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use shared::error::Fault;
use tokio::sync::oneshot;

use crate::transport::{ApiRequest, Transport};

/// Answers calls from a fixed queue of results, in order.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, Fault>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Result<Value, Fault>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, response: Result<Value, Fault>) {
        self.responses.lock().expect("responses").push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, Fault> {
        self.requests.lock().expect("requests").push(request);
        self.responses
            .lock()
            .expect("responses")
            .pop_front()
            .unwrap_or_else(|| Err(Fault::transport("no scripted response left")))
    }
}

/// Holds every call open until the test resolves it, so completion order can
/// differ from dispatch order. Gates are keyed by request path.
#[derive(Default)]
pub struct GatedTransport {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<Value, Fault>>>>,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers the gate for the next call to `path` and returns its resolver.
    pub fn gate(&self, path: &str) -> oneshot::Sender<Result<Value, Fault>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().expect("gates").insert(path.to_string(), rx);
        tx
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, Fault> {
        let gate = self.gates.lock().expect("gates").remove(&request.path);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(Fault::transport("gate dropped"))),
            None => Err(Fault::transport(format!("no gate for {}", request.path))),
        }
    }
}

/// Yields until `condition` holds; panics after a generous number of turns.
pub async fn settle<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..1000 {
        if condition().await {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
