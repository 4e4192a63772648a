use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{EntityKind, RecordId},
    protocol::{EntityRecord, Pagination},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    normalizer::{normalize_failure, normalize_success, NormalizedResponse},
    store::{EntityState, Mutation},
    transport::{ApiRequest, Method, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationToken(pub u64);

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        query.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        query
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List(ListParams),
    Get(RecordId),
    Create(Value),
    Update(RecordId, Value),
    Delete(RecordId),
    Search(String),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List(_) => "list",
            Operation::Get(_) => "get",
            Operation::Create(_) => "create",
            Operation::Update(..) => "update",
            Operation::Delete(_) => "delete",
            Operation::Search(_) => "search",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::List(_) | Operation::Get(_) | Operation::Search(_)
        )
    }

    pub fn request(&self, kind: EntityKind) -> ApiRequest {
        let base = kind.path();
        match self {
            Operation::List(params) => {
                ApiRequest::new(Method::Get, base).with_query(params.to_query())
            }
            Operation::Get(id) => ApiRequest::new(Method::Get, format!("{base}/{id}")),
            Operation::Create(payload) => {
                ApiRequest::new(Method::Post, base).with_body(payload.clone())
            }
            Operation::Update(id, payload) => {
                ApiRequest::new(Method::Put, format!("{base}/{id}")).with_body(payload.clone())
            }
            Operation::Delete(id) => ApiRequest::new(Method::Delete, format!("{base}/{id}")),
            Operation::Search(query) => ApiRequest::new(Method::Get, format!("{base}/search"))
                .with_query(vec![("q".to_string(), query.clone())]),
        }
    }

    fn mutation<T>(&self, normalized: &NormalizedResponse) -> Result<Mutation<T>, serde_json::Error>
    where
        T: EntityRecord + DeserializeOwned,
    {
        Ok(match self {
            Operation::List(_) => Mutation::ReplaceCollection {
                records: normalized.records()?,
                pagination: Some(normalized.pagination),
            },
            Operation::Search(_) => Mutation::ReplaceCollection {
                records: normalized.records()?,
                pagination: None,
            },
            Operation::Get(_) => Mutation::Select(normalized.record()?),
            Operation::Create(_) => Mutation::Append(normalized.record()?),
            Operation::Update(id, _) => Mutation::Replace {
                id: id.clone(),
                record: normalized.record()?,
            },
            Operation::Delete(id) => Mutation::Remove { id: id.clone() },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Fulfilled {
        token: CorrelationToken,
    },
    Rejected {
        token: CorrelationToken,
        error: String,
    },
    /// A newer call was still in flight when this one resolved. `error`
    /// carries this call's failure, if any.
    Superseded {
        token: CorrelationToken,
        error: Option<String>,
    },
    /// The store was reset while the call was in flight; nothing was applied.
    Discarded {
        token: CorrelationToken,
    },
}

impl Completion {
    pub fn token(&self) -> CorrelationToken {
        match self {
            Completion::Fulfilled { token }
            | Completion::Rejected { token, .. }
            | Completion::Superseded { token, .. }
            | Completion::Discarded { token } => *token,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Completion::Fulfilled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub kind: EntityKind,
    pub token: Option<CorrelationToken>,
    pub phase: RequestPhase,
    pub message: Option<String>,
    pub error: Option<String>,
}

struct Tracked<T> {
    state: EntityState<T>,
    next_token: u64,
    outstanding: BTreeSet<CorrelationToken>,
    /// Tokens at or below this value were issued before the last reset.
    reset_watermark: u64,
}

impl<T> Tracked<T> {
    // The flags belong to a completion unless a newer call is still out.
    fn settle(&mut self, token: CorrelationToken) -> Settlement {
        self.outstanding.remove(&token);
        if token.0 <= self.reset_watermark {
            Settlement::Discarded
        } else if self.outstanding.range(token..).next().is_some() {
            Settlement::Stale
        } else {
            Settlement::Latest
        }
    }
}

enum Settlement {
    Latest,
    Stale,
    Discarded,
}

pub struct LifecycleController<T> {
    transport: Arc<dyn Transport>,
    inner: RwLock<Tracked<T>>,
    events: broadcast::Sender<StoreEvent>,
}

impl<T> LifecycleController<T>
where
    T: EntityRecord + DeserializeOwned,
{
    pub fn new(transport: Arc<dyn Transport>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            transport,
            inner: RwLock::new(Tracked {
                state: EntityState::default(),
                next_token: 0,
                outstanding: BTreeSet::new(),
                reset_watermark: 0,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn execute(&self, op: Operation) -> Completion {
        let token = self.begin(&op).await;
        let request = op.request(T::KIND);

        match self.transport.send(request).await {
            Ok(body) => {
                let normalized = normalize_success(&body);
                match op.mutation::<T>(&normalized) {
                    Ok(mutation) => self.fulfill(token, &op, mutation, normalized.message).await,
                    Err(e) => {
                        let error = format!("invalid {} payload: {e}", T::KIND);
                        self.reject(token, &op, error).await
                    }
                }
            }
            Err(fault) => {
                warn!(
                    "store: call failed kind={} op={} token={} fault={:?} detail={}",
                    T::KIND,
                    op.name(),
                    token,
                    fault.kind(),
                    fault
                );
                self.reject(token, &op, normalize_failure(&fault)).await
            }
        }
    }

    pub async fn fail_before_send(&self, op: &Operation, error: String) -> Completion {
        let token = self.begin(op).await;
        self.reject(token, op, error).await
    }

    async fn begin(&self, op: &Operation) -> CorrelationToken {
        let mut guard = self.inner.write().await;
        guard.next_token += 1;
        let token = CorrelationToken(guard.next_token);
        guard.outstanding.insert(token);
        guard.state.phase = RequestPhase::Pending;
        guard.state.error = None;
        guard.state.message = None;
        debug!(
            "store: dispatch kind={} op={} token={} in_flight={}",
            T::KIND,
            op.name(),
            token,
            guard.outstanding.len()
        );
        self.publish(&guard.state, Some(token));
        token
    }

    async fn fulfill(
        &self,
        token: CorrelationToken,
        op: &Operation,
        mutation: Mutation<T>,
        message: String,
    ) -> Completion {
        let mut guard = self.inner.write().await;
        let completion = match guard.settle(token) {
            Settlement::Discarded => return Completion::Discarded { token },
            Settlement::Stale => {
                guard.state.apply(mutation);
                debug!(
                    "store: superseded completion applied kind={} op={} token={}",
                    T::KIND,
                    op.name(),
                    token
                );
                Completion::Superseded { token, error: None }
            }
            Settlement::Latest => {
                guard.state.apply(mutation);
                guard.state.phase = RequestPhase::Fulfilled;
                guard.state.error = None;
                guard.state.message = (!op.is_read()).then_some(message);
                info!(
                    "store: fulfilled kind={} op={} token={} records={}",
                    T::KIND,
                    op.name(),
                    token,
                    guard.state.collection.len()
                );
                Completion::Fulfilled { token }
            }
        };
        self.publish(&guard.state, Some(token));
        completion
    }

    async fn reject(&self, token: CorrelationToken, op: &Operation, error: String) -> Completion {
        let mut guard = self.inner.write().await;
        let completion = match guard.settle(token) {
            Settlement::Discarded => return Completion::Discarded { token },
            Settlement::Stale => {
                warn!(
                    "store: superseded rejection kind={} op={} token={} error={}",
                    T::KIND,
                    op.name(),
                    token,
                    error
                );
                return Completion::Superseded {
                    token,
                    error: Some(error),
                };
            }
            Settlement::Latest => {
                guard.state.phase = RequestPhase::Rejected;
                guard.state.message = None;
                guard.state.error = Some(error.clone());
                warn!(
                    "store: rejected kind={} op={} token={} error={}",
                    T::KIND,
                    op.name(),
                    token,
                    error
                );
                Completion::Rejected { token, error }
            }
        };
        self.publish(&guard.state, Some(token));
        completion
    }

    pub async fn read<R>(&self, f: impl FnOnce(&EntityState<T>) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard.state)
    }

    pub async fn in_flight(&self) -> usize {
        self.inner.read().await.outstanding.len()
    }

    pub async fn update_state(&self, f: impl FnOnce(&mut EntityState<T>) -> bool) {
        let mut guard = self.inner.write().await;
        if f(&mut guard.state) {
            self.publish(&guard.state, None);
        }
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.write().await;
        guard.reset_watermark = guard.next_token;
        guard.state = EntityState::default();
        debug!(
            "store: reset kind={} pending_discarded={}",
            T::KIND,
            guard.outstanding.len()
        );
        self.publish(&guard.state, None);
    }

    fn publish(&self, state: &EntityState<T>, token: Option<CorrelationToken>) {
        let _ = self.events.send(StoreEvent {
            kind: T::KIND,
            token,
            phase: state.phase,
            message: state.message.clone(),
            error: state.error.clone(),
        });
    }
}

pub fn page_count(pagination: &Pagination) -> u64 {
    if pagination.limit == 0 {
        return 0;
    }
    pagination.total.div_ceil(pagination.limit)
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
