use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, load_settings_from},
    lifecycle::page_count,
    BusinessStores, ClientSettings, Completion, EntityStore, HttpTransport, ListParams,
    Notification, NotificationBridge, NotificationLevel,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use shared::{domain::EntityKind, protocol::EntityRecord};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::timeout,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Run entity store operations against the back-office API")]
struct Args {
    /// Overrides the base URL from settings.
    #[arg(long)]
    api_base_url: Option<String>,
    /// Settings file; defaults to ./client.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Extra query filter as key=value; repeatable.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    Get {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        id: String,
    },
    Search {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        query: String,
    },
    Create {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        /// JSON object sent as the request body.
        payload: String,
    },
    Update {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        id: String,
        payload: String,
    },
    Delete {
        #[arg(value_parser = parse_kind)]
        entity: EntityKind,
        id: String,
    },
    /// Lists the first page of every entity kind at once.
    Overview,
}

impl Command {
    fn entity(&self) -> Option<EntityKind> {
        match self {
            Command::List { entity, .. }
            | Command::Get { entity, .. }
            | Command::Search { entity, .. }
            | Command::Create { entity, .. }
            | Command::Update { entity, .. }
            | Command::Delete { entity, .. } => Some(*entity),
            Command::Overview => None,
        }
    }
}

fn parse_kind(raw: &str) -> Result<EntityKind, String> {
    EntityKind::from_path(raw).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.path()).collect();
        format!("unknown entity '{raw}', expected one of: {}", known.join(", "))
    })
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("filter '{raw}' must look like key=value"))
}

fn parse_payload(raw: &str) -> Result<Value> {
    let payload: Value = serde_json::from_str(raw).context("payload must be valid JSON")?;
    if !payload.is_object() {
        return Err(anyhow!("payload must be a JSON object"));
    }
    Ok(payload)
}

macro_rules! with_store {
    ($stores:expr, $kind:expr, |$store:ident| $body:expr) => {
        match $kind {
            EntityKind::Customer => {
                let $store = &$stores.customers;
                $body
            }
            EntityKind::Repair => {
                let $store = &$stores.repairs;
                $body
            }
            EntityKind::Sale => {
                let $store = &$stores.sales;
                $body
            }
            EntityKind::Conversation => {
                let $store = &$stores.conversations;
                $body
            }
            EntityKind::Message => {
                let $store = &$stores.messages;
                $body
            }
            EntityKind::Report => {
                let $store = &$stores.reports;
                $body
            }
            EntityKind::Settings => {
                let $store = &$stores.settings;
                $body
            }
        }
    };
}

async fn run_on<T>(store: &EntityStore<T>, command: &Command, settings: &ClientSettings) -> Result<()>
where
    T: EntityRecord + DeserializeOwned + Serialize,
{
    let completion = match command {
        Command::List {
            page,
            limit,
            filters,
            ..
        } => {
            let mut params = ListParams::page(
                page.unwrap_or(1),
                limit.unwrap_or(settings.default_page_limit),
            );
            for (key, value) in filters {
                params = params.with_filter(key, value);
            }
            store.list_all(params).await
        }
        Command::Get { id, .. } => store.get_by_id(id.as_str()).await,
        Command::Search { query, .. } => store.search(query.as_str()).await,
        Command::Create { payload, .. } => store.create(&parse_payload(payload)?).await,
        Command::Update { id, payload, .. } => {
            store.update(id.as_str(), &parse_payload(payload)?).await
        }
        Command::Delete { id, .. } => store.delete(id.as_str()).await,
        Command::Overview => return Err(anyhow!("overview is not a single-entity command")),
    };

    let state = store.snapshot().await;
    let view = json!({
        "entity": store.kind(),
        "phase": format!("{:?}", state.phase),
        "pagination": state.pagination,
        "pages": page_count(&state.pagination),
        "selected": state.selected.as_ref().map(serde_json::to_value).transpose()?,
        "collection": state
            .collection
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);

    let token = completion.token();
    match completion {
        Completion::Rejected { error, .. }
        | Completion::Superseded {
            error: Some(error), ..
        } => Err(anyhow!("{} request {token} failed: {error}", store.kind())),
        _ => Ok(()),
    }
}

async fn overview(stores: &BusinessStores, settings: &ClientSettings) {
    let params = || ListParams::page(1, settings.default_page_limit);
    let (customers, repairs, sales, conversations, messages, reports, config) = futures::join!(
        stores.customers.list_all(params()),
        stores.repairs.list_all(params()),
        stores.sales.list_all(params()),
        stores.conversations.list_all(params()),
        stores.messages.list_all(params()),
        stores.reports.list_all(params()),
        stores.settings.list_all(params()),
    );

    let rows = [
        (EntityKind::Customer, customers, stores.customers.pagination().await),
        (EntityKind::Repair, repairs, stores.repairs.pagination().await),
        (EntityKind::Sale, sales, stores.sales.pagination().await),
        (
            EntityKind::Conversation,
            conversations,
            stores.conversations.pagination().await,
        ),
        (EntityKind::Message, messages, stores.messages.pagination().await),
        (EntityKind::Report, reports, stores.reports.pagination().await),
        (EntityKind::Settings, config, stores.settings.pagination().await),
    ];
    for (kind, completion, pagination) in rows {
        let status = if completion.is_fulfilled() { "ok" } else { "failed" };
        println!("{:<14} {status:<7} total={}", kind.path(), pagination.total);
    }
}

async fn drain_notifications(
    rx: &mut broadcast::Receiver<Notification>,
    quiet_for: Duration,
) -> Vec<Notification> {
    let mut drained = Vec::new();
    loop {
        match timeout(quiet_for, rx.recv()).await {
            Ok(Ok(notification)) => drained.push(notification),
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!("backoffice: notifications lagged skipped={skipped}");
            }
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
    drained
}

fn print_notifications(notifications: &[Notification]) {
    for notification in notifications {
        let tag = match notification.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Failure => "error",
        };
        eprintln!("[{tag}] {}: {}", notification.kind, notification.text);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    info!("backoffice: api_base_url={}", settings.api_base_url);

    let transport = HttpTransport::new(&settings).context("failed to build http transport")?;
    let stores = BusinessStores::new(Arc::new(transport), &settings);

    let mut bridge = NotificationBridge::new(settings.event_capacity);
    let mut notifications = bridge.subscribe();
    match args.command.entity() {
        Some(kind) => bridge.watch(stores.observed_kind(kind)),
        None => bridge.watch_all(stores.observed()),
    }

    let result = match args.command.entity() {
        Some(kind) => with_store!(stores, kind, |store| {
            run_on(store.as_ref(), &args.command, &settings).await
        }),
        None => {
            overview(&stores, &settings).await;
            Ok(())
        }
    };

    let drained = drain_notifications(&mut notifications, Duration::from_millis(250)).await;
    print_notifications(&drained);
    result
}
