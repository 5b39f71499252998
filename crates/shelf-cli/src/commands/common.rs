use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use shelf_core::models::{book, validate_field_name};
use shelf_core::{
    Book, Coordinator, FieldValue, NetworkStatus, Record, RecordStore, RemoteDocument,
    RemoteError, RemoteResult, RemoteStore, ShelfConfig, SyncStatus,
};

use crate::cli::{Cli, ListingFields};
use crate::error::CliError;

const DEFAULT_OWNER: &str = "local";
const SHORT_ID_LEN: usize = 13;
const TITLE_PREVIEW_CHARS: usize = 40;

/// Per-invocation settings resolved from flags, environment and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub db_path: PathBuf,
    pub offline: bool,
    pub owner: String,
}

impl SessionOptions {
    pub fn resolve(cli: &Cli, config: &ShelfConfig) -> Self {
        Self {
            db_path: cli
                .db_path
                .clone()
                .unwrap_or_else(|| config.resolved_db_path()),
            offline: cli.offline,
            owner: resolve_owner(cli.owner.as_deref()),
        }
    }
}

pub fn resolve_owner(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| env::var("SHELF_OWNER").ok())
        .and_then(|owner| shelf_core::util::normalize_text_option(Some(owner)))
        .unwrap_or_else(|| DEFAULT_OWNER.to_string())
}

pub struct Session {
    pub coordinator: Coordinator,
    pub owner: String,
    pub remote_configured: bool,
    /// `--offline` was given.
    pub offline: bool,
}

impl Session {
    /// Let background refreshes and drains finish before the process exits.
    pub async fn close(&self) {
        self.coordinator.wait_idle().await;
    }
}

/// Stand-in remote used when no remote URL is configured.
struct LocalOnlyRemote;

#[async_trait]
impl RemoteStore for LocalOnlyRemote {
    async fn fetch_all(&self) -> RemoteResult<Vec<(String, RemoteDocument)>> {
        Err(not_configured())
    }

    async fn fetch_one(&self, _id: &str) -> RemoteResult<Option<RemoteDocument>> {
        Err(not_configured())
    }

    async fn put(&self, _id: &str, _document: &RemoteDocument) -> RemoteResult<()> {
        Err(not_configured())
    }

    async fn remove(&self, _id: &str) -> RemoteResult<()> {
        Err(not_configured())
    }
}

fn not_configured() -> RemoteError {
    RemoteError::Unavailable("no remote store configured".to_string())
}

pub async fn open_session(
    config: &ShelfConfig,
    options: &SessionOptions,
) -> Result<Session, CliError> {
    let store = RecordStore::open(&options.db_path).await?;

    let (remote, online): (Arc<dyn RemoteStore>, bool) = match config.http_remote()? {
        Some(http) if options.offline => (Arc::new(http), false),
        Some(http) => {
            let online = match config.tcp_probe() {
                Some(probe) => probe.probe_once().await,
                None => true,
            };
            if !online {
                tracing::info!("Remote store unreachable, working offline");
            }
            (Arc::new(http), online)
        }
        None => (Arc::new(LocalOnlyRemote), false),
    };

    Ok(Session {
        coordinator: Coordinator::new(store, remote, NetworkStatus::new(online)),
        owner: options.owner.clone(),
        remote_configured: config.has_remote(),
        offline: options.offline,
    })
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find a record by exact id (local, then remote) or by unique local id prefix.
pub async fn resolve_record(query: &str, coordinator: &Coordinator) -> Result<Record, CliError> {
    let query = normalize_record_identifier(query)?;
    if let Some(record) = coordinator.get_by_id(&query).await? {
        return Ok(record);
    }

    let matching_ids = coordinator.store().list_ids_by_prefix(&query, 3).await?;
    match matching_ids.as_slice() {
        [] => Err(CliError::RecordNotFound(query)),
        [id] => coordinator
            .store()
            .get_by_id(id)
            .await?
            .ok_or(CliError::RecordNotFound(query)),
        ids => {
            let options = ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Parse a `KEY=VALUE` assignment from `--field`.
pub fn parse_field_assignment(raw: &str) -> Result<(String, FieldValue), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidFieldAssignment(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidFieldAssignment(raw.to_string()));
    }
    validate_field_name(key)?;
    Ok((key.to_string(), FieldValue::parse_literal(value)))
}

/// Apply listing flags to a record. `None` flags leave fields untouched.
pub fn apply_listing_fields(
    mut record: Record,
    title: Option<&str>,
    fields: &ListingFields,
) -> Result<Record, CliError> {
    if let Some(title) = title {
        let title = title.trim();
        if title.is_empty() {
            return Err(CliError::EmptyTitle);
        }
        record = record.with_field(book::TITLE, title);
    }

    let text_fields = [
        (book::AUTHOR, &fields.author),
        (book::CATEGORY, &fields.category),
        (book::DESCRIPTION, &fields.description),
        (book::IMAGE_URL, &fields.image_url),
    ];
    for (name, value) in text_fields {
        if let Some(value) = value {
            record = record.with_field(name, value.trim());
        }
    }
    if let Some(price) = fields.price {
        record = record.with_field(book::PRICE, price);
    }

    for raw in &fields.extra {
        let (key, value) = parse_field_assignment(raw)?;
        record = record.with_field(key, value);
    }
    Ok(record)
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn title_preview(title: &str, max_chars: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut preview: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    preview.push_str("...");
    preview
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let listing = Book::from(record);
            let short_id = short_id(&record.id);
            let title = title_preview(&listing.title, TITLE_PREVIEW_CHARS);
            let price = listing.price_label();
            if record.sync_status.is_pending() {
                format!(
                    "{short_id:<13}  {title:<40}  {price:>9}  {}",
                    record.sync_status
                )
            } else {
                format!("{short_id:<13}  {title:<40}  {price:>9}")
            }
        })
        .collect()
}

pub fn format_record_details(record: &Record) -> Vec<String> {
    let mut lines = vec![
        format!("id: {}", record.id),
        format!("owner: {}", record.owner_id),
        format!("status: {}", record.sync_status),
    ];
    lines.extend(
        record
            .fields
            .iter()
            .map(|(name, value)| format!("{name}: {value}")),
    );
    lines
}

/// Human summary of pending-mutation counts.
pub fn format_pending_summary(counts: &[(SyncStatus, usize)]) -> String {
    let pending = counts
        .iter()
        .filter(|(status, count)| status.is_pending() && *count > 0)
        .map(|(status, count)| format!("{count} {status}"))
        .collect::<Vec<_>>();
    if pending.is_empty() {
        "all changes synced".to_string()
    } else {
        format!("pending: {}", pending.join(", "))
    }
}
