use std::sync::Arc;

use clap::Parser;
use pretty_assertions::assert_eq;
use shelf_core::models::book;
use shelf_core::{
    Book, Coordinator, FieldValue, MemoryRemoteStore, NetworkStatus, Record, RecordStore,
    SyncStatus,
};

use crate::cli::{Cli, Commands, CompletionShell, ListingFields};
use crate::commands::common::{
    apply_listing_fields, format_pending_summary, format_record_details, format_record_lines,
    normalize_record_identifier, parse_field_assignment, resolve_owner, resolve_record, short_id,
    title_preview,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::error::CliError;

fn offline_coordinator(store: RecordStore) -> Coordinator {
    Coordinator::new(
        store,
        Arc::new(MemoryRemoteStore::new()),
        NetworkStatus::offline(),
    )
}

fn stored(id: &str, title: &str) -> Record {
    let mut listing = Book::new(title, "alice");
    listing.id = id.to_string();
    listing.price = 12.5;
    Record::from(listing)
}

#[test]
fn normalize_record_identifier_trims_and_rejects_empty() {
    assert_eq!(normalize_record_identifier("  abc  ").unwrap(), "abc");
    assert!(matches!(
        normalize_record_identifier(" \t "),
        Err(CliError::EmptyRecordId)
    ));
}

#[test]
fn parse_field_assignment_reads_typed_literals() {
    assert_eq!(
        parse_field_assignment("edition=3").unwrap(),
        ("edition".to_string(), FieldValue::Integer(3))
    );
    assert_eq!(
        parse_field_assignment("signed=true").unwrap(),
        ("signed".to_string(), FieldValue::Bool(true))
    );
    assert_eq!(
        parse_field_assignment("isbn=978-0-13").unwrap(),
        ("isbn".to_string(), FieldValue::Text("978-0-13".to_string()))
    );
}

#[test]
fn parse_field_assignment_rejects_bad_input() {
    assert!(matches!(
        parse_field_assignment("no-equals-sign"),
        Err(CliError::InvalidFieldAssignment(_))
    ));
    assert!(matches!(
        parse_field_assignment(" =3"),
        Err(CliError::InvalidFieldAssignment(_))
    ));
    assert!(matches!(
        parse_field_assignment("syncStatus=0"),
        Err(CliError::Core(_))
    ));
    assert!(matches!(
        parse_field_assignment("has space=1"),
        Err(CliError::Core(_))
    ));
}

#[test]
fn apply_listing_fields_sets_only_given_flags() {
    let record = Record::new("alice")
        .with_id("r1")
        .with_field(book::CATEGORY, "Math");
    let fields = ListingFields {
        author: Some(" Stewart ".to_string()),
        price: Some(40.0),
        extra: vec!["edition=8".to_string()],
        ..ListingFields::default()
    };

    let updated = apply_listing_fields(record, Some("  Calculus "), &fields).unwrap();

    assert_eq!(
        updated.field(book::TITLE),
        Some(&FieldValue::Text("Calculus".to_string()))
    );
    assert_eq!(
        updated.field(book::AUTHOR),
        Some(&FieldValue::Text("Stewart".to_string()))
    );
    assert_eq!(updated.field(book::PRICE), Some(&FieldValue::Float(40.0)));
    assert_eq!(
        updated.field(book::CATEGORY),
        Some(&FieldValue::Text("Math".to_string()))
    );
    assert_eq!(updated.field("edition"), Some(&FieldValue::Integer(8)));
    assert_eq!(updated.field(book::DESCRIPTION), None);
}

#[test]
fn apply_listing_fields_rejects_blank_title() {
    let result = apply_listing_fields(Record::new("alice"), Some("   "), &ListingFields::default());
    assert!(matches!(result, Err(CliError::EmptyTitle)));
}

#[test]
fn short_id_and_title_preview_truncate() {
    assert_eq!(short_id("0192f0c4-7d3e-7abc-8def"), "0192f0c4-7d3e");
    assert_eq!(short_id("abc"), "abc");
    assert_eq!(title_preview("  Linear Algebra  ", 40), "Linear Algebra");
    assert_eq!(title_preview("abcdefgh", 5), "ab...");
}

#[test]
fn format_record_lines_shows_status_only_when_pending() {
    let synced = stored("0192f0c4-7d3e-7abc-8def", "Physics");
    let pending = stored("0192f0c4-7d3f-7abc-8def", "Chemistry").with_status(SyncStatus::PendingInsert);

    let lines = format_record_lines(&[synced, pending]);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0192f0c4-7d3e  Physics"));
    assert!(lines[0].ends_with("$12.50"));
    assert!(lines[1].starts_with("0192f0c4-7d3f  Chemistry"));
    assert!(lines[1].ends_with("$12.50  pending-insert"));
}

#[test]
fn format_record_details_lists_every_field() {
    let record = Record::new("alice")
        .with_id("r1")
        .with_field("edition", 2_i64)
        .with_status(SyncStatus::PendingUpdate);

    assert_eq!(
        format_record_details(&record),
        vec![
            "id: r1".to_string(),
            "owner: alice".to_string(),
            "status: pending-update".to_string(),
            "edition: 2".to_string(),
        ]
    );
}

#[test]
fn format_pending_summary_skips_synced_and_zero_counts() {
    assert_eq!(
        format_pending_summary(&[
            (SyncStatus::Synced, 3),
            (SyncStatus::PendingInsert, 2),
            (SyncStatus::PendingUpdate, 0),
            (SyncStatus::PendingDelete, 1),
        ]),
        "pending: 2 pending-insert, 1 pending-delete"
    );
    assert_eq!(
        format_pending_summary(&[(SyncStatus::Synced, 3)]),
        "all changes synced"
    );
}

#[test]
fn resolve_owner_prefers_explicit_value() {
    assert_eq!(resolve_owner(Some("  bob  ")), "bob");
}

#[tokio::test]
async fn resolve_record_matches_exact_id_and_unique_prefix() {
    let store = RecordStore::open_in_memory().unwrap();
    store.upsert(&stored("abc-1", "Physics")).await.unwrap();
    store.upsert(&stored("xyz-1", "Biology")).await.unwrap();
    let coordinator = offline_coordinator(store);

    let exact = resolve_record("abc-1", &coordinator).await.unwrap();
    assert_eq!(exact.id, "abc-1");

    let by_prefix = resolve_record(" xy ", &coordinator).await.unwrap();
    assert_eq!(by_prefix.id, "xyz-1");
}

#[tokio::test]
async fn resolve_record_reports_ambiguous_and_missing_prefixes() {
    let store = RecordStore::open_in_memory().unwrap();
    store.upsert(&stored("abc-1", "Physics")).await.unwrap();
    store.upsert(&stored("abc-2", "Chemistry")).await.unwrap();
    let coordinator = offline_coordinator(store);

    match resolve_record("abc", &coordinator).await {
        Err(CliError::AmbiguousRecordId(message)) => {
            assert!(message.contains("abc-1"));
            assert!(message.contains("abc-2"));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
    assert!(matches!(
        resolve_record("nope", &coordinator).await,
        Err(CliError::RecordNotFound(query)) if query == "nope"
    ));
}

#[test]
fn cli_parses_add_with_listing_flags() {
    let cli = Cli::try_parse_from([
        "shelf",
        "--offline",
        "add",
        "--title",
        "Physics",
        "--price",
        "12.5",
        "--field",
        "edition=3",
    ])
    .unwrap();

    assert!(cli.offline);
    match cli.command {
        Commands::Add { title, fields } => {
            assert_eq!(title, "Physics");
            assert_eq!(fields.price, Some(12.5));
            assert_eq!(fields.extra, vec!["edition=3".to_string()]);
        }
        _ => panic!("expected add command"),
    }
}

#[test]
fn cli_accepts_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["shelf", "list", "--pending", "--owner", "alice"]).unwrap();
    assert_eq!(cli.owner.as_deref(), Some("alice"));
    assert!(matches!(
        cli.command,
        Commands::List {
            pending: true,
            json: false
        }
    ));
}

#[test]
fn cli_requires_title_for_add() {
    assert!(Cli::try_parse_from(["shelf", "add", "--price", "3"]).is_err());
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("shelf"));
}

#[test]
fn completions_write_to_output_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output = temp_dir.path().join("shelf.fish");

    run_completions(CompletionShell::Fish, Some(&output)).unwrap();

    let script = std::fs::read_to_string(&output).unwrap();
    assert!(script.contains("complete -c shelf"));
}
