use shelf_core::{Book, Record};

use crate::cli::ListingFields;
use crate::commands::common::{apply_listing_fields, Session};
use crate::error::CliError;

pub async fn run_add(session: &Session, title: &str, fields: &ListingFields) -> Result<(), CliError> {
    let record: Record = Book::new(title.trim(), session.owner.as_str()).into();
    let record = apply_listing_fields(record, Some(title), fields)?;

    let stored = session.coordinator.add(record).await?;
    println!("{}", stored.id);
    if stored.sync_status.is_pending() {
        eprintln!("Saved locally as {}; run `shelf sync` once online", stored.sync_status);
    }
    Ok(())
}
