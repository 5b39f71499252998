use crate::cli::ListingFields;
use crate::commands::common::{apply_listing_fields, resolve_record, Session};
use crate::error::CliError;

pub async fn run_edit(
    session: &Session,
    id: &str,
    title: Option<&str>,
    fields: &ListingFields,
) -> Result<(), CliError> {
    let record = resolve_record(id, &session.coordinator).await?;
    let edited = apply_listing_fields(record.clone(), title, fields)?;

    if edited.same_content(&record) {
        println!("{}", record.id);
        return Ok(());
    }

    let updated = session.coordinator.update(edited).await?;
    println!("{}", updated.id);
    if updated.sync_status.is_pending() {
        eprintln!("Saved locally as {}; run `shelf sync` once online", updated.sync_status);
    }
    Ok(())
}
