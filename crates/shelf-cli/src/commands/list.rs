use crate::commands::common::{format_record_lines, Session};
use crate::error::CliError;

pub async fn run_list(
    session: &Session,
    owner: Option<&str>,
    pending_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let subscription = session.coordinator.list();
    // The refresh (if any) runs in the background; show its result.
    session.coordinator.wait_idle().await;

    let records = subscription
        .current()
        .iter()
        .filter(|record| owner.is_none_or(|owner| record.owner_id == owner))
        .filter(|record| !pending_only || record.sync_status.is_pending())
        .cloned()
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No listings.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }
    Ok(())
}
