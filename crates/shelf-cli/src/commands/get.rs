use crate::commands::common::{format_record_details, resolve_record, Session};
use crate::error::CliError;

pub async fn run_get(session: &Session, id: &str, as_json: bool) -> Result<(), CliError> {
    let record = resolve_record(id, &session.coordinator).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        for line in format_record_details(&record) {
            println!("{line}");
        }
    }
    Ok(())
}
