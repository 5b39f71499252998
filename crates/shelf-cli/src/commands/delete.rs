use crate::commands::common::{resolve_record, Session};
use crate::error::CliError;

pub async fn run_delete(session: &Session, id: &str) -> Result<(), CliError> {
    let record = resolve_record(id, &session.coordinator).await?;

    session.coordinator.delete(&record).await?;
    println!("{}", record.id);
    if session.remote_configured && !session.coordinator.is_online() {
        eprintln!("Deleted locally only; the remote copy is left in place");
    }
    Ok(())
}
