use crate::commands::common::{format_pending_summary, Session};
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    if !session.remote_configured {
        return Err(CliError::RemoteNotConfigured);
    }

    let report = session.coordinator.drain_pending().await;
    if report.skipped_offline {
        println!("Remote store unreachable; nothing was pushed");
    } else {
        println!("Sync completed: {report}");
    }

    let counts = session.coordinator.store().count_by_status().await?;
    println!("{}", format_pending_summary(&counts));
    Ok(())
}
