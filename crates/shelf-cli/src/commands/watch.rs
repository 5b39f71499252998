use chrono::Local;
use shelf_core::{spawn_listener, ConnectivityMonitor, ManualConnectivity, ShelfConfig};

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_watch(session: &Session, config: &ShelfConfig) -> Result<(), CliError> {
    if !session.remote_configured {
        return Err(CliError::RemoteNotConfigured);
    }

    let coordinator = &session.coordinator;
    let initially_online = coordinator.is_online();
    let probe = config.tcp_probe().filter(|_| !session.offline);

    let (monitor, probe_task) = match probe {
        Some(probe) => {
            println!("Probing {} for connectivity; press Ctrl-C to stop", probe.target());
            let monitor = ConnectivityMonitor::new(initially_online);
            let task = probe.spawn(monitor.clone());
            (monitor, Some(task))
        }
        None => {
            println!("Watching the local store only; press Ctrl-C to stop");
            let manual = ManualConnectivity::new(initially_online);
            (manual.monitor().clone(), None)
        }
    };

    let listener = spawn_listener(coordinator.clone(), &monitor);
    let mut subscription = coordinator.store().subscribe_all();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else {
                    break;
                };
                let pending = snapshot
                    .iter()
                    .filter(|record| record.sync_status.is_pending())
                    .count();
                println!(
                    "[{}] {} listings, {} pending, {}",
                    Local::now().format("%H:%M:%S"),
                    snapshot.len(),
                    pending,
                    if coordinator.is_online() { "online" } else { "offline" }
                );
            }
        }
    }

    listener.abort();
    if let Some(task) = probe_task {
        task.abort();
    }
    coordinator.shutdown().await;
    Ok(())
}
