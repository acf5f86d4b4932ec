use std::sync::Arc;
use std::time::Duration;

use quill_core::{watch_reachability, ConnectivityMonitor, ConnectivitySignal};

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Probe the server every `interval_secs` and drain the queue on reconnect until Ctrl-C.
pub async fn run_watch(interval_secs: u64, ctx: &AppContext) -> Result<(), CliError> {
    if interval_secs == 0 {
        return Err(CliError::InvalidInterval);
    }

    let transport = Arc::new(ctx.http_transport()?);
    let synchronizer = ctx.synchronizer(transport.clone());
    let signal = ConnectivitySignal::new(false);

    let mut monitor = ConnectivityMonitor::new(synchronizer.clone(), &signal);
    if let Some(poll_interval) = ctx.config.poll_interval() {
        monitor = monitor.with_poll_interval(poll_interval);
    }
    let monitor = monitor.spawn();

    println!(
        "Watching {} every {interval_secs}s (Ctrl-C to stop)",
        transport.base_url()
    );
    let probe = move || {
        let transport = transport.clone();
        async move { transport.is_reachable().await }
    };

    // Dropping the probe loop drops the last signal sender, which stops the
    // monitor once its current drain has finished.
    tokio::select! {
        () = watch_reachability(signal, probe, Duration::from_secs(interval_secs)) => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    if synchronizer.is_running() {
        println!("Waiting for the running sync to finish...");
    }
    monitor.await?;
    Ok(())
}
