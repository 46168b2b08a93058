use anyhow::Result;
use netfluss::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let command_timeout = Duration::from_secs(app_config.monitoring.command_timeout_secs);

    let interfaces = Arc::new(interface_repo::InterfaceRepo::new(command_timeout));
    let traffic = Arc::new(traffic_repo::NetstatSource::new(
        app_config.process_traffic.program.clone(),
        app_config.process_traffic.args.clone(),
        command_timeout,
    ));
    let ips = Arc::new(ip_repo::IpRepo::new(
        app_config.ip_lookup.external_url.clone(),
        app_config.ip_lookup.preferred_interface.clone(),
        Duration::from_secs(app_config.ip_lookup.http_timeout_secs),
        command_timeout,
    )?);
    let control = Arc::new(reconnect::SystemAdapterControl::new(command_timeout));

    let ws_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let (poller, handle) = monitor::Monitor::new(
        monitor::MonitorDeps {
            interfaces,
            traffic,
            ips,
            control,
            ws_connections: ws_connections.clone(),
        },
        monitor::MonitorSettings::from_config(&app_config),
    );
    let poller_handle = poller.spawn(shutdown_rx);
    handle
        .start(app_config.monitoring.refresh_interval_secs)
        .await?;

    let app = routes::app(handle, app_config.display.clone(), ws_connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = poller_handle.await;
        }
    }

    Ok(())
}
