use anyhow::{Context, Result};
use lagg_core::{Aggregator, AggregatorConfig, Link, LinkManager, TunClient};

/// Open every configured link; any failure is fatal.
fn open_links(cfg: &AggregatorConfig) -> Result<Vec<Link>> {
    cfg.links
        .iter()
        .map(|l| {
            Link::open(&l.if_name, l.peer)
                .with_context(|| format!("failed to open link on '{}'", l.if_name))
        })
        .collect()
}

pub async fn run_aggregator(cfg: AggregatorConfig) -> Result<()> {
    tracing::info!(
        "Aggregator config: destination={} links={} reorder_timeout={:?} tun={} mtu={}",
        cfg.destination_ip,
        cfg.links.len(),
        cfg.reorder_timeout,
        cfg.tun_name,
        cfg.tun_mtu
    );

    let links = open_links(&cfg)?;
    let manager =
        LinkManager::new(links, cfg.reorder_timeout).context("failed to start link manager")?;

    let client = TunClient::new(&cfg.tun_name, cfg.tun_mtu)
        .with_context(|| format!("failed to create TUN device '{}'", cfg.tun_name))?;

    #[cfg(target_os = "linux")]
    crate::linux_tun_config::configure_linux_tun(client.name(), cfg.tun_mtu, cfg.destination_ip)?;

    let mut aggregator =
        Aggregator::new(client, manager, cfg.destination_ip, cfg.health_interval)
            .context("failed to set up event loop")?;
    aggregator.log_setup();

    let shutdown = aggregator.shutdown_handle();
    let mut event_loop = tokio::task::spawn_blocking(move || aggregator.run());

    tokio::select! {
        res = &mut event_loop => {
            res.context("event loop panicked")?.context("event loop failed")?;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received");
        }
    }

    shutdown.trigger();
    event_loop
        .await
        .context("event loop panicked")?
        .context("event loop failed")?;

    tracing::info!("Aggregator stopped");
    Ok(())
}
