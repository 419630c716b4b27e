//! Check command - verify the store is reachable

use anyhow::{Context, Result};

use beacon_config::Config;

use super::build_engine;

/// Run the check command
pub async fn run(config: &Config) -> Result<()> {
    let engine = build_engine(config)?;

    println!("Backend:     {}", engine.backend_name());
    println!(
        "Limits:      {} concurrent queries, {} cohort days, {:?} timeout",
        config.engine.max_concurrent_queries,
        config.engine.cohort_max_days,
        config.engine.request_timeout
    );
    println!(
        "Cache:       {} entries, today ttl {:?}, historical ttl {:?}",
        config.cache.capacity, config.cache.today_ttl, config.cache.historical_ttl
    );

    engine
        .health_check()
        .await
        .with_context(|| format!("{} backend is not healthy", engine.backend_name()))?;
    tracing::info!(backend = engine.backend_name(), "store health check passed");
    println!("Status:      ok");
    Ok(())
}
