//! Retention command - cohort retention of one entity

use anyhow::Result;
use clap::Args;

use beacon_analytics::EntityScope;
use beacon_config::Config;

use super::{RequestArgs, build_engine, output};

/// Retention command arguments
#[derive(Args, Debug)]
pub struct RetentionArgs {
    /// Entity ID
    pub entity: String,

    #[command(flatten)]
    pub request: RequestArgs,
}

/// Run the retention command
pub async fn run(args: RetentionArgs, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let request = args
        .request
        .request(EntityScope::One(args.entity.clone()), engine.clock())?;
    let resolver = args.request.resolver()?;

    let report = engine.retention(&request, resolver.as_ref()).await?;
    output::retention(&report, args.request.format)?;

    eprintln!("\n[{}]", engine.backend_name());
    Ok(())
}
