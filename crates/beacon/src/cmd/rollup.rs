//! Rollup command - sum several entities into one timeline

use anyhow::Result;
use clap::Args;

use beacon_analytics::EntityScope;
use beacon_config::Config;

use super::{RequestArgs, build_engine, output};

/// Rollup command arguments
#[derive(Args, Debug)]
pub struct RollupArgs {
    /// Entity IDs to roll up
    #[arg(required = true)]
    pub entities: Vec<String>,

    #[command(flatten)]
    pub request: RequestArgs,
}

/// Run the rollup command
pub async fn run(args: RollupArgs, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let request = args
        .request
        .request(EntityScope::Many(args.entities.clone()), engine.clock())?;
    let resolver = args.request.resolver()?;

    let result = engine.rollup(&request, resolver.as_ref()).await?;
    output::rollup(&result, args.request.format)?;

    eprintln!("\n[{}]", engine.backend_name());
    Ok(())
}
