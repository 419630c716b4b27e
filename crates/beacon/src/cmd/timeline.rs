//! Timeline command - one entity's merged series and deltas

use anyhow::Result;
use clap::Args;

use beacon_analytics::EntityScope;
use beacon_config::Config;

use super::{RequestArgs, build_engine, output};

/// Timeline command arguments
#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Entity ID
    pub entity: String,

    #[command(flatten)]
    pub request: RequestArgs,
}

/// Run the timeline command
pub async fn run(args: TimelineArgs, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let request = args
        .request
        .request(EntityScope::One(args.entity.clone()), engine.clock())?;
    let resolver = args.request.resolver()?;

    let timeline = engine.timeline(&request, resolver.as_ref()).await?;
    output::timeline(&timeline, args.request.format)?;

    eprintln!("\n[{}]", engine.backend_name());
    Ok(())
}
