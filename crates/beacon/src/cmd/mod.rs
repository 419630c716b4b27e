//! Command implementations for the Beacon CLI

pub mod check;
pub mod output;
pub mod retention;
pub mod rollup;
pub mod timeline;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use beacon_analytics::{
    AnalyticsEngine, Clock, DateFilter, EntityScope, IdentityResolver, MapResolver,
    RollupRequest, ScopeResolver, SystemClock,
};
use beacon_cache::MemoryCache;
use beacon_config::{Config, QueryBackend as BackendKind};
use beacon_query::{
    BranchFilter, ClickHouseBackend, ClickHouseBackendConfig, EnvironmentFilter, FixtureBackend,
    QueryBackend,
};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Arguments shared by every request-driven command
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Date range (e.g., 7d, 24h, 30m, today, yesterday, 2024-01-01,2024-01-31)
    #[arg(short, long, default_value = "7d")]
    pub range: String,

    /// Restrict to a player segment (repeatable)
    #[arg(short, long = "segment")]
    pub segments: Vec<String>,

    /// Keep only this branch
    #[arg(long, conflicts_with = "exclude_branch")]
    pub branch: Option<String>,

    /// Exclude this branch
    #[arg(long)]
    pub exclude_branch: Option<String>,

    /// Keep only this environment
    #[arg(long, conflicts_with = "exclude_environment")]
    pub environment: Option<String>,

    /// Exclude this environment
    #[arg(long)]
    pub exclude_environment: Option<String>,

    /// Map an entity to a store scope, as ENTITY=SCOPE (repeatable)
    #[arg(long = "scope", value_name = "ENTITY=SCOPE")]
    pub scopes: Vec<String>,

    /// Ignore cached results (fresh results are still cached)
    #[arg(long)]
    pub force_refresh: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl RequestArgs {
    /// Build the engine request for the given entities
    pub fn request(&self, entities: EntityScope, clock: &dyn Clock) -> Result<RollupRequest> {
        let filter = DateFilter::parse(&self.range, clock.now())
            .with_context(|| format!("invalid range '{}'", self.range))?;

        let mut request = RollupRequest::new(entities, filter)
            .with_segments(self.segments.iter().cloned())
            .with_force_refresh(self.force_refresh);

        if let Some(branch) = &self.branch {
            request = request.with_branch(BranchFilter::include(branch.clone()));
        } else if let Some(branch) = &self.exclude_branch {
            request = request.with_branch(BranchFilter::exclude(branch.clone()));
        }

        if let Some(environment) = &self.environment {
            request = request.with_environment(EnvironmentFilter::include(environment.clone()));
        } else if let Some(environment) = &self.exclude_environment {
            request = request.with_environment(EnvironmentFilter::exclude(environment.clone()));
        }

        Ok(request)
    }

    /// Identity mapping unless `--scope` pairs were given
    pub fn resolver(&self) -> Result<Box<dyn ScopeResolver>> {
        if self.scopes.is_empty() {
            return Ok(Box::new(IdentityResolver));
        }

        let mut resolver = MapResolver::new();
        for pair in &self.scopes {
            let (entity, scope) = pair
                .split_once('=')
                .filter(|(entity, scope)| !entity.is_empty() && !scope.is_empty())
                .ok_or_else(|| anyhow::anyhow!("invalid scope mapping '{}': use ENTITY=SCOPE", pair))?;
            resolver = resolver.with(entity.trim(), scope.trim());
        }
        Ok(Box::new(resolver))
    }
}

/// Load the config file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Build the store backend named by the config
pub fn build_backend(config: &Config) -> Result<Arc<dyn QueryBackend>> {
    let query = &config.query;
    match query.backend {
        BackendKind::Clickhouse => {
            let mut backend_config = ClickHouseBackendConfig::new(query.url(), query.database())
                .with_max_execution_time(query.max_execution_time);
            if let (Some(username), Some(password)) = (&query.username, &query.password) {
                backend_config = backend_config.with_credentials(username, password);
            }
            Ok(Arc::new(ClickHouseBackend::new(&backend_config)))
        }
        BackendKind::Fixture => {
            let path = query
                .fixture_path
                .as_ref()
                .context("fixture backend requires query.fixture_path")?;
            let backend = FixtureBackend::from_file(path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?;
            Ok(Arc::new(backend))
        }
    }
}

/// Wire the engine from config
pub fn build_engine(config: &Config) -> Result<AnalyticsEngine> {
    let store = build_backend(config)?;
    let cache = Arc::new(MemoryCache::new(config.cache.capacity));
    Ok(AnalyticsEngine::new(
        store,
        cache,
        Arc::new(SystemClock),
        &config.cache,
        &config.engine,
    ))
}
