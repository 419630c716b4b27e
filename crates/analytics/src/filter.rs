//! Inbound rollup request
//!
//! A request names which entities to aggregate, the date filter, and the
//! player filters (segments, branch, environment) applied to every metric.

use serde::{Deserialize, Serialize};

use beacon_query::{BranchFilter, EnvironmentFilter, RequestFilters};

use crate::interval::DateFilter;

/// One entity or a list of entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityScope {
    /// A single entity
    One(String),
    /// Several entities, rolled up in order
    Many(Vec<String>),
}

impl EntityScope {
    /// Entity IDs in request order, duplicates removed
    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id.clone()],
            Self::Many(ids) => {
                let mut seen = std::collections::HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }
}

impl From<&str> for EntityScope {
    fn from(id: &str) -> Self {
        Self::One(id.to_string())
    }
}

impl From<Vec<String>> for EntityScope {
    fn from(ids: Vec<String>) -> Self {
        Self::Many(ids)
    }
}

/// A rollup/timeline request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRequest {
    /// Entities to aggregate
    pub entity_scope: EntityScope,
    /// Requested period
    pub date_filter: DateFilter,
    /// Segment IDs (empty = all players)
    #[serde(default)]
    pub segments: Vec<String>,
    /// Optional branch filter
    #[serde(default)]
    pub branch_filter: Option<BranchFilter>,
    /// Optional environment filter
    #[serde(default)]
    pub environment_filter: Option<EnvironmentFilter>,
    /// Bypass cache reads (results are still written back)
    #[serde(default)]
    pub force_refresh: bool,
}

impl RollupRequest {
    /// Create a request with no player filters
    pub fn new(entity_scope: impl Into<EntityScope>, date_filter: DateFilter) -> Self {
        Self {
            entity_scope: entity_scope.into(),
            date_filter,
            segments: Vec::new(),
            branch_filter: None,
            environment_filter: None,
            force_refresh: false,
        }
    }

    /// Restrict to the given segments
    pub fn with_segments(mut self, segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Set the branch filter
    pub fn with_branch(mut self, branch: BranchFilter) -> Self {
        self.branch_filter = Some(branch);
        self
    }

    /// Set the environment filter
    pub fn with_environment(mut self, environment: EnvironmentFilter) -> Self {
        self.environment_filter = Some(environment);
        self
    }

    /// Skip cache reads for this request
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Player filters in their canonical store form
    pub fn filters(&self) -> RequestFilters {
        let mut filters = RequestFilters::new(self.segments.iter().cloned());
        if let Some(branch) = &self.branch_filter {
            filters = filters.with_branch(branch.clone());
        }
        if let Some(environment) = &self.environment_filter {
            filters = filters.with_environment(environment.clone());
        }
        filters
    }
}
