//! Tagged counter registry
//!
//! Owns every counter series in the process, keyed by name plus a canonical
//! tag set. The registry is constructed explicitly and shared by `Arc`; there
//! is no global instance.
//!
//! # Concurrency
//!
//! - Increments are lock-free atomic updates on the series cell and never
//!   touch the identity map.
//! - Looking up an existing identity takes the map's read lock.
//! - Creating a new identity takes the write lock and re-checks under it, so
//!   two callers racing on the same new identity receive the same series.
//! - `snapshot()` clones series handles under the read lock and reads values
//!   after releasing it.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

mod counter;
pub mod naming;
mod tags;

pub use counter::{Counter, CounterBuilder};
pub use tags::Tags;

use counter::CounterCell;

/// Errors returned by registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid metric identity: {reason}")]
    InvalidIdentity { reason: String },

    #[error("Cardinality limit exceeded for '{name}': {scope} limit of {limit} series reached")]
    CardinalityLimitExceeded {
        name: String,
        limit: usize,
        scope: LimitScope,
    },
}

impl RegistryError {
    /// Label value used when counting rejections in self metrics
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::InvalidIdentity { .. } => "invalid_identity",
            Self::CardinalityLimitExceeded { .. } => "cardinality_limit",
        }
    }
}

/// Which cardinality limit was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// Total series across all names
    Registry,
    /// Series sharing one name
    Name,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitScope::Registry => write!(f, "registry-wide"),
            LimitScope::Name => write!(f, "per-name"),
        }
    }
}

/// Optional caps on series creation
///
/// `None` means unbounded. Limits only gate the creation of new identities;
/// existing series are always returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryLimits {
    pub max_series: Option<usize>,
    pub max_series_per_name: Option<usize>,
}

/// Identity of one series: name plus canonical tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterId {
    name: String,
    tags: Tags,
}

impl CounterId {
    /// # Errors
    ///
    /// Returns `InvalidIdentity` if `name` is empty or two tag keys export as
    /// the same label.
    pub fn new(name: &str, tags: Tags) -> Result<Self, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::InvalidIdentity {
                reason: "metric name must not be empty".to_string(),
            });
        }
        tags.ensure_distinct_labels()?;
        Ok(Self {
            name: name.to_string(),
            tags,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.tags)
    }
}

/// One entry of a registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    pub name: String,
    pub tags: Tags,
    pub value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Default)]
struct SeriesTable {
    by_id: HashMap<CounterId, Arc<CounterCell>>,
    per_name: HashMap<String, usize>,
}

/// Concurrency-safe store of tagged counters
///
/// One instance per process is expected; pass it by `Arc` to every caller
/// that records metrics.
pub struct CounterRegistry {
    table: RwLock<SeriesTable>,
    limits: RegistryLimits,
    common_tags: Tags,
    reserved_prefixes: Vec<String>,
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CounterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterRegistry")
            .field("series", &self.len())
            .field("limits", &self.limits)
            .field("common_tags", &self.common_tags)
            .field("reserved_prefixes", &self.reserved_prefixes)
            .finish()
    }
}

impl CounterRegistry {
    /// Unbounded registry with no common tags
    pub fn new() -> Self {
        Self {
            table: RwLock::new(SeriesTable::default()),
            limits: RegistryLimits::default(),
            common_tags: Tags::empty(),
            reserved_prefixes: Vec::new(),
        }
    }

    /// Cap series creation
    pub fn with_limits(mut self, limits: RegistryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Tags merged into every identity; caller tags with the same key win
    pub fn with_common_tags(mut self, common_tags: Tags) -> Self {
        self.common_tags = common_tags;
        self
    }

    /// Refuse names whose exported form starts with `prefix`
    ///
    /// Keeps application counters from shadowing metric families that are
    /// exposed alongside the registry, such as the service's own metrics.
    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefixes.push(prefix.into());
        self
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    pub fn common_tags(&self) -> &Tags {
        &self.common_tags
    }

    /// Return the counter for `(name, tags)`, creating it on first use
    ///
    /// Tag order does not matter: pairs are canonicalized before lookup.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` if `name` is empty or exports under a reserved
    ///   prefix, or a tag key is empty, repeated, or exports as the same label
    ///   as another key
    /// - `CardinalityLimitExceeded` if the identity is new and a configured
    ///   limit is already reached
    pub fn get_or_create_counter(
        &self,
        name: &str,
        tags: &[(&str, &str)],
    ) -> Result<Counter, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::InvalidIdentity {
                reason: "metric name must not be empty".to_string(),
            });
        }
        self.check_reserved(name)?;
        let tags = Tags::from_pairs(tags)?.with_defaults(&self.common_tags);
        let id = CounterId::new(name, tags)?;
        self.resolve(id)
    }

    /// Explicit registration; equivalent to `builder.register(self)`
    ///
    /// # Errors
    ///
    /// Same as [`CounterRegistry::get_or_create_counter`].
    pub fn register(&self, builder: CounterBuilder) -> Result<Counter, RegistryError> {
        builder.register(self)
    }

    /// Resolve the identity and add `delta`
    ///
    /// Prefer caching the handle from `get_or_create_counter` at hot call
    /// sites; this pays for a map lookup on every call.
    ///
    /// # Errors
    ///
    /// Same as [`CounterRegistry::get_or_create_counter`].
    pub fn increment(
        &self,
        name: &str,
        tags: &[(&str, &str)],
        delta: u64,
    ) -> Result<(), RegistryError> {
        self.get_or_create_counter(name, tags)?.increment_by(delta);
        Ok(())
    }

    /// Point-in-time read of every series, ordered by name then tags
    pub fn snapshot(&self) -> Vec<CounterSample> {
        let mut cells: Vec<Arc<CounterCell>> =
            self.read_table().by_id.values().cloned().collect();
        cells.sort_by(|a, b| a.id().cmp(b.id()));
        cells.iter().map(|cell| cell.sample()).collect()
    }

    /// Total number of series
    pub fn len(&self) -> usize {
        self.read_table().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of series registered under `name`
    pub fn series_count(&self, name: &str) -> usize {
        self.read_table().per_name.get(name).copied().unwrap_or(0)
    }

    fn resolve(&self, id: CounterId) -> Result<Counter, RegistryError> {
        {
            let table = self.read_table();
            if let Some(cell) = table.by_id.get(&id) {
                return Ok(Counter::from_cell(Arc::clone(cell)));
            }
        }

        let mut table = self.write_table();

        // Another caller may have created it between the two locks
        if let Some(cell) = table.by_id.get(&id) {
            return Ok(Counter::from_cell(Arc::clone(cell)));
        }

        self.check_limits(&table, id.name())?;

        let cell = Arc::new(CounterCell::new(id.clone()));
        table.by_id.insert(id.clone(), Arc::clone(&cell));
        *table.per_name.entry(id.name().to_string()).or_insert(0) += 1;

        tracing::debug!(
            counter = %id,
            total_series = table.by_id.len(),
            "Registered new counter series"
        );

        Ok(Counter::from_cell(cell))
    }

    fn check_reserved(&self, name: &str) -> Result<(), RegistryError> {
        if self.reserved_prefixes.is_empty() {
            return Ok(());
        }
        let exported = naming::metric_name(name);
        match self
            .reserved_prefixes
            .iter()
            .find(|prefix| exported.starts_with(prefix.as_str()))
        {
            Some(prefix) => Err(RegistryError::InvalidIdentity {
                reason: format!(
                    "metric name '{}' exports as '{}', under reserved prefix '{}'",
                    name, exported, prefix
                ),
            }),
            None => Ok(()),
        }
    }

    fn check_limits(&self, table: &SeriesTable, name: &str) -> Result<(), RegistryError> {
        if let Some(limit) = self.limits.max_series {
            if table.by_id.len() >= limit {
                tracing::warn!(
                    metric = name,
                    limit,
                    "Refusing new series: registry-wide cardinality limit reached"
                );
                return Err(RegistryError::CardinalityLimitExceeded {
                    name: name.to_string(),
                    limit,
                    scope: LimitScope::Registry,
                });
            }
        }

        if let Some(limit) = self.limits.max_series_per_name {
            let existing = table.per_name.get(name).copied().unwrap_or(0);
            if existing >= limit {
                tracing::warn!(
                    metric = name,
                    limit,
                    "Refusing new series: per-name cardinality limit reached"
                );
                return Err(RegistryError::CardinalityLimitExceeded {
                    name: name.to_string(),
                    limit,
                    scope: LimitScope::Name,
                });
            }
        }

        Ok(())
    }

    // The table has no multi-step invariant a panicking holder could leave
    // half-applied, so a poisoned lock is still usable.
    fn read_table(&self) -> RwLockReadGuard<'_, SeriesTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, SeriesTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}
