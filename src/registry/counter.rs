//! Counter handles
//!
//! A `Counter` is a cheap, clonable handle to one series held by a
//! `CounterRegistry`. Every handle for the same identity shares one cell.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::{CounterId, CounterRegistry, CounterSample, RegistryError, Tags};

/// Storage for one series
pub(crate) struct CounterCell {
    id: CounterId,
    value: AtomicU64,
    description: OnceLock<String>,
}

impl CounterCell {
    pub(crate) fn new(id: CounterId) -> Self {
        Self {
            id,
            value: AtomicU64::new(0),
            description: OnceLock::new(),
        }
    }

    pub(crate) fn id(&self) -> &CounterId {
        &self.id
    }

    /// Record a description unless one is already set
    pub(crate) fn describe(&self, description: &str) {
        if !description.is_empty() {
            let _ = self.description.set(description.to_string());
        }
    }

    pub(crate) fn sample(&self) -> CounterSample {
        CounterSample {
            name: self.id.name().to_string(),
            tags: self.id.tags().clone(),
            value: self.value.load(Ordering::Relaxed),
            description: self.description.get().cloned(),
        }
    }
}

/// Handle to a registered counter
///
/// Increments are lock-free and never wrap: the value saturates at `u64::MAX`.
#[derive(Clone)]
pub struct Counter {
    cell: Arc<CounterCell>,
}

impl Counter {
    pub(crate) fn from_cell(cell: Arc<CounterCell>) -> Self {
        Self { cell }
    }

    /// Start building a counter for explicit registration
    ///
    /// # Examples
    ///
    /// ```
    /// use metricslab::registry::{Counter, CounterRegistry};
    ///
    /// let registry = CounterRegistry::new();
    /// let counter = Counter::builder("app.hello.requests")
    ///     .description("Number of hello endpoint requests")
    ///     .tag("endpoint", "/hello")
    ///     .register(&registry)
    ///     .unwrap();
    /// counter.increment();
    /// assert_eq!(counter.value(), 1);
    /// ```
    pub fn builder(name: impl Into<String>) -> CounterBuilder {
        CounterBuilder {
            name: name.into(),
            description: None,
            tags: Vec::new(),
        }
    }

    /// Add one
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Add `delta`; zero is a no-op
    pub fn increment_by(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        // The closure always returns Some, so this cannot fail.
        let _ = self
            .cell
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_add(delta))
            });
    }

    /// Current value
    pub fn value(&self) -> u64 {
        self.cell.value.load(Ordering::Relaxed)
    }

    pub fn id(&self) -> &CounterId {
        self.cell.id()
    }

    pub fn name(&self) -> &str {
        self.cell.id().name()
    }

    pub fn tags(&self) -> &Tags {
        self.cell.id().tags()
    }

    pub fn description(&self) -> Option<&str> {
        self.cell.description.get().map(String::as_str)
    }

    /// True when both handles refer to the same underlying series
    pub fn same_series(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn cell(&self) -> &CounterCell {
        &self.cell
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("id", self.cell.id())
            .field("value", &self.value())
            .finish()
    }
}

/// Builder for explicit counter registration
#[derive(Debug, Clone)]
pub struct CounterBuilder {
    name: String,
    description: Option<String>,
    tags: Vec<(String, String)>,
}

impl CounterBuilder {
    /// Help text shown on export
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Register with `registry`, returning the existing series if the identity
    /// is already known
    ///
    /// # Errors
    ///
    /// Same as [`CounterRegistry::get_or_create_counter`].
    pub fn register(self, registry: &CounterRegistry) -> Result<Counter, RegistryError> {
        let pairs: Vec<(&str, &str)> = self
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let counter = registry.get_or_create_counter(&self.name, &pairs)?;
        if let Some(description) = &self.description {
            counter.cell().describe(description);
        }
        Ok(counter)
    }
}
