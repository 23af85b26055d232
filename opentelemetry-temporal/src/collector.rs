//! Identities of the downstream readers pulling metrics out of the core.
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{data::Temporality, descriptor::InstrumentKind};

/// Chooses the temporality a collector wants for each kind of instrument.
///
/// A [TemporalProcessor] asks at most once per collector and instrument and
/// caches the answer for the collector's lifetime.
///
/// [TemporalProcessor]: crate::temporal::TemporalProcessor
pub trait TemporalitySelector: Send + Sync {
    /// The output temporality, a function of instrument kind.
    ///
    /// If not configured, the Cumulative temporality SHOULD be used.
    fn temporality(&self, kind: InstrumentKind) -> Temporality;
}

impl TemporalitySelector for Temporality {
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.resolve_temporality(*self)
    }
}

impl<F> TemporalitySelector for F
where
    F: Fn(InstrumentKind) -> Temporality + Send + Sync,
{
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self(kind)
    }
}

/// A stable identifier assigned to each [CollectorHandle] at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectorId(u64);

impl fmt::Display for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_COLLECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// A downstream reader of metrics.
///
/// Handles are compared by the [CollectorId] they were given when created:
/// two handles built from equal selectors are still distinct collectors, and
/// clones of one handle are the same collector.
#[derive(Clone)]
pub struct CollectorHandle {
    id: CollectorId,
    selector: Arc<dyn TemporalitySelector>,
}

impl CollectorHandle {
    /// Registers a new collector choosing temporality with `selector`.
    pub fn new(selector: impl TemporalitySelector + 'static) -> Self {
        CollectorHandle {
            id: CollectorId(NEXT_COLLECTOR_ID.fetch_add(1, Ordering::Relaxed)),
            selector: Arc::new(selector),
        }
    }

    /// The identity all per-collector state is keyed by.
    pub fn id(&self) -> CollectorId {
        self.id
    }

    /// Asks the collector which temporality it wants for `kind`.
    ///
    /// Preferences such as [Temporality::LowMemory] are resolved against the
    /// instrument kind, so the result is always either
    /// [Temporality::Delta] or [Temporality::Cumulative].
    pub fn select_aggregation_temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.resolve_temporality(self.selector.temporality(kind))
    }
}

impl PartialEq for CollectorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CollectorHandle {}

impl Hash for CollectorHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for CollectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorHandle")
            .field("id", &self.id)
            .finish()
    }
}
