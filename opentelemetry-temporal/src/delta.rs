use std::{
    fmt,
    marker::PhantomData,
    mem,
    sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;
use opentelemetry::{otel_warn, Context, KeyValue};

use crate::{
    aggregators::{range_test, Accumulation, Aggregator, Number},
    attributes::AttributeSet,
    descriptor::MetricDescriptor,
};

/// The default maximum number of distinct attribute sets recorded per
/// collection cycle.
pub const DEFAULT_CARDINALITY_LIMIT: usize = 2000;

/// Attribute set measurements are folded into once the cardinality limit is
/// reached.
pub static STREAM_OVERFLOW_ATTRIBUTES: Lazy<AttributeSet> =
    Lazy::new(|| AttributeSet::from([KeyValue::new("otel.metric.overflow", true)]));

struct Working<V> {
    accumulation: Accumulation<V>,
    overflow_reported: bool,
}

impl<V> Default for Working<V> {
    fn default() -> Self {
        Working {
            accumulation: Accumulation::new(),
            overflow_reported: false,
        }
    }
}

/// Buffers the measurements of one instrument recorded since the last
/// [collect](DeltaStore::collect).
///
/// `record` may be called from any number of threads. Each call holds the
/// store's lock only while merging one value, and `collect` swaps the working
/// accumulation for an empty one under the same lock, so every measurement
/// lands in exactly one collected accumulation.
pub struct DeltaStore<T, A: Aggregator<T>>
where
    T: Number,
{
    descriptor: MetricDescriptor,
    aggregator: Arc<A>,
    cardinality_limit: usize,
    working: Mutex<Working<A::Value>>,
    _marker: PhantomData<T>,
}

impl<T, A> DeltaStore<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    /// Creates an empty store for the instrument described by `descriptor`.
    pub fn new(descriptor: MetricDescriptor, aggregator: Arc<A>) -> Self {
        DeltaStore {
            descriptor,
            aggregator,
            cardinality_limit: DEFAULT_CARDINALITY_LIMIT,
            working: Mutex::new(Working::default()),
            _marker: PhantomData,
        }
    }

    /// Limit the number of distinct non-empty attribute sets kept per
    /// collection cycle. Measurements for further sets are recorded against
    /// [STREAM_OVERFLOW_ATTRIBUTES].
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.cardinality_limit = limit;
        self
    }

    /// Merges `value` into the working value for `attributes`.
    ///
    /// Invalid values (NaN, infinite, negative on non-negative instruments)
    /// are dropped with a warning. The context is accepted for API symmetry
    /// and not inspected.
    pub fn record(&self, value: T, attributes: &[KeyValue], _cx: &Context) {
        if let Err(err) = range_test(value, &self.descriptor) {
            otel_warn!(
                name: "DeltaStore.InvalidMeasurement",
                metric_name = format!("{}", self.descriptor.name()),
                value = format!("{}", value),
                error = format!("{}", err)
            );
            return;
        }

        let attributes = AttributeSet::from(attributes);
        let mut working = self.working.lock().unwrap_or_else(|err| err.into_inner());

        if let Some(current) = working.accumulation.get_mut(&attributes) {
            self.aggregator.update(current, value);
            return;
        }

        let attributes = if attributes.is_empty() || self.is_under_cardinality_limit(&working) {
            attributes
        } else {
            if !working.overflow_reported {
                working.overflow_reported = true;
                otel_warn!(
                    name: "DeltaStore.CardinalityOverflow",
                    metric_name = format!("{}", self.descriptor.name()),
                    cardinality_limit = self.cardinality_limit as u64,
                    message = "Maximum data points for metric stream exceeded. Entry added to overflow. Subsequent overflows to same metric until next collect will not be logged."
                );
            }
            STREAM_OVERFLOW_ATTRIBUTES.clone()
        };

        let aggregator = &self.aggregator;
        let current = working
            .accumulation
            .entry(attributes)
            .or_insert_with(|| aggregator.identity());
        aggregator.update(current, value);
    }

    /// Atomically takes everything recorded since the previous call and
    /// leaves the store empty.
    pub fn collect(&self) -> Accumulation<A::Value> {
        let mut working = self.working.lock().unwrap_or_else(|err| err.into_inner());
        mem::take(&mut *working).accumulation
    }

    fn is_under_cardinality_limit(&self, working: &Working<A::Value>) -> bool {
        let accumulation = &working.accumulation;
        let mut tracked = accumulation.len();
        if accumulation.contains(&AttributeSet::default()) {
            tracked -= 1;
        }
        if accumulation.contains(&STREAM_OVERFLOW_ATTRIBUTES) {
            tracked -= 1;
        }
        tracked < self.cardinality_limit
    }
}

impl<T, A> fmt::Debug for DeltaStore<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaStore")
            .field("descriptor", &self.descriptor)
            .field("aggregator", &self.aggregator)
            .field("cardinality_limit", &self.cardinality_limit)
            .finish()
    }
}
