//! Per-instrument storage pairing a delta store with a temporal processor.
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use opentelemetry::{time, Context, KeyValue};

use crate::{
    aggregators::{
        Aggregator, HistogramAggregator, LastValueAggregator, Number, SumAggregator,
        DEFAULT_HISTOGRAM_BOUNDARIES,
    },
    collector::{CollectorHandle, CollectorId},
    data::MetricData,
    delta::DeltaStore,
    descriptor::{InstrumentKind, MetricDescriptor},
    error::{MetricError, MetricResult},
    temporal::TemporalProcessor,
};

/// The way recorded measurements are summarized.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Aggregation {
    /// An aggregation that uses the default instrument kind selection mapping to
    /// select another aggregation.
    ///
    /// Counters of every flavour are summed, gauges keep their last value and
    /// histograms use explicit buckets with [DEFAULT_HISTOGRAM_BOUNDARIES].
    Default,

    /// An aggregation that summarizes a set of measurements as their arithmetic
    /// sum.
    Sum,

    /// An aggregation that summarizes a set of measurements as the last one made.
    ///
    /// Only available for gauges, and always reported with delta temporality.
    LastValue,

    /// An aggregation that summarizes a set of measurements as a histogram with
    /// explicitly defined buckets.
    ExplicitBucketHistogram {
        /// The increasing bucket boundary values.
        ///
        /// Boundary values define bucket upper bounds. Buckets are exclusive of their
        /// lower boundary and inclusive of their upper bound (except at positive
        /// infinity). A measurement is defined to fall into the greatest-numbered
        /// bucket with a boundary that is greater than or equal to the measurement.
        boundaries: Vec<f64>,

        /// Indicates whether to record the min and max of the distribution.
        record_min_max: bool,
    },
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Default => "Default",
            Aggregation::Sum => "Sum",
            Aggregation::LastValue => "LastValue",
            Aggregation::ExplicitBucketHistogram { .. } => "ExplicitBucketHistogram",
        };

        f.write_str(name)
    }
}

impl Aggregation {
    /// Validate that this aggregation has correct configuration
    pub fn validate(&self) -> MetricResult<()> {
        match self {
            Aggregation::Default => Ok(()),
            Aggregation::Sum => Ok(()),
            Aggregation::LastValue => Ok(()),
            Aggregation::ExplicitBucketHistogram { boundaries, .. } => {
                if boundaries.iter().any(|b| !b.is_finite()) {
                    return Err(MetricError::Config(format!(
                        "aggregation: explicit bucket histogram: non-finite boundaries: {:?}",
                        boundaries,
                    )));
                }
                for x in boundaries.windows(2) {
                    if x[0] >= x[1] {
                        return Err(MetricError::Config(format!(
                            "aggregation: explicit bucket histogram: non-monotonic boundaries: {:?}",
                            boundaries,
                        )));
                    }
                }

                Ok(())
            }
        }
    }
}

fn default_aggregation(kind: InstrumentKind) -> Aggregation {
    match kind {
        InstrumentKind::Counter
        | InstrumentKind::UpDownCounter
        | InstrumentKind::ObservableCounter
        | InstrumentKind::ObservableUpDownCounter => Aggregation::Sum,
        InstrumentKind::Gauge | InstrumentKind::ObservableGauge => Aggregation::LastValue,
        InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
            boundaries: DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
            record_min_max: true,
        },
    }
}

/// Everything kept for one instrument, independent of its aggregation.
pub trait MetricStorage<T: Number>: fmt::Debug + Send + Sync {
    /// The instrument this storage belongs to.
    fn descriptor(&self) -> &MetricDescriptor;

    /// Records a measurement. Never blocks beyond a short critical section.
    fn record(&self, value: T, attributes: &[KeyValue], cx: &Context);

    /// Snapshots what was recorded since the previous collection of any
    /// collector and returns the view owed to `collector`.
    fn collect(&self, collector: &CollectorHandle, all_collectors: &[CollectorHandle])
        -> MetricData<T>;

    /// Releases all state kept for `collector`.
    fn forget(&self, collector: &CollectorHandle);
}

/// The [MetricStorage] of a synchronous instrument.
///
/// Each collection snapshots the delta store and hands the snapshot to the
/// temporal processor while holding one lock, so snapshots reach every
/// collector's queue in the order they were taken. The window reported to a
/// collector starts at its previous collection, or at the creation of the
/// storage for its first one.
pub struct SyncMetricStorage<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    descriptor: MetricDescriptor,
    delta: DeltaStore<T, A>,
    temporal: TemporalProcessor<T, A>,
    start_time: SystemTime,
    last_collection: Mutex<HashMap<CollectorId, SystemTime>>,
}

impl<T, A> SyncMetricStorage<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    /// Creates storage for `descriptor` summarizing measurements with
    /// `aggregator`.
    pub fn new(descriptor: MetricDescriptor, aggregator: A) -> Self {
        let aggregator = Arc::new(aggregator);
        SyncMetricStorage {
            delta: DeltaStore::new(descriptor.clone(), Arc::clone(&aggregator)),
            temporal: TemporalProcessor::new(aggregator),
            descriptor,
            start_time: time::now(),
            last_collection: Mutex::new(HashMap::new()),
        }
    }

    /// See [DeltaStore::with_cardinality_limit].
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.delta = self.delta.with_cardinality_limit(limit);
        self
    }
}

impl<T, A> MetricStorage<T> for SyncMetricStorage<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn record(&self, value: T, attributes: &[KeyValue], cx: &Context) {
        self.delta.record(value, attributes, cx)
    }

    fn collect(
        &self,
        collector: &CollectorHandle,
        all_collectors: &[CollectorHandle],
    ) -> MetricData<T> {
        let mut last_collection = self
            .last_collection
            .lock()
            .unwrap_or_else(|err| err.into_inner());

        let accumulation = self.delta.collect();
        let end_time = time::now();
        let start_time = last_collection
            .insert(collector.id(), end_time)
            .unwrap_or(self.start_time);

        self.temporal.build_metrics(
            collector,
            all_collectors,
            &self.descriptor,
            accumulation,
            start_time,
            end_time,
        )
    }

    fn forget(&self, collector: &CollectorHandle) {
        let mut last_collection = self
            .last_collection
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        last_collection.remove(&collector.id());
        self.temporal.forget(collector);
    }
}

impl<T, A> fmt::Debug for SyncMetricStorage<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMetricStorage")
            .field("descriptor", &self.descriptor)
            .field("delta", &self.delta)
            .field("start_time", &self.start_time)
            .finish()
    }
}

/// Builds the storage of an instrument from its aggregation configuration.
///
/// Returns an error if `aggregation` is invalid, cannot be used with the
/// kind of instrument described, or if the descriptor's number kind is not
/// the one of `T`.
pub fn build_storage<T: Number>(
    descriptor: MetricDescriptor,
    aggregation: &Aggregation,
) -> MetricResult<Arc<dyn MetricStorage<T>>> {
    aggregation.validate()?;
    if descriptor.number_kind() != T::KIND {
        return Err(MetricError::Config(format!(
            "instrument {} is described as {:?} but records {:?} values",
            descriptor.name(),
            descriptor.number_kind(),
            T::KIND,
        )));
    }
    let kind = descriptor.kind();

    match aggregation {
        Aggregation::Default => build_storage(descriptor, &default_aggregation(kind)),
        Aggregation::Sum => Ok(Arc::new(SyncMetricStorage::new(
            descriptor,
            SumAggregator::<T>::new(),
        ))),
        Aggregation::LastValue => match kind {
            InstrumentKind::Gauge | InstrumentKind::ObservableGauge => Ok(Arc::new(
                SyncMetricStorage::new(descriptor, LastValueAggregator::<T>::new()),
            )),
            _ => Err(MetricError::Config(format!(
                "LastValue aggregation is only available for Gauge or ObservableGauge, but not for {kind:?}"
            ))),
        },
        Aggregation::ExplicitBucketHistogram {
            boundaries,
            record_min_max,
        } => {
            let record_sum = !matches!(
                kind,
                InstrumentKind::UpDownCounter
                    | InstrumentKind::ObservableUpDownCounter
                    | InstrumentKind::ObservableGauge
            );
            Ok(Arc::new(SyncMetricStorage::new(
                descriptor,
                HistogramAggregator::<T>::new(boundaries.clone(), *record_min_max, record_sum),
            )))
        }
    }
}
