//! Reconciles delta accumulations against any number of collectors.
//!
//! Every accumulation produced for an instrument is fanned out to the pending
//! queue of each collector known at that moment. A collector consumes its own
//! queue when it asks for metrics, so collectors reading at different cadences
//! each see every measurement exactly once. Collectors asking for cumulative
//! temporality additionally keep a memo of everything they were ever shown.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use opentelemetry::{otel_debug, otel_warn};

use crate::{
    aggregators::{Accumulation, Aggregator, Number},
    collector::{CollectorHandle, CollectorId},
    data::{MetricData, Temporality},
    descriptor::MetricDescriptor,
};

/// Per-collector bookkeeping.
struct CollectorState<V> {
    /// Resolved once, on the collector's first request.
    temporality: Option<Temporality>,
    /// Accumulations produced since the collector last consumed, oldest first.
    pending: VecDeque<Arc<Accumulation<V>>>,
    /// Everything reported so far, only for cumulative collectors.
    cumulative: Option<Accumulation<V>>,
    cumulative_start: Option<SystemTime>,
}

impl<V> Default for CollectorState<V> {
    fn default() -> Self {
        CollectorState {
            temporality: None,
            pending: VecDeque::new(),
            cumulative: None,
            cumulative_start: None,
        }
    }
}

/// The temporal reconciliation processor of one instrument.
pub struct TemporalProcessor<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    aggregator: Arc<A>,
    collectors: Mutex<HashMap<CollectorId, CollectorState<A::Value>>>,
    _marker: PhantomData<T>,
}

impl<T, A> TemporalProcessor<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    /// Creates a processor folding accumulations with `aggregator`.
    pub fn new(aggregator: Arc<A>) -> Self {
        TemporalProcessor {
            aggregator,
            collectors: Mutex::new(HashMap::new()),
            _marker: PhantomData,
        }
    }

    /// Builds the view of this instrument for `collector`.
    ///
    /// `accumulation` is appended to the queue of every collector in
    /// `all_collectors` and of `collector` itself, even when empty. The
    /// requesting collector then drains its queue, oldest first, into one
    /// combined delta. Delta collectors are shown that delta over
    /// `(start_time, end_time)`. Cumulative collectors have it merged into
    /// their memo and are shown the memo, starting at the `start_time` of
    /// their first request.
    ///
    /// A collector that was never seen before is registered on the spot.
    /// The returned data is never missing: a collector with nothing new gets
    /// zero data points.
    pub fn build_metrics(
        &self,
        collector: &CollectorHandle,
        all_collectors: &[CollectorHandle],
        descriptor: &MetricDescriptor,
        accumulation: Accumulation<A::Value>,
        start_time: SystemTime,
        end_time: SystemTime,
    ) -> MetricData<T> {
        let mut collectors = self
            .collectors
            .lock()
            .unwrap_or_else(|err| err.into_inner());

        let state = collectors.entry(collector.id()).or_default();
        let temporality = match state.temporality {
            Some(temporality) => temporality,
            None => {
                let temporality = self.resolve_temporality(collector, descriptor);
                state.temporality = Some(temporality);
                temporality
            }
        };

        let accumulation = Arc::new(accumulation);
        let mut appended = HashSet::with_capacity(all_collectors.len() + 1);
        for id in all_collectors
            .iter()
            .map(CollectorHandle::id)
            .chain(std::iter::once(collector.id()))
        {
            if appended.insert(id) {
                collectors
                    .entry(id)
                    .or_default()
                    .pending
                    .push_back(Arc::clone(&accumulation));
            }
        }
        drop(accumulation);

        let state = collectors.entry(collector.id()).or_default();
        let delta = self.drain(&mut state.pending);
        debug_assert!(state.pending.is_empty());

        let (data_points, start_time) = match temporality {
            Temporality::Cumulative => {
                let memo = state.cumulative.get_or_insert_with(Accumulation::new);
                memo.merge::<T, A>(&self.aggregator, &delta);
                let start = *state.cumulative_start.get_or_insert(start_time);
                (self.aggregator.to_points(memo), start)
            }
            _ => {
                debug_assert!(state.cumulative.is_none());
                (self.aggregator.to_points(&delta), start_time)
            }
        };
        debug_assert_eq!(
            data_points.data_point_type(),
            self.aggregator.data_point_type()
        );

        MetricData {
            descriptor: descriptor.clone(),
            temporality,
            start_time,
            time: end_time,
            data_points,
        }
    }

    /// Drops all state kept for `collector`: its queue, its cumulative memo
    /// and its resolved temporality.
    ///
    /// If the collector asks again later it is treated as new.
    pub fn forget(&self, collector: &CollectorHandle) {
        let mut collectors = self
            .collectors
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if collectors.remove(&collector.id()).is_some() {
            otel_debug!(
                name: "TemporalProcessor.CollectorForgotten",
                collector_id = format!("{}", collector.id())
            );
        }
    }

    fn resolve_temporality(
        &self,
        collector: &CollectorHandle,
        descriptor: &MetricDescriptor,
    ) -> Temporality {
        let temporality = collector.select_aggregation_temporality(descriptor.kind());
        if temporality == Temporality::Cumulative && !self.aggregator.supports_cumulative() {
            otel_warn!(
                name: "TemporalProcessor.CumulativeUnsupported",
                metric_name = format!("{}", descriptor.name()),
                collector_id = format!("{}", collector.id()),
                message = "Cumulative temporality is not supported by this aggregation. Reporting delta instead."
            );
            return Temporality::Delta;
        }
        temporality
    }

    fn drain(&self, pending: &mut VecDeque<Arc<Accumulation<A::Value>>>) -> Accumulation<A::Value> {
        let mut queued = pending.drain(..);
        let mut combined = match queued.next() {
            Some(first) => Arc::try_unwrap(first).unwrap_or_else(|shared| (*shared).clone()),
            None => return Accumulation::new(),
        };
        for addition in queued {
            combined.merge::<T, A>(&self.aggregator, &addition);
        }
        combined
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self, collector: &CollectorHandle) -> usize {
        self.collectors
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(&collector.id())
            .map_or(0, |state| state.pending.len())
    }
}

impl<T, A> fmt::Debug for TemporalProcessor<T, A>
where
    T: Number,
    A: Aggregator<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporalProcessor")
            .field("aggregator", &self.aggregator)
            .finish()
    }
}
