use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use opentelemetry::{Context, KeyValue};
use opentelemetry_temporal::{
    build_storage, Accumulation, Aggregation, AttributeSet, CollectorHandle, DataPoints,
    DeltaStore, HistogramAggregator, InstrumentKind, LastValueAggregator, MetricData,
    MetricDescriptor, MetricStorage, NumberKind, SumAggregator, SyncMetricStorage, Temporality,
    TemporalProcessor, TemporalitySelector,
};
use rstest::rstest;

fn counter() -> MetricDescriptor {
    MetricDescriptor::builder("my_counter")
        .with_kind(InstrumentKind::Counter)
        .with_number_kind(NumberKind::U64)
        .build()
        .unwrap()
}

fn sum_storage() -> SyncMetricStorage<u64, SumAggregator<u64>> {
    SyncMetricStorage::new(counter(), SumAggregator::new())
}

/// The single unattributed value in `data`, `None` when there are no points.
fn single_value<T: Copy>(data: &MetricData<T>) -> Option<T> {
    match &data.data_points {
        DataPoints::Singular(points) => {
            assert!(points.len() <= 1, "expected at most one point");
            points.first().map(|p| p.value)
        }
        DataPoints::Histogram(_) => panic!("expected singular points"),
    }
}

struct CountingSelector {
    temporality: Temporality,
    calls: Arc<AtomicUsize>,
}

impl TemporalitySelector for CountingSelector {
    fn temporality(&self, _kind: InstrumentKind) -> Temporality {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.temporality
    }
}

#[test]
fn delta_collector_sees_each_record_once() {
    let storage = sum_storage();
    let collector = CollectorHandle::new(Temporality::Delta);
    let all = [collector.clone()];
    let cx = Context::new();

    storage.record(1, &[], &cx);
    let data = storage.collect(&collector, &all);
    assert_eq!(data.temporality, Temporality::Delta);
    assert_eq!(single_value(&data), Some(1));

    storage.record(2, &[], &cx);
    assert_eq!(single_value(&storage.collect(&collector, &all)), Some(2));

    let data = storage.collect(&collector, &all);
    assert!(data.data_points.is_empty());
    assert_eq!(data.descriptor, counter());
}

#[test]
fn two_delta_collectors_both_see_the_record() {
    let storage = sum_storage();
    let a = CollectorHandle::new(Temporality::Delta);
    let b = CollectorHandle::new(Temporality::Delta);
    let all = [a.clone(), b.clone()];

    storage.record(1, &[], &Context::new());
    assert_eq!(single_value(&storage.collect(&a, &all)), Some(1));
    assert_eq!(single_value(&storage.collect(&b, &all)), Some(1));
}

#[test]
fn cumulative_collector_sees_running_total() {
    let storage = sum_storage();
    let collector = CollectorHandle::new(Temporality::Cumulative);
    let all = [collector.clone()];
    let cx = Context::new();

    storage.record(1, &[], &cx);
    let data = storage.collect(&collector, &all);
    assert_eq!(data.temporality, Temporality::Cumulative);
    assert_eq!(single_value(&data), Some(1));

    storage.record(2, &[], &cx);
    assert_eq!(single_value(&storage.collect(&collector, &all)), Some(3));
    assert_eq!(single_value(&storage.collect(&collector, &all)), Some(3));
}

#[test]
fn integer_sums_wrap_for_every_temporality() {
    let storage = sum_storage();
    let delta = CollectorHandle::new(Temporality::Delta);
    let cumulative = CollectorHandle::new(Temporality::Cumulative);
    let all = [delta.clone(), cumulative.clone()];
    let cx = Context::new();

    storage.record(u64::MAX, &[], &cx);
    assert_eq!(single_value(&storage.collect(&delta, &all)), Some(u64::MAX));
    assert_eq!(
        single_value(&storage.collect(&cumulative, &all)),
        Some(u64::MAX)
    );

    storage.record(1, &[], &cx);
    assert_eq!(single_value(&storage.collect(&delta, &all)), Some(1));
    assert_eq!(single_value(&storage.collect(&cumulative, &all)), Some(0));

    // Both measurements folded into one delta window.
    storage.record(u64::MAX, &[], &cx);
    storage.record(2, &[], &cx);
    assert_eq!(single_value(&storage.collect(&delta, &all)), Some(1));
    assert_eq!(single_value(&storage.collect(&cumulative, &all)), Some(1));
}

#[test]
fn skipped_cycles_are_folded_for_each_temporality() {
    let storage = sum_storage();
    let fast = CollectorHandle::new(Temporality::Delta);
    let slow_delta = CollectorHandle::new(Temporality::Delta);
    let slow_cumulative = CollectorHandle::new(Temporality::Cumulative);
    let all = [fast.clone(), slow_delta.clone(), slow_cumulative.clone()];
    let cx = Context::new();

    storage.record(1, &[], &cx);
    storage.collect(&fast, &all);
    storage.record(2, &[], &cx);
    storage.collect(&fast, &all);
    storage.record(4, &[], &cx);

    assert_eq!(single_value(&storage.collect(&slow_delta, &all)), Some(7));
    assert_eq!(single_value(&storage.collect(&slow_cumulative, &all)), Some(7));
    // The snapshot taken for the slow collectors is owed to `fast` as well.
    assert_eq!(single_value(&storage.collect(&fast, &all)), Some(4));
    assert_eq!(single_value(&storage.collect(&fast, &all)), None);

    storage.record(8, &[], &cx);
    assert_eq!(single_value(&storage.collect(&slow_delta, &all)), Some(8));
    assert_eq!(single_value(&storage.collect(&slow_cumulative, &all)), Some(15));
    assert_eq!(single_value(&storage.collect(&fast, &all)), Some(8));
}

#[test]
fn late_collector_receives_everything_since_first_listed() {
    let storage = sum_storage();
    let early = CollectorHandle::new(Temporality::Delta);
    let late = CollectorHandle::new(Temporality::Delta);
    let cx = Context::new();

    // Not yet listed: measurements consumed before `late` exists are not owed to it.
    storage.record(100, &[], &cx);
    storage.collect(&early, &[early.clone()]);

    let all = [early.clone(), late.clone()];
    storage.record(1, &[], &cx);
    storage.collect(&early, &all);
    storage.record(2, &[], &cx);
    storage.collect(&early, &all);

    assert_eq!(single_value(&storage.collect(&late, &all)), Some(3));
}

#[test]
fn temporality_is_selected_once_per_collector() {
    let storage = sum_storage();
    let calls = Arc::new(AtomicUsize::new(0));
    let collector = CollectorHandle::new(CountingSelector {
        temporality: Temporality::Cumulative,
        calls: Arc::clone(&calls),
    });
    let all = [collector.clone()];

    for i in 0..2000 {
        storage.record(1, &[], &Context::new());
        let data = storage.collect(&collector, &all);
        assert_eq!(single_value(&data), Some(i + 1));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_collection_leaves_other_collectors_untouched() {
    let storage = sum_storage();
    let idle = CollectorHandle::new(Temporality::Delta);
    let busy = CollectorHandle::new(Temporality::Delta);
    let all = [idle.clone(), busy.clone()];

    storage.record(5, &[], &Context::new());
    storage.collect(&busy, &all);
    for _ in 0..10 {
        let data = storage.collect(&busy, &all);
        assert!(data.data_points.is_empty());
    }

    assert_eq!(single_value(&storage.collect(&idle, &all)), Some(5));
}

#[test]
fn forgotten_collector_starts_over() {
    let storage = sum_storage();
    let collector = CollectorHandle::new(Temporality::Cumulative);
    let other = CollectorHandle::new(Temporality::Delta);
    let all = [collector.clone(), other.clone()];
    let cx = Context::new();

    storage.record(10, &[], &cx);
    assert_eq!(single_value(&storage.collect(&collector, &all)), Some(10));

    storage.forget(&collector);
    storage.record(1, &[], &cx);
    assert_eq!(single_value(&storage.collect(&collector, &all)), Some(1));
    assert_eq!(single_value(&storage.collect(&other, &all)), Some(11));
}

#[test]
fn attributes_are_reported_in_first_recorded_order() {
    let storage = sum_storage();
    let collector = CollectorHandle::new(Temporality::Cumulative);
    let all = [collector.clone()];
    let cx = Context::new();

    storage.record(1, &[KeyValue::new("route", "/b")], &cx);
    storage.record(1, &[KeyValue::new("route", "/a")], &cx);
    storage.collect(&collector, &all);
    storage.record(1, &[KeyValue::new("route", "/c")], &cx);
    storage.record(1, &[KeyValue::new("route", "/a")], &cx);

    let data = storage.collect(&collector, &all);
    let DataPoints::Singular(points) = data.data_points else {
        panic!("expected singular points");
    };
    let routes: Vec<_> = points
        .iter()
        .map(|p| (p.attributes[0].value.as_str().into_owned(), p.value))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("/b".to_string(), 1),
            ("/a".to_string(), 2),
            ("/c".to_string(), 1)
        ]
    );
}

#[test]
fn gauge_with_cumulative_collector_reports_delta() {
    let descriptor = MetricDescriptor::builder("queue.depth")
        .with_kind(InstrumentKind::Gauge)
        .build()
        .unwrap();
    let storage = SyncMetricStorage::new(descriptor, LastValueAggregator::<i64>::new());
    let cumulative = CollectorHandle::new(Temporality::Cumulative);
    let delta = CollectorHandle::new(Temporality::Delta);
    let all = [cumulative.clone(), delta.clone()];
    let cx = Context::new();

    storage.record(4, &[], &cx);
    storage.record(9, &[], &cx);
    let data = storage.collect(&cumulative, &all);
    assert_eq!(data.temporality, Temporality::Delta);
    assert_eq!(single_value(&data), Some(9));

    storage.record(-2, &[], &cx);
    let data = storage.collect(&delta, &all);
    assert_eq!(single_value(&data), Some(-2));

    let data = storage.collect(&cumulative, &all);
    assert_eq!(data.temporality, Temporality::Delta);
    assert_eq!(single_value(&data), Some(-2));
    assert!(storage.collect(&cumulative, &all).data_points.is_empty());
}

#[rstest]
#[case(Temporality::Delta, vec![1, 1, 1], 3)]
#[case(Temporality::Cumulative, vec![1, 1, 2], 4)]
fn histogram_by_temporality(
    #[case] temporality: Temporality,
    #[case] expected_buckets: Vec<u64>,
    #[case] expected_count: u64,
) {
    let descriptor = MetricDescriptor::builder("request.duration")
        .with_unit("ms")
        .with_kind(InstrumentKind::Histogram)
        .build()
        .unwrap();
    let storage = SyncMetricStorage::new(
        descriptor,
        HistogramAggregator::<f64>::new(vec![10.0, 100.0], true, true),
    );
    let collector = CollectorHandle::new(temporality);
    let all = [collector.clone()];
    let cx = Context::new();

    storage.record(500.0, &[], &cx);
    storage.collect(&collector, &all);
    storage.record(5.0, &[], &cx);
    storage.record(50.0, &[], &cx);
    storage.record(1000.0, &[], &cx);

    let data = storage.collect(&collector, &all);
    let DataPoints::Histogram(points) = data.data_points else {
        panic!("expected histogram points");
    };
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].bounds, vec![10.0, 100.0]);
    assert_eq!(points[0].bucket_counts, expected_buckets);
    assert_eq!(points[0].count, expected_count);
    assert_eq!(points[0].min, Some(5.0));
}

#[rstest]
#[case(Temporality::Delta)]
#[case(Temporality::Cumulative)]
#[case(Temporality::LowMemory)]
fn no_measurement_is_lost_under_concurrency(#[case] temporality: Temporality) {
    const THREADS: u64 = 4;
    const PER_THREAD: u64 = 5_000;

    let storage = build_storage::<u64>(counter(), &Aggregation::Sum).unwrap();
    let collector = CollectorHandle::new(temporality);
    let observer = CollectorHandle::new(Temporality::Delta);
    let all = [collector.clone(), observer.clone()];

    let mut reported = Vec::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let storage = Arc::clone(&storage);
            s.spawn(move || {
                let cx = Context::new();
                let attrs = [KeyValue::new("thread", t as i64)];
                for _ in 0..PER_THREAD {
                    storage.record(1, &attrs, &cx);
                }
            });
        }
        for _ in 0..20 {
            reported.push(storage.collect(&collector, &all));
            thread::yield_now();
        }
    });
    reported.push(storage.collect(&collector, &all));

    let total = |data: &MetricData<u64>| match &data.data_points {
        DataPoints::Singular(points) => points.iter().map(|p| p.value).sum::<u64>(),
        DataPoints::Histogram(_) => unreachable!(),
    };

    // Counters under low memory preference are reported as deltas.
    let grand_total = match temporality {
        Temporality::Cumulative => {
            let totals: Vec<u64> = reported.iter().map(total).collect();
            assert!(totals.windows(2).all(|w| w[0] <= w[1]));
            totals.last().copied().unwrap_or_default()
        }
        _ => reported.iter().map(total).sum(),
    };
    assert_eq!(grand_total, THREADS * PER_THREAD);

    let observed = total(&storage.collect(&observer, &all));
    assert_eq!(observed, THREADS * PER_THREAD);
}

#[test]
fn concurrent_collectors_each_receive_every_measurement() {
    let storage = sum_storage();
    let collectors: Vec<CollectorHandle> = (0..4)
        .map(|i| {
            CollectorHandle::new(if i % 2 == 0 {
                Temporality::Delta
            } else {
                Temporality::Cumulative
            })
        })
        .collect();

    let results: Vec<u64> = thread::scope(|s| {
        let recorder = s.spawn(|| {
            for _ in 0..1000 {
                storage.record(1, &[], &Context::new());
            }
        });
        let readers: Vec<_> = collectors
            .iter()
            .map(|collector| {
                let storage = &storage;
                let all = &collectors;
                s.spawn(move || {
                    let mut delta_sum = 0;
                    let mut last = 0;
                    for _ in 0..50 {
                        let data = storage.collect(collector, all);
                        let value = single_value(&data).unwrap_or_default();
                        match data.temporality {
                            Temporality::Cumulative => last = value,
                            _ => delta_sum += value,
                        }
                    }
                    (delta_sum, last)
                })
            })
            .collect();
        recorder.join().unwrap();
        readers
            .into_iter()
            .zip(&collectors)
            .map(|(reader, collector)| {
                let (delta_sum, last) = reader.join().unwrap();
                let data = storage.collect(collector, &collectors);
                let value = single_value(&data).unwrap_or_default();
                match data.temporality {
                    Temporality::Cumulative => value.max(last),
                    _ => delta_sum + value,
                }
            })
            .collect()
    });

    assert_eq!(results, vec![1000; 4]);
}

#[test]
fn processor_can_be_driven_without_storage() {
    let aggregator = Arc::new(SumAggregator::<i64>::new());
    let descriptor = MetricDescriptor::builder("balance")
        .with_kind(InstrumentKind::UpDownCounter)
        .build()
        .unwrap();
    let store = DeltaStore::new(descriptor.clone(), Arc::clone(&aggregator));
    let processor = TemporalProcessor::new(aggregator);
    let collector = CollectorHandle::new(Temporality::LowMemory);
    let now = SystemTime::now();
    let cx = Context::new();

    store.record(5, &[], &cx);
    store.record(-7, &[], &cx);
    let data = processor.build_metrics(&collector, &[], &descriptor, store.collect(), now, now);
    // Up-down counters stay cumulative under the low memory preference.
    assert_eq!(data.temporality, Temporality::Cumulative);
    assert_eq!(single_value(&data), Some(-2));

    let empty: Accumulation<i64> = Accumulation::new();
    let data = processor.build_metrics(&collector, &[], &descriptor, empty, now, now);
    assert_eq!(single_value(&data), Some(-2));

    let reset = AttributeSet::default();
    let next: Accumulation<i64> = [(reset, 2)].into_iter().collect();
    let data = processor.build_metrics(&collector, &[], &descriptor, next, now, now);
    assert_eq!(single_value(&data), Some(0));
}
