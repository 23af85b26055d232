/*
    Records unbounded attribute values so the counter permanently runs past its
    cardinality limit.
*/

use once_cell::sync::Lazy;
use opentelemetry::{Context, KeyValue};
use opentelemetry_temporal::{
    CollectorHandle, InstrumentKind, MetricDescriptor, MetricStorage, SumAggregator,
    SyncMetricStorage, Temporality,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;

mod throughput;

static STORAGE: Lazy<SyncMetricStorage<u64, SumAggregator<u64>>> = Lazy::new(|| {
    let descriptor = MetricDescriptor::builder("hello")
        .with_kind(InstrumentKind::Counter)
        .build()
        .expect("valid instrument name");
    SyncMetricStorage::new(descriptor, SumAggregator::new()).with_cardinality_limit(1000)
});

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    let collectors = [CollectorHandle::new(Temporality::Delta)];
    throughput::test_throughput(test_counter, move || {
        let data = STORAGE.collect(&collectors[0], &collectors);
        println!("Collected {} points", data.data_points.len());
    });
}

fn test_counter() {
    // The main goal of this test is to ensure that memory usage stays bounded
    // even when user code misbehaves by producing unbounded metric points
    // (unique time series), and that the overflow warning is not repeated for
    // every measurement.
    let rand = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0..100000000i64));
    STORAGE.record(1, &[KeyValue::new("A", rand)], &Context::new());
}
