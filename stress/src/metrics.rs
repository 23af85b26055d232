/*
    Records into a counter from every core while two collectors, one delta and
    one cumulative, read the instrument once per reporting window.
*/

use once_cell::sync::Lazy;
use opentelemetry::{Context, KeyValue};
use opentelemetry_temporal::{
    build_storage, Aggregation, CollectorHandle, InstrumentKind, MetricDescriptor, MetricStorage,
    NumberKind, Temporality,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::Arc;

mod throughput;

static ATTRIBUTE_VALUES: [&str; 10] = [
    "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
    "value10",
];

static STORAGE: Lazy<Arc<dyn MetricStorage<u64>>> = Lazy::new(|| {
    let descriptor = MetricDescriptor::builder("hello")
        .with_kind(InstrumentKind::Counter)
        .with_number_kind(NumberKind::U64)
        .build()
        .expect("valid instrument name");
    build_storage(descriptor, &Aggregation::Default).expect("default aggregation is valid")
});

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    let collectors = [
        CollectorHandle::new(Temporality::Delta),
        CollectorHandle::new(Temporality::Cumulative),
    ];
    throughput::test_throughput(test_counter, move || {
        for collector in &collectors {
            let data = STORAGE.collect(collector, &collectors);
            println!(
                "Collected {} points for {:?} collector",
                data.data_points.len(),
                data.temporality
            );
        }
    });
}

fn test_counter() {
    let [first, second, third] = CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        [
            rng.random_range(0..ATTRIBUTE_VALUES.len()),
            rng.random_range(0..ATTRIBUTE_VALUES.len()),
            rng.random_range(0..ATTRIBUTE_VALUES.len()),
        ]
    });

    // each attribute has 10 possible values, so there are 1000 possible combinations (time-series)
    STORAGE.record(
        1,
        &[
            KeyValue::new("attribute1", ATTRIBUTE_VALUES[first]),
            KeyValue::new("attribute2", ATTRIBUTE_VALUES[second]),
            KeyValue::new("attribute3", ATTRIBUTE_VALUES[third]),
        ],
        &Context::new(),
    );
}
