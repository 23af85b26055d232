use std::marker::PhantomData;

use crate::aggregators::{Accumulation, Aggregator, Number};
use crate::data::{DataPointType, DataPoints, HistogramDataPoint};

/// Bucket boundaries used when a histogram is configured without explicit
/// ones.
pub const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// The distribution of measurements recorded for one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramValue<T> {
    /// The count of each of the buckets, one more than the number of bounds.
    pub bucket_counts: Vec<u64>,
    /// The number of measurements.
    pub count: u64,
    /// The sum of the measurements, zero when sums are not recorded.
    pub sum: T,
    /// The smallest measurement, when min/max are recorded.
    pub min: Option<T>,
    /// The largest measurement, when min/max are recorded.
    pub max: Option<T>,
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
#[derive(Debug, Clone)]
pub struct HistogramAggregator<T> {
    bounds: Vec<f64>,
    record_min_max: bool,
    record_sum: bool,
    _marker: PhantomData<T>,
}

impl<T: Number> HistogramAggregator<T> {
    /// Creates a histogram over `boundaries`.
    ///
    /// NaN boundaries are ignored and the remaining ones are sorted and
    /// de-duplicated.
    pub fn new(mut boundaries: Vec<f64>, record_min_max: bool, record_sum: bool) -> Self {
        boundaries.retain(|v| !v.is_nan());
        boundaries.sort_by(|a, b| a.total_cmp(b));
        boundaries.dedup();

        HistogramAggregator {
            bounds: boundaries,
            record_min_max,
            record_sum,
            _marker: PhantomData,
        }
    }

    /// The upper bounds of the buckets.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }
}

impl<T: Number> Aggregator<T> for HistogramAggregator<T> {
    type Value = HistogramValue<T>;

    fn data_point_type(&self) -> DataPointType {
        DataPointType::Histogram
    }

    fn identity(&self) -> HistogramValue<T> {
        HistogramValue {
            bucket_counts: vec![0; self.bounds.len() + 1],
            count: 0,
            sum: T::default(),
            min: None,
            max: None,
        }
    }

    fn update(&self, value: &mut HistogramValue<T>, measurement: T) {
        let f = measurement.into_float();
        // This search will return an index in the range `[0, bounds.len()]`, where
        // it will return `bounds.len()` if value is greater than the last element
        // of `bounds`. This aligns with the buckets in that the length of buckets
        // is `bounds.len()+1`, with the last bucket representing:
        // `(bounds[bounds.len()-1], +∞)`.
        let index = self.bounds.partition_point(|&x| x < f);
        value.bucket_counts[index] += 1;
        value.count += 1;

        if self.record_sum {
            value.sum = value.sum.add(measurement);
        }
        if self.record_min_max {
            value.min = Some(match value.min {
                Some(min) if min <= measurement => min,
                _ => measurement,
            });
            value.max = Some(match value.max {
                Some(max) if max >= measurement => max,
                _ => measurement,
            });
        }
    }

    fn merge(&self, previous: &HistogramValue<T>, addition: &HistogramValue<T>) -> HistogramValue<T> {
        debug_assert_eq!(
            previous.bucket_counts.len(),
            addition.bucket_counts.len(),
            "histogram values built with different bounds"
        );
        HistogramValue {
            bucket_counts: previous
                .bucket_counts
                .iter()
                .zip(&addition.bucket_counts)
                .map(|(a, b)| a + b)
                .collect(),
            count: previous.count + addition.count,
            sum: previous.sum.add(addition.sum),
            min: pick(previous.min, addition.min, |a, b| a <= b),
            max: pick(previous.max, addition.max, |a, b| a >= b),
        }
    }

    fn to_points(&self, accumulation: &Accumulation<HistogramValue<T>>) -> DataPoints<T> {
        DataPoints::Histogram(
            accumulation
                .iter()
                .map(|(attributes, value)| HistogramDataPoint {
                    attributes: attributes.to_vec(),
                    count: value.count,
                    bounds: self.bounds.clone(),
                    bucket_counts: value.bucket_counts.clone(),
                    min: value.min,
                    max: value.max,
                    sum: value.sum,
                })
                .collect(),
        )
    }
}

fn pick<T: Copy>(a: Option<T>, b: Option<T>, keep_first: impl Fn(T, T) -> bool) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if keep_first(a, b) { a } else { b }),
        (a, None) => a,
        (None, b) => b,
    }
}
