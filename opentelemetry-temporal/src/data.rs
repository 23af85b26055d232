//! Types for delivery of pre-aggregated metric time series data.

use std::time::SystemTime;

use opentelemetry::KeyValue;

use crate::descriptor::MetricDescriptor;

/// Defines the window that an aggregation was calculated over.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Temporality {
    /// A measurement interval that continues to expand forward in time from a
    /// starting point.
    ///
    /// New measurements are added to all previous measurements since a start time.
    #[default]
    Cumulative,

    /// A measurement interval that resets each cycle.
    ///
    /// Measurements from one cycle are recorded independently, measurements from
    /// other cycles do not affect them.
    Delta,

    /// A preference rather than a reported temporality: synchronous counters
    /// and histograms use delta, everything else cumulative. See
    /// [InstrumentKind::resolve_temporality].
    ///
    /// [InstrumentKind::resolve_temporality]: crate::descriptor::InstrumentKind::resolve_temporality
    LowMemory,
}

/// The shape of the points carried by a [MetricData].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataPointType {
    /// One scalar value per attribute set.
    Singular,
    /// One bucketed distribution per attribute set.
    Histogram,
}

/// A single scalar data point in a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint<T> {
    /// Attributes is the set of key value pairs that uniquely identify the
    /// time series.
    pub attributes: Vec<KeyValue>,
    /// The value of this data point.
    pub value: T,
}

/// A single histogram data point in a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramDataPoint<T> {
    /// The set of key value pairs that uniquely identify the time series.
    pub attributes: Vec<KeyValue>,
    /// The number of updates this histogram has been calculated with.
    pub count: u64,
    /// The upper bounds of the buckets of the histogram.
    ///
    /// Because the last boundary is +infinity this one is implied.
    pub bounds: Vec<f64>,
    /// The count of each of the buckets.
    pub bucket_counts: Vec<u64>,
    /// The minimum value recorded.
    pub min: Option<T>,
    /// The maximum value recorded.
    pub max: Option<T>,
    /// The sum of the values recorded.
    pub sum: T,
}

/// The rendered points of one metric, in the order their attribute sets were
/// first recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPoints<T> {
    /// Scalar points, produced by sum and last-value aggregations.
    Singular(Vec<DataPoint<T>>),
    /// Distribution points, produced by histogram aggregations.
    Histogram(Vec<HistogramDataPoint<T>>),
}

impl<T> DataPoints<T> {
    /// The shape of these points.
    pub fn data_point_type(&self) -> DataPointType {
        match self {
            DataPoints::Singular(_) => DataPointType::Singular,
            DataPoints::Histogram(_) => DataPointType::Histogram,
        }
    }

    /// The number of points.
    pub fn len(&self) -> usize {
        match self {
            DataPoints::Singular(points) => points.len(),
            DataPoints::Histogram(points) => points.len(),
        }
    }

    /// Whether there are no points at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The view of one instrument materialized for one collector.
///
/// A `MetricData` is always returned, even when nothing was recorded during
/// the window; in that case `data_points` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricData<T> {
    /// The instrument that produced this data.
    pub descriptor: MetricDescriptor,
    /// Whether the points are the change since the collector's last read
    /// ([Temporality::Delta]) or since its first read
    /// ([Temporality::Cumulative]).
    pub temporality: Temporality,
    /// The time when the time series was started.
    pub start_time: SystemTime,
    /// The time when the time series was recorded.
    pub time: SystemTime,
    /// The aggregated points.
    pub data_points: DataPoints<T>,
}

impl<T> MetricData<T> {
    /// The shape of the points carried.
    pub fn data_point_type(&self) -> DataPointType {
        self.data_points.data_point_type()
    }
}
