//! Metric aggregators
//!
//! An [Aggregator] is a stateless strategy describing how measurements of one
//! instrument are folded into a per-attribute-set value, how two such values
//! combine, and how an [Accumulation] of them renders as [DataPoints].
use core::fmt;

use indexmap::{map, IndexMap};

use crate::{
    attributes::AttributeSet,
    data::{DataPointType, DataPoints},
    descriptor::{MetricDescriptor, NumberKind},
    error::{MetricError, MetricResult},
};

mod histogram;
mod last_value;
mod sum;

pub use histogram::{HistogramAggregator, HistogramValue, DEFAULT_HISTOGRAM_BOUNDARIES};
pub use last_value::LastValueAggregator;
pub use sum::SumAggregator;

/// The numeric types measurements can be recorded with.
pub trait Number:
    PartialOrd
    + fmt::Debug
    + fmt::Display
    + Clone
    + Copy
    + PartialEq
    + Default
    + Send
    + Sync
    + 'static
{
    /// The descriptor number kind matching this type.
    const KIND: NumberKind;

    /// Sums two values. Integers wrap around on overflow instead of
    /// panicking.
    fn add(self, other: Self) -> Self;

    /// Whether the value is neither NaN nor infinite.
    fn is_finite(self) -> bool;

    /// Whether the value is strictly below zero.
    fn is_negative(self) -> bool;

    /// The value as a float, used to find histogram buckets.
    fn into_float(self) -> f64;
}

impl Number for i64 {
    const KIND: NumberKind = NumberKind::I64;

    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn is_finite(self) -> bool {
        true
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }
}

impl Number for u64 {
    const KIND: NumberKind = NumberKind::U64;

    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn is_finite(self) -> bool {
        true
    }

    fn is_negative(self) -> bool {
        false
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }
}

impl Number for f64 {
    const KIND: NumberKind = NumberKind::F64;

    fn add(self, other: Self) -> Self {
        self + other
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn is_negative(self) -> bool {
        self < 0.0
    }

    fn into_float(self) -> f64 {
        self
    }
}

/// RangeTest is a common routine for testing for valid input values. This
/// rejects NaN and infinite values for every instrument, and negative values
/// for instruments that only accept non-negative input (counters and
/// histograms).
pub fn range_test<T: Number>(value: T, descriptor: &MetricDescriptor) -> MetricResult<()> {
    if !value.is_finite() {
        return Err(MetricError::NonFiniteInput);
    }
    if descriptor.kind().is_non_negative() && value.is_negative() {
        return Err(MetricError::NegativeInput);
    }
    Ok(())
}

/// All measurements of one instrument over some window, grouped by
/// attribute set.
///
/// Attribute sets keep the order in which they were first recorded.
#[derive(Clone, PartialEq)]
pub struct Accumulation<V> {
    values: IndexMap<AttributeSet, V>,
}

impl<V> Accumulation<V> {
    /// An accumulation with no attribute sets, the identity of [merge].
    ///
    /// [merge]: Accumulation::merge
    pub fn new() -> Self {
        Accumulation {
            values: IndexMap::new(),
        }
    }

    /// The number of attribute sets.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no attribute set has a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value for `attributes`, if any.
    pub fn get(&self, attributes: &AttributeSet) -> Option<&V> {
        self.values.get(attributes)
    }

    /// Iterates attribute sets and values in first-recorded order.
    pub fn iter(&self) -> map::Iter<'_, AttributeSet, V> {
        self.values.iter()
    }

    pub(crate) fn contains(&self, attributes: &AttributeSet) -> bool {
        self.values.contains_key(attributes)
    }

    pub(crate) fn entry(&mut self, attributes: AttributeSet) -> map::Entry<'_, AttributeSet, V> {
        self.values.entry(attributes)
    }

    pub(crate) fn get_mut(&mut self, attributes: &AttributeSet) -> Option<&mut V> {
        self.values.get_mut(attributes)
    }

    /// Folds `addition` into this accumulation: values for attribute sets
    /// present in both are combined with [Aggregator::merge], the others are
    /// copied over.
    pub fn merge<T, A>(&mut self, aggregator: &A, addition: &Accumulation<V>)
    where
        T: Number,
        A: Aggregator<T, Value = V> + ?Sized,
        V: Clone,
    {
        for (attributes, value) in addition.iter() {
            match self.values.get_mut(attributes) {
                Some(previous) => *previous = aggregator.merge(previous, value),
                None => {
                    self.values.insert(attributes.clone(), value.clone());
                }
            }
        }
    }
}

impl<V> Default for Accumulation<V> {
    fn default() -> Self {
        Accumulation::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Accumulation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl<'a, V> IntoIterator for &'a Accumulation<V> {
    type Item = (&'a AttributeSet, &'a V);
    type IntoIter = map::Iter<'a, AttributeSet, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<V> FromIterator<(AttributeSet, V)> for Accumulation<V> {
    fn from_iter<I: IntoIterator<Item = (AttributeSet, V)>>(iter: I) -> Self {
        Accumulation {
            values: iter.into_iter().collect(),
        }
    }
}

/// Aggregator implements a specific aggregation behavior, i.e., a behavior to
/// track a sequence of measurements of one instrument.
///
/// Implementations hold configuration only. All state lives in the
/// [Accumulation]s passed in and out, so a single aggregator is shared by the
/// delta store and the temporal processor of an instrument and may be called
/// from any thread.
pub trait Aggregator<T: Number>: fmt::Debug + Send + Sync + 'static {
    /// The per-attribute-set state this aggregator produces.
    type Value: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// The shape of the points rendered by [Aggregator::to_points].
    fn data_point_type(&self) -> DataPointType;

    /// The neutral value: `merge(identity(), x) == x`.
    fn identity(&self) -> Self::Value;

    /// Incorporates a single measurement into `value`.
    fn update(&self, value: &mut Self::Value, measurement: T);

    /// Combines two values for the same attribute set, `addition` being the
    /// later one.
    fn merge(&self, previous: &Self::Value, addition: &Self::Value) -> Self::Value;

    /// Whether a since-start view can be built by merging successive deltas.
    ///
    /// Collectors asking for cumulative temporality on an aggregator
    /// returning `false` are served delta views instead.
    fn supports_cumulative(&self) -> bool {
        true
    }

    /// Renders an accumulation as data points, in the accumulation's order.
    fn to_points(&self, accumulation: &Accumulation<Self::Value>) -> DataPoints<T>;
}
