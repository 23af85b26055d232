use std::marker::PhantomData;

use crate::aggregators::{Accumulation, Aggregator, Number};
use crate::data::{DataPoint, DataPointType, DataPoints};

/// Summarizes a set of measurements as the last one made.
///
/// A last value has no meaning accumulated since the start of the process,
/// so this aggregator only supports delta views.
#[derive(Debug, Clone, Default)]
pub struct LastValueAggregator<T> {
    _marker: PhantomData<T>,
}

impl<T: Number> LastValueAggregator<T> {
    /// Returns an aggregator that keeps the most recent measurement of each
    /// attribute set.
    pub fn new() -> Self {
        LastValueAggregator {
            _marker: PhantomData,
        }
    }
}

impl<T: Number> Aggregator<T> for LastValueAggregator<T> {
    type Value = T;

    fn data_point_type(&self) -> DataPointType {
        DataPointType::Singular
    }

    fn identity(&self) -> T {
        T::default()
    }

    fn update(&self, value: &mut T, measurement: T) {
        *value = measurement;
    }

    fn merge(&self, _previous: &T, addition: &T) -> T {
        *addition
    }

    fn supports_cumulative(&self) -> bool {
        false
    }

    fn to_points(&self, accumulation: &Accumulation<T>) -> DataPoints<T> {
        DataPoints::Singular(
            accumulation
                .iter()
                .map(|(attributes, value)| DataPoint {
                    attributes: attributes.to_vec(),
                    value: *value,
                })
                .collect(),
        )
    }
}
