use std::marker::PhantomData;

use crate::aggregators::{Accumulation, Aggregator, Number};
use crate::data::{DataPoint, DataPointType, DataPoints};

/// Summarizes a set of measurements as their arithmetic sum.
#[derive(Debug, Clone, Default)]
pub struct SumAggregator<T> {
    _marker: PhantomData<T>,
}

impl<T: Number> SumAggregator<T> {
    /// Returns an aggregator that summarizes a set of measurements as their
    /// arithmetic sum.
    pub fn new() -> Self {
        SumAggregator {
            _marker: PhantomData,
        }
    }
}

impl<T: Number> Aggregator<T> for SumAggregator<T> {
    type Value = T;

    fn data_point_type(&self) -> DataPointType {
        DataPointType::Singular
    }

    fn identity(&self) -> T {
        T::default()
    }

    fn update(&self, value: &mut T, measurement: T) {
        *value = (*value).add(measurement);
    }

    fn merge(&self, previous: &T, addition: &T) -> T {
        (*previous).add(*addition)
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
