//! # OpenTelemetry Temporal
//!
//! The in-process aggregation core of an OpenTelemetry metrics pipeline.
//! Measurements recorded on an instrument are buffered as deltas, snapshotted
//! on demand and reconciled against any number of independent collectors,
//! each of which reads at its own cadence and asks for either a delta or a
//! cumulative view.
//!
//! The pieces, bottom up:
//!
//! * [Aggregator]s describe how measurements fold into a value per attribute
//!   set and how two values combine.
//! * A [DeltaStore] buffers the measurements of one instrument until the next
//!   snapshot.
//! * A [CollectorHandle] identifies one downstream reader and the temporality
//!   it wants.
//! * A [TemporalProcessor] fans snapshots out to every collector and builds
//!   each collector's [MetricData].
//! * [SyncMetricStorage] ties the store and the processor together for one
//!   instrument, and [build_storage] picks the aggregator from an
//!   [Aggregation].
//!
//! ## Getting Started
//!
//! ```
//! use opentelemetry::{Context, KeyValue};
//! use opentelemetry_temporal::{
//!     build_storage, Aggregation, CollectorHandle, DataPoints, InstrumentKind,
//!     MetricDescriptor, NumberKind, Temporality,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = MetricDescriptor::builder("http.server.requests")
//!     .with_unit("{request}")
//!     .with_kind(InstrumentKind::Counter)
//!     .with_number_kind(NumberKind::U64)
//!     .build()?;
//! let storage = build_storage::<u64>(descriptor, &Aggregation::Default)?;
//!
//! let delta = CollectorHandle::new(Temporality::Delta);
//! let cumulative = CollectorHandle::new(Temporality::Cumulative);
//! let collectors = [delta.clone(), cumulative.clone()];
//!
//! storage.record(1, &[KeyValue::new("route", "/")], &Context::current());
//! storage.collect(&delta, &collectors);
//! storage.record(2, &[KeyValue::new("route", "/")], &Context::current());
//!
//! // The cumulative collector sees both measurements on its first read.
//! let data = storage.collect(&cumulative, &collectors);
//! if let DataPoints::Singular(points) = data.data_points {
//!     assert_eq!(points[0].value, 3);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Feature Flags
//!
//! * `internal-logs`: Reports dropped measurements, cardinality overflows and
//!   unsupported temporalities through `tracing`. Enabled by default.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

pub mod aggregators;
pub mod attributes;
pub mod collector;
pub mod data;
pub mod delta;
pub mod descriptor;
pub mod error;
pub mod storage;
pub mod temporal;

pub use aggregators::{
    Accumulation, Aggregator, HistogramAggregator, LastValueAggregator, Number, SumAggregator,
};
pub use attributes::AttributeSet;
pub use collector::{CollectorHandle, CollectorId, TemporalitySelector};
pub use data::{
    DataPoint, DataPointType, DataPoints, HistogramDataPoint, MetricData, Temporality,
};
pub use delta::DeltaStore;
pub use descriptor::{InstrumentKind, MetricDescriptor, MetricDescriptorBuilder, NumberKind};
pub use error::{MetricError, MetricResult};
pub use storage::{build_storage, Aggregation, MetricStorage, SyncMetricStorage};
pub use temporal::TemporalProcessor;
