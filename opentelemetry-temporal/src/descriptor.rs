use std::borrow::Cow;

use crate::data::Temporality;
use crate::error::{MetricError, MetricResult};

// maximum length of instrument name
const INSTRUMENT_NAME_MAX_LENGTH: usize = 255;
// maximum length of instrument unit name
const INSTRUMENT_UNIT_NAME_MAX_LENGTH: usize = 63;
const INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

// instrument validation error strings
const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 256 characters";
const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";
const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

/// The identifier of a group of instruments that all perform the same function.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Identifies a group of instruments that record increasing values synchronously
    /// with the code path they are measuring.
    Counter,
    /// A group of instruments that record increasing and decreasing values
    /// synchronously with the code path they are measuring.
    UpDownCounter,
    /// A group of instruments that record a distribution of values synchronously with
    /// the code path they are measuring.
    Histogram,
    /// A group of instruments that record increasing values in an asynchronous
    /// callback.
    ObservableCounter,
    /// A group of instruments that record increasing and decreasing values in an
    /// asynchronous callback.
    ObservableUpDownCounter,
    /// a group of instruments that record current value synchronously with
    /// the code path they are measuring.
    Gauge,
    /// a group of instruments that record current values in an asynchronous callback.
    ObservableGauge,
}

impl InstrumentKind {
    /// Whether this kind of instrument exposes a non-decreasing sum.
    pub fn is_monotonic(&self) -> bool {
        matches!(self, Self::Counter | Self::ObservableCounter)
    }

    /// Whether measurements of this kind must be non-negative.
    pub fn is_non_negative(&self) -> bool {
        matches!(
            self,
            Self::Counter | Self::ObservableCounter | Self::Histogram
        )
    }

    /// Resolves a temporality preference into the concrete temporality used
    /// for this kind of instrument.
    ///
    /// [Temporality::LowMemory] keeps only synchronous counters and histograms
    /// on delta, everything else is reported cumulatively.
    pub fn resolve_temporality(&self, temporality: Temporality) -> Temporality {
        match temporality {
            Temporality::Cumulative => Temporality::Cumulative,
            Temporality::Delta => Temporality::Delta,
            Temporality::LowMemory => match self {
                Self::Counter | Self::Histogram => Temporality::Delta,
                Self::ObservableCounter
                | Self::Gauge
                | Self::ObservableGauge
                | Self::UpDownCounter
                | Self::ObservableUpDownCounter => Temporality::Cumulative,
            },
        }
    }
}

/// The numeric type an instrument records.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum NumberKind {
    /// Signed 64 bit integers.
    I64,
    /// Unsigned 64 bit integers.
    U64,
    /// 64 bit floating point numbers.
    #[default]
    F64,
}

/// Immutable metadata describing one instrument.
///
/// The core passes the descriptor through to every [MetricData] it produces
/// and never mutates it.
///
/// [MetricData]: crate::data::MetricData
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    kind: InstrumentKind,
    number_kind: NumberKind,
}

impl MetricDescriptor {
    /// Create a [MetricDescriptorBuilder] for an instrument with the given name.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> MetricDescriptorBuilder {
        MetricDescriptorBuilder {
            name: name.into(),
            description: None,
            unit: None,
            kind: InstrumentKind::Counter,
            number_kind: NumberKind::default(),
        }
    }

    /// The human-readable identifier of the instrument.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Describes the purpose of the instrument.
    pub fn description(&self) -> &str {
        self.description.as_ref()
    }

    /// Unit is the unit of measurement recorded by the instrument.
    pub fn unit(&self) -> &str {
        self.unit.as_ref()
    }

    /// The functional group of the instrument.
    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// The numeric type recorded by the instrument.
    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }
}

/// Configuration for a [MetricDescriptor].
#[derive(Debug)]
pub struct MetricDescriptorBuilder {
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    kind: InstrumentKind,
    number_kind: NumberKind,
}

impl MetricDescriptorBuilder {
    /// Set the description for this instrument.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the instrument kind. Defaults to [InstrumentKind::Counter].
    pub fn with_kind(mut self, kind: InstrumentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the number kind. Defaults to [NumberKind::F64].
    pub fn with_number_kind(mut self, number_kind: NumberKind) -> Self {
        self.number_kind = number_kind;
        self
    }

    /// Validates the configuration and creates the descriptor.
    pub fn build(self) -> MetricResult<MetricDescriptor> {
        validate_instrument_name(&self.name)?;
        validate_instrument_unit(&self.unit)?;

        Ok(MetricDescriptor {
            name: self.name,
            description: self.description.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
            kind: self.kind,
            number_kind: self.number_kind,
        })
    }
}

fn validate_instrument_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_EMPTY,
        ));
    }
    if name.len() > INSTRUMENT_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_LENGTH,
        ));
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_FIRST_ALPHABETIC,
        ));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_INVALID_CHAR,
        ));
    }
    Ok(())
}

fn validate_instrument_unit(unit: &Option<Cow<'static, str>>) -> MetricResult<()> {
    if let Some(unit) = unit {
        if unit.len() > INSTRUMENT_UNIT_NAME_MAX_LENGTH {
            return Err(MetricError::InvalidInstrumentConfiguration(
                INSTRUMENT_UNIT_LENGTH,
            ));
        }
        if unit.contains(|c: char| !c.is_ascii()) {
            return Err(MetricError::InvalidInstrumentConfiguration(
                INSTRUMENT_UNIT_INVALID_CHAR,
            ));
        }
    }
    Ok(())
}
