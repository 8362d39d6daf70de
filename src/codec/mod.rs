//! Checkpoint value codecs
//!
//! Converts column values to and from their checkpoint representation.
//!
//! # Overview
//!
//! Every `FieldType` has one codec. `encode` accepts the shapes a row source
//! may produce (numbers as strings, timestamps with a space separator, ...)
//! and returns one canonical JSON value. `decode` accepts only values of the
//! canonical JSON kind, so a checkpoint decodes back to exactly the value that
//! was encoded into it.

mod codecs;
mod types;

pub use codecs::{
    BinaryCodec, BooleanCodec, DateCodec, DecimalCodec, IntegerCodec, JsonCodec, NumberCodec,
    StringCodec, TimeCodec, TimestampCodec, TimestampTzCodec,
};
pub use types::ValueCodec;

use crate::catalog::FieldType;

/// Codec for a field type
pub fn codec_for(field_type: FieldType) -> &'static dyn ValueCodec {
    match field_type {
        FieldType::Boolean => &BooleanCodec,
        FieldType::Integer => &IntegerCodec,
        FieldType::Number => &NumberCodec,
        FieldType::Decimal => &DecimalCodec,
        FieldType::String => &StringCodec,
        FieldType::Date => &DateCodec,
        FieldType::Time => &TimeCodec,
        FieldType::TimestampWithoutTimezone => &TimestampCodec,
        FieldType::TimestampWithTimezone => &TimestampTzCodec,
        FieldType::Binary => &BinaryCodec,
        FieldType::Json => &JsonCodec,
    }
}
