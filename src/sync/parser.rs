//! Delimited text record parsing.
//!
//! The text actions of the telematics API (`getRoutes`, `getStops`,
//! `getRouteStops`) return one record per line with comma separated fields,
//! some of them quoted and space padded:
//!
//! ```text
//! 1754,799, "ΕΛ.ΒΕΝΙΖΕΛΟΥ - ΚΑΙΣΑΡΙΑΝΗ", "EL. VENIZELOU - KAISARIANI",2,9889.61
//! ```
//!
//! Records are dequoted by removing every space and every double quote before
//! splitting on commas. Spaces inside text values are therefore lost, and a
//! comma inside a quoted value still splits the field; the feed has no escape
//! syntax that would let a tokenizer do better.
//!
//! Each entity with a line shape implements [`DelimitedRecord`], mapping field
//! positions to typed fields and failing on the first value that does not
//! coerce.

use crate::models::{Route, RouteStop, Stop};
use crate::sync::coerce::Coerce;
use crate::sync::mapper::RecordError;
use thiserror::Error;

/// A line with fewer fields than its entity's shape requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record `{record}` has {actual} fields, expected at least {expected}")]
pub struct RecordShapeError {
    pub record: String,
    pub expected: usize,
    pub actual: usize,
}

/// Remove the spaces and double quotes the feed pads its fields with.
pub fn prepare_record(raw: &str) -> String {
    raw.chars().filter(|c| *c != ' ' && *c != '"').collect()
}

/// Split a raw line into its fields, requiring at least `expected_min_fields`.
pub fn parse_line(raw: &str, expected_min_fields: usize) -> Result<Vec<String>, RecordShapeError> {
    let prepared = prepare_record(raw);
    let fields: Vec<String> = prepared.split(',').map(str::to_string).collect();

    if fields.len() < expected_min_fields {
        return Err(RecordShapeError {
            record: raw.to_string(),
            expected: expected_min_fields,
            actual: fields.len(),
        });
    }

    Ok(fields)
}

/// Positional view over the fields of one parsed line.
pub struct Columns<'a> {
    raw: &'a str,
    fields: &'a [String],
}

impl<'a> Columns<'a> {
    pub fn new(raw: &'a str, fields: &'a [String]) -> Self {
        Self { raw, fields }
    }

    /// Coerce the field at `index`, naming it `field` in errors.
    pub fn get<T: Coerce>(&self, index: usize, field: &'static str) -> Result<T, RecordError> {
        let text = self.fields.get(index).ok_or_else(|| RecordShapeError {
            record: self.raw.to_string(),
            expected: index + 1,
            actual: self.fields.len(),
        })?;

        T::from_text(text).map_err(|source| RecordError::Field { field, source })
    }
}

/// An entity read from one line of a delimited text feed.
pub trait DelimitedRecord: Sized {
    /// Minimum number of fields a line must carry.
    const MIN_FIELDS: usize;

    fn from_columns(columns: &Columns<'_>) -> Result<Self, RecordError>;

    fn parse(raw: &str) -> Result<Self, RecordError> {
        let fields = parse_line(raw, Self::MIN_FIELDS)?;
        Self::from_columns(&Columns::new(raw, &fields))
    }
}

impl DelimitedRecord for Route {
    const MIN_FIELDS: usize = 6;

    fn from_columns(columns: &Columns<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            route_code: columns.get(0, "route_code")?,
            line_code: columns.get(1, "line_code")?,
            route_descr: columns.get(2, "route_descr")?,
            route_descr_eng: columns.get(3, "route_descr_eng")?,
            route_type: columns.get(4, "route_type")?,
            route_distance: columns.get(5, "route_distance")?,
        })
    }
}

impl DelimitedRecord for Stop {
    const MIN_FIELDS: usize = 13;

    fn from_columns(columns: &Columns<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            stop_code: columns.get(0, "stop_code")?,
            stop_id: columns.get(1, "stop_id")?,
            stop_descr: columns.get(2, "stop_descr")?,
            stop_descr_eng: columns.get(3, "stop_descr_eng")?,
            stop_street: columns.get(4, "stop_street")?,
            stop_street_eng: columns.get(5, "stop_street_eng")?,
            stop_heading: columns.get(6, "stop_heading")?,
            stop_lng: columns.get(7, "stop_lng")?,
            stop_lat: columns.get(8, "stop_lat")?,
            stop_type: columns.get(9, "stop_type")?,
            stop_amea: columns.get(10, "stop_amea")?,
            destinations: columns.get(11, "destinations")?,
            destinations_eng: columns.get(12, "destinations_eng")?,
        })
    }
}

impl DelimitedRecord for RouteStop {
    const MIN_FIELDS: usize = 4;

    // Field 0 is the association's own code, which is not persisted.
    fn from_columns(columns: &Columns<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            route_code: columns.get(1, "route_code")?,
            stop_code: columns.get(2, "stop_code")?,
            senu: columns.get(3, "senu")?,
        })
    }
}
