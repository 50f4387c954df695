use crate::sync::mapper::{FieldDecl, TaggedRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ===== Entity Types =====

/// How an entity type's records are delivered by the telematics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON array of flat objects.
    Json,
    /// Newline-delimited, comma-separated text.
    Delimited,
}

/// The categories of reference data, each synced independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Line,
    Route,
    Stop,
    RouteStop,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Line,
        EntityKind::Route,
        EntityKind::Stop,
        EntityKind::RouteStop,
    ];

    /// API action that returns the full set of records.
    pub fn default_action(self) -> &'static str {
        match self {
            EntityKind::Line => "webGetLinesWithMLInfo",
            EntityKind::Route => "getRoutes",
            EntityKind::Stop => "getStops",
            EntityKind::RouteStop => "getRouteStops",
        }
    }

    pub fn default_batch_size(self) -> usize {
        match self {
            EntityKind::Line | EntityKind::Stop => 1_000,
            EntityKind::Route | EntityKind::RouteStop => 10_000,
        }
    }

    pub fn source_format(self) -> SourceFormat {
        match self {
            EntityKind::Line => SourceFormat::Json,
            EntityKind::Route | EntityKind::Stop | EntityKind::RouteStop => {
                SourceFormat::Delimited
            }
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Line => "lines",
            EntityKind::Route => "routes",
            EntityKind::Stop => "stops",
            EntityKind::RouteStop => "route_stops",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Line => "line",
            EntityKind::Route => "route",
            EntityKind::Stop => "stop",
            EntityKind::RouteStop => "route_stop",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "line" | "lines" => Ok(EntityKind::Line),
            "route" | "routes" => Ok(EntityKind::Route),
            "stop" | "stops" => Ok(EntityKind::Stop),
            "route_stop" | "route-stop" | "route_stops" | "route-stops" => {
                Ok(EntityKind::RouteStop)
            }
            other => Err(format!("unknown entity type '{other}'")),
        }
    }
}

// ===== Lines =====

/// A line as returned by `webGetLinesWithMLInfo`.
///
/// ```json
/// {
///     "ml_code": "9",
///     "sdc_code": "54",
///     "line_code": "1151",
///     "line_id": "021",
///     "line_descr": "ΠΛΑΤΕΙΑ ΚΑΝΙΓΓΟΣ - ΓΚΥΖH (ΚΥΚΛΙΚΗ)",
///     "line_descr_eng": "PLATEIA KANIGKOS - GKIZI",
///     "mld_master": "1"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineDto {
    pub ml_code: i16,
    pub sdc_code: i16,
    pub line_code: i32,
    pub line_id: String,
    pub line_descr: String,
    pub line_descr_eng: String,
    pub mld_master: i16,
}

impl TaggedRecord for LineDto {
    const FIELDS: &'static [FieldDecl<Self>] = &[
        crate::tagged!("ml_code" => ml_code: i16),
        crate::tagged!("sdc_code" => sdc_code: i16),
        crate::tagged!("line_code" => line_code: i32),
        crate::tagged!("line_id" => line_id: String),
        crate::tagged!("line_descr" => line_descr: String),
        crate::tagged!("line_descr_eng" => line_descr_eng: String),
        crate::tagged!("mld_master" => mld_master: i16),
    ];
}

/// Row of the `lines` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub line_code: i32,
    pub line_id: String,
    pub line_descr: String,
    pub line_descr_eng: String,
    pub ml_code: i16,
    pub sdc_code: i16,
    pub mld_master: i16,
}

crate::project!(LineDto => Line {
    line_code,
    line_id,
    line_descr,
    line_descr_eng,
    ml_code,
    sdc_code,
    mld_master,
});

// ===== Routes and Stops =====

/// Row of the `routes` table, read from a `getRoutes` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_code: i32,
    pub line_code: i32,
    pub route_descr: String,
    pub route_descr_eng: String,
    pub route_type: i8,
    pub route_distance: f32,
}

/// Row of the `stops` table, read from a `getStops` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_code: i32,
    pub stop_id: String,
    pub stop_descr: String,
    pub stop_descr_eng: String,
    pub stop_street: String,
    pub stop_street_eng: String,
    pub stop_heading: i32,
    pub stop_lng: f64,
    pub stop_lat: f64,
    pub stop_type: i8,
    pub stop_amea: i8,
    pub destinations: String,
    pub destinations_eng: String,
}

/// Row of the `route_stops` table: the position of a stop along a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub route_code: i32,
    pub stop_code: i64,
    /// Sequence number of the stop within the route.
    pub senu: i16,
}
