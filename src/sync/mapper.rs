//! Record-to-entity mapping.
//!
//! Two mappers live here:
//!
//! - **Tagged mapping** ([`map_tagged`]): binds the keys of a JSON object to the
//!   fields of an entity through a static table of [`FieldDecl`]s built with
//!   [`tagged!`](crate::tagged). Each declaration carries the source key and a
//!   typed binder, so coercion is checked at compile time.
//! - **Projection** ([`project!`](crate::project)): copies same-named fields
//!   from one typed entity into a narrower one (DTO to persistence row).
//!
//! Both are shallow. Nested objects are never traversed; reference-typed
//! fields are cleared when the source carries a value for them.

use crate::sync::coerce::CoercionError;
use crate::sync::parser::RecordShapeError;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure to turn one source record into an entity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Shape(#[from] RecordShapeError),
    #[error("field `{field}`: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: CoercionError,
    },
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Binds one source key to one entity field.
pub struct FieldDecl<E> {
    /// Key in the source object. An empty key disables the declaration.
    pub source_key: &'static str,
    pub bind: fn(&mut E, &Value) -> Result<(), CoercionError>,
}

/// An entity populated from JSON objects through a static field table.
pub trait TaggedRecord: Default + 'static {
    const FIELDS: &'static [FieldDecl<Self>];
}

/// Declare one entry of a [`TaggedRecord::FIELDS`] table.
///
/// ```rust,ignore
/// impl TaggedRecord for LineDto {
///     const FIELDS: &'static [FieldDecl<Self>] = &[
///         tagged!("line_code" => line_code: i32),
///         tagged!("line_descr" => line_descr: String),
///         tagged!("ml_info" => ml_info: ref),
///     ];
/// }
/// ```
#[macro_export]
macro_rules! tagged {
    ($key:literal => $field:ident : ref) => {
        $crate::sync::mapper::FieldDecl {
            source_key: $key,
            bind: |entity: &mut Self, _value: &::serde_json::Value| {
                entity.$field = None;
                Ok(())
            },
        }
    };
    ($key:literal => $field:ident : $ty:ty) => {
        $crate::sync::mapper::FieldDecl {
            source_key: $key,
            bind: |entity: &mut Self, value: &::serde_json::Value| {
                if let Some(coerced) = $crate::sync::coerce::coerce::<$ty>(value)? {
                    entity.$field = coerced;
                }
                Ok(())
            },
        }
    };
}

/// Generate `From<Source> for Target` copying the listed same-named fields.
///
/// Target fields that are not listed take their `Default` value; source fields
/// that are not listed are dropped.
#[macro_export]
macro_rules! project {
    ($source:ty => $target:ty { $($field:ident),+ $(,)? }) => {
        impl From<$source> for $target {
            #[allow(clippy::needless_update)]
            fn from(source: $source) -> Self {
                Self {
                    $($field: source.$field,)+
                    ..Default::default()
                }
            }
        }
    };
}

/// Populate a fresh `E` from a JSON object.
///
/// Absent and `null` keys leave the field at its default. The first coercion
/// failure aborts the record.
pub fn map_tagged<E: TaggedRecord>(source: &Map<String, Value>) -> Result<E, RecordError> {
    let mut entity = E::default();

    for decl in E::FIELDS {
        if decl.source_key.is_empty() {
            continue;
        }

        let Some(value) = source.get(decl.source_key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        (decl.bind)(&mut entity, value).map_err(|source| RecordError::Field {
            field: decl.source_key,
            source,
        })?;
    }

    Ok(entity)
}

/// [`map_tagged`] for a value that should be a JSON object.
pub fn map_tagged_value<E: TaggedRecord>(value: &Value) -> Result<E, RecordError> {
    match value {
        Value::Object(source) => map_tagged(source),
        other => Err(RecordError::NotAnObject {
            found: json_type_name(other),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
