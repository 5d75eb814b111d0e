//! Geometry selector validation for request records.
//!
//! Several request records accept their area of interest in more than one
//! representation (WKT, GeoJSON, and for tile searches an explicit list of
//! tile ids). Exactly one representation must be set. This module checks that
//! rule locally so a malformed record never reaches the network.

use serde::Serialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// The representation that was selected for a record's area of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryField {
    Wkt,
    GeoJson,
    TileGuids,
}

impl GeometryField {
    /// Returns the wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryField::Wkt => "Wkt",
            GeometryField::GeoJson => "GeoJson",
            GeometryField::TileGuids => "TileGuids",
        }
    }
}

/// One candidate selector of a record and whether it carries a value.
#[derive(Debug, Clone, Copy)]
pub struct Selector {
    pub field: GeometryField,
    pub present: bool,
}

impl Selector {
    pub fn new(field: GeometryField, present: bool) -> Self {
        Self { field, present }
    }
}

/// Local precondition violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// None of the candidate geometry fields was set.
    #[error("missing geometry: one of {} must be provided", candidates.join(", "))]
    MissingGeometry { candidates: Vec<&'static str> },

    /// More than one geometry field was set.
    #[error("ambiguous geometry: only one of {} can be provided at a time", provided.join(", "))]
    AmbiguousGeometry { provided: Vec<&'static str> },
}

/// Implemented by every request record that carries geometry selectors.
pub trait GeometryRequest {
    /// Lists the record's candidate selectors in wire order.
    fn geometry_selectors(&self) -> Vec<Selector>;

    /// Checks the exactly-one rule and returns the selected field.
    fn validate_geometry(&self) -> Result<GeometryField, ValidationError> {
        require_exactly_one(&self.geometry_selectors())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Requires exactly one selector to be present.
///
/// # Errors
///
/// - `ValidationError::MissingGeometry` when no selector is present
/// - `ValidationError::AmbiguousGeometry` when two or more are present
pub fn require_exactly_one(selectors: &[Selector]) -> Result<GeometryField, ValidationError> {
    let provided: Vec<GeometryField> = selectors
        .iter()
        .filter(|s| s.present)
        .map(|s| s.field)
        .collect();

    match provided.as_slice() {
        [only] => Ok(*only),
        [] => Err(ValidationError::MissingGeometry {
            candidates: selectors.iter().map(|s| s.field.as_str()).collect(),
        }),
        many => Err(ValidationError::AmbiguousGeometry {
            provided: many.iter().map(|f| f.as_str()).collect(),
        }),
    }
}

/// A text selector counts as set only when it has non-whitespace content.
pub fn text_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// A list selector counts as set only when it has at least one element.
pub fn list_present<T>(value: &Option<Vec<T>>) -> bool {
    value.as_ref().is_some_and(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn two_way(wkt: bool, geojson: bool) -> Vec<Selector> {
        vec![
            Selector::new(GeometryField::Wkt, wkt),
            Selector::new(GeometryField::GeoJson, geojson),
        ]
    }

    fn three_way(wkt: bool, geojson: bool, tiles: bool) -> Vec<Selector> {
        vec![
            Selector::new(GeometryField::Wkt, wkt),
            Selector::new(GeometryField::GeoJson, geojson),
            Selector::new(GeometryField::TileGuids, tiles),
        ]
    }

    #[test]
    fn two_way_accepts_exactly_one() {
        assert_eq!(require_exactly_one(&two_way(true, false)), Ok(GeometryField::Wkt));
        assert_eq!(
            require_exactly_one(&two_way(false, true)),
            Ok(GeometryField::GeoJson)
        );
    }

    #[test]
    fn two_way_rejects_none() {
        let err = require_exactly_one(&two_way(false, false)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingGeometry {
                candidates: vec!["Wkt", "GeoJson"]
            }
        );
        assert!(err.to_string().starts_with("missing geometry"));
    }

    #[test]
    fn two_way_rejects_both() {
        let err = require_exactly_one(&two_way(true, true)).unwrap_err();
        assert!(matches!(err, ValidationError::AmbiguousGeometry { .. }));
        assert!(err.to_string().starts_with("ambiguous geometry"));
    }

    #[test]
    fn three_way_covers_every_combination() {
        for mask in 0u8..8 {
            let (wkt, geojson, tiles) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
            let count = [wkt, geojson, tiles].iter().filter(|b| **b).count();
            let result = require_exactly_one(&three_way(wkt, geojson, tiles));

            match count {
                0 => assert!(matches!(result, Err(ValidationError::MissingGeometry { .. }))),
                1 => assert!(result.is_ok(), "mask {} should validate", mask),
                _ => assert!(matches!(result, Err(ValidationError::AmbiguousGeometry { .. }))),
            }
        }
    }

    #[test]
    fn ambiguous_error_lists_provided_fields() {
        let err = require_exactly_one(&three_way(true, false, true)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmbiguousGeometry {
                provided: vec!["Wkt", "TileGuids"]
            }
        );
    }

    #[test]
    fn blank_text_is_not_present() {
        assert!(!text_present(&None));
        assert!(!text_present(&Some(String::new())));
        assert!(!text_present(&Some("   ".into())));
        assert!(text_present(&Some("POLYGON((0 0,1 0,1 1,0 0))".into())));
    }

    #[test]
    fn empty_list_is_not_present() {
        assert!(!list_present::<u8>(&None));
        assert!(!list_present::<u8>(&Some(vec![])));
        assert!(list_present(&Some(vec![1u8])));
    }
}
