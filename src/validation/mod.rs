//! Request validation performed before any network I/O.
//!
//! Request records that accept an area of interest in several representations
//! must carry exactly one of them.

pub mod geometry;

pub use geometry::{
    list_present, require_exactly_one, text_present, GeometryField, GeometryRequest, Selector,
    ValidationError,
};
