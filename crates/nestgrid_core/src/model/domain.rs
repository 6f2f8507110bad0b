//! Domain identity and grid metadata.
//!
//! # Responsibility
//! - Define integer domain ids and the arena handles that address nodes.
//! - Validate grid configuration independently of the registry contract.
//!
//! # Invariants
//! - `DomainId` is always non-negative.
//! - A `GridConfig` that passed `validate()` has no zero dimension, no
//!   non-finite coordinate and no non-positive resolution.
//! - Raw `GridSpec` arrays must have the exact axis count and no nulls.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Arena handle for one domain node.
///
/// Distinct from `DomainId`: the handle addresses storage, the id is the
/// model-facing identity that must be unique tree-wide.
pub type DomainKey = Uuid;

/// Tree-wide unique domain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainId(u32);

impl DomainId {
    /// Converts a caller-provided integer into a domain id.
    ///
    /// Returns `None` for negative values and values beyond `u32::MAX`.
    pub fn new(value: i64) -> Option<Self> {
        u32::try_from(value).ok().map(Self)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for DomainId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Planar coordinate pair in the domain's CRS units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Parses a two-slot raw array such as `[x, y]`.
    pub fn from_slots(
        field: &'static str,
        slots: &[Option<f64>],
    ) -> Result<Self, GridValidationError> {
        let values = require_slots(field, slots, 2)?;
        let point = Self::new(values[0], values[1]);
        if !point.is_finite() {
            return Err(GridValidationError::NonFiniteCoordinate { field });
        }
        Ok(point)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Number of grid points along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

/// Grid spacing along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

/// Validated grid metadata attached to one domain node.
///
/// Every member is optional: a layout may leave parts to be filled in by
/// grid generation later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridConfig {
    /// Coordinate reference system identifier, e.g. `EPSG:3067`.
    pub crs: Option<String>,
    /// Root origin in CRS coordinates. Ignored for child domains, which
    /// locate themselves by offset.
    pub origin: Option<Point>,
    pub shape: Option<Shape>,
    pub resolution: Option<Resolution>,
    /// Number of processing elements the domain is decomposed over.
    pub pe: Option<u32>,
}

impl GridConfig {
    /// Validates value ranges of all present members.
    pub fn validate(&self) -> Result<(), GridValidationError> {
        if let Some(crs) = &self.crs {
            if crs.trim().is_empty() {
                return Err(GridValidationError::BlankCrs);
            }
        }
        if let Some(origin) = self.origin {
            if !origin.is_finite() {
                return Err(GridValidationError::NonFiniteCoordinate { field: "origin" });
            }
        }
        if let Some(shape) = self.shape {
            for (axis, value) in [("nx", shape.nx), ("ny", shape.ny), ("nz", shape.nz)] {
                if value == 0 {
                    return Err(GridValidationError::InvalidShape {
                        axis,
                        value: i64::from(value),
                    });
                }
            }
        }
        if let Some(resolution) = self.resolution {
            for (axis, value) in [
                ("dx", resolution.dx),
                ("dy", resolution.dy),
                ("dz", resolution.dz),
            ] {
                if !value.is_finite() || value <= 0.0 {
                    return Err(GridValidationError::InvalidResolution { axis, value });
                }
            }
        }
        if self.pe == Some(0) {
            return Err(GridValidationError::InvalidProcessingElements(0));
        }
        Ok(())
    }

    /// Total number of grid points, when the shape is known.
    ///
    /// `None` also when the product does not fit in `u64`.
    pub fn point_count(&self) -> Option<u64> {
        self.shape.and_then(|shape| {
            u64::from(shape.nx)
                .checked_mul(u64::from(shape.ny))?
                .checked_mul(u64::from(shape.nz))
        })
    }
}

/// Raw, deserialized grid description.
///
/// Arrays may be of any length and may contain `null`; conversion into
/// `GridConfig` rejects both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridSpec {
    pub crs: Option<String>,
    pub origin: Option<Vec<Option<f64>>>,
    pub shape: Option<Vec<Option<i64>>>,
    pub resolution: Option<Vec<Option<f64>>>,
    pub pe: Option<i64>,
}

impl TryFrom<GridSpec> for GridConfig {
    type Error = GridValidationError;

    fn try_from(spec: GridSpec) -> Result<Self, Self::Error> {
        let origin = spec
            .origin
            .as_deref()
            .map(|slots| Point::from_slots("origin", slots))
            .transpose()?;

        let shape = match spec.shape.as_deref() {
            Some(slots) => {
                let values = require_slots("shape", slots, 3)?;
                Some(Shape {
                    nx: shape_axis("nx", values[0])?,
                    ny: shape_axis("ny", values[1])?,
                    nz: shape_axis("nz", values[2])?,
                })
            }
            None => None,
        };

        let resolution = match spec.resolution.as_deref() {
            Some(slots) => {
                let values = require_slots("resolution", slots, 3)?;
                Some(Resolution {
                    dx: values[0],
                    dy: values[1],
                    dz: values[2],
                })
            }
            None => None,
        };

        let pe = match spec.pe {
            Some(value) => Some(
                u32::try_from(value)
                    .map_err(|_| GridValidationError::InvalidProcessingElements(value))?,
            ),
            None => None,
        };

        let config = Self {
            crs: spec.crs,
            origin,
            shape,
            resolution,
            pe,
        };
        config.validate()?;
        Ok(config)
    }
}

fn require_slots<T: Copy>(
    field: &'static str,
    slots: &[Option<T>],
    expected: usize,
) -> Result<Vec<T>, GridValidationError> {
    if slots.len() != expected {
        return Err(GridValidationError::WrongLength {
            field,
            expected,
            actual: slots.len(),
        });
    }
    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(GridValidationError::MissingValue { field, index }))
        .collect()
}

fn shape_axis(axis: &'static str, value: i64) -> Result<u32, GridValidationError> {
    match u32::try_from(value) {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(GridValidationError::InvalidShape { axis, value }),
    }
}

/// Grid metadata validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GridValidationError {
    /// Raw array has the wrong number of entries.
    WrongLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Raw array contains `null` at `index`.
    MissingValue { field: &'static str, index: usize },
    /// CRS identifier is blank after trim.
    BlankCrs,
    NonFiniteCoordinate { field: &'static str },
    InvalidShape { axis: &'static str, value: i64 },
    InvalidResolution { axis: &'static str, value: f64 },
    InvalidProcessingElements(i64),
}

impl Display for GridValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongLength {
                field,
                expected,
                actual,
            } => write!(f, "`{field}` must have {expected} values, got {actual}"),
            Self::MissingValue { field, index } => {
                write!(f, "`{field}` is missing a value at index {index}")
            }
            Self::BlankCrs => write!(f, "crs must not be blank"),
            Self::NonFiniteCoordinate { field } => {
                write!(f, "`{field}` must contain finite coordinates")
            }
            Self::InvalidShape { axis, value } => {
                write!(f, "shape `{axis}` must be a positive integer, got {value}")
            }
            Self::InvalidResolution { axis, value } => {
                write!(f, "resolution `{axis}` must be positive and finite, got {value}")
            }
            Self::InvalidProcessingElements(value) => {
                write!(f, "pe must be a positive integer, got {value}")
            }
        }
    }
}

impl Error for GridValidationError {}
