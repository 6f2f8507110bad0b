//! Physical field records attached to domains.
//!
//! # Responsibility
//! - Describe one named input variable: coordinates, units, fill value.
//! - Validate naming rules shared by static and dynamic inputs.
//!
//! # Invariants
//! - `name` and every coordinate name are identifier-like.
//! - `fill_value` is finite.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static VARIABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid variable name regex"));

/// Whether a field is constant over the run or time-varying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Time-invariant input such as topography or land use.
    Static,
    /// Time-varying input such as boundary forcing.
    Dynamic,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Input variable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Short variable name, e.g. `zt`.
    pub name: String,
    /// Descriptive name, e.g. `terrain height`.
    pub long_name: String,
    /// Ordered coordinate names the variable is defined over.
    pub coords: Vec<String>,
    pub fill_value: f64,
    /// Unit string; `1` for dimensionless quantities.
    pub units: String,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        long_name: impl Into<String>,
        coords: impl IntoIterator<Item = impl Into<String>>,
        fill_value: f64,
        units: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            long_name: long_name.into(),
            coords: coords.into_iter().map(Into::into).collect(),
            fill_value,
            units: units.into(),
        }
    }

    /// Validates record-level naming and value rules.
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        if !is_variable_name(&self.name) {
            return Err(FieldValidationError::InvalidName(self.name.clone()));
        }
        if self.long_name.trim().is_empty() {
            return Err(FieldValidationError::BlankLongName);
        }

        let mut seen = BTreeSet::new();
        for coord in &self.coords {
            if !is_variable_name(coord) {
                return Err(FieldValidationError::InvalidCoordinate(coord.clone()));
            }
            if !seen.insert(coord.as_str()) {
                return Err(FieldValidationError::DuplicateCoordinate(coord.clone()));
            }
        }

        if !self.fill_value.is_finite() {
            return Err(FieldValidationError::NonFiniteFillValue);
        }
        if self.units.trim().is_empty() {
            return Err(FieldValidationError::BlankUnits);
        }
        Ok(())
    }
}

fn is_variable_name(value: &str) -> bool {
    VARIABLE_NAME_RE.is_match(value)
}

/// Field record validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValidationError {
    InvalidName(String),
    BlankLongName,
    InvalidCoordinate(String),
    DuplicateCoordinate(String),
    NonFiniteFillValue,
    BlankUnits,
}

impl Display for FieldValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "field name is invalid: `{value}`"),
            Self::BlankLongName => write!(f, "field long_name must not be blank"),
            Self::InvalidCoordinate(value) => {
                write!(f, "field coordinate name is invalid: `{value}`")
            }
            Self::DuplicateCoordinate(value) => {
                write!(f, "field coordinate declared twice: `{value}`")
            }
            Self::NonFiniteFillValue => write!(f, "field fill_value must be finite"),
            Self::BlankUnits => write!(f, "field units must not be blank"),
        }
    }
}

impl Error for FieldValidationError {}
