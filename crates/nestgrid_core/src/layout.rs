//! Declarative domain layouts.
//!
//! # Responsibility
//! - Deserialize a nested domain layout document (JSON).
//! - Build a `DomainRegistry` from it through the public registry API.
//!
//! # Invariants
//! - Children are attached depth-first in document order.
//! - The first registry error aborts the build; no partial registry is
//!   returned.

use crate::model::domain::{DomainKey, GridConfig, GridSpec, Point};
use crate::model::field::Field;
use crate::registry::{DomainRegistry, IdReleasePolicy, RegistryError};
use log::{error, info};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Top-level layout document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainLayout {
    #[serde(default)]
    pub id_release: IdReleasePolicy,
    pub root: NodeLayout,
}

/// One domain entry in a layout document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeLayout {
    pub id: i64,
    /// `[x, y]` offset from the parent's origin. Not allowed on the root.
    #[serde(default)]
    pub offset: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub static_fields: Vec<Field>,
    #[serde(default)]
    pub dynamic_fields: Vec<Field>,
    #[serde(default)]
    pub children: Vec<NodeLayout>,
}

impl DomainLayout {
    /// Parses a layout from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, LayoutError> {
        serde_json::from_str(raw).map_err(LayoutError::Json)
    }

    /// Reads and parses a layout file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Builds a registry holding every domain of this layout.
    ///
    /// # Errors
    /// - `RootOffset` when the root declares an offset.
    /// - `Registry` for any id, grid, structure or field violation.
    pub fn build(&self) -> Result<DomainRegistry, LayoutError> {
        let started_at = Instant::now();
        info!(
            "event=layout_build module=layout status=start root_id={}",
            self.root.id
        );

        match self.build_inner() {
            Ok(registry) => {
                info!(
                    "event=layout_build module=layout status=ok duration_ms={} node_count={}",
                    started_at.elapsed().as_millis(),
                    registry.node_count()
                );
                Ok(registry)
            }
            Err(err) => {
                error!(
                    "event=layout_build module=layout status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn build_inner(&self) -> Result<DomainRegistry, LayoutError> {
        if self.root.offset.is_some() {
            return Err(LayoutError::RootOffset);
        }

        let grid = grid_config(&self.root.grid)?;
        let mut registry =
            DomainRegistry::create_root(self.root.id, grid)?.with_id_release(self.id_release);
        let root = registry.root();
        add_fields(&mut registry, root, &self.root)?;
        attach_children(&mut registry, root, &self.root.children)?;
        Ok(registry)
    }
}

fn attach_children(
    registry: &mut DomainRegistry,
    parent: DomainKey,
    children: &[NodeLayout],
) -> Result<(), LayoutError> {
    for entry in children {
        let offset = entry
            .offset
            .as_deref()
            .map(|slots| Point::from_slots("offset", slots))
            .transpose()
            .map_err(RegistryError::from)?;
        let child = registry.create_child(entry.id, offset, grid_config(&entry.grid)?)?;
        registry.attach(parent, child)?;
        add_fields(registry, child, entry)?;
        attach_children(registry, child, &entry.children)?;
    }
    Ok(())
}

fn add_fields(
    registry: &mut DomainRegistry,
    key: DomainKey,
    entry: &NodeLayout,
) -> Result<(), LayoutError> {
    for field in &entry.static_fields {
        registry.add_static_field(key, field.clone())?;
    }
    for field in &entry.dynamic_fields {
        registry.add_dynamic_field(key, field.clone())?;
    }
    Ok(())
}

fn grid_config(spec: &GridSpec) -> Result<GridConfig, RegistryError> {
    GridConfig::try_from(spec.clone()).map_err(RegistryError::from)
}

/// Layout loading/building errors.
#[derive(Debug)]
pub enum LayoutError {
    /// Layout file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Document is not valid layout JSON.
    Json(serde_json::Error),
    /// Root entry declares an offset.
    RootOffset,
    /// Registry rejected one of the declared domains.
    Registry(RegistryError),
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read layout `{}`: {source}", path.display())
            }
            Self::Json(err) => write!(f, "invalid layout document: {err}"),
            Self::RootOffset => write!(f, "root domain must not declare an offset"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LayoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::RootOffset => None,
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<RegistryError> for LayoutError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainLayout, LayoutError};
    use crate::model::domain::{DomainId, GridValidationError, Point};
    use crate::registry::{IdReleasePolicy, RegistryError};
    use serde_json::json;

    fn nested_layout() -> serde_json::Value {
        json!({
            "root": {
                "id": 0,
                "grid": {
                    "crs": "EPSG:3067",
                    "origin": [385000.0, 6672000.0],
                    "shape": [256, 256, 96],
                    "resolution": [8.0, 8.0, 8.0],
                    "pe": 64
                },
                "static_fields": [
                    { "name": "zt", "long_name": "terrain height", "coords": ["y", "x"],
                      "fill_value": -9999.0, "units": "m" }
                ],
                "children": [
                    {
                        "id": 1,
                        "offset": [512.0, 512.0],
                        "grid": { "shape": [256, 256, 64], "resolution": [2.0, 2.0, 2.0] },
                        "dynamic_fields": [
                            { "name": "ls_forcing_left_pt", "long_name": "large-scale forcing",
                              "coords": ["time", "z", "y"], "fill_value": -9999.0, "units": "K" }
                        ],
                        "children": [
                            { "id": 2, "offset": [64.0, 64.0] }
                        ]
                    },
                    { "id": 3 }
                ]
            }
        })
    }

    fn parse(value: serde_json::Value) -> DomainLayout {
        serde_json::from_value(value).expect("layout should deserialize")
    }

    #[test]
    fn builds_nested_layout_in_document_order() {
        let registry = parse(nested_layout()).build().expect("layout should build");

        assert_eq!(registry.node_count(), 4);
        assert_eq!(registry.id_release(), IdReleasePolicy::Reserve);
        let root = registry.root_node();
        assert_eq!(root.static_fields().len(), 1);
        let ids: Vec<u32> = root
            .children()
            .iter()
            .map(|key| registry.node(*key).expect("child").id().value())
            .collect();
        assert_eq!(ids, vec![1, 3]);

        let nested = registry.find_by_id(DomainId::from(2)).expect("nested domain");
        assert_eq!(registry.depth(nested).expect("depth"), 2);
        assert_eq!(
            registry.absolute_origin(nested),
            Some(Point::new(385_576.0, 6_672_576.0))
        );

        let child = registry.find_by_id(DomainId::from(1)).expect("child domain");
        assert_eq!(
            registry.node(child).expect("child").dynamic_fields()[0].name,
            "ls_forcing_left_pt"
        );
    }

    #[test]
    fn duplicate_id_in_distant_branch_aborts_build() {
        let mut value = nested_layout();
        value["root"]["children"][1]["id"] = json!(2);

        let err = parse(value).build().expect_err("duplicate id must fail");
        assert!(matches!(
            err,
            LayoutError::Registry(RegistryError::DuplicateId(id)) if id == DomainId::from(2)
        ));
    }

    #[test]
    fn rejects_root_offset() {
        let mut value = nested_layout();
        value["root"]["offset"] = json!([0.0, 0.0]);

        let err = parse(value).build().expect_err("root offset must fail");
        assert!(matches!(err, LayoutError::RootOffset));
    }

    #[test]
    fn rejects_grid_arrays_with_missing_values() {
        let mut value = nested_layout();
        value["root"]["children"][0]["grid"]["shape"] = json!([256, null, 64]);

        let err = parse(value).build().expect_err("null shape entry must fail");
        assert!(matches!(
            err,
            LayoutError::Registry(RegistryError::InvalidGrid(
                GridValidationError::MissingValue { field: "shape", index: 1 }
            ))
        ));
    }

    #[test]
    fn rejects_unknown_keys_and_reads_release_policy() {
        let err = DomainLayout::from_json_str(r#"{ "root": { "id": 0, "colour": "red" } }"#)
            .expect_err("unknown key must fail");
        assert!(matches!(err, LayoutError::Json(_)));

        let layout =
            DomainLayout::from_json_str(r#"{ "id_release": "release", "root": { "id": 4 } }"#)
                .expect("minimal layout");
        let registry = layout.build().expect("minimal layout should build");
        assert_eq!(registry.id_release(), IdReleasePolicy::Release);
        assert_eq!(registry.root_node().id(), DomainId::from(4));
    }

    #[test]
    fn negative_child_id_is_rejected() {
        let mut value = nested_layout();
        value["root"]["children"][1]["id"] = json!(-3);

        let err = parse(value).build().expect_err("negative id must fail");
        assert!(matches!(
            err,
            LayoutError::Registry(RegistryError::InvalidDomainId(-3))
        ));
    }
}
