use nestgrid_core::{
    DomainId, DomainRegistry, Field, FieldKind, FieldValidationError, GridConfig, RegistryError,
};

fn setup() -> DomainRegistry {
    DomainRegistry::create_root(0, GridConfig::default()).unwrap()
}

fn terrain_height() -> Field {
    Field::new("zt", "terrain height", ["y", "x"], -9999.0, "m")
}

fn surface_temperature() -> Field {
    Field::new(
        "init_soil_t",
        "initial soil temperature",
        ["zsoil", "y", "x"],
        -9999.0,
        "K",
    )
}

#[test]
fn static_and_dynamic_fields_are_kept_in_order() {
    let mut registry = setup();
    let root = registry.root();
    registry.add_static_field(root, terrain_height()).unwrap();
    registry
        .add_static_field(
            root,
            Field::new("buildings_2d", "building height", ["y", "x"], -9999.0, "m"),
        )
        .unwrap();
    registry
        .add_dynamic_field(root, surface_temperature())
        .unwrap();

    let node = registry.root_node();
    let names: Vec<&str> = node
        .static_fields()
        .iter()
        .map(|field| field.name.as_str())
        .collect();
    assert_eq!(names, vec!["zt", "buildings_2d"]);
    assert_eq!(node.dynamic_fields().len(), 1);

    let (kind, field) = node.field("init_soil_t").unwrap();
    assert_eq!(kind, FieldKind::Dynamic);
    assert_eq!(field.units, "K");
    assert!(node.field("missing").is_none());
}

#[test]
fn field_names_are_unique_across_both_sets() {
    let mut registry = setup();
    let root = registry.root();
    registry.add_static_field(root, terrain_height()).unwrap();

    let err = registry
        .add_dynamic_field(root, terrain_height())
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateField {
            domain: DomainId::from(0),
            name: "zt".to_string(),
        }
    );
}

#[test]
fn same_field_name_is_allowed_on_different_domains() {
    let mut registry = setup();
    let nested = registry
        .create_child(1, None, GridConfig::default())
        .unwrap();
    registry.attach(registry.root(), nested).unwrap();

    registry
        .add_static_field(registry.root(), terrain_height())
        .unwrap();
    registry.add_static_field(nested, terrain_height()).unwrap();
    assert_eq!(
        registry.node(nested).unwrap().static_fields()[0].name,
        "zt"
    );
}

#[test]
fn invalid_field_is_rejected_before_storage() {
    let mut registry = setup();
    let root = registry.root();
    let mut field = terrain_height();
    field.long_name = "   ".to_string();

    let err = registry.add_static_field(root, field).unwrap_err();
    assert_eq!(
        err,
        RegistryError::InvalidField(FieldValidationError::BlankLongName)
    );
    assert!(registry.root_node().static_fields().is_empty());
}

#[test]
fn fields_can_be_added_to_detached_domains() {
    let mut registry = setup();
    let detached = registry
        .create_child(3, None, GridConfig::default())
        .unwrap();

    registry
        .add_dynamic_field(detached, surface_temperature())
        .unwrap();
    registry.attach(registry.root(), detached).unwrap();
    assert_eq!(registry.node(detached).unwrap().dynamic_fields().len(), 1);
}
