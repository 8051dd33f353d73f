use caster_graph::{FieldPath, Kind, TypeExpr, TypeGraph, TypeId};
use std::path::PathBuf;

fn shop() -> anyhow::Result<TypeGraph> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata/shop_types.json");
    Ok(TypeGraph::load_file(&path)?)
}

#[test]
fn test_shop_snapshot_lookups() -> anyhow::Result<()> {
    let graph = shop()?;

    let order = graph.resolve_ident("store.Order");
    assert_eq!(order, TypeId::new("example.com/shop/store", "Order"));
    assert_eq!(graph.kind_of(&TypeExpr::Named(order.clone())), Kind::Struct);

    let info = graph.get(&order).expect("store.Order");
    let names: Vec<&str> = info
        .fields()
        .unwrap_or_default()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names.first(), Some(&"ID"));
    assert!(!info.field("revision").expect("revision").exported);
    Ok(())
}

#[test]
fn test_alias_and_external_kinds() -> anyhow::Result<()> {
    let graph = shop()?;

    let status = TypeExpr::named("example.com/shop/store", "Status");
    assert_eq!(graph.kind_of(&status), Kind::Alias);
    assert_eq!(graph.underlying(&status), &TypeExpr::basic("string"));

    let time = TypeExpr::named("time", "Time");
    assert_eq!(graph.kind_of(&time), Kind::External);
    assert!(graph.struct_of(&time).is_none());
    Ok(())
}

#[test]
fn test_package_names_and_qualifiers() -> anyhow::Result<()> {
    let graph = shop()?;
    assert_eq!(graph.package_name("example.com/shop/wire"), "wire");
    assert_eq!(graph.package_name("example.com/other/model"), "model");
    assert_eq!(graph.resolve_package("convert"), Some("example.com/shop/convert"));
    assert_eq!(graph.resolve_package("nowhere"), None);
    assert_eq!(
        graph.package("example.com/shop/dto").and_then(|p| p.dir.clone()),
        Some(PathBuf::from("dto"))
    );
    Ok(())
}

#[test]
fn test_field_path_selectors() -> anyhow::Result<()> {
    let path = FieldPath::parse("Lines[].Code")?;
    assert_eq!(path.slice_count(), 1);
    assert_eq!(path.selector("in"), "in.Lines.Code");
    assert!(FieldPath::parse("Lines..Code").is_err());
    Ok(())
}

#[test]
fn test_malformed_snapshot_is_rejected() {
    let err = TypeGraph::from_json("{ \"types\": [ { \"id\": 1 } ] }").unwrap_err();
    assert!(err.to_string().contains("Invalid type graph snapshot"));
}
