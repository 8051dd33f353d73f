use caster_mapping::{ExtraDef, MappingDsl, TransformRef, TransformRegistry};
use std::path::PathBuf;

fn shop_mapping() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata/shop_mapping.yaml")
}

#[test]
fn test_shop_mapping_document() -> anyhow::Result<()> {
    let file = MappingDsl::parse_file(&shop_mapping())?;
    assert_eq!(file.version, "1");
    assert_eq!(file.mappings.len(), 2);

    let order = &file.mappings[0];
    assert_eq!(order.label(), "store.Order -> wire.Order");
    let one_to_one: Vec<(&str, &str)> = order.one_to_one.iter().collect();
    assert_eq!(one_to_one, vec![("ID", "ID"), ("Number", "Number")]);

    let full_name = &order.fields[0];
    assert_eq!(full_name.source.paths().collect::<Vec<_>>(), vec!["FirstName", "LastName"]);
    assert_eq!(full_name.transform.as_deref(), Some("ConcatNames"));

    let label = &order.fields[4];
    assert_eq!(label.extra.len(), 1);
    assert_eq!(label.extra[0].def(), ExtraDef::Target("Currency"));

    assert_eq!(order.ignore.len(), 1);
    assert_eq!(order.ignore[0].target.paths().collect::<Vec<_>>(), vec!["Internal"]);

    let summary = &file.mappings[1];
    assert!(summary.generate_target);
    assert_eq!(summary.fields[0].default.as_deref(), Some("\"order\""));
    Ok(())
}

#[test]
fn test_round_trip_preserves_document() -> anyhow::Result<()> {
    let file = MappingDsl::parse_file(&shop_mapping())?;
    let yaml = MappingDsl::to_yaml(&file)?;
    assert_eq!(MappingDsl::parse(&yaml)?, file);
    Ok(())
}

#[test]
fn test_transform_name_resolution() -> anyhow::Result<()> {
    let file = MappingDsl::parse(
        r"
mappings: []
transforms:
  - name: FormatMoney
    package: example.com/shop/convert
",
    )?;
    let registry = TransformRegistry::from_defs(&file.transforms);

    assert!(matches!(registry.resolve("FormatMoney"), TransformRef::Declared(_)));
    assert!(matches!(
        registry.resolve("strings.ToUpper"),
        TransformRef::Qualified { qualifier: "strings", func: "ToUpper" }
    ));
    assert!(matches!(registry.resolve("ConcatNames"), TransformRef::Missing("ConcatNames")));
    Ok(())
}
