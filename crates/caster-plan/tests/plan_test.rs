use caster_graph::{FieldPath, TypeExpr, TypeGraph, TypeId};
use caster_mapping::{MappingDsl, MappingFile};
use caster_plan::{
    Callee, ConversionStrategy, DiagnosticKind, Diagnostics, ExtraValue, PairOrigin,
    ResolvedFieldMapping, ResolvedTypePair, plan,
};
use std::path::PathBuf;

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(name)
}

fn load() -> anyhow::Result<(TypeGraph, MappingFile)> {
    let graph = TypeGraph::load_file(&testdata("shop_types.json"))?;
    let mapping = MappingDsl::parse_file(&testdata("shop_mapping.yaml"))?;
    Ok((graph, mapping))
}

/// Plan an inline mapping document against the shop types
fn plan_shop(yaml: &str) -> anyhow::Result<(Vec<ResolvedTypePair>, Diagnostics)> {
    let graph = TypeGraph::load_file(&testdata("shop_types.json"))?;
    let file = MappingDsl::parse(yaml)?;
    let (plan, diagnostics) = plan(&graph, &file);
    Ok((plan.pairs, diagnostics))
}

fn has_error(diagnostics: &Diagnostics, kind: DiagnosticKind, text: &str) -> bool {
    diagnostics
        .errors()
        .any(|d| d.kind == kind && d.message.contains(text))
}

fn mapping<'p>(pair: &'p ResolvedTypePair, target: &str) -> &'p ResolvedFieldMapping {
    pair.mappings
        .iter()
        .find(|m| m.target_label() == target)
        .unwrap_or_else(|| panic!("no mapping for {target}"))
}

#[test]
fn test_shop_pairs_in_discovery_order() -> anyhow::Result<()> {
    let (graph, file) = load()?;
    let (plan, diagnostics) = plan(&graph, &file);

    assert!(
        !diagnostics.has_errors(),
        "unexpected errors: {:?}",
        diagnostics.errors().collect::<Vec<_>>()
    );

    let labels: Vec<String> = plan.pairs.iter().map(ResolvedTypePair::label).collect();
    assert_eq!(
        labels,
        vec![
            "store.Order -> wire.Order",
            "store.Order -> dto.OrderSummary",
            "store.Item -> wire.Item",
            "store.Customer -> wire.Customer",
        ]
    );
    assert_eq!(plan.pairs[2].origin, PairOrigin::Nested);
    assert_eq!(plan.pairs[0].caster_name, "StoreOrderToWireOrder");
    Ok(())
}

#[test]
fn test_shop_strategies() -> anyhow::Result<()> {
    let (graph, file) = load()?;
    let (plan, _) = plan(&graph, &file);
    let order = &plan.pairs[0];

    let expected = [
        ("ID", ConversionStrategy::Convert),
        ("Number", ConversionStrategy::DirectAssign),
        ("Currency", ConversionStrategy::Default),
        ("Status", ConversionStrategy::Convert),
        ("Tags", ConversionStrategy::SliceMap),
        ("Items", ConversionStrategy::SliceMap),
        ("Customer", ConversionStrategy::PointerDeref),
        ("Notes", ConversionStrategy::Map),
        ("Created", ConversionStrategy::DirectAssign),
        ("Total", ConversionStrategy::PointerWrap),
        ("Internal", ConversionStrategy::Ignore),
        ("FullName", ConversionStrategy::Transform),
    ];
    for (target, strategy) in expected {
        assert_eq!(mapping(order, target).strategy, strategy, "strategy of {target}");
    }

    let meta = mapping(order, "Meta.Note");
    assert_eq!(meta.target_pointers.len(), 1);
    assert_eq!(meta.target_pointers[0].0, FieldPath::field("Meta"));

    let codes = mapping(order, "LineCodes[]");
    let projection = codes.projection.as_ref().expect("projection");
    assert_eq!(projection.source_container.to_string(), "Lines");
    assert_eq!(projection.source_rest.to_string(), "Code");
    Ok(())
}

#[test]
fn test_shop_transforms_and_extras() -> anyhow::Result<()> {
    let (graph, file) = load()?;
    let (plan, diagnostics) = plan(&graph, &file);
    let order = &plan.pairs[0];

    let full_name = mapping(order, "FullName");
    let call = full_name.transform.as_ref().expect("transform");
    assert_eq!(
        call.callee,
        Callee::Missing {
            name: "ConcatNames".to_string()
        }
    );
    assert!(diagnostics
        .warnings()
        .any(|d| d.kind == DiagnosticKind::Reference && d.message.contains("ConcatNames")));

    let label = mapping(order, "Label");
    let call = label.transform.as_ref().expect("transform");
    assert_eq!(
        call.callee,
        Callee::Package {
            path: "example.com/shop/convert".to_string(),
            func: "FormatMoney".to_string()
        }
    );
    assert_eq!(label.extra.len(), 1);
    assert_eq!(
        label.extra[0].value,
        ExtraValue::Target(FieldPath::field("Currency"))
    );
    assert_eq!(label.depends_on_targets, vec![FieldPath::field("Currency")]);
    Ok(())
}

#[test]
fn test_generated_target_shape() -> anyhow::Result<()> {
    let (graph, file) = load()?;
    let (plan, _) = plan(&graph, &file);

    let id = TypeId::new("example.com/shop/dto", "OrderSummary");
    let info = plan.generated_types.get(&id).expect("generated type");
    let shape: Vec<(String, TypeExpr)> = info
        .fields()
        .unwrap_or_default()
        .iter()
        .map(|f| (f.name.clone(), f.ty.clone()))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("ID".to_string(), TypeExpr::basic("int")),
            ("Total".to_string(), TypeExpr::basic("float64")),
            ("Kind".to_string(), TypeExpr::basic("string")),
        ]
    );

    let summary = &plan.pairs[1];
    assert!(summary.is_generated_target);
    assert!(summary.unmapped_targets.is_empty());
    Ok(())
}

#[test]
fn test_plan_is_deterministic() -> anyhow::Result<()> {
    let (graph, file) = load()?;
    let (first, first_diagnostics) = plan(&graph, &file);
    let (second, second_diagnostics) = plan(&graph, &file);

    assert_eq!(
        serde_json::to_string(&first)?,
        serde_json::to_string(&second)?
    );
    assert_eq!(first_diagnostics, second_diagnostics);
    Ok(())
}

#[test]
fn test_recursive_types_terminate() -> anyhow::Result<()> {
    let graph = TypeGraph::from_json(
        r#"{
        "types": [
            { "id": { "pkg_path": "a", "name": "Node" }, "kind": "struct",
              "fields": [
                { "name": "Value", "type": { "basic": "int" } },
                { "name": "Next", "type": { "pointer": { "named": { "pkg_path": "a", "name": "Node" } } } }
              ] },
            { "id": { "pkg_path": "b", "name": "Node" }, "kind": "struct",
              "fields": [
                { "name": "Value", "type": { "basic": "int" } },
                { "name": "Next", "type": { "pointer": { "named": { "pkg_path": "b", "name": "Node" } } } }
              ] }
        ]
    }"#,
    )?;
    let file = MappingDsl::parse(
        r"
mappings:
  - source: a.Node
    target: b.Node
",
    )?;

    let (plan, diagnostics) = plan(&graph, &file);
    assert!(!diagnostics.has_errors());
    assert_eq!(plan.pairs.len(), 1);
    let next = mapping(&plan.pairs[0], "Next");
    assert_eq!(next.strategy, ConversionStrategy::PointerNestedCast);
    assert_eq!(plan.pairs[0].nested_pairs, vec![plan.pairs[0].key.clone()]);
    Ok(())
}

#[test]
fn test_duplicate_transform_declaration() -> anyhow::Result<()> {
    let (_, diagnostics) = plan_shop(
        r"
mappings:
  - source: store.Order
    target: wire.Order
transforms:
  - name: Join
    source_type: string
    target_type: string
  - name: Join
    source_type: int
    target_type: string
",
    )?;
    let duplicate = diagnostics
        .errors()
        .find(|d| d.message.contains("duplicate transform declaration 'Join'"))
        .expect("duplicate reported");
    assert_eq!(duplicate.kind, DiagnosticKind::Reference);
    assert_eq!(duplicate.field_path.as_deref(), Some("Join"));
    Ok(())
}

#[test]
fn test_mapping_without_source_is_an_error() -> anyhow::Result<()> {
    let (pairs, diagnostics) = plan_shop(
        r"
mappings:
  - source: store.Order
    target: wire.Order
    fields:
      - target: Label
",
    )?;
    assert!(has_error(&diagnostics, DiagnosticKind::Structural, "no source"));
    assert!(pairs[0].mappings.iter().all(|m| m.target_label() != "Label"));
    Ok(())
}

#[test]
fn test_unsupported_slice_projections() -> anyhow::Result<()> {
    let (pairs, diagnostics) = plan_shop(
        r#"
mappings:
  - source: store.Order
    target: wire.Order
    fields:
      - source: Lines[].Code
        target: Number
      - target: LineCodes[]
        default: '"x"'
      - source: Lines[].Code
        target: Label
        transform: Upper
"#,
    )?;
    let messages: Vec<&str> = diagnostics
        .errors()
        .filter(|d| d.message.starts_with("unsupported slice projection"))
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(messages.len(), 3, "{messages:?}");
    assert!(messages[0].contains("Lines[].Code -> Number"));
    assert!(messages[1].contains("a default cannot fill elements"));
    assert!(messages[2].contains("transform Upper cannot take [] paths"));

    let order = &pairs[0];
    for target in ["LineCodes[]", "Label"] {
        assert!(order.mappings.iter().all(|m| m.target_label() != target));
    }
    Ok(())
}

#[test]
fn test_unexported_source_field_is_reported() -> anyhow::Result<()> {
    let (pairs, diagnostics) = plan_shop(
        r"
mappings:
  - source: store.Order
    target: wire.Order
    fields:
      - source: revision
        target: Number
",
    )?;
    let error = diagnostics
        .errors()
        .find(|d| d.message.contains("unexported"))
        .expect("unexported field reported");
    assert_eq!(error.kind, DiagnosticKind::Structural);
    assert_eq!(error.field_path.as_deref(), Some("revision"));
    assert!(pairs[0]
        .mappings
        .iter()
        .all(|m| m.source_label() != "revision"));
    Ok(())
}

#[test]
fn test_dependent_of_dropped_mapping_is_dropped() -> anyhow::Result<()> {
    let (pairs, diagnostics) = plan_shop(
        r"
mappings:
  - source: store.Order
    target: wire.Order
    fields:
      - source: Number
        target: Currency
        transform: CurrencyOf
        extra:
          - name: tenant
      - source: Subtotal
        target: Label
        transform: convert.FormatMoney
        extra:
          - name: currency
            target: Currency
",
    )?;
    assert!(has_error(&diagnostics, DiagnosticKind::Reference, "undeclared extra 'tenant'"));
    let orphan = diagnostics
        .errors()
        .find(|d| d.message.contains("whose mapping was dropped"))
        .expect("dependent reported");
    assert_eq!(orphan.field_path.as_deref(), Some("Label"));
    assert!(orphan.message.contains("'Currency'"));

    let order = &pairs[0];
    for target in ["Currency", "Label"] {
        assert!(order.mappings.iter().all(|m| m.target_label() != target));
    }
    Ok(())
}

#[test]
fn test_pointer_inside_projection_is_recorded() -> anyhow::Result<()> {
    let graph = TypeGraph::from_json(
        r#"{
        "types": [
            { "id": { "pkg_path": "s", "name": "Order" }, "kind": "struct",
              "fields": [
                { "name": "Lines", "type": { "slice": { "named": { "pkg_path": "s", "name": "Line" } } } }
              ] },
            { "id": { "pkg_path": "s", "name": "Line" }, "kind": "struct",
              "fields": [
                { "name": "Meta", "type": { "pointer": { "named": { "pkg_path": "s", "name": "Meta" } } } }
              ] },
            { "id": { "pkg_path": "s", "name": "Meta" }, "kind": "struct",
              "fields": [ { "name": "Note", "type": { "basic": "string" } } ] },
            { "id": { "pkg_path": "t", "name": "Order" }, "kind": "struct",
              "fields": [
                { "name": "Rows", "type": { "slice": { "named": { "pkg_path": "t", "name": "Row" } } } }
              ] },
            { "id": { "pkg_path": "t", "name": "Row" }, "kind": "struct",
              "fields": [
                { "name": "Meta", "type": { "pointer": { "named": { "pkg_path": "t", "name": "Meta" } } } }
              ] },
            { "id": { "pkg_path": "t", "name": "Meta" }, "kind": "struct",
              "fields": [ { "name": "Text", "type": { "basic": "string" } } ] }
        ]
    }"#,
    )?;
    let file = MappingDsl::parse(
        r"
mappings:
  - source: s.Order
    target: t.Order
    fields:
      - source: Lines[].Meta.Note
        target: Rows[].Meta.Text
",
    )?;

    let (plan, diagnostics) = plan(&graph, &file);
    assert!(!diagnostics.has_errors());
    let rows = mapping(&plan.pairs[0], "Rows[].Meta.Text");
    assert!(rows.source_pointers.is_empty());
    assert!(rows.target_pointers.is_empty());

    let projection = rows.projection.as_ref().expect("projection");
    assert_eq!(projection.source_pointers, vec![FieldPath::field("Meta")]);
    assert_eq!(
        projection.target_pointers,
        vec![(
            FieldPath::field("Meta"),
            TypeExpr::pointer_to(TypeExpr::named("t", "Meta"))
        )]
    );
    Ok(())
}
