mod common;

use std::sync::Arc;

use common::*;
use ion_binary_writer::constants::v1_0::system_symbol_ids;
use ion_binary_writer::{
    IonResult, IonType, IonWriter, ManagedBinaryWriter, ManagedBinaryWriterBuilder, MapCatalog,
    SharedSymbolTable,
};
use rstest::*;

fn output(writer: &ManagedBinaryWriter<Vec<u8>>) -> Vec<u8> {
    writer.output().cloned().unwrap_or_default()
}

fn fruit_catalog() -> IonResult<MapCatalog> {
    let mut catalog = MapCatalog::new();
    catalog.insert_table(SharedSymbolTable::new(
        "fruit",
        1,
        [Some("apple"), Some("banana")],
    )?);
    catalog.insert_table(SharedSymbolTable::new(
        "fruit",
        2,
        [Some("apple"), Some("banana"), Some("cherry")],
    )?);
    Ok(catalog)
}

// Writes `$ion_symbol_table::{imports: [...], symbols: [...]}` as ordinary values.
fn write_symbol_table(
    writer: &mut ManagedBinaryWriter<Vec<u8>>,
    imports: &[(&str, i64, Option<i64>)],
    symbols: &[&str],
) -> IonResult<()> {
    writer.set_annotations(["$ion_symbol_table"])?;
    writer.step_in(IonType::Struct)?;
    if !imports.is_empty() {
        writer.set_field_name("imports")?;
        writer.step_in(IonType::List)?;
        for (name, version, max_id) in imports {
            writer.step_in(IonType::Struct)?;
            writer.set_field_name("name")?;
            writer.write_string(name)?;
            writer.set_field_name("version")?;
            writer.write_i64(*version)?;
            if let Some(max_id) = max_id {
                writer.set_field_name("max_id")?;
                writer.write_i64(*max_id)?;
            }
            writer.step_out()?;
        }
        writer.step_out()?;
    }
    writer.set_field_name("symbols")?;
    writer.step_in(IonType::List)?;
    for symbol in symbols {
        writer.write_string(symbol)?;
    }
    writer.step_out()?;
    writer.step_out()
}

#[test]
fn user_symbol_tables_replace_the_context() -> IonResult<()> {
    let catalog = Arc::new(fruit_catalog()?);
    let mut writer = ManagedBinaryWriterBuilder::new()
        .with_catalog(catalog.clone())
        .build(Vec::new())?;
    writer.write_symbol("before")?;
    write_symbol_table(&mut writer, &[("fruit", 2, Some(3))], &["durian", "elderberry"])?;

    // The user's table is now in effect.
    let view = writer.symbol_table();
    assert_eq!(view.imports().len(), 1);
    assert_eq!(view.sid_for("cherry"), Some(12));
    assert_eq!(view.sid_for("elderberry"), Some(14));
    assert_eq!(view.sid_for("before"), None);

    writer.write_symbol("cherry")?;
    writer.write_symbol("elderberry")?;
    writer.write_symbol(13usize)?;
    writer.finish()?;

    let decoded = decode_stream(&output(&writer), catalog.as_ref())?;
    // No trace of the user's encoding survives as a value.
    assert_eq!(
        decoded.values,
        vec![
            symbol("before"),
            symbol("cherry"),
            symbol("elderberry"),
            symbol("durian")
        ]
    );
    assert_eq!(decoded.ivm_count, 2);
    Ok(())
}

#[test]
fn a_leading_user_symbol_table_needs_no_extra_marker() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    write_symbol_table(&mut writer, &[], &["only"])?;
    writer.write_symbol("only")?;
    writer.finish()?;
    let bytes = output(&writer);
    let decoded = decode_stream(&bytes, &MapCatalog::new())?;
    assert_eq!(decoded.ivm_count, 1);
    assert_eq!(decoded.values, vec![symbol("only")]);
    assert!(bytes.ends_with(&[0x71, 0x0A]));
    Ok(())
}

#[test]
fn user_symbol_table_appends_extend_the_context() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    writer.write_symbol("first")?;
    writer.set_annotations([system_symbol_ids::ION_SYMBOL_TABLE])?;
    writer.step_in(IonType::Struct)?;
    writer.set_field_name(system_symbol_ids::IMPORTS)?;
    writer.write_symbol(system_symbol_ids::ION_SYMBOL_TABLE)?;
    writer.set_field_name(system_symbol_ids::SYMBOLS)?;
    writer.step_in(IonType::List)?;
    writer.write_string("second")?;
    writer.write_string("first")?;
    writer.step_out()?;
    writer.step_out()?;

    assert_eq!(writer.intern("first")?.local_sid(), Some(10));
    assert_eq!(writer.intern("second")?.local_sid(), Some(11));
    writer.write_symbol(11usize)?;
    writer.finish()?;

    let decoded = decode_stream(&output(&writer), &MapCatalog::new())?;
    assert_eq!(decoded.ivm_count, 1);
    assert_eq!(decoded.values, vec![symbol("first"), symbol("second")]);
    Ok(())
}

#[rstest]
#[case::unknown_version(("fruit", 7, Some(4)), &[Some("apple"), Some("banana"), Some("cherry"), None])]
#[case::shorter_max_id(("fruit", 2, Some(1)), &[Some("apple")])]
#[case::unknown_table(("vegetables", 1, Some(2)), &[None, None])]
fn mismatched_imports_are_substituted(
    #[case] import: (&str, i64, Option<i64>),
    #[case] expected: &[Option<&str>],
) -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new()
        .with_catalog(Arc::new(fruit_catalog()?))
        .build(Vec::new())?;
    write_symbol_table(&mut writer, &[import], &[])?;
    let view = writer.symbol_table();
    assert_eq!(view.imported_max_id(), 9 + expected.len());
    for (index, text) in expected.iter().enumerate() {
        assert_eq!(view.text_for(10 + index), *text);
    }
    Ok(())
}

#[test]
fn unresolvable_imports_are_rejected() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    // Without a max_id, an import the catalog does not know cannot be sized.
    assert!(write_symbol_table(&mut writer, &[("missing", 1, None)], &["x"]).is_err());

    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    writer.set_annotations(["$ion_symbol_table"])?;
    writer.step_in(IonType::Struct)?;
    writer.set_field_name("symbols")?;
    assert!(writer.step_in(IonType::Struct).is_err());
    Ok(())
}

#[test]
fn annotated_values_elsewhere_are_left_alone() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    writer.step_in(IonType::List)?;
    writer.set_annotations(["$ion_symbol_table"])?;
    writer.step_in(IonType::Struct)?;
    writer.set_field_name("symbols")?;
    writer.step_in(IonType::List)?;
    writer.write_string("nested")?;
    writer.step_out()?;
    writer.step_out()?;
    writer.step_out()?;
    writer.finish()?;

    let values = decode(&output(&writer))?;
    let nested = Element::from(Value::Struct(vec![(
        Some("symbols".to_owned()),
        list(vec![string("nested")]),
    )]))
    .with_annotations(&["$ion_symbol_table"]);
    assert_eq!(values, vec![list(vec![nested])]);
    Ok(())
}

#[test]
fn utf16_symbol_text_is_captured_and_checked() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
    writer.set_annotations(["$ion_symbol_table"])?;
    writer.step_in(IonType::Struct)?;
    writer.set_field_name("symbols")?;
    writer.step_in(IonType::List)?;
    assert!(writer.write_string_utf16(&[0x0061, 0xD800]).is_err());
    let units: Vec<u16> = "grüße".encode_utf16().collect();
    writer.write_string_utf16(&units)?;
    writer.step_out()?;
    writer.step_out()?;

    assert_eq!(writer.intern("grüße")?.local_sid(), Some(10));
    writer.write_symbol(10usize)?;
    writer.finish()?;
    let decoded = decode_stream(&output(&writer), &MapCatalog::new())?;
    assert_eq!(decoded.values, vec![symbol("grüße")]);
    Ok(())
}
