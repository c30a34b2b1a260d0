use sql_script_udf::testutil::{column_refs, expand_transpose, mytable_rows, MemoryCatalog};
use sql_script_udf::{
    squery, AggregationExpression, AggregatorKind, Context, Expression, MacroParserConfig, ScriptDialect, Value,
};

fn rewrite_and_register(sql: &str, dialect: ScriptDialect, catalog: &mut MemoryCatalog) -> String {
    squery(sql, MacroParserConfig::new(0, dialect), catalog).expect("rewrite should succeed")
}

#[test]
fn scalar_macro_runs_per_row_in_js() {
    let mut catalog = MemoryCatalog::new();
    let sql = rewrite_and_register(
        "SELECT <? @{mytable.name} + ' <3' ?> FROM mytable",
        ScriptDialect::Js,
        &mut catalog,
    );
    assert_eq!(sql, "SELECT _auto_1_udf_(mytable.name) FROM mytable");

    let (_, descriptors) = sql_script_udf::parse_macros(
        "SELECT <? @{mytable.name} + ' <3' ?> FROM mytable",
        MacroParserConfig::new(0, ScriptDialect::Js),
    )
    .unwrap();
    let params: Vec<String> = vec!["mytable.name".to_string()];
    assert_eq!(descriptors[0].id, "_auto_1_udf_");

    let scriptable = catalog.call("_auto_1_udf_", column_refs(&params)).unwrap();
    let ctx = Context::default();
    let rows = mytable_rows();
    let result = Expression::eval(&scriptable, &ctx, &rows[0]).unwrap();
    assert_eq!(result, Value::from("John Doe <3"));
}

#[test]
fn list_aggregator_without_flatten_collects_one_entry_per_row() {
    let mut catalog = MemoryCatalog::new();
    let sql = rewrite_and_register(
        "SELECT <?L__@ @{mytable.phone_numbers} ?> FROM mytable",
        ScriptDialect::Expr,
        &mut catalog,
    );
    assert_eq!(sql, "SELECT fold_auto_1_udf_(mytable.phone_numbers) FROM mytable");

    let scriptable =
        catalog.call("fold_auto_1_udf_", column_refs(&["mytable.phone_numbers".to_string()])).unwrap();
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    let Value::Array(entries) = result else { panic!("expected array") };
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3], Value::Array(vec![Value::from("555-0200"), Value::from("555-0201")]));
}

#[test]
fn list_aggregator_with_flatten_splices_phone_numbers() {
    let mut catalog = MemoryCatalog::new();
    rewrite_and_register(
        "SELECT <?LFT@ @{mytable.phone_numbers} ?> FROM mytable",
        ScriptDialect::Expr,
        &mut catalog,
    );

    let scriptable =
        catalog.call("fold_auto_1_udf_", column_refs(&["mytable.phone_numbers".to_string()])).unwrap();
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![
            Value::from("555-0100"),
            Value::from("555-0200"),
            Value::from("555-0201"),
        ])
    );
}

#[test]
fn set_aggregator_deduplicates_repeated_names() {
    let mut catalog = MemoryCatalog::new();
    rewrite_and_register("SELECT <?S__@ @{mytable.name} ?> FROM mytable", ScriptDialect::Expr, &mut catalog);

    let scriptable = catalog.call("fold_auto_1_udf_", column_refs(&["mytable.name".to_string()])).unwrap();
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let Value::Array(mut names) = scriptable.finalize(&ctx, &mut buffer).unwrap() else { panic!("expected array") };
    names.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    assert_eq!(names, vec![Value::from("Evil Bob"), Value::from("Jane Doe"), Value::from("John Doe")]);
}

#[test]
fn generic_aggregator_folds_a_running_factorial() {
    let mut catalog = MemoryCatalog::new();
    let sql = rewrite_and_register(
        "SELECT <?AGG@ [0,1] # $_[0]+=1; $_[1]*=$_[0]; $_ ?> FROM mytable",
        ScriptDialect::Js,
        &mut catalog,
    );
    assert_eq!(sql, "SELECT fold_auto_1_udf_() FROM mytable");

    let scriptable = catalog.call("fold_auto_1_udf_", Vec::new()).unwrap();
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    // Four rows: counter reaches 4, factorial reaches 4! = 24.
    assert_eq!(result, Value::Array(vec![Value::Int(4), Value::Int(24)]));
}

#[test]
fn repeated_placeholder_resolves_to_a_single_positional_argument() {
    // Regression case: `@{mytable.phone_numbers}` used twice in one body
    // must still only appear once in the synthesized call's argument list.
    let (sql, descriptors) = sql_script_udf::parse_macros(
        "SELECT <? $x = @{mytable.phone_numbers}; $y = []; $y.concat($x); $y ?> FROM mytable",
        MacroParserConfig::new(0, ScriptDialect::Js),
    )
    .unwrap();
    assert_eq!(sql, "SELECT _auto_1_udf_(mytable.phone_numbers) FROM mytable");
    assert_eq!(descriptors.len(), 1);
}

#[test]
fn merge_combines_two_partial_list_buffers() {
    let mut catalog = MemoryCatalog::new();
    rewrite_and_register("SELECT <?L__@ @{mytable.name} ?> FROM mytable", ScriptDialect::Expr, &mut catalog);
    let scriptable = catalog.call("fold_auto_1_udf_", column_refs(&["mytable.name".to_string()])).unwrap();
    let ctx = Context::default();

    let rows = mytable_rows();
    let mut left = scriptable.new_buffer().unwrap();
    scriptable.update(&ctx, &mut left, &rows[0]).unwrap();
    scriptable.update(&ctx, &mut left, &rows[1]).unwrap();

    let mut right = scriptable.new_buffer().unwrap();
    scriptable.update(&ctx, &mut right, &rows[2]).unwrap();
    scriptable.update(&ctx, &mut right, &rows[3]).unwrap();

    scriptable.merge(&ctx, &mut left, &right).unwrap();
    let result = scriptable.finalize(&ctx, &mut left).unwrap();
    let Value::Array(names) = result else { panic!("expected array") };
    assert_eq!(names.len(), 3);
}

#[test]
fn generic_aggregator_folds_a_mapping_seed() {
    let mut catalog = MemoryCatalog::new();
    let sql = rewrite_and_register(
        "SELECT <?AGG@ x={'i':0,'f':1} # $_.i+=1; $_.f*=$_.i; $_ ?> FROM mytable",
        ScriptDialect::Js,
        &mut catalog,
    );
    assert_eq!(sql, "SELECT fold_auto_1_udf_() FROM mytable");

    let scriptable = catalog.call("fold_auto_1_udf_", Vec::new()).unwrap();
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    let map = result.as_map().expect("expected a map");
    assert_eq!(map.get("i"), Some(&Value::Int(4)));
    assert_eq!(map.get("f"), Some(&Value::Int(24)));
}

#[test]
fn list_aggregator_collects_one_mapping_per_row() {
    let mut catalog = MemoryCatalog::new();
    let sql = rewrite_and_register(
        "SELECT <?L__@ ({'n':@{mytable.name},'m':@{mytable.email}}) ?> FROM mytable",
        ScriptDialect::Js,
        &mut catalog,
    );
    assert_eq!(
        sql,
        "SELECT fold_auto_1_udf_(mytable.name, mytable.email) FROM mytable"
    );

    let params = vec!["mytable.name".to_string(), "mytable.email".to_string()];
    let scriptable = catalog.call("fold_auto_1_udf_", column_refs(&params)).unwrap();
    assert_eq!(scriptable.aggregator_kind(), AggregatorKind::List);
    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    let Value::Array(entries) = result else { panic!("expected array") };
    assert_eq!(entries.len(), 4);
    let first = entries[0].as_map().expect("expected a map entry");
    assert_eq!(first.get("n"), Some(&Value::from("John Doe")));
    assert_eq!(first.get("m"), Some(&Value::from("john@example.com")));
}

#[test]
fn list_aggregator_with_transpose_exposes_the_flag_for_row_expansion() {
    let mut catalog = MemoryCatalog::new();
    rewrite_and_register(
        "SELECT <?L_T@ ({'n':@{mytable.name},'m':@{mytable.email}}) ?> FROM mytable",
        ScriptDialect::Js,
        &mut catalog,
    );

    let params = vec!["mytable.name".to_string(), "mytable.email".to_string()];
    let scriptable = catalog.call("fold_auto_1_udf_", column_refs(&params)).unwrap();
    assert!(scriptable.transpose());

    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    assert_eq!(expand_transpose(result).len(), 4);
}

#[test]
fn set_aggregator_with_transpose_exposes_the_flag_for_row_expansion() {
    let mut catalog = MemoryCatalog::new();
    rewrite_and_register("SELECT <?S_T@ @{mytable.name} ?> FROM mytable", ScriptDialect::Expr, &mut catalog);

    let scriptable = catalog.call("fold_auto_1_udf_", column_refs(&["mytable.name".to_string()])).unwrap();
    assert!(scriptable.transpose());

    let ctx = Context::default();
    let mut buffer = scriptable.new_buffer().unwrap();
    for row in mytable_rows() {
        scriptable.update(&ctx, &mut buffer, &row).unwrap();
    }
    let result = scriptable.finalize(&ctx, &mut buffer).unwrap();
    assert_eq!(expand_transpose(result).len(), 3);
}
