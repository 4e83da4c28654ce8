// Property-based tests for reconciliation and merge invariants.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use sheetmerge_core::{Table, Value};
use sheetmerge_merge::export::ExportSummaryBuilder;
use sheetmerge_merge::{
    reconcile, DataQualityValidator, MergeEngine, MergeError, MergeMode, MergeRequest,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const POOL: &[&str] = &["id", "Name", "amount", "Created At", "status", "notes"];

/// Arbitrary value: mostly numeric, sometimes text, sometimes null.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (-1000i64..1000).prop_map(Value::Int),
        1 => "[a-z]{0,6}".prop_map(Value::Str),
        1 => Just(Value::Null),
    ]
}

fn arb_table(names: Vec<String>) -> impl Strategy<Value = Table> {
    let width = names.len();
    (0usize..6).prop_flat_map(move |rows| {
        let names = names.clone();
        prop::collection::vec(prop::collection::vec(arb_value(), rows), width).prop_map(
            move |cols| {
                Table::from_values(names.iter().cloned().zip(cols).collect())
                    .expect("generated table is valid")
            },
        )
    })
}

/// Ordered subset of the name pool, at least one name.
fn arb_names() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(POOL.to_vec(), 1..=POOL.len())
        .prop_map(|names| names.into_iter().map(str::to_string).collect())
}

/// Several tables sharing one schema.
fn arb_same_schema() -> impl Strategy<Value = Vec<Table>> {
    (arb_names(), 1usize..5).prop_flat_map(|(names, n)| prop::collection::vec(arb_table(names), n))
}

/// Several tables, each with its own schema.
fn arb_any_schema() -> impl Strategy<Value = Vec<Table>> {
    prop::collection::vec(arb_names().prop_flat_map(arb_table), 2..5)
}

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("file{i}")).collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn strict_merge_preserves_rows_and_adds_one_column(tables in arb_same_schema()) {
        let request = MergeRequest::new(tables.clone(), labels(tables.len()), MergeMode::Strict);
        let result = MergeEngine::default().merge(&request).unwrap();

        let expected_rows: usize = tables.iter().map(Table::row_count).sum();
        prop_assert_eq!(result.table.row_count(), expected_rows);
        prop_assert_eq!(result.table.column_count(), tables[0].column_count() + 1);
        prop_assert_eq!(result.sources.iter().map(|s| s.rows).sum::<usize>(), expected_rows);

        // Rows appear in source order, tagged with their own label
        let source = result.table.column("source").unwrap();
        let mut offset = 0;
        for (idx, table) in tables.iter().enumerate() {
            for row in 0..table.row_count() {
                prop_assert_eq!(&source.values()[offset + row], &Value::Str(format!("file{idx}")));
            }
            offset += table.row_count();
        }
    }

    #[test]
    fn single_table_merge_only_adds_provenance(
        names in arb_names(),
        mode in prop_oneof![Just(MergeMode::Strict), Just(MergeMode::Intersection)],
    ) {
        let table =
            Table::from_values(names.iter().map(|n| (n.clone(), vec![Value::Int(1)])).collect())
                .unwrap();
        let request = MergeRequest::new(vec![table.clone()], vec!["only".into()], mode);
        let result = MergeEngine::default().merge(&request).unwrap();

        let without_source = result.table.select(&table.column_names()).unwrap();
        prop_assert_eq!(without_source, table);
        let provenance = result.table.column("source").unwrap().values();
        prop_assert!(provenance.iter().all(|v| v == &Value::from("only")));
    }

    #[test]
    fn strict_mismatch_iff_sequences_differ(tables in arb_any_schema()) {
        let first = tables[0].column_names();
        let all_equal = tables.iter().all(|t| t.column_names() == first);
        let result = reconcile(&tables, MergeMode::Strict);
        match result {
            Ok(_) => prop_assert!(all_equal),
            Err(MergeError::SchemaMismatch { .. }) => prop_assert!(!all_equal),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn intersection_is_deterministic_and_shared(tables in arb_any_schema()) {
        let first = reconcile(&tables, MergeMode::Intersection);
        let second = reconcile(&tables, MergeMode::Intersection);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(&a.columns, &b.columns);
                for (table, projection) in tables.iter().zip(&a.projections) {
                    let projected = projection.apply(table).unwrap();
                    let names: Vec<String> =
                        projected.column_names().iter().map(|s| s.to_string()).collect();
                    prop_assert_eq!(&names, &a.columns);
                }
            }
            (Err(MergeError::NoCommonColumns { .. }), Err(MergeError::NoCommonColumns { .. })) => {}
            (a, b) => {
                prop_assert!(false, "inconsistent results: {:?} / {:?}", a.is_ok(), b.is_ok())
            }
        }
    }

    #[test]
    fn export_estimate_is_monotonic(tables in arb_same_schema()) {
        let merged = MergeEngine::default()
            .merge(&MergeRequest::new(tables.clone(), labels(tables.len()), MergeMode::Strict))
            .unwrap()
            .table;
        let names: Vec<String> = merged.column_names().iter().map(|s| s.to_string()).collect();

        // More columns never shrink the estimate
        let mut previous = 0;
        for k in 1..=names.len() {
            let summary = ExportSummaryBuilder.summarize(&merged, &names[..k]).unwrap();
            prop_assert!(summary.estimated_size_bytes >= previous);
            previous = summary.estimated_size_bytes;
        }

        // More rows never shrink the estimate
        let mut previous = 0;
        for rows in 0..=merged.row_count() {
            let head = merged.head(rows);
            let bytes = ExportSummaryBuilder.summarize(&head, &names).unwrap().estimated_size_bytes;
            prop_assert!(bytes >= previous);
            previous = bytes;
        }
    }

    #[test]
    fn null_percentages_stay_in_range(tables in arb_same_schema()) {
        let report = DataQualityValidator.summarize(&tables[0]);
        prop_assert!((0.0..=100.0).contains(&report.null_percentage));
        for column in &report.columns {
            prop_assert!((0.0..=100.0).contains(&column.null_percentage));
            prop_assert!(column.unique_count <= tables[0].row_count());
        }
    }
}
