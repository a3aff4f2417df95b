use eer_costs::aggregator::{pair_inputs, MultiScenarioAggregator, ScenarioInput};
use eer_costs::categories::StandardCategory;
use eer_costs::export::{self, ExportFormat};
use eer_costs::extractor::Dimension;
use eer_costs::grid::AutoLoader;
use eer_costs::{ExtractError, ExtractionConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// JSON export of one report page: section list, then one block per section
fn report_json(sections: &[(&str, &[(&str, &str)])]) -> Value {
    let mut cells = vec![
        json!({"row": 1, "column": 1, "value": "CAPITAL INVESTMENT PER PROCESS SECTION (2024 prices)"}),
        json!({"row": 2, "column": 1, "value": "Section"}),
    ];
    let mut row = 3;
    for (name, _) in sections {
        cells.push(json!({"row": row, "column": 1, "value": name}));
        row += 1;
    }
    cells.push(json!({"row": row, "column": 1, "value": "Total"}));
    row += 2;
    for (name, rows) in sections {
        cells.push(json!({"row": row, "column": 1, "value": name}));
        row += 1;
        for (label, value) in rows.iter() {
            cells.push(json!({"row": row, "column": 1, "value": label}));
            cells.push(json!({"row": row, "column": 4, "value": value}));
            row += 1;
        }
    }
    json!({"Table p. 1": {"cells": cells, "max_row": row}})
}

fn write_report(dir: &Path, file_name: &str, sections: &[(&str, &[(&str, &str)])]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, report_json(sections).to_string()).unwrap();
    path
}

fn baseline_and_optimized(dir: &Path) -> Vec<ScenarioInput> {
    let baseline = write_report(
        dir,
        "baseline.json",
        &[("Fermentation", &[("Labor", "1000"), ("Utilities", "500")])],
    );
    let optimized = write_report(
        dir,
        "optimized.json",
        &[
            ("Fermentation", &[("Labor", "800"), ("Utilities", "500")]),
            ("Purification", &[("Labor", "200")]),
        ],
    );
    pair_inputs(
        &[baseline, optimized],
        &["Baseline".to_string(), "Optimized".to_string()],
    )
    .unwrap()
}

#[test]
fn test_two_scenarios_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = baseline_and_optimized(dir.path());

    let outcome = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap();
    let table = &outcome.table;

    assert!(!outcome.is_partial());
    assert_eq!(table.scenarios, vec!["Baseline", "Optimized"]);
    assert_eq!(table.sections, vec!["Fermentation", "Purification"]);
    assert_eq!(table.value("Baseline", "Fermentation", StandardCategory::Labor), 1000.0);
    assert_eq!(table.value("Optimized", "Fermentation", StandardCategory::Labor), 800.0);
    assert_eq!(table.value("Baseline", "Purification", StandardCategory::Labor), 0.0);
    assert_eq!(
        table.value("Optimized", "Purification", StandardCategory::Utilities),
        0.0
    );

    for scenario in &table.scenarios {
        for section in &table.sections {
            assert_eq!(table.values[scenario][section].len(), StandardCategory::ALL.len());
        }
    }
}

#[test]
fn test_aggregation_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = baseline_and_optimized(dir.path());
    let aggregator = MultiScenarioAggregator::default();

    let first = aggregator.aggregate_files(&inputs, &AutoLoader::new()).unwrap();
    let second = aggregator.aggregate_files(&inputs, &AutoLoader::new()).unwrap();

    assert_eq!(first.table, second.table);
    assert_eq!(
        export::to_json(&first.table).unwrap(),
        export::to_json(&second.table).unwrap()
    );
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn test_sections_ordered_by_total_across_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_report(
        dir.path(),
        "a.json",
        &[("Upstream", &[("Labor", "100")]), ("Downstream", &[("Labor", "50")])],
    );
    let b = write_report(dir.path(), "b.json", &[("Downstream", &[("Facility", "400")])]);
    let inputs = pair_inputs(&[a, b], &[]).unwrap();

    let table = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap()
        .table;

    assert_eq!(table.scenarios, vec!["a", "b"]);
    assert_eq!(table.sections, vec!["Downstream", "Upstream"]);
    let totals: Vec<f64> = table.sections.iter().map(|s| table.section_total(s)).collect();
    assert!(totals.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_missing_file_is_partial_success() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_report(dir.path(), "good.json", &[("Fermentation", &[("Labor", "10")])]);
    let missing = dir.path().join("missing.json");
    let inputs = pair_inputs(&[good, missing], &[]).unwrap();

    let outcome = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap();

    assert!(outcome.is_partial());
    assert_eq!(outcome.table.scenarios, vec!["good"]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].name, "missing");
}

#[test]
fn test_nothing_loads_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    let inputs = pair_inputs(&[broken, dir.path().join("missing.json")], &[]).unwrap();

    let err = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoUsableScenarios(2)));
}

#[test]
fn test_label_count_mismatch_is_a_usage_error() {
    let files = vec![PathBuf::from("a.json"), PathBuf::from("b.json")];
    let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    assert!(matches!(pair_inputs(&files, &labels), Err(ExtractError::Usage(_))));
    assert!(matches!(pair_inputs(&[], &[]), Err(ExtractError::Usage(_))));
}

#[test]
fn test_per_unit_dimension_reads_its_own_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("per_unit.json");
    let cells = json!([
        {"row": 1, "column": 1, "value": "CAPITAL INVESTMENT PER PROCESS SECTION (2024 prices)"},
        {"row": 2, "column": 1, "value": "Section"},
        {"row": 3, "column": 1, "value": "Fermentation"},
        {"row": 4, "column": 1, "value": "Total"},
        {"row": 6, "column": 1, "value": "Fermentation"},
        {"row": 7, "column": 1, "value": "Labor"},
        {"row": 7, "column": 2, "value": 1.25},
        {"row": 7, "column": 4, "value": "1,000.00"},
        {"row": 7, "column": 5, "value": 40}
    ]);
    fs::write(&path, json!({"cells": cells}).to_string()).unwrap();
    let inputs = vec![ScenarioInput::labelled(&path, "Only")];

    let aggregator = MultiScenarioAggregator::default().with_dimension(Dimension::PerUnit);
    let table = aggregator.aggregate_files(&inputs, &AutoLoader::new()).unwrap().table;
    assert_eq!(table.value("Only", "Fermentation", StandardCategory::Labor), 1.25);

    let aggregator = MultiScenarioAggregator::default().with_dimension(Dimension::Percentage);
    let table = aggregator.aggregate_files(&inputs, &AutoLoader::new()).unwrap().table;
    assert_eq!(table.value("Only", "Fermentation", StandardCategory::Labor), 40.0);
}

#[test]
fn test_csv_export_is_long_format() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = baseline_and_optimized(dir.path());
    let table = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap()
        .table;

    let out = dir.path().join("out").join("comparison.csv");
    export::write_comparison(&table, &out, ExportFormat::Csv).unwrap();
    let csv = fs::read_to_string(&out).unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "scenario,section,category,value");
    assert_eq!(lines.len(), 1 + 2 * 2 * 7);
    assert!(lines
        .iter()
        .any(|l| l.starts_with("Optimized,Purification,Labor (OPEX),200")));
}

#[test]
fn test_json_export_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = baseline_and_optimized(dir.path());
    let table = MultiScenarioAggregator::default()
        .aggregate_files(&inputs, &AutoLoader::new())
        .unwrap()
        .table;

    let out = dir.path().join("comparison.json");
    export::write_comparison(&table, &out, ExportFormat::Json).unwrap();
    assert_eq!(export::read_comparison(&out).unwrap(), table);
}

#[test]
fn test_config_page_key_and_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let report = report_json(&[("Fermentation", &[("Operators", "300")])]);
    let page = report["Table p. 1"].clone();
    let path = dir.path().join("report.json");
    fs::write(&path, json!({"Sheet A": page}).to_string()).unwrap();

    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"page_key": "Sheet A", "category_aliases": {"Operators": "Labor (OPEX)"}}"#,
    )
    .unwrap();
    let config = ExtractionConfig::resolve(Some(config_path.as_path())).unwrap();

    let outcome = MultiScenarioAggregator::new(config.extractor())
        .aggregate_files(&[ScenarioInput::new(&path)], &config.loader())
        .unwrap();
    assert_eq!(
        outcome.table.value("report", "Fermentation", StandardCategory::Labor),
        300.0
    );
    assert!(outcome.scenarios[0].audit.is_clean());
}

#[test]
fn test_report_blocks_after_sections_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut report = report_json(&[("Fermentation", &[("Labor", "1000")])]);
    let page = report["Table p. 1"].as_object_mut().unwrap();
    let cells = page["cells"].as_array_mut().unwrap();
    for (row, column, value) in [
        (20, 1, "8. ANNUAL OPERATING COST (2024 prices)"),
        (21, 1, "Cost Item"),
        (21, 4, "$/year"),
        (22, 1, "Labor-Dependent"),
        (22, 4, "2,500,000"),
        (23, 1, "Facility-Dependent"),
        (23, 4, "750,000"),
        (24, 1, "TOTAL"),
        (24, 4, "3,250,000"),
    ] {
        cells.push(json!({"row": row, "column": column, "value": value}));
    }
    page["max_row"] = json!(24);
    let path = dir.path().join("with_aoc.json");
    fs::write(&path, report.to_string()).unwrap();

    let table = MultiScenarioAggregator::default()
        .aggregate_files(&[ScenarioInput::new(&path)], &AutoLoader::new())
        .unwrap()
        .table;
    assert_eq!(table.value("with_aoc", "Fermentation", StandardCategory::Labor), 1000.0);
    assert_eq!(
        table.value("with_aoc", "Fermentation", StandardCategory::FacilityDependent),
        0.0
    );
    assert_eq!(table.section_total("Fermentation"), 1000.0);
}

#[test]
fn test_extract_with_explicit_spans() {
    let grid = eer_costs::CellGrid::from_rows(vec![
        vec!["Fermentation area", "", "", ""],
        vec!["Waste Trtmt/Disp", "", "", "12,345.00"],
        vec!["", "", "", ""],
        vec!["Labor", "", "", "500"],
    ])
    .unwrap();
    let spans = vec![eer_costs::sections::Section {
        name: "Fermentation".to_string(),
        start_row: 1,
        end_row: 3,
    }];

    let table = eer_costs::CostExtractor::new().extract(&grid, &spans, Dimension::Yearly);
    assert_eq!(
        table.value("Fermentation", StandardCategory::WastewaterTreatment),
        12345.0
    );
    assert_eq!(table.value("Fermentation", StandardCategory::Labor), 0.0);
}
