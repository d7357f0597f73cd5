use log::{debug, info, warn};

use rescore_stats::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::rescore::config_reader::*;
use crate::rescore::io_common::{simplify_file_name, Table};
use crate::rescore::session::{AdminGate, Provider, Session, SourceSettings};

mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod render;
mod session;

/// One header row by default.
pub const DEFAULT_FIRST_DATA_ROW: usize = 2;
pub const DEFAULT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RescoreError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading the Excel workbook"))]
    OpeningExcel { source: calamine::XlsxError },
    #[snafu(display("The workbook does not contain any worksheet"))]
    EmptyWorkbook {},
    #[snafu(display("Worksheet {name} not found"))]
    MissingWorksheet { name: String },
    #[snafu(display(
        "The workbook has several worksheets, the worksheet name must be provided: {names:?}"
    ))]
    AmbiguousWorksheet { names: Vec<String> },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("{name} does not contain any data row"))]
    EmptyTable { name: String },
    #[snafu(display(
        "The table has {width} columns, but the layout uses column {column} ({name})"
    ))]
    TooFewColumns {
        width: usize,
        column: usize,
        name: String,
    },
    #[snafu(display("Unknown input type {input_type}"))]
    UnknownProvider { input_type: String },
    #[snafu(display("Error opening {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Cannot read a column index from {content}"))]
    ParsingColumnIndex { content: String },
    #[snafu(display("Invalid layout"))]
    Layout { source: AggregationErrors },
    #[snafu(display("Access denied: the admin password does not match"))]
    AccessDenied {},
    #[snafu(display("Aggregation failed"))]
    Aggregation { source: AggregationErrors },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RescoreResult<T> = Result<T, RescoreError>;

fn read_table(bytes: &[u8], settings: &SourceSettings) -> RescoreResult<Table> {
    match settings.provider {
        Provider::Excel => io_excel::read_excel_table(
            bytes,
            &settings.excel_worksheet_name,
            settings.first_data_row,
        ),
        Provider::Csv => io_csv::read_csv_table(bytes, settings.first_data_row),
    }
}

/// Builds the records of one part from the rows whose part column matches.
fn extract_records(table: &Table, layout: &ColumnLayout, part: &PartColumns) -> Vec<Record> {
    let part_name = part.layout.part();
    let mut res: Vec<Record> = Vec::new();
    for ridx in 0..table.rows.len() {
        let row_part = table.cell(ridx, layout.part).as_label();
        if row_part.as_deref() != Some(part_name) {
            continue;
        }
        let scores = |col: fn(&DimensionColumns) -> usize| -> Vec<Score> {
            part.columns
                .iter()
                .map(|dc| table.cell(ridx, col(dc)).as_score())
                .collect()
        };
        let r = Record {
            part: part_name.to_string(),
            scorer1_id: table.cell(ridx, layout.scorer1_id).as_label(),
            scorer2_id: table.cell(ridx, layout.scorer2_id).as_label(),
            rescore_flag: table.cell(ridx, layout.rescore).as_score(),
            final_scores: scores(|dc| dc.final_score),
            scorer1_scores: scores(|dc| dc.scorer1),
            scorer2_scores: scores(|dc| dc.scorer2),
            ai_scores: scores(|dc| dc.ai),
        };
        debug!("extract_records: row {:?}: {:?}", ridx, r);
        res.push(r);
    }
    info!(
        "extract_records: part {:?}: {:?} records out of {:?} rows",
        part_name,
        res.len(),
        table.rows.len()
    );
    res
}

fn counts_to_json(counts: &[(String, u64)]) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (name, count) in counts.iter() {
        m.insert(name.clone(), json!(count));
    }
    JSValue::Object(m)
}

fn part_summary_to_json(ps: &PartSummary) -> JSValue {
    let scorers: Vec<JSValue> = ps
        .scorers
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            json!({
                "sNo": idx + 1,
                "scorerId": s.scorer_id,
                "totalScored": s.total_scored,
                "totalRescored": s.total_rescored,
                "rescoringPct": s.rescoring_pct,
                "total": counts_to_json(&s.compared),
                "incorrect": counts_to_json(&s.incorrect),
            })
        })
        .collect();
    json!({
        "part": ps.part,
        "humanScorers": scorers,
        "ai": {
            "totalScored": ps.ai.total_scored,
            "totalRescored": ps.ai.total_rescored,
            "rescoringPct": ps.ai.rescoring_pct,
            "total": counts_to_json(&ps.ai.compared),
            "incorrect": counts_to_json(&ps.ai.incorrect),
        }
    })
}

fn build_summary_js(
    analysis_name: &str,
    layout: &ColumnLayout,
    rules: &AggregationRules,
    summaries: &[PartSummary],
) -> JSValue {
    let ai_scope = match rules.ai_scope {
        AiScope::MissingSecondScore => "missingSecondScore",
        AiScope::AllRecords => "allRecords",
    };
    let missing_final = match rules.missing_final {
        MissingFinalPolicy::Skip => "skip",
        MissingFinalPolicy::Disagree => "disagree",
    };
    let results: Vec<JSValue> = summaries.iter().map(part_summary_to_json).collect();
    json!({
        "config": {
            "analysis": analysis_name,
            "layoutVersion": layout.version,
            "rescoreSentinel": rules.rescore_sentinel,
            "aiScope": ai_scope,
            "missingFinalValue": missing_final,
        },
        "results": results
    })
}

// Paths in the configuration are relative to the configuration file.
fn resolve_path(root: &Option<PathBuf>, p: &str) -> String {
    match root {
        Some(r) if Path::new(p).is_relative() => r.join(p).display().to_string(),
        _ => p.to_string(),
    }
}

/// Loads the sheet, runs the aggregation on every part and outputs the results.
pub fn run_analysis(args: &Args) -> RescoreResult<()> {
    let config: Option<RescoreConfig> = match &args.config {
        Some(p) => Some(read_config(p)?),
        None => None,
    };
    let root: Option<PathBuf> = args
        .config
        .as_ref()
        .and_then(|p| Path::new(p).parent().map(|x| x.to_path_buf()));
    let source: Option<FileSource> = config.as_ref().and_then(|c| c.source.clone());

    let input_path: String = match (&args.input, &source) {
        (Some(p), _) => p.clone(),
        (None, Some(fs)) => resolve_path(&root, &fs.file_path),
        (None, None) => {
            whatever!("No input file: use --input or provide a source in the configuration")
        }
    };

    let provider = match (&args.input_type, source.as_ref().and_then(|s| s.provider.clone())) {
        (Some(x), _) => Provider::parse(x)?,
        (None, Some(x)) => Provider::parse(&x)?,
        (None, None) => Provider::from_path(&input_path),
    };
    let settings = SourceSettings {
        provider,
        excel_worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or_else(|| source.as_ref().and_then(|s| s.excel_worksheet_name.clone())),
        first_data_row: match &source {
            Some(s) => s.first_data_row_index()?,
            None => DEFAULT_FIRST_DATA_ROW,
        },
    };

    let layout = match config.as_ref().and_then(|c| c.layout.as_ref()) {
        Some(lc) => ColumnLayout::from_config(lc)?,
        None => ColumnLayout::builtin()?,
    };
    info!("Using column layout version {}", layout.version);

    let mut rules = read_rules(&config.as_ref().and_then(|c| c.rules.clone()))?;
    if let Some(s) = &args.ai_scope {
        rules.ai_scope = parse_ai_scope(s)?;
    }
    if let Some(s) = &args.missing_final {
        rules.missing_final = parse_missing_final(s)?;
    }
    info!("rules: {:?}", rules);

    let secret_env = config
        .as_ref()
        .and_then(|c| c.admin.as_ref())
        .and_then(|a| a.secret_env.clone())
        .unwrap_or_else(|| DEFAULT_SECRET_ENV.to_string());
    let mut session = Session::new(AdminGate::from_env(&secret_env));

    let bytes = fs::read(&input_path).context(OpeningFileSnafu {
        path: input_path.clone(),
    })?;
    let name = simplify_file_name(&input_path);
    let table = session.upload(args.password.as_deref(), &name, &bytes, &settings)?;
    layout.check_width(table.width)?;

    let parts: Vec<&PartColumns> = match &args.part {
        Some(names) => {
            for n in names.iter() {
                if !layout.parts.iter().any(|p| p.layout.part() == n) {
                    whatever!("Part {:?} is not defined in the layout", n);
                }
            }
            layout
                .parts
                .iter()
                .filter(|p| names.iter().any(|n| n == p.layout.part()))
                .collect()
        }
        None => layout.parts.iter().collect(),
    };

    let mut summaries: Vec<PartSummary> = Vec::new();
    for p in parts {
        let records = extract_records(&table, &layout, p);
        let summary = run_part_summary(&records, &p.layout, &rules).context(AggregationSnafu {})?;
        println!("{}", render::render_part(&summary));
        summaries.push(summary);
    }

    let analysis_name = config
        .as_ref()
        .map(|c| c.output_settings.analysis_name.clone())
        .unwrap_or(name);
    let result_js = build_summary_js(&analysis_name, &layout, &rules, &summaries);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path: Option<String> = match (&args.out, &config) {
        (Some(o), _) => Some(o.clone()),
        (None, Some(c)) => c.output_settings.output_directory.as_ref().map(|d| {
            resolve_path(&root, &format!("{}/{}_summary.json", d, c.output_settings.analysis_name))
        }),
        (None, None) => None,
    };
    match out_path.as_deref() {
        Some("stdout") => {
            println!("{}", pretty_js_stats);
        }
        Some(p) => {
            info!("Writing summary to {}", p);
            fs::write(p, &pretty_js_stats).context(WritingOutputSnafu { path: p })?;
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
        info!("The summary matches the reference {}", summary_p);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rescore::io_common::Cell;
    use tempfile::tempdir;

    // A sheet with the part in column A, ids in B and C, the rescore flag in D
    // and the scores of TA1 and TA2 in E..L.
    const SHEET: &str = "\
part,id1,id2,flag,f1,f2,s1a,s1b,s2a,s2b,ai1,ai2
A,X,Y,12,5,5,5,4,5,5,5,5
A,X,,,5,5,4,5,,,3,5
A,Y,X,,5,5,5,5,5,5,5,5
B,Z,,,1,1,1,1,,,1,1
";

    fn small_layout() -> ColumnLayout {
        let lc: LayoutConfig = serde_json::from_value(json!({
            "version": "t1",
            "partColumnIndex": "A",
            "scorer1IdColumnIndex": "B",
            "scorer2IdColumnIndex": "C",
            "rescoreColumnIndex": "D",
            "parts": [{
                "name": "A",
                "dimensions": [
                    {"name": "TA1", "final": "E", "scorer1": "G", "scorer2": "I", "ai": "K"},
                    {"name": "TA2", "final": "F", "scorer1": "H", "scorer2": "J", "ai": "L"}
                ]
            }]
        }))
        .unwrap();
        ColumnLayout::from_config(&lc).unwrap()
    }

    fn sheet() -> Table {
        io_csv::read_csv_table(SHEET.as_bytes(), DEFAULT_FIRST_DATA_ROW).unwrap()
    }

    #[test]
    fn records_from_sheet() {
        let layout = small_layout();
        let table = sheet();
        assert!(layout.check_width(table.width).is_ok());
        let records = extract_records(&table, &layout, &layout.parts[0]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].scorer1_id, Some("X".to_string()));
        assert_eq!(records[0].rescore_flag, Some(12.0));
        assert_eq!(records[0].scorer1_scores, vec![Some(5.0), Some(4.0)]);
        assert_eq!(records[1].scorer2_id, None);
        assert!(records[1].lacks_second_score());
        assert_eq!(records[1].ai_scores, vec![Some(3.0), Some(5.0)]);
    }

    #[test]
    fn sheet_summary() {
        let layout = small_layout();
        let table = sheet();
        let records = extract_records(&table, &layout, &layout.parts[0]);
        let rules = AggregationRules::DEFAULT_RULES;
        let summary = run_part_summary(&records, &layout.parts[0].layout, &rules).unwrap();

        let x = &summary.scorers[0];
        assert_eq!(x.scorer_id, "X");
        assert_eq!(x.total_scored, 3);
        assert_eq!(x.total_rescored, 1);
        assert_eq!(x.rescoring_pct, 33.33);
        assert_eq!(
            x.incorrect,
            vec![("TA1".to_string(), 1), ("TA2".to_string(), 1)]
        );

        let y = &summary.scorers[1];
        assert_eq!(y.scorer_id, "Y");
        assert_eq!(y.total_scored, 2);
        assert_eq!(
            y.incorrect,
            vec![("TA1".to_string(), 0), ("TA2".to_string(), 0)]
        );

        assert_eq!(summary.ai.total_scored, 1);
        assert_eq!(
            summary.ai.incorrect,
            vec![("TA1".to_string(), 1), ("TA2".to_string(), 0)]
        );

        let js = build_summary_js("test", &layout, &rules, &[summary]);
        assert_eq!(js["config"]["layoutVersion"], json!("t1"));
        assert_eq!(js["config"]["aiScope"], json!("missingSecondScore"));
        assert_eq!(js["results"][0]["humanScorers"][0]["sNo"], json!(1));
        assert_eq!(js["results"][0]["humanScorers"][0]["incorrect"]["TA2"], json!(1));
        assert_eq!(js["results"][0]["ai"]["totalScored"], json!(1));
    }

    #[test]
    fn narrow_sheet_is_rejected() {
        let table = Table::new(vec![vec![Cell::Text("A".to_string()); 10]]);
        let res = ColumnLayout::builtin().unwrap().check_width(table.width);
        assert!(matches!(res, Err(RescoreError::TooFewColumns { width: 10, .. })));
    }

    #[test]
    fn numeric_part_and_ids() {
        let mut layout = small_layout();
        layout.parts[0].layout = PartLayout::new(
            "1",
            &["TA1".to_string(), "TA2".to_string()],
            &[],
        )
        .unwrap();
        let table = io_csv::read_csv_table(b"1.0,1001.0,,,5,5,5,5,,,5,5\n", 1).unwrap();
        let records = extract_records(&table, &layout, &layout.parts[0]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scorer1_id, Some("1001".to_string()));
    }

    // End-to-end runs: each test case lives in tests/data/<name>/ with a
    // configuration, a sheet and the expected summary.
    fn test_dir(test_name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join(test_name)
    }

    fn test_args(test_name: &str) -> Args {
        let dir = test_dir(test_name);
        Args {
            config: Some(
                dir.join(format!("{}_config.json", test_name))
                    .display()
                    .to_string(),
            ),
            reference: Some(
                dir.join(format!("{}_expected_summary.json", test_name))
                    .display()
                    .to_string(),
            ),
            out: None,
            input: None,
            input_type: None,
            excel_worksheet_name: None,
            part: None,
            ai_scope: None,
            missing_final: None,
            password: None,
            verbose: false,
        }
    }

    fn test_wrapper(test_name: &str) -> RescoreResult<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        info!("Running test {}", test_name);
        run_analysis(&test_args(test_name))
    }

    // A copy of the configuration of a test case, with absolute paths.
    fn copy_config(
        test_name: &str,
        dir: &Path,
        update: impl Fn(&mut RescoreConfig),
    ) -> String {
        let src = test_dir(test_name);
        let mut config =
            read_config(&src.join(format!("{}_config.json", test_name)).display().to_string())
                .unwrap();
        if let Some(source) = config.source.as_mut() {
            source.file_path = src.join(&source.file_path).display().to_string();
        }
        update(&mut config);
        let path = dir.join("config.json");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn two_parts() {
        let res = test_wrapper("two_parts");
        assert!(res.is_ok(), "{:?}", res);
    }

    #[test]
    fn two_parts_reference_mismatch() {
        let args = Args {
            ai_scope: Some("all-records".to_string()),
            ..test_args("two_parts")
        };
        let res = run_analysis(&args);
        assert!(matches!(res, Err(RescoreError::Whatever { .. })));
    }

    #[test]
    fn command_line_overrides_config() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("summary.json").display().to_string();
        let args = Args {
            reference: None,
            out: Some(out.clone()),
            part: Some(vec!["B".to_string()]),
            missing_final: Some("disagree".to_string()),
            ..test_args("two_parts")
        };
        run_analysis(&args).unwrap();

        let js = read_summary(&out).unwrap();
        assert_eq!(js["config"]["missingFinalValue"], json!("disagree"));
        assert_eq!(js["config"]["aiScope"], json!("missingSecondScore"));
        let results = js["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["part"], json!("B"));
        assert_eq!(results[0]["humanScorers"][1]["scorerId"], json!("W"));
        assert_eq!(results[0]["humanScorers"][1]["incorrect"]["V"], json!(2));
    }

    #[test]
    fn unknown_part() {
        let args = Args {
            reference: None,
            part: Some(vec!["A".to_string(), "C".to_string()]),
            ..test_args("two_parts")
        };
        let res = run_analysis(&args);
        assert!(matches!(res, Err(RescoreError::Whatever { .. })));
    }

    #[test]
    fn summary_in_output_directory() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().display().to_string();
        let config = copy_config("two_parts", dir.path(), |c| {
            c.output_settings.output_directory = Some(out_dir.clone());
        });
        let args = Args {
            config: Some(config),
            ..test_args("two_parts")
        };
        run_analysis(&args).unwrap();

        let written = read_summary(
            &dir.path()
                .join("two_parts_summary.json")
                .display()
                .to_string(),
        )
        .unwrap();
        let expected = read_summary(args.reference.as_deref().unwrap()).unwrap();
        assert_eq!(written, expected);
    }

    #[test]
    fn protected_upload() {
        let var_name = "RESCORE_PROTECTED_UPLOAD_TEST_SECRET";
        let dir = tempdir().unwrap();
        let config = copy_config("two_parts", dir.path(), |c| {
            c.admin = Some(AdminConfig {
                secret_env: Some(var_name.to_string()),
            });
        });
        std::env::set_var(var_name, "s3cret");
        let denied = run_analysis(&Args {
            config: Some(config.clone()),
            password: Some("wrong".to_string()),
            ..test_args("two_parts")
        });
        let granted = run_analysis(&Args {
            config: Some(config),
            password: Some("s3cret".to_string()),
            ..test_args("two_parts")
        });
        std::env::remove_var(var_name);
        assert!(matches!(denied, Err(RescoreError::AccessDenied {})));
        assert!(granted.is_ok(), "{:?}", granted);
    }

    #[test]
    fn relative_paths() {
        let root = Some(PathBuf::from("/data/conf"));
        assert_eq!(resolve_path(&root, "scores.xlsx"), "/data/conf/scores.xlsx");
        assert_eq!(resolve_path(&root, "/abs/scores.xlsx"), "/abs/scores.xlsx");
        assert_eq!(resolve_path(&None, "scores.xlsx"), "scores.xlsx");
    }
}
