use crate::rescore::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

pub const DEFAULT_SECRET_ENV: &str = "RESCORE_ADMIN_SECRET";
pub const DEFAULT_LAYOUT_VERSION: &str = "builtin-1";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "analysisName")]
    pub analysis_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "firstDataRowIndex")]
    pub first_data_row_index: Option<JSValue>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DimensionConfig {
    pub name: String,
    #[serde(rename = "final")]
    pub final_column: JSValue,
    pub scorer1: JSValue,
    pub scorer2: JSValue,
    pub ai: JSValue,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub dimensions: Vec<String>,
    pub tolerance: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartConfig {
    pub name: String,
    pub dimensions: Vec<DimensionConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub version: Option<String>,
    #[serde(rename = "partColumnIndex")]
    pub part_column_index: JSValue,
    #[serde(rename = "scorer1IdColumnIndex")]
    pub scorer1_id_column_index: JSValue,
    #[serde(rename = "scorer2IdColumnIndex")]
    pub scorer2_id_column_index: JSValue,
    #[serde(rename = "rescoreColumnIndex")]
    pub rescore_column_index: JSValue,
    pub parts: Vec<PartConfig>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "rescoreSentinel")]
    pub rescore_sentinel: Option<f64>,
    #[serde(rename = "aiScope")]
    pub ai_scope: Option<String>,
    #[serde(rename = "missingFinalValue")]
    pub missing_final_value: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Name of the environment variable holding the admin secret.
    #[serde(rename = "secretEnv")]
    pub secret_env: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RescoreConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub source: Option<FileSource>,
    pub layout: Option<LayoutConfig>,
    pub rules: Option<RulesConfig>,
    pub admin: Option<AdminConfig>,
}

impl FileSource {
    /// The row of the first record. The index starts at 1.
    pub fn first_data_row_index(&self) -> RescoreResult<usize> {
        match &self.first_data_row_index {
            None => Ok(DEFAULT_FIRST_DATA_ROW),
            Some(js) => read_js_int(js),
        }
    }
}

// ********* Validated layout **********

/// Where the four scores of a dimension are located.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DimensionColumns {
    pub name: String,
    pub final_score: usize,
    pub scorer1: usize,
    pub scorer2: usize,
    pub ai: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PartColumns {
    pub layout: PartLayout,
    /// In the same order as the dimensions of the layout.
    pub columns: Vec<DimensionColumns>,
}

/// The positional contract of the sheet. All the indexes start at 0.
#[derive(PartialEq, Debug, Clone)]
pub struct ColumnLayout {
    pub version: String,
    pub part: usize,
    pub scorer1_id: usize,
    pub scorer2_id: usize,
    pub rescore: usize,
    pub parts: Vec<PartColumns>,
}

impl ColumnLayout {
    /// The layout of the reference scoring sheet.
    pub fn builtin() -> RescoreResult<ColumnLayout> {
        let part_a = builtin_part("A", &["TA1", "TA2", "Style", "Accuracy"], &[])?;
        let part_b = builtin_part("B", &["GA1", "GA2", "V", "G", "O"], &["V", "G", "O"])?;
        Ok(ColumnLayout {
            version: DEFAULT_LAYOUT_VERSION.to_string(),
            part: 11,
            scorer1_id: 45,
            scorer2_id: 60,
            rescore: 76,
            parts: vec![part_a, part_b],
        })
    }

    pub fn from_config(config: &LayoutConfig) -> RescoreResult<ColumnLayout> {
        let mut parts: Vec<PartColumns> = Vec::new();
        for pc in config.parts.iter() {
            if parts.iter().any(|p| p.layout.part() == pc.name) {
                whatever!("Part {:?} is defined twice in the layout", pc.name);
            }
            let mut columns: Vec<DimensionColumns> = Vec::new();
            for dc in pc.dimensions.iter() {
                columns.push(DimensionColumns {
                    name: dc.name.clone(),
                    final_score: read_column_index(&dc.final_column)?,
                    scorer1: read_column_index(&dc.scorer1)?,
                    scorer2: read_column_index(&dc.scorer2)?,
                    ai: read_column_index(&dc.ai)?,
                });
            }
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let groups: Vec<(Vec<String>, f64)> = pc
                .groups
                .iter()
                .map(|g| (g.dimensions.clone(), g.tolerance.unwrap_or(DEFAULT_TOLERANCE)))
                .collect();
            let layout = PartLayout::new(&pc.name, &names, &groups).context(LayoutSnafu {})?;
            parts.push(PartColumns { layout, columns });
        }
        if parts.is_empty() {
            whatever!("The layout does not define any part");
        }

        Ok(ColumnLayout {
            version: config
                .version
                .clone()
                .unwrap_or_else(|| "unversioned".to_string()),
            part: read_column_index(&config.part_column_index)?,
            scorer1_id: read_column_index(&config.scorer1_id_column_index)?,
            scorer2_id: read_column_index(&config.scorer2_id_column_index)?,
            rescore: read_column_index(&config.rescore_column_index)?,
            parts,
        })
    }

    /// The rightmost column used by the layout, with a description.
    pub fn max_column(&self) -> (usize, String) {
        let mut res = vec![
            (self.part, "part".to_string()),
            (self.scorer1_id, "first scorer id".to_string()),
            (self.scorer2_id, "second scorer id".to_string()),
            (self.rescore, "rescore flag".to_string()),
        ];
        for p in self.parts.iter() {
            for c in p.columns.iter() {
                let prefix = format!("part {} {}", p.layout.part(), c.name);
                res.push((c.final_score, format!("{} final", prefix)));
                res.push((c.scorer1, format!("{} first scorer", prefix)));
                res.push((c.scorer2, format!("{} second scorer", prefix)));
                res.push((c.ai, format!("{} AI", prefix)));
            }
        }
        // Invariant: the list is never empty.
        res.into_iter()
            .max_by_key(|(idx, _)| *idx)
            .unwrap_or((0, "part".to_string()))
    }

    /// Fails if the table is too narrow for the layout.
    pub fn check_width(&self, width: usize) -> RescoreResult<()> {
        let (column, name) = self.max_column();
        if column >= width {
            return Err(RescoreError::TooFewColumns {
                width,
                column: column + 1,
                name,
            });
        }
        Ok(())
    }
}

// The four score blocks of the reference sheet start at fixed columns.
fn builtin_part(name: &str, dimensions: &[&str], group: &[&str]) -> RescoreResult<PartColumns> {
    let columns: Vec<DimensionColumns> = dimensions
        .iter()
        .enumerate()
        .map(|(idx, d)| DimensionColumns {
            name: d.to_string(),
            final_score: 20 + idx,
            scorer1: 35 + idx,
            scorer2: 50 + idx,
            ai: 95 + idx,
        })
        .collect();
    let names: Vec<String> = dimensions.iter().map(|s| s.to_string()).collect();
    let groups: Vec<(Vec<String>, f64)> = if group.is_empty() {
        vec![]
    } else {
        vec![(
            group.iter().map(|s| s.to_string()).collect(),
            DEFAULT_TOLERANCE,
        )]
    };
    let layout = PartLayout::new(name, &names, &groups).context(LayoutSnafu {})?;
    Ok(PartColumns { layout, columns })
}

pub fn read_rules(config: &Option<RulesConfig>) -> RescoreResult<AggregationRules> {
    let mut rules = AggregationRules::DEFAULT_RULES;
    if let Some(rc) = config {
        if let Some(sentinel) = rc.rescore_sentinel {
            rules.rescore_sentinel = sentinel;
        }
        if let Some(s) = &rc.ai_scope {
            rules.ai_scope = parse_ai_scope(s)?;
        }
        if let Some(s) = &rc.missing_final_value {
            rules.missing_final = parse_missing_final(s)?;
        }
    }
    Ok(rules)
}

pub fn parse_ai_scope(s: &str) -> RescoreResult<AiScope> {
    match s {
        "missingSecondScore" | "missing-second-score" => Ok(AiScope::MissingSecondScore),
        "allRecords" | "all-records" => Ok(AiScope::AllRecords),
        x => whatever!("Unknown AI scope {:?}", x),
    }
}

pub fn parse_missing_final(s: &str) -> RescoreResult<MissingFinalPolicy> {
    match s {
        "skip" => Ok(MissingFinalPolicy::Skip),
        "disagree" => Ok(MissingFinalPolicy::Disagree),
        x => whatever!("Unknown policy for missing final values {:?}", x),
    }
}

pub fn read_config(path: &str) -> RescoreResult<RescoreConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RescoreConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> RescoreResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Reads a column index, either as a number starting at 1 or as Excel letters.
/// The returned index starts at 0.
pub fn read_column_index(x: &JSValue) -> RescoreResult<usize> {
    match x {
        JSValue::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            let mut acc: usize = 0;
            for c in s.to_ascii_lowercase().chars() {
                let digit = (c as usize) - ('a' as usize) + 1;
                acc = acc
                    .checked_mul(26)
                    .and_then(|x| x.checked_add(digit))
                    .context(ParsingColumnIndexSnafu { content: s.clone() })?;
            }
            Ok(acc - 1)
        }
        _ => {
            let x = read_js_int(x)?;
            if x == 0 {
                return Err(RescoreError::ParsingColumnIndex {
                    content: "0".to_string(),
                });
            }
            Ok(x - 1)
        }
    }
}

fn read_js_int(x: &JSValue) -> RescoreResult<usize> {
    match x {
        JSValue::Number(n) => n.as_u64().map(|x| x as usize),
        JSValue::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
    .context(ParsingColumnIndexSnafu {
        content: x.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_letters() {
        assert_eq!(read_column_index(&json!("A")).unwrap(), 0);
        assert_eq!(read_column_index(&json!("l")).unwrap(), 11);
        assert_eq!(read_column_index(&json!("Z")).unwrap(), 25);
        assert_eq!(read_column_index(&json!("AA")).unwrap(), 26);
        assert_eq!(read_column_index(&json!("AT")).unwrap(), 45);
        assert_eq!(read_column_index(&json!("BI")).unwrap(), 60);
        assert_eq!(read_column_index(&json!("BY")).unwrap(), 76);
        assert_eq!(read_column_index(&json!("CR")).unwrap(), 95);
        assert_eq!(read_column_index(&json!("XFD")).unwrap(), 16383);
        assert!(matches!(
            read_column_index(&json!("ZZZZZZZZZZZZZZZ")),
            Err(RescoreError::ParsingColumnIndex { .. })
        ));
    }

    #[test]
    fn column_numbers() {
        assert_eq!(read_column_index(&json!(12)).unwrap(), 11);
        assert_eq!(read_column_index(&json!("77")).unwrap(), 76);
        assert!(read_column_index(&json!(0)).is_err());
        assert!(read_column_index(&json!(-3)).is_err());
        assert!(read_column_index(&json!("B2")).is_err());
        assert!(read_column_index(&json!(null)).is_err());
    }

    #[test]
    fn builtin_layout() {
        let l = ColumnLayout::builtin().unwrap();
        assert_eq!(l.parts.len(), 2);
        assert_eq!(l.parts[0].columns[3].name, "Accuracy");
        assert_eq!(l.parts[0].columns[3].final_score, 23);
        assert_eq!(l.parts[0].columns[3].ai, 98);
        assert_eq!(l.parts[1].layout.groups()[0].members, vec![2, 3, 4]);
        assert_eq!(l.max_column(), (99, "part B O AI".to_string()));
        assert!(l.check_width(100).is_ok());
        assert!(matches!(
            l.check_width(99),
            Err(RescoreError::TooFewColumns { column: 100, .. })
        ));
    }

    fn small_layout_js() -> JSValue {
        json!({
            "version": "test-1",
            "partColumnIndex": "A",
            "scorer1IdColumnIndex": 2,
            "scorer2IdColumnIndex": "C",
            "rescoreColumnIndex": "D",
            "parts": [
                {
                    "name": "B",
                    "dimensions": [
                        {"name": "V", "final": "E", "scorer1": "H", "scorer2": "K", "ai": "N"},
                        {"name": "G", "final": "F", "scorer1": "I", "scorer2": "L", "ai": "O"},
                        {"name": "O", "final": "G", "scorer1": "J", "scorer2": "M", "ai": "P"}
                    ],
                    "groups": [{"dimensions": ["V", "G", "O"]}]
                }
            ]
        })
    }

    #[test]
    fn layout_from_config() {
        let lc: LayoutConfig = serde_json::from_value(small_layout_js()).unwrap();
        let l = ColumnLayout::from_config(&lc).unwrap();
        assert_eq!(l.version, "test-1");
        assert_eq!((l.part, l.scorer1_id, l.scorer2_id, l.rescore), (0, 1, 2, 3));
        assert_eq!(l.parts[0].columns[2].ai, 15);
        assert_eq!(l.parts[0].layout.groups()[0].tolerance, DEFAULT_TOLERANCE);
        assert_eq!(l.max_column().0, 15);
    }

    #[test]
    fn layout_with_unknown_group_member() {
        let mut js = small_layout_js();
        js["parts"][0]["groups"] = json!([{"dimensions": ["V", "X"]}]);
        let lc: LayoutConfig = serde_json::from_value(js).unwrap();
        assert!(matches!(
            ColumnLayout::from_config(&lc),
            Err(RescoreError::Layout { .. })
        ));
    }

    #[test]
    fn rules_from_config() {
        let rc = RulesConfig {
            rescore_sentinel: Some(7.0),
            ai_scope: Some("allRecords".to_string()),
            missing_final_value: Some("disagree".to_string()),
        };
        let rules = read_rules(&Some(rc)).unwrap();
        assert_eq!(rules.rescore_sentinel, 7.0);
        assert_eq!(rules.ai_scope, AiScope::AllRecords);
        assert_eq!(rules.missing_final, MissingFinalPolicy::Disagree);
        assert_eq!(read_rules(&None).unwrap(), AggregationRules::DEFAULT_RULES);
        assert!(parse_ai_scope("everything").is_err());
    }

    #[test]
    fn full_config() {
        let js = json!({
            "outputSettings": {"analysisName": "June"},
            "source": {"filePath": "scores.csv", "provider": "csv", "firstDataRowIndex": 3},
            "layout": small_layout_js(),
        });
        let config: RescoreConfig = serde_json::from_value(js).unwrap();
        assert_eq!(config.output_settings.analysis_name, "June");
        assert_eq!(config.source.unwrap().first_data_row_index().unwrap(), 3);
        assert!(config.rules.is_none());
        assert!(config.admin.is_none());
    }
}
