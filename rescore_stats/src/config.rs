// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A score read from the sheet. `None` when the cell was blank or not a number.
pub type Score = Option<f64>;

/// One scoring record, as extracted from a row of the sheet.
///
/// All the score vectors are indexed by the dimensions of the [PartLayout]
/// the record was extracted with.
#[derive(PartialEq, Debug, Clone)]
pub struct Record {
    pub part: String,
    pub scorer1_id: Option<String>,
    pub scorer2_id: Option<String>,
    /// The raw content of the rescore column.
    pub rescore_flag: Option<f64>,
    pub final_scores: Vec<Score>,
    pub scorer1_scores: Vec<Score>,
    pub scorer2_scores: Vec<Score>,
    pub ai_scores: Vec<Score>,
}

impl Record {
    /// True if no second score was recorded for any dimension.
    pub fn lacks_second_score(&self) -> bool {
        self.scorer2_scores
            .iter()
            .all(|s| s.map_or(true, |x| x.is_nan()))
    }

    pub fn is_rescored(&self, sentinel: f64) -> bool {
        self.rescore_flag == Some(sentinel)
    }
}

/// A set of dimensions that are compared through the sum of their scores.
#[derive(PartialEq, Debug, Clone)]
pub struct ToleranceGroup {
    /// Positions of the members in [PartLayout::dimensions].
    pub members: Vec<usize>,
    /// The largest accepted gap between the summed scores.
    pub tolerance: f64,
}

/// The dimensions evaluated in one part of the sheet.
#[derive(PartialEq, Debug, Clone)]
pub struct PartLayout {
    part: String,
    dimensions: Vec<String>,
    groups: Vec<ToleranceGroup>,
}

impl PartLayout {
    /// Creates a layout. Every dimension that does not belong to a group is
    /// compared on its own.
    ///
    /// Fails if the dimensions are empty or duplicated, or if a group refers
    /// to an unknown dimension or overlaps with another group.
    pub fn new(
        part: &str,
        dimensions: &[String],
        groups: &[(Vec<String>, f64)],
    ) -> Result<PartLayout, AggregationErrors> {
        if dimensions.is_empty() {
            return Err(AggregationErrors::EmptyLayout {
                part: part.to_string(),
            });
        }
        for (idx, d) in dimensions.iter().enumerate() {
            if dimensions[..idx].contains(d) {
                return Err(AggregationErrors::DuplicateDimension {
                    part: part.to_string(),
                    dimension: d.clone(),
                });
            }
        }

        let mut seen: Vec<usize> = Vec::new();
        let mut tolerance_groups: Vec<ToleranceGroup> = Vec::new();
        for (names, tolerance) in groups.iter() {
            if names.is_empty() {
                return Err(AggregationErrors::InvalidGroup {
                    part: part.to_string(),
                    dimension: "".to_string(),
                });
            }
            let mut members: Vec<usize> = Vec::new();
            for name in names.iter() {
                let pos = dimensions.iter().position(|d| d == name);
                match pos {
                    Some(p) if !seen.contains(&p) => {
                        seen.push(p);
                        members.push(p);
                    }
                    _ => {
                        return Err(AggregationErrors::InvalidGroup {
                            part: part.to_string(),
                            dimension: name.clone(),
                        });
                    }
                }
            }
            tolerance_groups.push(ToleranceGroup {
                members,
                tolerance: *tolerance,
            });
        }

        Ok(PartLayout {
            part: part.to_string(),
            dimensions: dimensions.to_vec(),
            groups: tolerance_groups,
        })
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn groups(&self) -> &[ToleranceGroup] {
        &self.groups
    }

    /// The dimensions that are compared one by one, in layout order.
    pub fn independent_dimensions(&self) -> Vec<usize> {
        (0..self.dimensions.len())
            .filter(|idx| !self.groups.iter().any(|g| g.members.contains(idx)))
            .collect()
    }
}

// ******** Output data structures *********

/// Statistics for one human scorer
#[derive(PartialEq, Debug, Clone)]
pub struct ScorerSummary {
    pub scorer_id: String,
    pub total_scored: u64,
    pub total_rescored: u64,
    pub rescoring_pct: f64,
    /// Number of records in which the dimension could be compared.
    pub compared: Vec<(String, u64)>,
    pub incorrect: Vec<(String, u64)>,
}

/// Statistics for the automated scorer.
#[derive(PartialEq, Debug, Clone)]
pub struct AiSummary {
    pub total_scored: u64,
    pub total_rescored: u64,
    pub rescoring_pct: f64,
    pub compared: Vec<(String, u64)>,
    pub incorrect: Vec<(String, u64)>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PartSummary {
    pub part: String,
    pub scorers: Vec<ScorerSummary>,
    pub ai: AiSummary,
}

/// Errors that prevent the aggregation from starting.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AggregationErrors {
    EmptyLayout {
        part: String,
    },
    DuplicateDimension {
        part: String,
        dimension: String,
    },
    InvalidGroup {
        part: String,
        dimension: String,
    },
    /// A record does not carry one score per dimension.
    RecordShape {
        part: String,
        index: usize,
        expected: usize,
        found: usize,
    },
}

impl Error for AggregationErrors {}

impl Display for AggregationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationErrors::EmptyLayout { part } => {
                write!(f, "part {} does not define any dimension", part)
            }
            AggregationErrors::DuplicateDimension { part, dimension } => {
                write!(f, "part {}: dimension {} is defined twice", part, dimension)
            }
            AggregationErrors::InvalidGroup { part, dimension } => write!(
                f,
                "part {}: invalid tolerance group member {:?}",
                part, dimension
            ),
            AggregationErrors::RecordShape {
                part,
                index,
                expected,
                found,
            } => write!(
                f,
                "part {}: record {} has {} scores, expected {}",
                part, index, found, expected
            ),
        }
    }
}

// ********* Configuration **********

/// Which records the automated scorer is accounted for.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AiScope {
    /// Only the records without any second human score: the AI acted as the
    /// second scorer.
    MissingSecondScore,
    /// All the records of the part, measuring the raw AI accuracy.
    AllRecords,
}

/// What to do when the final score of a dimension is missing.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MissingFinalPolicy {
    /// Nothing can be compared, the dimension never disagrees.
    Skip,
    /// Any recorded score counts as a disagreement.
    Disagree,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AggregationRules {
    /// Value of the rescore column marking a record as rescored.
    pub rescore_sentinel: f64,
    pub ai_scope: AiScope,
    pub missing_final: MissingFinalPolicy,
}

impl AggregationRules {
    pub const DEFAULT_RULES: AggregationRules = AggregationRules {
        rescore_sentinel: 12.0,
        ai_scope: AiScope::MissingSecondScore,
        missing_final: MissingFinalPolicy::Skip,
    };
}
