mod config;
pub mod builder;
pub mod manual;

use log::{debug, info};

pub use crate::config::*;

// **** Private structures ****

// Outcome of the comparison of one dimension against the final score.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Verdict {
    // Nothing to compare: the score or the final score is missing.
    NotCompared,
    Agree,
    Disagree,
}

impl Verdict {
    // Combines the verdicts of the two roles a scorer may play on the same record.
    fn merge(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Disagree, _) | (_, Verdict::Disagree) => Verdict::Disagree,
            (Verdict::Agree, _) | (_, Verdict::Agree) => Verdict::Agree,
            _ => Verdict::NotCompared,
        }
    }
}

// Running counts for one scorer.
#[derive(Eq, PartialEq, Debug, Clone)]
struct Tally {
    total_scored: u64,
    total_rescored: u64,
    compared: Vec<u64>,
    incorrect: Vec<u64>,
}

impl Tally {
    fn new(num_dimensions: usize) -> Tally {
        Tally {
            total_scored: 0,
            total_rescored: 0,
            compared: vec![0; num_dimensions],
            incorrect: vec![0; num_dimensions],
        }
    }

    fn add(&mut self, record: &Record, verdicts: &[Verdict], rules: &AggregationRules) {
        self.total_scored += 1;
        if record.is_rescored(rules.rescore_sentinel) {
            self.total_rescored += 1;
        }
        for (idx, v) in verdicts.iter().enumerate() {
            match v {
                Verdict::NotCompared => {}
                Verdict::Agree => {
                    self.compared[idx] += 1;
                }
                Verdict::Disagree => {
                    self.compared[idx] += 1;
                    self.incorrect[idx] += 1;
                }
            }
        }
    }

    fn named(&self, counts: &[u64], layout: &PartLayout) -> Vec<(String, u64)> {
        layout
            .dimensions()
            .iter()
            .cloned()
            .zip(counts.iter().cloned())
            .collect()
    }
}

/// Runs the aggregation for one part of the sheet.
///
/// Arguments:
/// * `records` the records to process. Records from other parts are ignored.
/// * `layout` the dimensions of the part
/// * `rules` the rules that govern this analysis
///
/// The human table contains one row per scorer, in the order returned by
/// [scorer_ids].
pub fn run_part_summary(
    records: &[Record],
    layout: &PartLayout,
    rules: &AggregationRules,
) -> Result<PartSummary, AggregationErrors> {
    let part_records = records_for_part(records, layout.part());
    info!(
        "Processing {:?} records for part {:?} ({:?} total), dimensions: {:?}, rules: {:?}",
        part_records.len(),
        layout.part(),
        records.len(),
        layout.dimensions(),
        rules
    );
    checks(&part_records, layout)?;

    let ids = scorer_ids(&part_records);
    info!("Part {:?}: {:?} scorers", layout.part(), ids.len());

    let scorers: Vec<ScorerSummary> = ids
        .iter()
        .map(|sid| aggregate_for_scorer(sid, &part_records, layout, rules))
        .collect();
    let ai = aggregate_for_ai(&part_records, layout, rules);

    Ok(PartSummary {
        part: layout.part().to_string(),
        scorers,
        ai,
    })
}

/// The records that belong to the given part.
pub fn records_for_part(records: &[Record], part: &str) -> Vec<Record> {
    records.iter().filter(|r| r.part == part).cloned().collect()
}

/// All the distinct scorer ids.
///
/// The first scorers come first, in row order, followed by the second scorers
/// that were not seen as first scorers.
pub fn scorer_ids(records: &[Record]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    let firsts = records.iter().filter_map(|r| r.scorer1_id.as_ref());
    let seconds = records.iter().filter_map(|r| r.scorer2_id.as_ref());
    for sid in firsts.chain(seconds) {
        if !res.contains(sid) {
            res.push(sid.clone());
        }
    }
    res
}

/// Counts the disagreements of one human scorer with the final scores.
///
/// The scorer may appear as first or second scorer. As a second scorer, a
/// missing score is replaced by the score of the automated scorer.
/// If the scorer appears in both roles of the same record, the record is
/// counted once and a dimension is incorrect if either role disagrees.
pub fn aggregate_for_scorer(
    scorer_id: &str,
    records: &[Record],
    layout: &PartLayout,
    rules: &AggregationRules,
) -> ScorerSummary {
    let mut tally = Tally::new(layout.dimensions().len());
    for r in records.iter() {
        let as_first = r.scorer1_id.as_deref() == Some(scorer_id);
        let as_second = r.scorer2_id.as_deref() == Some(scorer_id);
        if !as_first && !as_second {
            continue;
        }

        let mut verdicts = vec![Verdict::NotCompared; layout.dimensions().len()];
        if as_first {
            let v1 = compare_scores(&r.scorer1_scores, &r.final_scores, layout, rules);
            verdicts = merge_verdicts(&verdicts, &v1);
        }
        if as_second {
            let scores = second_scores(r, layout);
            let v2 = compare_scores(&scores, &r.final_scores, layout, rules);
            verdicts = merge_verdicts(&verdicts, &v2);
        }
        debug!(
            "aggregate_for_scorer: {}: first: {} second: {} verdicts: {:?}",
            scorer_id, as_first, as_second, verdicts
        );
        tally.add(r, &verdicts, rules);
    }

    ScorerSummary {
        scorer_id: scorer_id.to_string(),
        total_scored: tally.total_scored,
        total_rescored: tally.total_rescored,
        rescoring_pct: rescoring_pct(tally.total_rescored, tally.total_scored),
        compared: tally.named(&tally.compared, layout),
        incorrect: tally.named(&tally.incorrect, layout),
    }
}

/// Counts the disagreements of the automated scorer with the final scores.
///
/// The records taken into account depend on [AggregationRules::ai_scope].
pub fn aggregate_for_ai(
    records: &[Record],
    layout: &PartLayout,
    rules: &AggregationRules,
) -> AiSummary {
    let mut tally = Tally::new(layout.dimensions().len());
    for r in records.iter() {
        let in_scope = match rules.ai_scope {
            AiScope::MissingSecondScore => r.lacks_second_score(),
            AiScope::AllRecords => true,
        };
        if in_scope {
            let verdicts = compare_scores(&r.ai_scores, &r.final_scores, layout, rules);
            tally.add(r, &verdicts, rules);
        }
    }
    debug!(
        "aggregate_for_ai: part {:?}: {:?}",
        layout.part(),
        tally.incorrect
    );

    AiSummary {
        total_scored: tally.total_scored,
        total_rescored: tally.total_rescored,
        rescoring_pct: rescoring_pct(tally.total_rescored, tally.total_scored),
        compared: tally.named(&tally.compared, layout),
        incorrect: tally.named(&tally.incorrect, layout),
    }
}

/// Percentage of rescored records, rounded to 2 decimals. Zero if nothing was scored.
pub fn rescoring_pct(total_rescored: u64, total_scored: u64) -> f64 {
    if total_scored == 0 {
        0.0
    } else {
        let pct = (total_rescored as f64) / (total_scored as f64) * 100.0;
        let scaled = pct * 100.0;
        let mut rounded = scaled.round();
        // Ties go to the even neighbour: 3.125 gives 3.12.
        if (rounded - scaled).abs() == 0.5 && rounded % 2.0 != 0.0 {
            rounded -= 1.0;
        }
        rounded / 100.0
    }
}

// Missing positions and NaN are handled as missing scores.
fn score_at(scores: &[Score], idx: usize) -> Option<f64> {
    scores.get(idx).copied().flatten().filter(|x| !x.is_nan())
}

fn merge_verdicts(left: &[Verdict], right: &[Verdict]) -> Vec<Verdict> {
    left.iter()
        .zip(right.iter())
        .map(|(l, r)| l.merge(*r))
        .collect()
}

// The scores of the second scorer, with the fallback to the automated scorer.
// Independent dimensions fall back one by one, groups only when all the
// members are missing.
fn second_scores(record: &Record, layout: &PartLayout) -> Vec<Score> {
    let mut scores: Vec<Score> = (0..layout.dimensions().len())
        .map(|idx| score_at(&record.scorer2_scores, idx))
        .collect();
    for idx in layout.independent_dimensions() {
        if scores[idx].is_none() {
            scores[idx] = score_at(&record.ai_scores, idx);
        }
    }
    for g in layout.groups() {
        if g.members.iter().all(|idx| scores[*idx].is_none()) {
            for idx in g.members.iter() {
                scores[*idx] = score_at(&record.ai_scores, *idx);
            }
        }
    }
    scores
}

fn compare_scores(
    scored: &[Score],
    finals: &[Score],
    layout: &PartLayout,
    rules: &AggregationRules,
) -> Vec<Verdict> {
    let mut verdicts = vec![Verdict::NotCompared; layout.dimensions().len()];

    for idx in layout.independent_dimensions() {
        verdicts[idx] = match (score_at(scored, idx), score_at(finals, idx)) {
            (None, _) => Verdict::NotCompared,
            (Some(_), None) => missing_final_verdict(rules),
            (Some(s), Some(f)) if s != f => Verdict::Disagree,
            (Some(_), Some(_)) => Verdict::Agree,
        };
    }

    for g in layout.groups() {
        let group_scored: Option<Vec<f64>> = g.members.iter().map(|i| score_at(scored, *i)).collect();
        let group_finals: Option<Vec<f64>> = g.members.iter().map(|i| score_at(finals, *i)).collect();
        let v = match (group_scored, group_finals) {
            // Never compare a partial group.
            (None, _) => Verdict::NotCompared,
            (Some(_), None) => missing_final_verdict(rules),
            (Some(s), Some(f)) => {
                let delta = f.iter().sum::<f64>() - s.iter().sum::<f64>();
                if delta.abs() > g.tolerance {
                    Verdict::Disagree
                } else {
                    Verdict::Agree
                }
            }
        };
        for idx in g.members.iter() {
            verdicts[*idx] = v;
        }
    }
    verdicts
}

fn missing_final_verdict(rules: &AggregationRules) -> Verdict {
    match rules.missing_final {
        MissingFinalPolicy::Skip => Verdict::NotCompared,
        MissingFinalPolicy::Disagree => Verdict::Disagree,
    }
}

// Every record must carry one score per dimension.
fn checks(records: &[Record], layout: &PartLayout) -> Result<(), AggregationErrors> {
    let expected = layout.dimensions().len();
    for (index, r) in records.iter().enumerate() {
        let lengths = [
            r.final_scores.len(),
            r.scorer1_scores.len(),
            r.scorer2_scores.len(),
            r.ai_scores.len(),
        ];
        if let Some(found) = lengths.iter().find(|l| **l != expected) {
            return Err(AggregationErrors::RecordShape {
                part: layout.part().to_string(),
                index,
                expected,
                found: *found,
            });
        }
    }
    debug!("checks: {:?} records validated", records.len());
    Ok(())
}
