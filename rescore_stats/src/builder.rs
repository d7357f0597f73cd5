pub use crate::config::*;

/// A builder for adding records of one part.
///
/// ```
/// pub use rescore_stats::builder::Builder;
/// pub use rescore_stats::{AggregationRules, PartLayout};
/// # use rescore_stats::AggregationErrors;
///
/// let dimensions = vec!["TA1".to_string(), "TA2".to_string()];
/// let layout = PartLayout::new("A", &dimensions, &[])?;
/// let mut builder = Builder::new(&layout, &AggregationRules::DEFAULT_RULES)?;
///
/// // Final scores, then the first scorer, the second scorer and the AI.
/// builder.add_scores("S1", None, &[5.0, 5.0], &[5.0, 4.0], &[], &[5.0, 5.0])?;
///
/// let summary = builder.summary()?;
/// assert_eq!(summary.scorers[0].incorrect[1], ("TA2".to_string(), 1));
/// # Ok::<(), AggregationErrors>(())
/// ```
pub struct Builder {
    pub(crate) _layout: PartLayout,
    pub(crate) _rules: AggregationRules,
    pub(crate) _records: Vec<Record>,
}

impl Builder {
    pub fn new(layout: &PartLayout, rules: &AggregationRules) -> Result<Builder, AggregationErrors> {
        Ok(Builder {
            _layout: layout.clone(),
            _rules: rules.clone(),
            _records: Vec::new(),
        })
    }

    /// Adds a record with fully specified scores.
    ///
    /// The part of the record is forced to the part of the builder.
    pub fn add_record(&mut self, record: &Record) -> Result<(), AggregationErrors> {
        let expected = self._layout.dimensions().len();
        let lengths = [
            record.final_scores.len(),
            record.scorer1_scores.len(),
            record.scorer2_scores.len(),
            record.ai_scores.len(),
        ];
        if let Some(found) = lengths.iter().find(|l| **l != expected) {
            return Err(AggregationErrors::RecordShape {
                part: self._layout.part().to_string(),
                index: self._records.len(),
                expected,
                found: *found,
            });
        }
        let mut r = record.clone();
        r.part = self._layout.part().to_string();
        self._records.push(r);
        Ok(())
    }

    /// Adds a record where all the scores are present.
    ///
    /// An empty slice for the second scorer means that no second score was
    /// recorded.
    pub fn add_scores(
        &mut self,
        first_scorer: &str,
        second_scorer: Option<&str>,
        finals: &[f64],
        first: &[f64],
        second: &[f64],
        ai: &[f64],
    ) -> Result<(), AggregationErrors> {
        let wrap = |xs: &[f64]| -> Vec<Score> { xs.iter().map(|x| Some(*x)).collect() };
        let second_scores = if second.is_empty() {
            vec![None; self._layout.dimensions().len()]
        } else {
            wrap(second)
        };
        self.add_record(&Record {
            part: self._layout.part().to_string(),
            scorer1_id: Some(first_scorer.to_string()),
            scorer2_id: second_scorer.map(|s| s.to_string()),
            rescore_flag: None,
            final_scores: wrap(finals),
            scorer1_scores: wrap(first),
            scorer2_scores: second_scores,
            ai_scores: wrap(ai),
        })
    }

    pub fn records(&self) -> &[Record] {
        &self._records
    }

    pub fn summary(&self) -> Result<PartSummary, AggregationErrors> {
        crate::run_part_summary(&self._records, &self._layout, &self._rules)
    }
}
