use rescore_stats::{AiSummary, PartSummary};

/// The table of the human scorers, header included.
///
/// The `Total <dimension>` columns hold the number of records in which the
/// dimension was compared, not the number of role slots.
pub fn human_table(summary: &PartSummary) -> Vec<Vec<String>> {
    let dims: Vec<String> = summary
        .ai
        .incorrect
        .iter()
        .map(|(name, _)| name.clone())
        .collect();

    let mut header: Vec<String> = vec![
        "S.No".to_string(),
        "Scorer ID".to_string(),
        "Total Scored".to_string(),
        "Total Rescored".to_string(),
        "Rescoring %".to_string(),
    ];
    header.extend(dims.iter().map(|d| format!("Total {}", d)));
    header.extend(dims.iter().map(|d| format!("Incorrect {}", d)));

    let mut rows = vec![header];
    for (idx, s) in summary.scorers.iter().enumerate() {
        let mut row: Vec<String> = vec![
            (idx + 1).to_string(),
            s.scorer_id.clone(),
            s.total_scored.to_string(),
            s.total_rescored.to_string(),
            format_pct(s.rescoring_pct),
        ];
        row.extend(s.compared.iter().map(|(_, c)| c.to_string()));
        row.extend(s.incorrect.iter().map(|(_, c)| c.to_string()));
        rows.push(row);
    }
    rows
}

/// The one-row table of the automated scorer, header included.
pub fn ai_table(ai: &AiSummary) -> Vec<Vec<String>> {
    let mut header: Vec<String> = vec![
        "Total Scored by AI".to_string(),
        "Total Rescored".to_string(),
        "Rescoring %".to_string(),
    ];
    header.extend(ai.incorrect.iter().map(|(d, _)| format!("Incorrect {}", d)));

    let mut row: Vec<String> = vec![
        ai.total_scored.to_string(),
        ai.total_rescored.to_string(),
        format_pct(ai.rescoring_pct),
    ];
    row.extend(ai.incorrect.iter().map(|(_, c)| c.to_string()));
    vec![header, row]
}

pub fn format_pct(x: f64) -> String {
    format!("{:.2}", x)
}

/// Lays out the cells in aligned columns. The first row is the header.
pub fn render_table(rows: &[Vec<String>]) -> String {
    let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![0; num_cols];
    for r in rows.iter() {
        for (idx, c) in r.iter().enumerate() {
            widths[idx] = widths[idx].max(c.chars().count());
        }
    }

    let mut lines: Vec<String> = Vec::new();
    for (ridx, r) in rows.iter().enumerate() {
        let cells: Vec<String> = r
            .iter()
            .enumerate()
            .map(|(idx, c)| format!("{:<width$}", c, width = widths[idx]))
            .collect();
        lines.push(cells.join(" | ").trim_end().to_string());
        if ridx == 0 {
            let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            lines.push(sep.join("-+-"));
        }
    }
    lines.join("\n")
}

pub fn render_part(summary: &PartSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Part {} - Human Scorers\n", summary.part));
    if summary.scorers.is_empty() {
        out.push_str("(no scorer)\n");
    } else {
        out.push_str(&render_table(&human_table(summary)));
        out.push('\n');
    }
    out.push_str(&format!("\nPart {} - AI\n", summary.part));
    out.push_str(&render_table(&ai_table(&summary.ai)));
    out.push('\n');
    out
}
