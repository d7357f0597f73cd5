// Primitives for reading CSV files.

use crate::rescore::{
    io_common::{Cell, Table},
    *,
};

/// Reads the data rows of a CSV file.
///
/// The index of the first row starts at 1 to respect most conventions in
/// the excel world. Lines may have different lengths.
pub fn read_csv_table(bytes: &[u8], first_row: usize) -> RescoreResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        if lineno < first_row {
            continue;
        }
        let cells: Vec<Cell> = line.iter().map(Cell::from_text).collect();
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, &cells);
        rows.push(cells);
    }
    Ok(Table::new(rows))
}
