// Primitives for reading Excel files.

use std::io::Cursor;

use calamine::DataType;

use crate::rescore::{
    io_common::{Cell, Table},
    *,
};

/// Reads the data rows of a workbook.
///
/// `first_row` is the index of the first data row, starting at 1. The rows
/// above it are the headers.
pub fn read_excel_table(
    bytes: &[u8],
    worksheet_name: &Option<String>,
    first_row: usize,
) -> RescoreResult<Table> {
    let wrange = get_range(bytes, worksheet_name)?;
    debug!(
        "read_excel_table: size: {:?} first_row: {:?}",
        wrange.get_size(),
        first_row
    );

    // The range starts at the first used cell, not at A1.
    let (row_start, col_start) = wrange.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (idx, row) in wrange.rows().enumerate() {
        let lineno = row_start as usize + idx + 1;
        if lineno < first_row {
            continue;
        }
        let mut cells: Vec<Cell> = vec![Cell::Empty; col_start as usize];
        cells.extend(row.iter().map(read_cell));
        debug!("read_excel_table: lineno: {:?} row: {:?}", lineno, &cells);
        rows.push(cells);
    }
    Ok(Table::new(rows))
}

fn read_cell(dt: &DataType) -> Cell {
    match dt {
        DataType::Empty => Cell::Empty,
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Float(f) => Cell::Number(*f),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::String(s) => Cell::from_text(s),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        // Formula errors (#N/A, #DIV/0!, ...) do not carry any score.
        DataType::Error(_) => Cell::Empty,
        #[allow(unreachable_patterns)]
        other => Cell::from_text(&other.to_string()),
    }
}

fn get_range(
    bytes: &[u8],
    worksheet_name_o: &Option<String>,
) -> RescoreResult<calamine::Range<DataType>> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes.to_vec())).context(OpeningExcelSnafu {})?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        debug!("get_range: worksheet: {:?}", worksheet_name);
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name.clone(),
            })?
            .context(OpeningExcelSnafu {})?;
        Ok(wrange)
    } else {
        let names: Vec<String> = workbook.sheet_names().to_vec();
        match names.as_slice() {
            [] => EmptyWorkbookSnafu {}.fail(),
            [worksheet_name] => {
                debug!("get_range: single worksheet: {:?}", worksheet_name);
                let wrange = workbook
                    .worksheet_range(worksheet_name)
                    .context(MissingWorksheetSnafu {
                        name: worksheet_name.clone(),
                    })?
                    .context(OpeningExcelSnafu {})?;
                Ok(wrange)
            }
            _ => AmbiguousWorksheetSnafu {
                names: names.clone(),
            }
            .fail(),
        }
    }
}
