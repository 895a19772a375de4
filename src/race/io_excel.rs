use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::race::{
    io_common::{read_reported_flag, TallyRow},
    *,
};

/// Reads the same columns as the CSV format from an Excel worksheet.
pub fn read_excel_tallies(path: &str, worksheet_name: Option<&str>) -> RaceResult<Vec<TallyRow>> {
    debug!(
        "read_excel_tallies: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    let wrange = match worksheet_name {
        // A worksheet name was provided, use it.
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header = iter.next();
    debug!("read_excel_tallies: header: {:?}", header);

    let mut res: Vec<TallyRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let cells: Vec<String> = row.iter().map(read_cell).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if cells.len() < 3 {
            return ExcelRowTooShortSnafu { lineno }.fail();
        }
        res.push(TallyRow {
            subdivision: cells[0].clone(),
            votes_a: cells[1].clone(),
            votes_b: cells[2].clone(),
            reported: read_reported_flag(cells.get(3).map(|s| s.as_str())),
        });
    }
    Ok(res)
}

// Counts typed in a spreadsheet are usually stored as floats.
fn read_cell(cell: &DataType) -> String {
    match cell {
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && *f >= 0.0 => format!("{}", *f as u64),
        DataType::Float(f) => f.to_string(),
        DataType::String(s) => s.trim().to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => "".to_string(),
        _ => {
            warn!("read_cell: could not understand cell {:?}", cell);
            "".to_string()
        }
    }
}
