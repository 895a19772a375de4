// Primitives for reading CSV files.

use crate::race::{
    io_common::{read_reported_flag, TallyRow},
    *,
};

/// Reads `subdivision,votes_a,votes_b[,reported]` rows. The first row is a header.
pub fn read_csv_tallies(path: &str) -> RaceResult<Vec<TallyRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut res: Vec<TallyRow> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // Line 1 is the header.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_tallies: lineno: {:?} row: {:?}", lineno, line);
        if line.iter().all(|s| s.is_empty()) {
            continue;
        }
        let subdivision = line.get(0).context(CsvLineTooShortSnafu { lineno })?;
        let votes_a = line.get(1).context(CsvLineTooShortSnafu { lineno })?;
        let votes_b = line.get(2).context(CsvLineTooShortSnafu { lineno })?;
        res.push(TallyRow {
            subdivision: subdivision.to_string(),
            votes_a: votes_a.to_string(),
            votes_b: votes_b.to_string(),
            reported: read_reported_flag(line.get(3)),
        });
    }
    Ok(res)
}
