/// A row of a tallies file, before the counts are read as numbers.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyRow {
    pub subdivision: String,
    pub votes_a: String,
    pub votes_b: String,
    pub reported: bool,
}

/// Reads the optional `reported` column. Only an explicit yes marks a subdivision.
pub fn read_reported_flag(cell: Option<&str>) -> bool {
    matches!(
        cell.map(|s| s.trim().to_lowercase()).as_deref(),
        Some("true") | Some("yes") | Some("y") | Some("1") | Some("x")
    )
}
