use serde_json::Map as JSMap;

use crate::race::{io_common::TallyRow, *};

/// Reads an object keyed by subdivision: `{"Adams": {"votesA": 1200, "votesB": 800}}`.
///
/// Counts may be numbers or strings. An optional `reported` boolean marks a
/// subdivision as reporting.
pub fn read_json_tallies(path: &str) -> RaceResult<Vec<TallyRow>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let obj: &JSMap<String, JSValue> = match js.as_object() {
        Some(o) => o,
        None => whatever!("The tallies in {} must be a JSON object", path),
    };

    let mut res: Vec<TallyRow> = Vec::new();
    for (name, entry) in obj.iter() {
        debug!("read_json_tallies: {:?}: {:?}", name, entry);
        res.push(TallyRow {
            subdivision: name.trim().to_string(),
            votes_a: read_js_count(entry.get("votesA")),
            votes_b: read_js_count(entry.get("votesB")),
            reported: entry
                .get("reported")
                .and_then(|r| r.as_bool())
                .unwrap_or(false),
        });
    }
    Ok(res)
}

fn read_js_count(x: Option<&JSValue>) -> String {
    match x {
        Some(JSValue::Number(n)) => n.to_string(),
        Some(JSValue::String(s)) => s.clone(),
        Some(other) => {
            warn!("read_js_count: could not understand count {:?}", other);
            "".to_string()
        }
        None => "".to_string(),
    }
}
