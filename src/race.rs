use log::{debug, info, warn};

use race_projection::store::{FileCache, VoteStore};
use race_projection::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::race::config_reader::*;
use crate::race::io_common::TallyRow;

mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod io_json;
mod render;

#[derive(Debug, Snafu)]
pub enum RaceError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("CSV line {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Row {lineno} of the Excel file is too short"))]
    ExcelRowTooShort { lineno: usize },
    #[snafu(display("Invalid race: {source}"))]
    InvalidRace { source: ProjectionErrors },
    #[snafu(display("Difference detected between the projection and the reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RaceResult<T> = Result<T, RaceError>;

fn read_tallies(path: &str, args: &Args) -> RaceResult<Vec<TallyRow>> {
    let input_type = match args.input_type.as_deref() {
        Some(t) => t.to_string(),
        None => guess_input_type(path),
    };
    info!("Reading {} tallies from {:?}", input_type, path);
    match input_type.as_str() {
        "csv" => io_csv::read_csv_tallies(path),
        "xlsx" => io_excel::read_excel_tallies(path, args.excel_worksheet_name.as_deref()),
        "json" => io_json::read_json_tallies(path),
        x => whatever!("Input type {:?} is not supported (expected csv, xlsx or json)", x),
    }
}

fn guess_input_type(path: &str) -> String {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("xlsx") => "xlsx".to_string(),
        Some("json") => "json".to_string(),
        _ => "csv".to_string(),
    }
}

fn apply_tallies(store: &mut VoteStore, rows: &[TallyRow]) -> RaceResult<()> {
    for row in rows.iter() {
        debug!("apply_tallies: {:?}", row);
        store
            .set_raw_tally(&row.subdivision, &row.votes_a, &row.votes_b)
            .context(InvalidRaceSnafu {})?;
        if row.reported {
            store
                .mark_reported(&row.subdivision)
                .context(InvalidRaceSnafu {})?;
        }
    }
    info!("Applied {} tallies", rows.len());
    Ok(())
}

fn check_reference(reference_path: &str, summary: &JSValue) -> RaceResult<()> {
    let reference = read_summary(reference_path)?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(WritingJsonSnafu {})?;
    let pretty_summary = serde_json::to_string_pretty(summary).context(WritingJsonSnafu {})?;
    if pretty_reference != pretty_summary {
        warn!("Found differences with the reference summary");
        print_diff(pretty_reference.as_str(), pretty_summary.as_str(), "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("The projection matches the reference {:?}", reference_path);
    Ok(())
}

fn write_summary(out: &str, summary: &JSValue) -> RaceResult<()> {
    let pretty = serde_json::to_string_pretty(summary).context(WritingJsonSnafu {})?;
    if out == "stdout" {
        println!("{}", pretty);
    } else {
        fs::write(out, pretty).context(WritingFileSnafu { path: out })?;
        info!("Summary written to {:?}", out);
    }
    Ok(())
}

/// Runs one projection and returns its summary.
pub fn run_race(args: &Args) -> RaceResult<JSValue> {
    let mut race_config = read_race_config(&args.race)?;
    // The flags behave like the matching thresholds of the race file.
    let thresholds = race_config
        .thresholds
        .get_or_insert_with(RaceThresholds::default);
    if args.enhanced {
        thresholds.include_forward_projection = Some(true);
    }
    if args.vote_based_reporting {
        thresholds.use_vote_based_reporting = Some(true);
    }
    let race = validate_race(&race_config)?;
    info!("race: {:?}", race);

    let mut store = VoteStore::new(&race.subdivisions).context(InvalidRaceSnafu {})?;
    if let Some(dir) = args.cache_dir.as_deref() {
        store = store.with_cache(Box::new(FileCache::new(dir)));
    }
    if args.reset {
        store.reset();
    }
    if let Some(path) = args.tallies.as_deref() {
        let rows = read_tallies(path, args)?;
        apply_tallies(&mut store, &rows)?;
    }
    if let Some(e) = store.persistence_error() {
        eprintln!("Warning: the counts could not be saved ({}).", e);
    }

    let outcome = match store.project(&race.config) {
        Ok(res) => Some(res),
        Err(ProjectionErrors::InsufficientData) => None,
        Err(e) => return Err(e).context(InvalidRaceSnafu {}),
    };

    println!("{}", render::render_text(&race, &store.summary(), outcome.as_ref()));

    let summary = render::build_summary_js(&race, &store.summary(), outcome.as_ref());
    if let Some(out) = args.out.as_deref() {
        write_summary(out, &summary)?;
    }
    if let Some(reference) = args.reference.as_deref() {
        check_reference(reference, &summary)?;
    }
    Ok(summary)
}
