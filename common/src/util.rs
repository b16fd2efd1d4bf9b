use csv::{ReaderBuilder, Trim};
use tracing::warn;

use crate::error::ParseFailure;

/// Index of the measured value in a driver result line, ie. `CM,ARE,0.12`
pub const RESULT_FIELD: usize = 2;

/// Parses one result line and returns field [`RESULT_FIELD`]
pub fn parse_result_line(line: &str) -> Result<f64, ParseFailure> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());
    let record = match reader.records().next() {
        Some(record) => record?,
        None => return Err(ParseFailure::NoResultLine),
    };
    let field = record.get(RESULT_FIELD).ok_or(ParseFailure::TooFewFields {
        found: record.len(),
    })?;
    // nan and inf parse as f64 but cannot be stored in results.json
    field
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseFailure::NotNumeric {
            field: field.to_owned(),
        })
}

/// Parses the whole stdout of one driver run. Every non-blank line must be a
/// valid result line; the first one is the measurement.
pub fn parse_driver_output(stdout: &str) -> Result<f64, ParseFailure> {
    let mut values = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_result_line)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let value = values.next().ok_or(ParseFailure::NoResultLine)?;
    let extra = values.count();
    if extra > 0 {
        warn!("Driver printed {extra} extra result line(s), keeping the first");
    }
    Ok(value)
}
