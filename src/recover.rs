//! Recovering the swept parameter from canonical names.
//!
//! Legacy results tables only carry names, so the independent variable of a plot has to be
//! decoded back out of them. This is a compatibility adapter: new sweeps carry a structured
//! [`ConfigId`](crate::grid::ConfigId).
//!
//! The literal following the algorithm token is decoded as follows:
//! 1. the first character must be a digit;
//! 2. if it is followed by `-` (or nothing), the literal is that digit: `uct3-vs-..` is `3`;
//! 3. if it is followed by `div`, the value is the digit divided by the single digit after
//!    `div`: `egreedy-1div4` (token `egreedy-`) is `0.25`. A `div10` denominator is refused
//!    with [`ParameterDecodeError::DenominatorTen`], as it always was;
//! 4. if it is followed by `.` or `dot`, the literal runs through the next digits:
//!    `uct0.5-vs-..` is `0.5`, `expterm-0dot5` is `0.5`;
//! 5. otherwise the literal is the digit and the next character: `uct10` is `10`, but `uct150`
//!    is `15` too.
//!
//! Every name that cannot be decoded is returned as a diagnostic and logged, never dropped
//! silently.

use std::{collections::BTreeMap, io::Write};

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::{aggregate::AggregateRecord, error::ParameterDecodeError, results::Scalar};

/// Decode the parameter following the first occurrence of `token` in `name`.
///
/// ```
/// use sweep_lab::recover::decode_parameter;
///
/// assert_eq!(decode_parameter("uct0.5-vs-random", "uct"), Ok(0.5));
/// assert_eq!(decode_parameter("uct3-vs-random", "uct"), Ok(3.0));
/// ```
///
/// # Errors
/// [`ParameterDecodeError`] when the name does not follow the encoding.
pub fn decode_parameter(name: &str, token: &str) -> Result<f64, ParameterDecodeError> {
    let start = name
        .find(token)
        .ok_or_else(|| ParameterDecodeError::TokenNotFound {
            token: token.to_owned(),
        })?
        + token.len();
    let rest = &name[start..];
    let digit = rest
        .chars()
        .next()
        .ok_or_else(|| ParameterDecodeError::NothingAfterToken {
            token: token.to_owned(),
        })?;
    if !digit.is_ascii_digit() {
        return Err(ParameterDecodeError::NotADigit(digit));
    }
    let after = &rest[1..];

    let literal = if after.is_empty() || after.starts_with('-') {
        digit.to_string()
    } else if let Some(denominator) = after.strip_prefix("div") {
        if denominator.starts_with("10") {
            return Err(ParameterDecodeError::DenominatorTen);
        }
        let d = denominator
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .filter(|&d| d != 0)
            .ok_or_else(|| {
                ParameterDecodeError::InvalidDenominator(denominator.chars().take(1).collect())
            })?;
        return Ok(f64::from(digit.to_digit(10).unwrap_or_default()) / f64::from(d));
    } else if let Some(decimals) = after
        .strip_prefix('.')
        .or_else(|| after.strip_prefix("dot"))
    {
        let decimals: String = decimals.chars().take_while(char::is_ascii_digit).collect();
        format!("{digit}.{decimals}")
    } else {
        after.chars().take(1).fold(digit.to_string(), |mut s, c| {
            s.push(c);
            s
        })
    };

    literal
        .parse()
        .map_err(|_| ParameterDecodeError::InvalidLiteral(literal))
}

/// One point of a parameter series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterPoint {
    /// Decoded parameter value.
    pub parameter_value: f64,
    /// Sum of the column over every record with this value.
    pub aggregated_outcome: Scalar,
}

/// Series per outcome column, and the names that could not be decoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSeries {
    /// Column -> points, ascending by parameter value.
    pub series: BTreeMap<String, Vec<ParameterPoint>>,
    /// Names skipped, with the reason.
    pub diagnostics: Vec<(String, ParameterDecodeError)>,
}

/// Decode the parameter of every record and sum `columns` per parameter value.
///
/// A record lacking a column is left out of that column's series only.
#[instrument(skip(records, columns), fields(records = records.len()))]
pub fn parameter_series(
    records: &[AggregateRecord],
    token: &str,
    columns: &[String],
) -> ParameterSeries {
    let mut result = ParameterSeries::default();
    let mut decoded = vec![];
    for record in records {
        match decode_parameter(&record.canonical_name, token) {
            Ok(value) => decoded.push((value, record)),
            Err(e) => {
                warn!(name = %record.canonical_name, "parameter not decoded: {e}");
                result.diagnostics.push((record.canonical_name.clone(), e));
            }
        }
    }
    // Same summation order whatever the record order.
    decoded.sort_by(|(a, ra), (b, rb)| {
        a.total_cmp(b)
            .then_with(|| ra.canonical_name.cmp(&rb.canonical_name))
    });

    for column in columns {
        let mut points: Vec<ParameterPoint> = vec![];
        for (value, record) in &decoded {
            let Some(&outcome) = record.summed_fields.get(column) else {
                debug!(name = %record.canonical_name, column = %column, "no value in column");
                continue;
            };
            match points.last_mut() {
                Some(last) if last.parameter_value == *value => {
                    last.aggregated_outcome = last.aggregated_outcome + outcome;
                }
                _ => points.push(ParameterPoint {
                    parameter_value: *value,
                    aggregated_outcome: outcome,
                }),
            }
        }
        result.series.insert(column.clone(), points);
    }
    info!(
        decoded = decoded.len(),
        skipped = result.diagnostics.len(),
        "parameter series extracted"
    );
    result
}

/// Write the series as `column,parameter_value,outcome` CSV.
///
/// # Errors
/// When writing fails.
pub fn write_series<W: Write>(writer: W, series: &ParameterSeries) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["column", "parameter_value", "outcome"])
        .context("could not write series header")?;
    for (column, points) in &series.series {
        for point in points {
            let value = point.parameter_value.to_string();
            let outcome = point.aggregated_outcome.to_string();
            csv.write_record([column.as_str(), value.as_str(), outcome.as_str()])
                .context("could not write series")?;
        }
    }
    csv.flush().context("could not write series")
}
