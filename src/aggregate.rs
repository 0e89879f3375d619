//! Summing seeded replicates per configuration.
//!
//! The grouping key, the canonical name, is the run id with its last two characters removed:
//! the `-<seed>` marker of single-digit seeds. Seeds of two digits or more are therefore
//! grouped under a name ending with `-1`, `-2`.. instead of the configuration name. This is how
//! every existing results table was produced and is kept as is; see [`canonical_name`].
//!
//! Sums are per field. A replicate missing a field is left out of that field's sum only, and is
//! reported with [`AggregationGap::MissingFields`]. The output does not depend on the order of
//! the input.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use anyhow::{bail, Context};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::results::{RunResult, Scalar};

/// Name of the optional replicate count column.
pub const REPLICATES_COLUMN: &str = "replicates";

/// Fields of the Carcassonne results table, in column order.
pub const CARCASSONNE_FIELDS: [&str; 4] = [
    "p1_points",
    "p2_points",
    "p1_contemplation_time",
    "p2_contemplation_time",
];

/// Replicates of one configuration, summed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    /// Configuration name without its replicate marker.
    pub canonical_name: String,
    /// Sum of every present value, per field. A field no replicate has is absent.
    pub summed_fields: BTreeMap<String, Scalar>,
    /// Number of distinct replicates grouped under this name.
    pub replicate_count: usize,
}

/// Something worth reporting about the input of an aggregation. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationGap {
    /// A replicate lacks some declared fields.
    #[error("missing fields for `{config_name}`: {}", fields.join(", "))]
    MissingFields {
        /// Run id of the replicate.
        config_name: String,
        /// Absent fields.
        fields: Vec<String>,
    },

    /// Not a single replicate of this configuration has every declared field.
    #[error("no complete replicate for `{canonical_name}`")]
    NoCompleteReplicate {
        /// Canonical name.
        canonical_name: String,
    },

    /// The same replicate was given twice; only the first one in sort order counts.
    #[error("duplicate replicate `{config_name}` (seed {seed:?}) ignored")]
    DuplicateReplicate {
        /// Run id of the ignored duplicate.
        config_name: String,
        /// Its seed.
        seed: Option<u64>,
    },

    /// The run id is too short to carry a replicate marker.
    #[error("`{config_name}` has no replicate marker, ignored")]
    NameTooShort {
        /// Offending run id.
        config_name: String,
    },
}

/// Records sorted by canonical name, and the gaps met on the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    /// One record per canonical name.
    pub records: Vec<AggregateRecord>,
    /// Everything skipped or incomplete.
    pub gaps: Vec<AggregationGap>,
}

/// Strip the replicate marker: the last two characters of `config_name`.
///
/// `None` when nothing would remain.
///
/// ```
/// use sweep_lab::aggregate::canonical_name;
///
/// assert_eq!(canonical_name("carcassonne-uct3_1-4"), Some("carcassonne-uct3_1"));
/// // two-digit seeds keep part of their marker
/// assert_eq!(canonical_name("carcassonne-uct3_1-12"), Some("carcassonne-uct3_1-"));
/// ```
pub fn canonical_name(config_name: &str) -> Option<&str> {
    let (cut, _) = config_name.char_indices().rev().nth(1)?;
    (cut > 0).then(|| &config_name[..cut])
}

/// Groups [`RunResult`]s by canonical name and sums the declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAggregator {
    fields: Vec<String>,
}

impl ResultAggregator {
    /// Aggregator summing `fields`. They are also the CSV columns, in this order.
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Points and contemplation times of both players.
    pub fn carcassonne() -> Self {
        Self::new(CARCASSONNE_FIELDS)
    }

    /// Declared fields.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Sum `results` per canonical name.
    #[instrument(skip_all, fields(runs = results.len()))]
    pub fn aggregate(&self, results: &[RunResult]) -> Aggregation {
        // Sorting first makes float sums and duplicate resolution independent of input order.
        let mut sorted: Vec<(&RunResult, String)> = results
            .iter()
            .map(|r| (r, format!("{:?}", r.fields)))
            .collect();
        sorted.sort_by(|(a, a_fields), (b, b_fields)| {
            (&a.config_name, a.seed, a_fields).cmp(&(&b.config_name, b.seed, b_fields))
        });

        let mut gaps = vec![];
        let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
        for (result, _) in sorted {
            let Some(canonical) = canonical_name(&result.config_name) else {
                gaps.push(AggregationGap::NameTooShort {
                    config_name: result.config_name.clone(),
                });
                continue;
            };
            let group = groups.entry(canonical).or_default();
            let replicate = match result.seed {
                Some(seed) => Replicate::Seed(seed),
                None => Replicate::Run(&result.config_name),
            };
            if group.replicates.contains(&replicate) {
                gaps.push(AggregationGap::DuplicateReplicate {
                    config_name: result.config_name.clone(),
                    seed: result.seed,
                });
                continue;
            }
            group.replicates.push(replicate);

            let mut missing = vec![];
            for field in &self.fields {
                match result.fields.get(field).copied().flatten() {
                    Some(value) => {
                        group
                            .sums
                            .entry(field.clone())
                            .and_modify(|sum| *sum = *sum + value)
                            .or_insert(value);
                    }
                    None => missing.push(field.clone()),
                }
            }
            if missing.is_empty() {
                group.complete += 1;
            } else {
                gaps.push(AggregationGap::MissingFields {
                    config_name: result.config_name.clone(),
                    fields: missing,
                });
            }
        }

        let records = groups
            .into_iter()
            .map(|(canonical_name, group)| {
                if group.complete == 0 {
                    gaps.push(AggregationGap::NoCompleteReplicate {
                        canonical_name: canonical_name.to_owned(),
                    });
                }
                AggregateRecord {
                    canonical_name: canonical_name.to_owned(),
                    summed_fields: group.sums,
                    replicate_count: group.replicates.len(),
                }
            })
            .collect::<Vec<_>>();

        for gap in &gaps {
            warn!("{gap}");
        }
        info!(records = records.len(), gaps = gaps.len(), "results aggregated");
        Aggregation { records, gaps }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Replicate<'r> {
    Seed(u64),
    Run(&'r str),
}

#[derive(Debug, Default)]
struct Group<'r> {
    replicates: Vec<Replicate<'r>>,
    sums: BTreeMap<String, Scalar>,
    complete: usize,
}

/// Column layout of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvLayout {
    /// `name, <fields>..`, as every existing table. Lossy: the replicate count is not written
    /// and reads back as 0.
    Legacy,
    /// `name, <fields>.., replicates`.
    #[default]
    WithReplicates,
}

/// Write `records` as CSV: a header line, then one line per record.
///
/// The header keeps the historical `name, p1_points, ..` spacing; absent sums are empty cells.
///
/// # Errors
/// When writing fails.
pub fn write_csv<W: Write>(
    mut writer: W,
    fields: &[String],
    records: &[AggregateRecord],
    layout: CsvLayout,
) -> anyhow::Result<()> {
    let mut header = vec!["name"];
    header.extend(fields.iter().map(String::as_str));
    if layout == CsvLayout::WithReplicates {
        header.push(REPLICATES_COLUMN);
    }
    writeln!(writer, "{}", header.join(", ")).context("could not write CSV header")?;

    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    for record in records {
        let mut row = vec![record.canonical_name.clone()];
        row.extend(fields.iter().map(|f| {
            record
                .summed_fields
                .get(f)
                .map(Scalar::to_string)
                .unwrap_or_default()
        }));
        if layout == CsvLayout::WithReplicates {
            row.push(record.replicate_count.to_string());
        }
        csv.write_record(&row)
            .with_context(|| format!("could not write record '{}'", record.canonical_name))?;
    }
    csv.flush().context("could not write CSV")
}

/// Read a table written by [`write_csv`] (either layout) or by the legacy conversion script.
///
/// Without a `replicates` column, `replicate_count` is 0.
///
/// # Errors
/// When the header does not start with `name` or a cell is not a number.
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<(Vec<String>, Vec<AggregateRecord>)> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let header = csv.headers().context("could not read CSV header")?.clone();
    if header.get(0) != Some("name") {
        bail!("first CSV column must be 'name'");
    }
    let columns = header.iter().skip(1).map(str::to_owned).collect::<Vec<_>>();
    let fields = columns
        .iter()
        .filter(|c| *c != REPLICATES_COLUMN)
        .cloned()
        .collect();

    let mut records = vec![];
    for (line, row) in csv.records().enumerate() {
        let row = row.with_context(|| format!("could not read CSV line {}", line + 2))?;
        let mut record = AggregateRecord {
            canonical_name: row.get(0).unwrap_or_default().to_owned(),
            summed_fields: BTreeMap::new(),
            replicate_count: 0,
        };
        for (column, cell) in columns.iter().zip(row.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            if column == REPLICATES_COLUMN {
                record.replicate_count = cell.parse().with_context(|| {
                    format!("line {}: invalid replicate count '{cell}'", line + 2)
                })?;
                continue;
            }
            let value = Scalar::parse(cell).with_context(|| {
                format!("line {}: '{cell}' in column '{column}' is not a number", line + 2)
            })?;
            record.summed_fields.insert(column.clone(), value);
        }
        records.push(record);
    }
    Ok((fields, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config_name: &str, seed: u64, fields: &[(&str, Option<Scalar>)]) -> RunResult {
        RunResult {
            config_name: config_name.to_owned(),
            seed: Some(seed),
            fields: fields
                .iter()
                .map(|(f, v)| (f.to_string(), *v))
                .collect(),
            raw_output: String::new(),
        }
    }

    #[test]
    fn sums_replicates() {
        let aggregator = ResultAggregator::new(["p1_points"]);
        let aggregation = aggregator.aggregate(&[
            run("uct-vs-random-0", 0, &[("p1_points", Some(Scalar::Int(10)))]),
            run("uct-vs-random-1", 1, &[("p1_points", Some(Scalar::Int(14)))]),
        ]);
        assert!(aggregation.gaps.is_empty());
        let record = &aggregation.records[0];
        assert_eq!(record.canonical_name, "uct-vs-random");
        assert_eq!(record.summed_fields["p1_points"], Scalar::Int(24));
        assert_eq!(record.replicate_count, 2);
    }

    #[test]
    fn missing_fields_are_excluded_per_field() {
        let aggregator = ResultAggregator::new(["a", "b"]);
        let aggregation = aggregator.aggregate(&[
            run("x-0", 0, &[("a", Some(Scalar::Int(1))), ("b", Some(Scalar::Float(0.5)))]),
            run("x-1", 1, &[("a", Some(Scalar::Int(2))), ("b", None)]),
            run("x-2", 2, &[("a", Some(Scalar::Int(4)))]),
        ]);
        let record = &aggregation.records[0];
        assert_eq!(record.summed_fields["a"], Scalar::Int(7));
        assert_eq!(record.summed_fields["b"], Scalar::Float(0.5));
        assert_eq!(record.replicate_count, 3);
        assert_eq!(aggregation.gaps.len(), 2);
        assert_eq!(
            aggregation.gaps[0].to_string(),
            "missing fields for `x-1`: b"
        );
    }

    #[test]
    fn incomplete_configurations_are_reported() {
        let aggregator = ResultAggregator::new(["a"]);
        let aggregation = aggregator.aggregate(&[run("crashed-0", 0, &[("a", None)])]);
        assert_eq!(aggregation.records.len(), 1);
        assert!(aggregation.records[0].summed_fields.is_empty());
        assert!(aggregation.gaps.contains(&AggregationGap::NoCompleteReplicate {
            canonical_name: "crashed".into()
        }));
    }

    #[test]
    fn duplicates_count_once() {
        let aggregator = ResultAggregator::new(["a"]);
        let first = run("x-0", 0, &[("a", Some(Scalar::Int(1)))]);
        let aggregation = aggregator.aggregate(&[first.clone(), first]);
        assert_eq!(aggregation.records[0].summed_fields["a"], Scalar::Int(1));
        assert_eq!(aggregation.records[0].replicate_count, 1);
        assert!(matches!(
            aggregation.gaps[0],
            AggregationGap::DuplicateReplicate { seed: Some(0), .. }
        ));
    }

    #[test]
    fn empty_input() {
        let aggregation = ResultAggregator::carcassonne().aggregate(&[]);
        assert_eq!(aggregation, Aggregation::default());
    }

    #[test]
    fn two_digit_seeds_are_mis_grouped() {
        let aggregator = ResultAggregator::new(["a"]);
        let aggregation = aggregator.aggregate(&[
            run("x-9", 9, &[("a", Some(Scalar::Int(1)))]),
            run("x-10", 10, &[("a", Some(Scalar::Int(1)))]),
        ]);
        let names = aggregation
            .records
            .iter()
            .map(|r| r.canonical_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["x", "x-"]);
        assert!(matches!(
            aggregator.aggregate(&[run("x", 0, &[])]).gaps[0],
            AggregationGap::NameTooShort { .. }
        ));
    }

    #[test]
    fn default_layout_round_trips() {
        let fields = vec!["p1_points".to_owned()];
        let records = vec![AggregateRecord {
            canonical_name: "uct-vs-random".into(),
            summed_fields: [("p1_points".to_owned(), Scalar::Int(24))].into(),
            replicate_count: 2,
        }];
        let mut table = vec![];
        write_csv(&mut table, &fields, &records, CsvLayout::default()).unwrap();
        assert_eq!(read_csv(table.as_slice()).unwrap(), (fields, records));
    }

    #[test]
    fn legacy_tables_carry_no_replicate_count() {
        let table = "name, p1_points, p2_points, p1_contemplation_time, p2_contemplation_time\n\
                     carcassonne-uct3_1,24, 10, 1.5, 2.25\n";
        let (fields, records) = read_csv(table.as_bytes()).unwrap();
        assert_eq!(fields, CARCASSONNE_FIELDS);
        assert_eq!(records[0].summed_fields["p2_points"], Scalar::Int(10));
        assert_eq!(
            records[0].summed_fields["p2_contemplation_time"],
            Scalar::Float(2.25)
        );
        assert_eq!(records[0].replicate_count, 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_csv("id,a\nx,1\n".as_bytes()).is_err());
        assert!(read_csv("name,a\nx,abc\n".as_bytes()).is_err());
    }
}
