/// Parsing of captured vw output
///
/// vw prints a progress table preceded by a header line
///
/// ```text
/// loss     last          counter         weight    label  predict features
/// ```
///
/// and terminated by a blank line, followed by summary lines of the form
/// `metric name = value`. Captures may be truncated or garbled, so parsing
/// never fails: rows it cannot read are skipped.
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary metric used as the scalar loss of a run.
pub const AVERAGE_LOSS: &str = "average loss";

const HEADER: [&str; 3] = ["loss", "last", "counter"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Example counter to average loss since the start of the run.
    pub loss_per_example: BTreeMap<u64, f64>,
    /// Example counter to average loss since the previous progress row.
    pub since_last: BTreeMap<u64, f64>,
    /// Summary metrics from the tail of the output.
    pub metrics: BTreeMap<String, String>,
}

/// Extract metrics and the `average loss` scalar from captured output lines.
pub fn parse_output<S: AsRef<str>>(lines: &[S]) -> (MetricsRecord, Option<f64>) {
    let mut record = MetricsRecord::default();
    let mut recording = false;

    for line in lines {
        let line = line.as_ref().trim();

        if recording {
            if line.is_empty() {
                recording = false;
            } else if let Some((counter, since_start, since_last)) = progress_row(line) {
                record.loss_per_example.insert(counter, since_start);
                record.since_last.insert(counter, since_last);
            }
        } else if is_header(line) {
            recording = true;
        } else if let Some((key, value)) = line.split_once('=') {
            record
                .metrics
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let loss = record
        .metrics
        .get(AVERAGE_LOSS)
        .and_then(|value| value.parse::<f64>().ok());

    (record, loss)
}

fn is_header(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().take(3).collect();
    tokens == HEADER
}

fn progress_row(line: &str) -> Option<(u64, f64, f64)> {
    let mut tokens = line.split_whitespace();
    let since_start = tokens.next()?.parse().ok()?;
    let since_last = tokens.next()?.parse().ok()?;
    let counter = tokens.next()?.parse().ok()?;
    Some((counter, since_start, since_last))
}

/// One progress row of one input file, flattened for tabular output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub file: usize,
    pub n: u64,
    pub loss_per_example: Option<f64>,
    pub since_last: Option<f64>,
}

/// Flatten per-file progress tables into rows keyed by (file index, counter).
pub fn metrics_table(records: &[MetricsRecord]) -> Vec<MetricsRow> {
    let mut rows = Vec::new();
    for (file, record) in records.iter().enumerate() {
        let counters: std::collections::BTreeSet<u64> = record
            .loss_per_example
            .keys()
            .chain(record.since_last.keys())
            .copied()
            .collect();
        rows.extend(counters.into_iter().map(|n| MetricsRow {
            file,
            n,
            loss_per_example: record.loss_per_example.get(&n).copied(),
            since_last: record.since_last.get(&n).copied(),
        }));
    }
    rows
}

/// Summary metrics of each input file, in file order.
pub fn final_metrics_table(records: &[MetricsRecord]) -> Vec<BTreeMap<String, String>> {
    records.iter().map(|record| record.metrics.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_and_summary() {
        let lines = [
            "loss     last          counter         weight    label  predict features",
            "0.5 0.5 1 1.0 1 1 3",
            "",
            "average loss = 0.5",
        ];

        let (record, loss) = parse_output(&lines);

        assert_eq!(record.loss_per_example, BTreeMap::from([(1, 0.5)]));
        assert_eq!(record.since_last, BTreeMap::from([(1, 0.5)]));
        assert_eq!(
            record.metrics,
            BTreeMap::from([("average loss".to_string(), "0.5".to_string())])
        );
        assert_eq!(loss, Some(0.5));
    }

    #[test]
    fn test_missing_average_loss() {
        let lines = ["number of examples = 10", "weighted example sum = 10.000000"];

        let (record, loss) = parse_output(&lines);

        assert_eq!(record.metrics.len(), 2);
        assert_eq!(loss, None);
    }

    #[test]
    fn test_unparsable_average_loss() {
        let (_, loss) = parse_output(&["average loss = n.a."]);
        assert_eq!(loss, None);
    }

    #[test]
    fn test_truncated_output_degrades() {
        let lines = [
            "loss last counter weight label predict features",
            "0.25 0.25 1 1.0 0 1 3",
            "0.5 0.75",
            "0.125 h 2",
        ];

        let (record, loss) = parse_output(&lines);

        assert_eq!(record.loss_per_example, BTreeMap::from([(1, 0.25)]));
        assert!(record.metrics.is_empty());
        assert_eq!(loss, None);
    }

    #[test]
    fn test_summary_split_on_first_equals() {
        let (record, _) = parse_output(&["  final_regressor =  a=b.model  ", "loss function = squared"]);

        assert_eq!(record.metrics["final_regressor"], "a=b.model");
        assert_eq!(record.metrics["loss function"], "squared");
    }

    #[test]
    fn test_recording_ignores_equals_inside_table() {
        let lines = [
            "loss last counter",
            "0.5 0.5 1",
            "0.25 0.0 2",
            "",
            "average loss = 0.25",
        ];

        let (record, loss) = parse_output(&lines);

        assert_eq!(record.loss_per_example.len(), 2);
        assert_eq!(record.since_last[&2], 0.0);
        assert_eq!(loss, Some(0.25));
    }

    #[test]
    fn test_metrics_table_rows() {
        let (first, _) = parse_output(&["loss last counter", "0.5 0.5 1", "0.25 0.0 2", ""]);
        let (second, _) = parse_output(&["loss last counter", "0.1 0.1 1", ""]);

        let rows = metrics_table(&[first, second]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].file, 0);
        assert_eq!(rows[1].n, 2);
        assert_eq!(rows[1].since_last, Some(0.0));
        assert_eq!(rows[2].file, 1);
        assert_eq!(rows[2].loss_per_example, Some(0.1));
    }
}
