use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::NodeId;
use crate::error::Result;
use crate::measurement::MeasurementResult;
use crate::routing::PolicyKind;

pub const HEADER: [&str; 6] = ["algorithm", "src", "dst", "bandwidth", "latency", "jitter"];

/// One measured host pair under one policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub policy: PolicyKind,
    pub src: NodeId,
    pub dst: NodeId,
    pub result: MeasurementResult,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    algorithm: &'static str,
    src: &'a str,
    dst: &'a str,
    bandwidth: Option<f64>,
    latency: Option<f64>,
    jitter: Option<f64>,
}

impl<'a> From<&'a TrialRecord> for CsvRow<'a> {
    fn from(record: &'a TrialRecord) -> Self {
        Self {
            algorithm: record.policy.name(),
            src: &record.src,
            dst: &record.dst,
            bandwidth: record.result.bandwidth,
            latency: record.result.latency,
            jitter: record.result.jitter,
        }
    }
}

/// Mean of every metric over the trials where it was present.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicySummary {
    pub trials: usize,
    pub bandwidth: Option<f64>,
    pub latency: Option<f64>,
    pub jitter: Option<f64>,
}

/// Trial records in arrival order, written out once as CSV.
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    records: Vec<TrialRecord>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<TrialRecord> {
        self.records
    }

    /// Writes the header and one row per record. Absent values are empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv.write_record(HEADER)?;
        for record in &self.records {
            csv.serialize(CsvRow::from(record))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))?;
        info!("Wrote {} result(s) to {}", self.len(), path.display());
        Ok(())
    }

    pub fn summary(&self) -> BTreeMap<PolicyKind, PolicySummary> {
        let mut sums: BTreeMap<PolicyKind, (usize, [(f64, usize); 3])> = BTreeMap::new();
        for record in &self.records {
            let (trials, metrics) = sums.entry(record.policy).or_default();
            *trials += 1;
            let values = [
                record.result.bandwidth,
                record.result.latency,
                record.result.jitter,
            ];
            for (slot, value) in metrics.iter_mut().zip(values) {
                if let Some(v) = value {
                    slot.0 += v;
                    slot.1 += 1;
                }
            }
        }

        let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
        sums.into_iter()
            .map(|(policy, (trials, [bw, lat, jit]))| {
                (
                    policy,
                    PolicySummary {
                        trials,
                        bandwidth: mean(bw),
                        latency: mean(lat),
                        jitter: mean(jit),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn record(policy: PolicyKind, src: &str, dst: &str, bw: Option<f64>, lat: Option<f64>, jit: Option<f64>) -> TrialRecord {
        TrialRecord {
            policy,
            src: src.to_string(),
            dst: dst.to_string(),
            result: MeasurementResult {
                bandwidth: bw,
                latency: lat,
                jitter: jit,
            },
        }
    }

    fn render(sink: &ResultSink) -> String {
        let mut buf = Vec::new();
        sink.write_csv(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_sink_still_has_header() {
        assert_eq!(render(&ResultSink::new()), "algorithm,src,dst,bandwidth,latency,jitter\n");
    }

    #[test]
    fn absent_values_are_empty_fields() {
        let mut sink = ResultSink::new();
        sink.push(record(PolicyKind::ShortestHop, "h1", "h3", Some(9.41), Some(0.067), Some(0.021)));
        sink.push(record(PolicyKind::PathVector, "h2", "h5", None, Some(1.5), None));
        assert_eq!(
            render(&sink),
            "algorithm,src,dst,bandwidth,latency,jitter\n\
             ShortestHop,h1,h3,9.41,0.067,0.021\n\
             PathVector,h2,h5,,1.5,\n"
        );
    }

    #[test]
    fn summary_averages_present_values() {
        let mut sink = ResultSink::new();
        sink.push(record(PolicyKind::LinkState, "h1", "h2", Some(10.0), Some(1.0), None));
        sink.push(record(PolicyKind::LinkState, "h3", "h4", Some(20.0), None, None));
        sink.push(record(PolicyKind::ShortestHop, "h1", "h2", None, None, None));

        let summary = sink.summary();
        assert_eq!(summary.len(), 2);
        let ls = summary[&PolicyKind::LinkState];
        assert_eq!(ls.trials, 2);
        assert_approx_eq!(ls.bandwidth.unwrap(), 15.0);
        assert_approx_eq!(ls.latency.unwrap(), 1.0);
        assert_eq!(ls.jitter, None);
        assert_eq!(
            summary[&PolicyKind::ShortestHop],
            PolicySummary {
                trials: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn write_to_path_creates_the_file() {
        let path = std::env::temp_dir().join(format!("qos-lab-sink-{}.csv", std::process::id()));
        let mut sink = ResultSink::new();
        sink.push(record(PolicyKind::LinkState, "h1", "h2", Some(1.0), Some(2.0), Some(3.0)));
        sink.write_to_path(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content.lines().nth(1), Some("LinkState,h1,h2,1.0,2.0,3.0"));
    }
}
