//! Per-job summary of task outcomes
//!
//! The orchestrator does not fail a job because a task failed; it records
//! what happened here and leaves the decision to the caller.

use super::map_task::MapOutcome;
use super::reduce_task::ReduceOutcome;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct MapperReport {
    pub mapper_id: usize,
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: MapOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReducerReport {
    pub partition: usize,
    pub output: PathBuf,
    #[serde(flatten)]
    pub outcome: ReduceOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub shuffle_root: PathBuf,
    pub mappers: Vec<MapperReport>,
    pub reducers: Vec<ReducerReport>,
}

impl JobReport {
    pub fn failed_mappers(&self) -> usize {
        self.mappers
            .iter()
            .filter(|m| !m.outcome.is_completed())
            .count()
    }

    pub fn failed_reducers(&self) -> usize {
        self.reducers
            .iter()
            .filter(|r| matches!(r.outcome, ReduceOutcome::Failed { .. }))
            .count()
    }

    pub fn timed_out_reducers(&self) -> usize {
        self.reducers
            .iter()
            .filter(|r| matches!(r.outcome, ReduceOutcome::TimedOut { .. }))
            .count()
    }

    /// Total records written across all output files
    pub fn records_written(&self) -> u64 {
        self.reducers
            .iter()
            .map(|r| match r.outcome {
                ReduceOutcome::Done { records, .. } | ReduceOutcome::TimedOut { records, .. } => {
                    records
                }
                ReduceOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// True when every mapper completed and every reducer saw all mappers
    pub fn is_clean(&self) -> bool {
        self.failed_mappers() == 0 && self.reducers.iter().all(|r| r.outcome.is_done())
    }

    pub fn summary(&self) -> String {
        format!(
            "mappers {}/{} completed, reducers {}/{} done ({} timed out, {} failed), {} records written",
            self.mappers.len() - self.failed_mappers(),
            self.mappers.len(),
            self.reducers.iter().filter(|r| r.outcome.is_done()).count(),
            self.reducers.len(),
            self.timed_out_reducers(),
            self.failed_reducers(),
            self.records_written()
        )
    }

    /// Turn an unclean report into [`Error::TasksFailed`]
    pub fn into_strict(self) -> Result<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        Err(Error::TasksFailed {
            failed: self.failed_mappers() + self.failed_reducers() + self.timed_out_reducers(),
            summary: self.summary(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(mappers: Vec<MapOutcome>, reducers: Vec<ReduceOutcome>) -> JobReport {
        JobReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            shuffle_root: PathBuf::from("/tmp/mapreduce"),
            mappers: mappers
                .into_iter()
                .enumerate()
                .map(|(mapper_id, outcome)| MapperReport {
                    mapper_id,
                    input: PathBuf::from(format!("in-{mapper_id}")),
                    outcome,
                })
                .collect(),
            reducers: reducers
                .into_iter()
                .enumerate()
                .map(|(partition, outcome)| ReducerReport {
                    partition,
                    output: PathBuf::from(format!("out/part-{partition}")),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn test_clean_report() {
        let report = report(
            vec![MapOutcome::Completed { lines: 1, records: 3 }],
            vec![ReduceOutcome::Done {
                mappers: 1,
                keys: 2,
                records: 2,
            }],
        );

        assert!(report.is_clean());
        assert_eq!(report.records_written(), 2);
        assert!(report.summary().contains("mappers 1/1 completed"));
        assert!(report.into_strict().is_ok());
    }

    #[test]
    fn test_unclean_report_counts() {
        let report = report(
            vec![
                MapOutcome::Completed { lines: 1, records: 1 },
                MapOutcome::Failed {
                    reason: "boom".into(),
                },
            ],
            vec![
                ReduceOutcome::TimedOut {
                    processed: 1,
                    total: 2,
                    keys: 1,
                    records: 1,
                },
                ReduceOutcome::Failed {
                    reason: "bad".into(),
                },
            ],
        );

        assert!(!report.is_clean());
        assert_eq!(report.failed_mappers(), 1);
        assert_eq!(report.failed_reducers(), 1);
        assert_eq!(report.timed_out_reducers(), 1);
        assert_eq!(report.records_written(), 1);

        match report.into_strict() {
            Err(Error::TasksFailed { failed, summary }) => {
                assert_eq!(failed, 3);
                assert!(summary.contains("1 timed out"));
            }
            other => panic!("Expected TasksFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_json_shape() {
        let report = report(
            vec![MapOutcome::Failed {
                reason: "io".into(),
            }],
            vec![],
        );

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["mappers"][0]["status"], "failed");
        assert_eq!(value["mappers"][0]["reason"], "io");
        assert_eq!(value["mappers"][0]["mapper_id"], 0);
    }
}
