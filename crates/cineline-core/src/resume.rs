//! Resumption planning against an existing sink
//!
//! A job run may stop partway through. Before harvesting per-id
//! records, the planner reads the ids already present in the sink and
//! cuts them from the candidate list, so a rerun only pays for what is
//! missing. The decision is policy-driven; nothing here prompts.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::SinkError;

/// What to do when the sink already holds rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumePolicy {
    /// Keep existing rows and harvest only the missing ids.
    Append,
    /// Discard the sink and harvest every candidate again.
    Fresh,
}

/// How the writer must open the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate, start from nothing.
    Fresh,
    /// Extend the rows already on disk.
    Append,
}

/// The resolved plan for one sink.
#[derive(Debug)]
pub struct ResumePlan {
    pub mode: WriteMode,
    /// Candidates still to harvest, in candidate order, deduplicated.
    pub work_set: Vec<u64>,
    /// Whether the first non-empty batch must carry the header row.
    pub header_needed: bool,
    /// Ids the sink already holds.
    pub already_present: usize,
}

/// Decide mode, work set and header for one sink.
///
/// A sink that is absent or zero-length always means a fresh start,
/// whatever the policy. An existing sink without the id column is
/// fatal: it was not written by this harvester.
pub fn resolve_write_mode(
    sink: &Path,
    id_column: &str,
    candidates: &[u64],
    policy: ResumePolicy,
) -> Result<ResumePlan, SinkError> {
    let populated = match fs::metadata(sink) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    };

    if !populated || policy == ResumePolicy::Fresh {
        return Ok(ResumePlan {
            mode: WriteMode::Fresh,
            work_set: dedup_in_order(candidates, &FxHashSet::default()),
            header_needed: true,
            already_present: 0,
        });
    }

    let existing = read_id_column(sink, id_column)?;
    Ok(ResumePlan {
        mode: WriteMode::Append,
        work_set: dedup_in_order(candidates, &existing),
        header_needed: false,
        already_present: existing.len(),
    })
}

fn dedup_in_order(candidates: &[u64], existing: &FxHashSet<u64>) -> Vec<u64> {
    let mut seen = FxHashSet::default();
    candidates
        .iter()
        .copied()
        .filter(|id| !existing.contains(id) && seen.insert(*id))
        .collect()
}

/// Read an id column back from a sink, in row order, duplicates kept.
/// Rows whose field does not parse as an id are logged and skipped.
pub fn sink_ids(sink: &Path, id_column: &str) -> Result<Vec<u64>, SinkError> {
    let mut reader = csv::Reader::from_path(sink).map_err(SinkError::Csv)?;
    let headers = reader.headers().map_err(SinkError::Csv)?;
    let idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| SinkError::MissingColumn {
            column: id_column.to_string(),
            path: sink.to_path_buf(),
        })?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(SinkError::Csv)?;
        let Some(field) = record.get(idx) else {
            continue;
        };
        match field.parse::<u64>() {
            Ok(id) => ids.push(id),
            Err(_) => log::debug!("{}: unparsable id {field:?}", sink.display()),
        }
    }
    Ok(ids)
}

fn read_id_column(sink: &Path, id_column: &str) -> Result<FxHashSet<u64>, SinkError> {
    Ok(sink_ids(sink, id_column)?.into_iter().collect())
}
