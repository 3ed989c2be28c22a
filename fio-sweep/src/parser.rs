// SPDX-License-Identifier: Apache-2.0
//! Tolerant parsing of raw fio output units.
//!
//! Transport streams interleave fio json payloads with unrelated log lines,
//! and fio-3.x result dumps captured through a python-repr style pipeline
//! arrive with single-quoted string literals. A unit is recognized by the
//! tool-and-major-version signature at its head; everything else is noise
//! for the ingestion pass to skip.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::sweep::{BenchmarkRecord, ClassificationError};

/// Structural marker identifying a fio-3.x result unit, checked after quote
/// normalization.
pub const FIO_UNIT_MARKER: &str = "{\"fio version\": \"fio-3";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed fio result ({0})")]
    MalformedStructure(String),
    #[error("missing required field {0:?}")]
    MissingField(&'static str),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

/// Blind `'` -> `"` substitution. A genuine apostrophe inside a field value
/// would be corrupted; fio's result schema contains none, matching the
/// convention of the capture pipeline this was built for.
pub fn normalize_quotes(raw: &str) -> String {
    raw.replace('\'', "\"")
}

/// Does this raw unit carry the fio result signature? Accepts both quoting
/// conventions.
pub fn is_fio_unit(raw: &str) -> bool {
    let head: String = raw
        .trim_start()
        .chars()
        .take(FIO_UNIT_MARKER.len())
        .collect::<String>()
        .replace('\'', "\"");
    head.starts_with(FIO_UNIT_MARKER)
}

// Job-level options shadow global ones, as in fio itself.
fn lookup<'a>(job: &'a Value, global: &'a Value, name: &str) -> Option<&'a Value> {
    job.get("job options")
        .and_then(|opts| opts.get(name))
        .or_else(|| global.get(name))
}

fn lookup_str(job: &Value, global: &Value, name: &'static str) -> Result<String, ParseError> {
    match lookup(job, global, name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(v) => Err(ParseError::MalformedStructure(format!(
            "field {:?} has non-scalar value {}",
            name, v
        ))),
        None => Err(ParseError::MissingField(name)),
    }
}

/// fio block sizes come as plain KiB counts or with a k/m suffix.
fn parse_block_size(input: &str) -> Result<u64, ParseError> {
    let trimmed = input.trim();
    let (digits, mult) = match trimmed.char_indices().last() {
        Some((idx, 'k')) | Some((idx, 'K')) => (&trimmed[..idx], 1),
        Some((idx, 'm')) | Some((idx, 'M')) => (&trimmed[..idx], 1024),
        _ => (trimmed, 1),
    };
    match digits.parse::<u64>() {
        Ok(v) if v > 0 => Ok(v * mult),
        _ => Err(ParseError::MalformedStructure(format!(
            "invalid block size {:?}",
            input
        ))),
    }
}

fn parse_queue_depth(input: &str) -> Result<u32, ParseError> {
    match input.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ParseError::MalformedStructure(format!(
            "invalid queue depth {:?}",
            input
        ))),
    }
}

fn side_metrics(job: &Value, side_key: &'static str) -> Result<BTreeMap<String, f64>, ParseError> {
    let side = job
        .get(side_key)
        .and_then(|v| v.as_object())
        .ok_or(ParseError::MissingField(side_key))?;

    let mut metrics = BTreeMap::new();
    for (name, val) in side.iter() {
        // Only scalar, non-negative stats are series material; nested
        // latency histograms and the like are skipped.
        if let Some(v) = val.as_f64() {
            if v >= 0.0 {
                metrics.insert(name.clone(), v);
            }
        }
    }
    Ok(metrics)
}

/// Parses one raw text unit into its benchmark records, one per fio job
/// entry. The caller is expected to have applied [`is_fio_unit`] first;
/// units failing here are malformed fio output, not noise.
pub fn parse_units(raw: &str) -> Result<Vec<BenchmarkRecord>, ParseError> {
    let text = normalize_quotes(raw);
    let root: Value = serde_json::from_str(text.trim())
        .map_err(|e| ParseError::MalformedStructure(e.to_string()))?;

    let global = root.get("global options").cloned().unwrap_or(Value::Null);
    let jobs = root
        .get("jobs")
        .and_then(|j| j.as_array())
        .filter(|j| !j.is_empty())
        .ok_or(ParseError::MissingField("jobs"))?;

    let mut records = Vec::with_capacity(jobs.len());
    for job in jobs {
        let engine = lookup_str(job, &global, "ioengine")?.parse()?;
        let pattern: crate::sweep::IoPattern = lookup_str(job, &global, "rw")?.parse()?;
        let block_size = parse_block_size(&lookup_str(job, &global, "bs")?)?;
        let queue_depth = parse_queue_depth(&lookup_str(job, &global, "iodepth")?)?;
        let metrics = side_metrics(job, pattern.side().json_key())?;

        records.push(BenchmarkRecord {
            engine,
            pattern,
            block_size,
            queue_depth,
            metrics,
        });
    }
    Ok(records)
}
