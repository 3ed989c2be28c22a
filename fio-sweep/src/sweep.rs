// SPDX-License-Identifier: Apache-2.0
//! Sweep coordinates and classification.
//!
//! A benchmark sweep repeats the same fio workload across the cross product
//! of (io engine, access pattern, block size, queue depth). Everything that
//! decides which sweep cell an observation belongs to lives here, including
//! the read/write family split consumed by the parser when picking which
//! metric side to extract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("unknown access pattern {0:?}")]
    UnknownPattern(String),
    #[error("unknown io engine {0:?}")]
    UnknownEngine(String),
}

/// I/O submission mechanism under test. Unknown engine names are rejected
/// rather than lumped into a catch-all bucket so that a typo in a sweep
/// config can't silently pollute another engine's series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IoEngine {
    Libaio,
    Mmap,
    Sync,
    Psync,
}

impl FromStr for IoEngine {
    type Err = ClassificationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "libaio" => Ok(Self::Libaio),
            "mmap" => Ok(Self::Mmap),
            "sync" => Ok(Self::Sync),
            "psync" => Ok(Self::Psync),
            v => Err(ClassificationError::UnknownEngine(v.to_string())),
        }
    }
}

impl fmt::Display for IoEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Libaio => write!(f, "libaio"),
            Self::Mmap => write!(f, "mmap"),
            Self::Sync => write!(f, "sync"),
            Self::Psync => write!(f, "psync"),
        }
    }
}

/// Which side of a fio job result carries the metrics for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSide {
    Read,
    Write,
}

impl MetricSide {
    pub fn json_key(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Access pattern, named as fio names them. Mixed patterns (randrw, rw)
/// don't fit the two-family split and fail classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IoPattern {
    RandRead,
    RandWrite,
    Read,
    Write,
}

impl IoPattern {
    /// The single source of truth for the read/write family split. The
    /// parser uses this to pick the metric side and aggregation uses the
    /// pattern itself, so the two can never disagree.
    pub fn side(&self) -> MetricSide {
        match self {
            Self::RandRead | Self::Read => MetricSide::Read,
            Self::RandWrite | Self::Write => MetricSide::Write,
        }
    }
}

impl FromStr for IoPattern {
    type Err = ClassificationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "randread" => Ok(Self::RandRead),
            "randwrite" => Ok(Self::RandWrite),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            v => Err(ClassificationError::UnknownPattern(v.to_string())),
        }
    }
}

impl fmt::Display for IoPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RandRead => write!(f, "randread"),
            Self::RandWrite => write!(f, "randwrite"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Canonical identity of one sweep cell. Two records with identical keys
/// belong to the same series regardless of arrival order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SweepKey {
    pub engine: IoEngine,
    pub pattern: IoPattern,
    pub block_size: u64,
    pub queue_depth: u32,
}

impl fmt::Display for SweepKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}k/qd{}",
            self.engine, self.pattern, self.block_size, self.queue_depth
        )
    }
}

/// One parsed fio job observation. Immutable once built; `metrics` holds
/// only the side matching the pattern's family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub engine: IoEngine,
    pub pattern: IoPattern,
    pub block_size: u64,
    pub queue_depth: u32,
    pub metrics: BTreeMap<String, f64>,
}

impl BenchmarkRecord {
    pub fn key(&self) -> SweepKey {
        SweepKey {
            engine: self.engine,
            pattern: self.pattern,
            block_size: self.block_size,
            queue_depth: self.queue_depth,
        }
    }
}
