// SPDX-License-Identifier: Apache-2.0
//! Threshold bands and pass/fail gating.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Min(f64),
    Max(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundViolation {
    pub metric: String,
    pub value: f64,
    pub bound: Bound,
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.bound {
            Bound::Min(min) => write!(
                f,
                "{}={} at or below min bound {} (short by {})",
                self.metric,
                self.value,
                min,
                min - self.value
            ),
            Bound::Max(max) => write!(
                f,
                "{}={} at or above max bound {} (over by {})",
                self.metric,
                self.value,
                max,
                self.value - max
            ),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct GateFailure(pub BoundViolation);

#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Pass,
    Fail(BoundViolation),
}

impl GateVerdict {
    pub fn into_result(self) -> Result<(), GateFailure> {
        match self {
            Self::Pass => Ok(()),
            Self::Fail(violation) => Err(GateFailure(violation)),
        }
    }
}

/// Known-good bands, metric name -> (min, max), both bounds exclusive.
/// Loaded once at startup and read-only afterwards. Metrics without a band
/// always pass; the band set is a strict allow-list, not a universal
/// requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSpec {
    bands: BTreeMap<String, (f64, f64)>,
}

impl Default for ThresholdSpec {
    /// The known-good drive bands the sweep was originally tuned against.
    fn default() -> Self {
        Self::from_bands(vec![
            ("bw".to_string(), (150000.0, 400000.0)),
            ("iops".to_string(), (40000.0, 100000.0)),
            ("runtime".to_string(), (1400.0, 3000.0)),
        ])
    }
}

impl ThresholdSpec {
    /// Fio stat names are terse; accept the descriptive aliases too.
    pub fn canonical_metric(name: &str) -> &str {
        match name {
            "bandwidth" => "bw",
            "operations-per-second" => "iops",
            "elapsed-time" => "runtime",
            other => other,
        }
    }

    pub fn from_bands<I>(bands: I) -> Self
    where
        I: IntoIterator<Item = (String, (f64, f64))>,
    {
        Self {
            bands: bands
                .into_iter()
                .map(|(name, band)| (Self::canonical_metric(&name).to_string(), band))
                .collect(),
        }
    }

    /// Loads a JSON map of metric -> [min, max].
    pub fn load(path: &str) -> Result<Self> {
        let buf =
            fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
        let raw: BTreeMap<String, (f64, f64)> = serde_json::from_str(&buf)
            .with_context(|| format!("failed to parse threshold file {:?}", path))?;
        for (name, (min, max)) in raw.iter() {
            if min >= max {
                bail!("threshold band for {:?} has min {} >= max {}", name, min, max);
            }
        }
        Ok(Self::from_bands(raw))
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(|name| name.as_str())
    }

    /// Judges the single value given; any averaging across repeated runs is
    /// the caller's to do beforehand. Never escalates on its own.
    pub fn check(&self, metric: &str, value: f64) -> GateVerdict {
        let name = Self::canonical_metric(metric);
        match self.bands.get(name) {
            None => GateVerdict::Pass,
            Some(&(min, _)) if value <= min => GateVerdict::Fail(BoundViolation {
                metric: name.to_string(),
                value,
                bound: Bound::Min(min),
            }),
            Some(&(_, max)) if value >= max => GateVerdict::Fail(BoundViolation {
                metric: name.to_string(),
                value,
                bound: Bound::Max(max),
            }),
            Some(_) => GateVerdict::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_bounds() {
        let spec = ThresholdSpec::from_bands(vec![(
            "bw".to_string(),
            (150000.0, 400000.0),
        )]);

        assert_eq!(spec.check("bw", 150001.0), GateVerdict::Pass);
        assert_eq!(spec.check("bw", 399999.0), GateVerdict::Pass);

        match spec.check("bw", 150000.0) {
            GateVerdict::Fail(v) => assert_eq!(v.bound, Bound::Min(150000.0)),
            v => panic!("expected min violation, got {:?}", v),
        }
        match spec.check("bw", 400000.0) {
            GateVerdict::Fail(v) => assert_eq!(v.bound, Bound::Max(400000.0)),
            v => panic!("expected max violation, got {:?}", v),
        }
    }

    #[test]
    fn test_unbanded_metric_passes() {
        let spec = ThresholdSpec::default();
        assert_eq!(spec.check("io_bytes", 0.0), GateVerdict::Pass);
    }

    #[test]
    fn test_aliases() {
        let spec = ThresholdSpec::from_bands(vec![(
            "bandwidth".to_string(),
            (10.0, 20.0),
        )]);
        // Band declared via alias, checked via fio's own name and back.
        assert_ne!(spec.check("bw", 5.0), GateVerdict::Pass);
        assert_ne!(spec.check("bandwidth", 25.0), GateVerdict::Pass);
        assert_eq!(spec.check("bw", 15.0), GateVerdict::Pass);
        assert_eq!(spec.metrics().collect::<Vec<_>>(), vec!["bw"]);
    }

    #[test]
    fn test_violation_diagnostics() {
        let spec = ThresholdSpec::default();
        let err = spec.check("bw", 145000.0).into_result().unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("min bound 150000"));
        assert!(msg.contains("short by 5000"));
    }

    #[test]
    fn test_load_rejects_inverted_band() {
        let dir = std::env::temp_dir();
        let path = dir.join("fio-sweep-test-thresholds.json");
        std::fs::write(&path, r#"{"bw": [400000, 150000]}"#).unwrap();
        assert!(ThresholdSpec::load(path.to_str().unwrap()).is_err());
        std::fs::write(&path, r#"{"operations-per-second": [40000, 100000]}"#).unwrap();
        let spec = ThresholdSpec::load(path.to_str().unwrap()).unwrap();
        assert_eq!(spec.metrics().collect::<Vec<_>>(), vec!["iops"]);
        let _ = std::fs::remove_file(&path);
    }
}
