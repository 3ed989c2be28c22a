// SPDX-License-Identifier: Apache-2.0
//! Per-sweep-cell metric series and the ingestion pass that fills them.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::parser;
use crate::sweep::{IoEngine, IoPattern, SweepKey};

/// One mapping from sweep cell to per-metric series, replacing the loose
/// per-metric dictionaries an ad hoc sweep script would keep in sync by
/// convention. Series preserve append order so the caller can correlate
/// the Nth value with the Nth entry of its configured sweep list.
#[derive(Debug, Default)]
pub struct SweepStudy {
    series: BTreeMap<SweepKey, BTreeMap<String, Vec<f64>>>,
}

impl SweepStudy {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends one observation. A metric absent from `metrics` simply does
    /// not extend its series; no placeholder is inserted, so series sharing
    /// a key may end up with different lengths.
    pub fn append(&mut self, key: &SweepKey, metrics: &BTreeMap<String, f64>) {
        let cell = self.series.entry(key.clone()).or_default();
        for (name, val) in metrics.iter() {
            cell.entry(name.clone()).or_default().push(*val);
        }
    }

    /// Ordered values observed for `metric` under `key`; empty if unseen.
    pub fn get(&self, key: &SweepKey, metric: &str) -> &[f64] {
        self.series
            .get(key)
            .and_then(|cell| cell.get(metric))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &SweepKey> {
        self.series.keys()
    }

    pub fn engines(&self) -> Vec<IoEngine> {
        self.series
            .keys()
            .map(|k| k.engine)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn patterns(&self) -> Vec<IoPattern> {
        self.series
            .keys()
            .map(|k| k.pattern)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn engine_patterns(&self) -> Vec<(IoEngine, IoPattern)> {
        self.series
            .keys()
            .map(|k| (k.engine, k.pattern))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The representative value for one cell: its first observation, in
    /// keeping with series order being sweep order rather than merit order.
    pub fn cell_value(&self, key: &SweepKey, metric: &str) -> Option<f64> {
        self.get(key, metric).first().copied()
    }

    /// Walks `block_sizes` in display order collecting one value per cell
    /// and stops at the first unpopulated cell, yielding the available
    /// prefix. Keeps a truncated sweep aligned with the axis instead of
    /// silently shifting later block sizes left.
    pub fn sweep_series(
        &self,
        engine: IoEngine,
        pattern: IoPattern,
        queue_depth: u32,
        metric: &str,
        block_sizes: &[u64],
    ) -> Vec<f64> {
        let mut vals = vec![];
        for &block_size in block_sizes {
            let key = SweepKey {
                engine,
                pattern,
                block_size,
                queue_depth,
            };
            match self.cell_value(&key, metric) {
                Some(v) => vals.push(v),
                None => break,
            }
        }
        vals
    }

    /// (count, min, mean, max) over one series, None if unseen.
    pub fn metric_summary(&self, key: &SweepKey, metric: &str) -> Option<(usize, f64, f64, f64)> {
        let vals = self.get(key, metric);
        if vals.is_empty() {
            return None;
        }
        let mut min = std::f64::MAX;
        let mut max = std::f64::MIN;
        for v in vals.iter() {
            min = min.min(*v);
            max = max.max(*v);
        }
        Some((vals.len(), min, statistical::mean(vals), max))
    }
}

#[derive(Debug, Default)]
pub struct IngestStats {
    /// Records appended to the study.
    pub parsed: usize,
    /// Units without the fio signature, skipped silently.
    pub noise: usize,
    /// Diagnostics for units that carried the signature but failed to
    /// parse or classify.
    pub rejected: Vec<String>,
}

/// Feeds raw units through recognition, parsing and aggregation. Failures
/// are local: the offending unit is skipped with a diagnostic and the run
/// continues, since transport streams routinely interleave unrelated
/// content with genuine fio output.
pub fn ingest<'a, I>(units: I, study: &mut SweepStudy) -> IngestStats
where
    I: IntoIterator<Item = &'a str>,
{
    let mut stats = IngestStats::default();

    for (idx, unit) in units.into_iter().enumerate() {
        if !parser::is_fio_unit(unit) {
            stats.noise += 1;
            continue;
        }
        match parser::parse_units(unit) {
            Ok(records) => {
                for rec in records.iter() {
                    let key = rec.key();
                    debug!("unit {}: {} ({} metrics)", idx + 1, &key, rec.metrics.len());
                    study.append(&key, &rec.metrics);
                    stats.parsed += 1;
                }
            }
            Err(e) => {
                let diag = format!("unit {}: {}", idx + 1, &e);
                warn!("{}", &diag);
                stats.rejected.push(diag);
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(block_size: u64, queue_depth: u32) -> SweepKey {
        SweepKey {
            engine: IoEngine::Libaio,
            pattern: IoPattern::RandRead,
            block_size,
            queue_depth,
        }
    }

    fn metrics(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn test_append_order_preserved() {
        let mut study = SweepStudy::new();
        let a = key(4, 1);
        let b = key(4, 32);

        study.append(&a, &metrics(&[("bw", 1.0)]));
        study.append(&b, &metrics(&[("bw", 2.0)]));
        study.append(&a, &metrics(&[("bw", 3.0)]));

        assert_eq!(study.get(&a, "bw"), &[1.0, 3.0]);
        assert_eq!(study.get(&b, "bw"), &[2.0]);
        assert_eq!(study.get(&key(8, 1), "bw"), &[] as &[f64]);
    }

    #[test]
    fn test_sparse_metric_no_placeholder() {
        let mut study = SweepStudy::new();
        let k = key(4, 1);
        study.append(&k, &metrics(&[("bw", 1.0), ("iops", 10.0)]));
        study.append(&k, &metrics(&[("bw", 2.0)]));

        assert_eq!(study.get(&k, "bw").len(), 2);
        assert_eq!(study.get(&k, "iops"), &[10.0]);
    }

    #[test]
    fn test_sweep_series_prefix() {
        let mut study = SweepStudy::new();
        for &bs in &[4, 32, 128] {
            study.append(&key(bs, 1), &metrics(&[("bw", bs as f64)]));
        }
        // 512 and 1024 never ran; the series is the available prefix.
        let series = study.sweep_series(
            IoEngine::Libaio,
            IoPattern::RandRead,
            1,
            "bw",
            &[4, 32, 128, 512, 1024],
        );
        assert_eq!(series, vec![4.0, 32.0, 128.0]);

        // A hole in the middle ends the prefix rather than shifting
        // later values onto the wrong axis position.
        let series = study.sweep_series(
            IoEngine::Libaio,
            IoPattern::RandRead,
            1,
            "bw",
            &[4, 8, 32],
        );
        assert_eq!(series, vec![4.0]);
    }

    #[test]
    fn test_metric_summary() {
        let mut study = SweepStudy::new();
        let k = key(4, 1);
        for v in &[2.0, 6.0, 4.0] {
            study.append(&k, &metrics(&[("bw", *v)]));
        }
        assert_eq!(study.metric_summary(&k, "bw"), Some((3, 2.0, 4.0, 6.0)));
        assert_eq!(study.metric_summary(&k, "lat"), None);
    }

    #[test]
    fn test_ingest_end_to_end() {
        let _ = ::env_logger::try_init();
        let units = vec![
            crate::parser::tests::sample_unit("4k", 1, "randread", 160000),
            "[ 67.120697] EXT4-fs (vdb): mounted filesystem".to_string(),
            crate::parser::tests::sample_unit("4k", 32, "randread", 380000),
            // Carries the signature but is structurally broken.
            "{'fio version': 'fio-3.1', 'jobs': [".to_string(),
        ];

        let mut study = SweepStudy::new();
        let stats = ingest(units.iter().map(|u| u.as_str()), &mut study);

        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.noise, 1);
        assert_eq!(stats.rejected.len(), 1);
        assert!(stats.rejected[0].contains("unit 4"));

        // Two series under keys differing only by queue depth.
        assert_eq!(study.get(&key(4, 1), "bw"), &[160000.0]);
        assert_eq!(study.get(&key(4, 32), "bw"), &[380000.0]);
        assert_eq!(study.keys().count(), 2);

        let gate = crate::gate::ThresholdSpec::default();
        for k in study.keys() {
            for &v in study.get(k, "bw") {
                assert_eq!(gate.check("bw", v), crate::gate::GateVerdict::Pass);
            }
        }
    }
}
