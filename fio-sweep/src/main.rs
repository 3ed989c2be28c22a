// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use log::{error, info};
use std::fs;
use std::io::Write;
use std::process::exit;

use fio_sweep_intf::{Args, Mode};

mod gate;
mod graph;
mod parser;
mod study;
mod sweep;

use gate::ThresholdSpec;
use graph::{AxisSeries, Grapher};
use study::{ingest, IngestStats, SweepStudy};

// Gate failures and an empty ingestion are different conditions: the
// latter usually means the benchmark tool itself fell over upstream and
// must not look like a clean pass.
const EXIT_GATE_FAILED: i32 = 1;
const EXIT_NO_RECORDS: i32 = 2;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Trace)
        .format_timestamp(None)
        .init();
    log::set_max_level(log::LevelFilter::Info);
}

fn apply_verbosity(verbosity: u32) {
    log::set_max_level(match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    });
}

fn ingest_results(args: &Args) -> Result<(SweepStudy, IngestStats)> {
    let buf = fs::read_to_string(&args.results)
        .with_context(|| format!("failed to read {:?}", &args.results))?;

    let mut study = SweepStudy::new();
    let stats = ingest(buf.lines(), &mut study);
    info!(
        "ingested {} record(s): {} noise unit(s) skipped, {} unit(s) rejected",
        stats.parsed,
        stats.noise,
        stats.rejected.len()
    );
    Ok((study, stats))
}

fn run_check(args: &Args, study: &SweepStudy) -> Result<u32> {
    let tspec = match args.thresholds.as_deref() {
        Some(path) => ThresholdSpec::load(path)?,
        None => ThresholdSpec::default(),
    };
    let metrics: Vec<String> = tspec.metrics().map(|m| m.to_string()).collect();

    let mut nr_failed = 0;
    for key in study.keys() {
        for metric in metrics.iter() {
            for (idx, &val) in study.get(key, metric).iter().enumerate() {
                match tspec.check(metric, val).into_result() {
                    Ok(()) => println!("PASS {} {}[{}] = {}", key, metric, idx, val),
                    Err(e) => {
                        println!("FAIL {} [{}]: {}", key, idx, e);
                        nr_failed += 1;
                    }
                }
            }
        }
    }
    Ok(nr_failed)
}

fn run_graph(args: &Args, study: &SweepStudy) -> Result<()> {
    let stdout = std::io::stdout();
    let mut grapher = Grapher::new(Box::new(stdout.lock()), args.prefix.as_deref());

    for metric in args.metrics.iter() {
        // Grouped bars: per sweep cell family, block-size groups with one
        // bar per queue depth.
        for (engine, pattern) in study.engine_patterns() {
            let series: Vec<AxisSeries> = args
                .queue_depths
                .iter()
                .map(|&qd| AxisSeries {
                    name: format!("qd{}", qd),
                    values: study.sweep_series(engine, pattern, qd, metric, &args.block_sizes),
                })
                .filter(|s| !s.values.is_empty())
                .collect();
            if series.is_empty() {
                continue;
            }
            grapher.plot_bars(
                &format!("fio {} {} on {} across block sizes", pattern, metric, engine),
                &format!("{}-{}-{}-bars", engine, pattern, metric),
                metric,
                &args.block_sizes,
                &series,
            )?;
        }

        // Engine comparison lines at the first configured queue depth.
        let qd = args.queue_depths[0];
        for pattern in study.patterns() {
            let series: Vec<AxisSeries> = study
                .engines()
                .into_iter()
                .map(|engine| AxisSeries {
                    name: engine.to_string(),
                    values: study.sweep_series(engine, pattern, qd, metric, &args.block_sizes),
                })
                .filter(|s| !s.values.is_empty())
                .collect();
            if series.is_empty() {
                continue;
            }
            grapher.plot_lines(
                &format!("fio {} {} per engine at qd{}", pattern, metric, qd),
                &format!("{}-{}-qd{}-lines", pattern, metric, qd),
                metric,
                &args.block_sizes,
                &series,
            )?;
        }
    }
    Ok(())
}

fn run_summary(args: &Args, study: &SweepStudy) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for key in study.keys() {
        writeln!(out, "{}", key)?;
        for metric in args.metrics.iter() {
            if let Some((count, min, mean, max)) = study.metric_summary(key, metric) {
                writeln!(
                    out,
                    "  {:<10} n={:<3} min={:.1} mean={:.1} max={:.1}",
                    metric, count, min, mean, max
                )?;
            }
        }
    }
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::init();
    apply_verbosity(args.verbosity);

    let (study, stats) = match ingest_results(&args) {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to ingest results ({})", &e);
            exit(1);
        }
    };

    if stats.parsed == 0 {
        error!(
            "No valid fio result units in {:?} - benchmark output missing or unrecognized \
             ({} noise unit(s), {} rejected)",
            &args.results,
            stats.noise,
            stats.rejected.len()
        );
        exit(EXIT_NO_RECORDS);
    }

    match args.mode {
        Mode::Check => match run_check(&args, &study) {
            Ok(0) => println!("all gates passed ({} record(s))", stats.parsed),
            Ok(nr_failed) => {
                error!("{} gate check(s) failed", nr_failed);
                exit(EXIT_GATE_FAILED);
            }
            Err(e) => {
                error!("Failed to run gate checks ({})", &e);
                exit(1);
            }
        },
        Mode::Graph => {
            if let Err(e) = run_graph(&args, &study) {
                error!("Failed to render graphs ({})", &e);
                exit(1);
            }
        }
        Mode::Summary => {
            if let Err(e) = run_summary(&args, &study) {
                error!("Failed to summarize results ({})", &e);
                exit(1);
            }
        }
    }
}
