// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::process::exit;

lazy_static::lazy_static! {
    static ref TOP_ARGS_STR: String = {
        let dfl_args = Args::default();
        format!(
            "-t, --thresholds=[FILE]    'Threshold band file, JSON map of metric -> (min, max) (dfl: built-in drive bands)'
             -B, --block-sizes=[LIST]   'Swept block sizes in KiB in display order (dfl: {dfl_bs})'
             -Q, --queue-depths=[LIST]  'Swept queue depths in display order (dfl: {dfl_qd})'
             -m, --metrics=[LIST]       'Metrics to graph and summarize (dfl: {dfl_metrics})'
             -v...                      'Sets the level of verbosity'",
            dfl_bs = format_list(&dfl_args.block_sizes),
            dfl_qd = format_list(&dfl_args.queue_depths),
            dfl_metrics = dfl_args.metrics.join(","),
        )
    };
}

fn format_list<T: std::fmt::Display>(list: &[T]) -> String {
    list.iter()
        .map(|v| format!("{}", v))
        .collect::<Vec<String>>()
        .join(",")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mode {
    Check,
    Graph,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Args {
    pub mode: Mode,
    pub results: String,
    pub thresholds: Option<String>,
    pub block_sizes: Vec<u64>,
    pub queue_depths: Vec<u32>,
    pub metrics: Vec<String>,

    #[serde(skip)]
    pub prefix: Option<String>,
    #[serde(skip)]
    pub verbosity: u32,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            mode: Mode::Summary,
            results: "".into(),
            thresholds: None,
            block_sizes: vec![4, 32, 128, 512, 1024],
            queue_depths: vec![1, 2, 8, 32],
            metrics: vec!["bw".into(), "iops".into()],
            prefix: None,
            verbosity: 0,
        }
    }
}

impl Args {
    fn build_app<'a, 'b>() -> clap::App<'a, 'b> {
        let results_arg = clap::Arg::with_name("RESULTFILE")
            .required(true)
            .help("File containing raw fio output units, one per line");

        clap::App::new("fio-sweep")
            .version(*super::VERSION)
            .about("Classifies, aggregates, gates and graphs fio storage sweep results")
            .setting(clap::AppSettings::UnifiedHelpMessage)
            .setting(clap::AppSettings::DeriveDisplayOrder)
            .setting(clap::AppSettings::SubcommandRequiredElseHelp)
            .args_from_usage(&TOP_ARGS_STR)
            .subcommand(
                clap::SubCommand::with_name("check")
                    .about("Gates every observed metric value against its threshold band")
                    .arg(results_arg.clone()),
            )
            .subcommand(
                clap::SubCommand::with_name("graph")
                    .about("Renders comparative charts across the sweep dimensions")
                    .arg(
                        clap::Arg::with_name("prefix")
                            .long("prefix")
                            .short("p")
                            .takes_value(true)
                            .help("Also save charts as PREFIX-*.svg"),
                    )
                    .arg(results_arg.clone()),
            )
            .subcommand(
                clap::SubCommand::with_name("summary")
                    .about("Prints per-sweep-cell metric summaries")
                    .arg(results_arg.clone()),
            )
    }

    pub fn parse_u64_list(input: &str) -> Result<Vec<u64>> {
        let mut vals = vec![];
        for tok in input.split(',').filter(|t| t.len() > 0) {
            match tok.trim().parse::<u64>() {
                Ok(v) if v > 0 => vals.push(v),
                _ => bail!("invalid list element {:?}", tok),
            }
        }
        if vals.len() == 0 {
            bail!("empty list");
        }
        Ok(vals)
    }

    fn process_matches(matches: &clap::ArgMatches) -> Result<Self> {
        let mut args = Self::default();
        args.verbosity = matches.occurrences_of("v") as u32;

        if let Some(v) = matches.value_of("thresholds") {
            args.thresholds = Some(v.to_string());
        }
        if let Some(v) = matches.value_of("block-sizes") {
            args.block_sizes = Self::parse_u64_list(v)?;
        }
        if let Some(v) = matches.value_of("queue-depths") {
            args.queue_depths = Self::parse_u64_list(v)?
                .into_iter()
                .map(|v| v as u32)
                .collect();
        }
        if let Some(v) = matches.value_of("metrics") {
            args.metrics = v
                .split(',')
                .filter(|t| t.len() > 0)
                .map(|t| t.trim().to_string())
                .collect();
            if args.metrics.len() == 0 {
                bail!("--metrics must name at least one metric");
            }
        }

        let (mode, subm) = match matches.subcommand() {
            ("check", Some(subm)) => (Mode::Check, subm),
            ("graph", Some(subm)) => (Mode::Graph, subm),
            ("summary", Some(subm)) => (Mode::Summary, subm),
            (name, _) => bail!("unknown subcommand {:?}", name),
        };
        args.mode = mode;
        args.results = subm.value_of("RESULTFILE").unwrap().to_string();
        if mode == Mode::Graph {
            args.prefix = subm.value_of("prefix").map(|v| v.to_string());
        }

        Ok(args)
    }

    pub fn init() -> Self {
        let matches = Self::build_app().get_matches();
        match Self::process_matches(&matches) {
            Ok(args) => args,
            Err(e) => {
                error!("Failed to process command line ({})", &e);
                exit(1);
            }
        }
    }

    /// Non-exiting variant for tests and embedding.
    pub fn init_from<I, T>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::build_app().get_matches_from_safe(iter)?;
        Self::process_matches(&matches)
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, Mode};

    #[test]
    fn test_check_cmdline() {
        let args = Args::init_from(vec![
            "fio-sweep",
            "-B",
            "4,32",
            "-Q",
            "1,32",
            "check",
            "results.txt",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::Check);
        assert_eq!(args.results, "results.txt");
        assert_eq!(args.block_sizes, vec![4, 32]);
        assert_eq!(args.queue_depths, vec![1, 32]);
        assert_eq!(args.metrics, vec!["bw".to_string(), "iops".to_string()]);
    }

    #[test]
    fn test_graph_prefix() {
        let args =
            Args::init_from(vec!["fio-sweep", "graph", "-p", "drive", "results.txt"]).unwrap();
        assert_eq!(args.mode, Mode::Graph);
        assert_eq!(args.prefix.as_deref(), Some("drive"));
    }

    #[test]
    fn test_bad_lists_rejected() {
        assert!(Args::init_from(vec!["fio-sweep", "-B", "4,zero", "check", "r"]).is_err());
        assert!(Args::init_from(vec!["fio-sweep", "-B", "0", "check", "r"]).is_err());
        assert!(Args::init_from(vec!["fio-sweep", "-m", ",", "check", "r"]).is_err());
    }
}
