// SPDX-License-Identifier: Apache-2.0
//! Chart rendering for grouped sweep series. Pure presentation: series are
//! assembled by the caller and nothing here reads thresholds or mutates
//! the study.

use anyhow::{bail, Result};
use plotlib::page::Page;
use plotlib::repr::{BarChart, Plot};
use plotlib::style::{BoxStyle, LineStyle, PointMarker, PointStyle};
use plotlib::view::{CategoricalView, ContinuousView, View};
use std::io::Write;

const TEXT_SIZE: (u32, u32) = (80, 24);
const SVG_SIZE: (u32, u32) = (576, 468);

const SERIES_COLOURS: &[&str] = &[
    "#37c0e6", "#3749e6", "#e6a437", "#49e637", "#9437e6", "#e63737",
];

fn series_colour(idx: usize) -> &'static str {
    SERIES_COLOURS[idx % SERIES_COLOURS.len()]
}

pub fn metric_unit(metric: &str) -> &'static str {
    match metric {
        "bw" => "KiB/sec",
        "iops" => "IOPS",
        "runtime" => "msec",
        _ => "",
    }
}

/// One named series aligned to the head of the block-size axis. May be
/// shorter than the axis; only the available prefix is drawn.
#[derive(Debug, Clone)]
pub struct AxisSeries {
    pub name: String,
    pub values: Vec<f64>,
}

pub struct Grapher<'a> {
    out: Box<dyn Write + 'a>,
    file_prefix: Option<String>,
}

impl<'a> Grapher<'a> {
    pub fn new(out: Box<dyn Write + 'a>, file_prefix: Option<&str>) -> Self {
        Self {
            out,
            file_prefix: file_prefix.map(|x| x.to_owned()),
        }
    }

    fn plot_filename(&self, slug: &str) -> String {
        format!("{}-{}.svg", self.file_prefix.as_ref().unwrap(), slug)
    }

    fn y_label(metric: &str) -> String {
        match metric_unit(metric) {
            "" => metric.to_string(),
            unit => format!("{} [{}]", metric, unit),
        }
    }

    fn emit(&mut self, view: &dyn View, title: &str, slug: &str) -> Result<()> {
        let text = Page::single(view)
            .dimensions(TEXT_SIZE.0, TEXT_SIZE.1)
            .to_text()
            .unwrap();
        write!(self.out, "{}\n{}\n\n", title, &text)?;

        if self.file_prefix.is_some() {
            if let Err(e) = Page::single(view)
                .dimensions(SVG_SIZE.0, SVG_SIZE.1)
                .save(self.plot_filename(slug))
            {
                bail!("failed to save {:?} ({})", &self.plot_filename(slug), &e);
            }
        }
        Ok(())
    }

    /// One line per series across the block-size axis, circle markers at
    /// each point. Series colours are spelled out in the x label since
    /// plotlib views carry no legend.
    pub fn plot_lines(
        &mut self,
        title: &str,
        slug: &str,
        metric: &str,
        axis: &[u64],
        series: &[AxisSeries],
    ) -> Result<()> {
        let mut view = ContinuousView::new();
        let mut x_max = 0.0_f64;
        let mut y_max = 0.0_f64;
        let mut legend = vec![];

        for (idx, s) in series.iter().enumerate() {
            // zip truncates to the available prefix
            let points: Vec<(f64, f64)> = axis
                .iter()
                .zip(s.values.iter())
                .map(|(&x, &y)| (x as f64, y))
                .collect();
            for &(x, y) in points.iter() {
                x_max = x_max.max(x);
                y_max = y_max.max(y);
            }
            legend.push(format!("{}={}", &s.name, series_colour(idx)));
            view = view.add(
                Plot::new(points)
                    .line_style(LineStyle::new().colour(series_colour(idx)))
                    .point_style(
                        PointStyle::new()
                            .marker(PointMarker::Circle)
                            .colour(series_colour(idx)),
                    ),
            );
        }

        let view = view
            .x_range(0.0, (x_max * 1.1).max(1.0))
            .y_range(0.0, (y_max * 1.1).max(1.0))
            .x_label(format!("block size [KiB] ({})", legend.join(" ")))
            .y_label(Self::y_label(metric))
            .x_max_ticks(10)
            .y_max_ticks(10);

        self.emit(&view, title, slug)
    }

    /// One category group per block size, one bar per series inside it,
    /// emitted group-major so a group's bars sit adjacent. Cells a series
    /// never reached render no bar. The terminal gets the same data as an
    /// aligned table; the SVG artifact carries the actual bars.
    pub fn plot_bars(
        &mut self,
        title: &str,
        slug: &str,
        metric: &str,
        groups: &[u64],
        series: &[AxisSeries],
    ) -> Result<()> {
        writeln!(self.out, "{}", title)?;
        write!(self.out, "{:>8}", "bs")?;
        for s in series.iter() {
            write!(self.out, "  {:>10}", &s.name)?;
        }
        writeln!(self.out, "  [{}]", Self::y_label(metric))?;
        for (grp_idx, &block_size) in groups.iter().enumerate() {
            write!(self.out, "{:>7}k", block_size)?;
            for s in series.iter() {
                match s.values.get(grp_idx) {
                    Some(val) => write!(self.out, "  {:>10.1}", val)?,
                    None => write!(self.out, "  {:>10}", "-")?,
                }
            }
            writeln!(self.out, "")?;
        }
        writeln!(self.out, "")?;

        if self.file_prefix.is_none() {
            return Ok(());
        }

        let mut view = CategoricalView::new();
        for (grp_idx, &block_size) in groups.iter().enumerate() {
            for (idx, s) in series.iter().enumerate() {
                if let Some(&val) = s.values.get(grp_idx) {
                    view = view.add(
                        BarChart::new(val)
                            .label(format!("{}k/{}", block_size, &s.name))
                            .style(&BoxStyle::new().fill(series_colour(idx))),
                    );
                }
            }
        }
        let view = view
            .x_label("block size / queue depth")
            .y_label(Self::y_label(metric));

        if let Err(e) = Page::single(&view)
            .dimensions(SVG_SIZE.0, SVG_SIZE.1)
            .save(self.plot_filename(slug))
        {
            bail!("failed to save {:?} ({})", &self.plot_filename(slug), &e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_series_renders_prefix() {
        let mut out: Vec<u8> = vec![];
        {
            let mut grapher = Grapher::new(Box::new(&mut out), None);
            grapher
                .plot_lines(
                    "seq read bw per engine",
                    "read-bw-qd1-lines",
                    "bw",
                    &[4, 32, 128, 512, 1024],
                    &[AxisSeries {
                        name: "mmap".to_string(),
                        values: vec![100.0, 200.0, 300.0],
                    }],
                )
                .unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("seq read bw per engine"));
        assert!(text.contains("KiB/sec"));
        // Three observations on a five-value axis: exactly three markers.
        assert_eq!(text.matches('\u{25cf}').count(), 3);
    }

    #[test]
    fn test_grouped_bars_with_missing_cells() {
        let mut out: Vec<u8> = vec![];
        {
            let mut grapher = Grapher::new(Box::new(&mut out), None);
            grapher
                .plot_bars(
                    "randread iops",
                    "randread-iops-bars",
                    "iops",
                    &[4, 32, 128],
                    &[
                        AxisSeries {
                            name: "qd1".to_string(),
                            values: vec![10.0, 20.0, 30.0],
                        },
                        AxisSeries {
                            name: "qd32".to_string(),
                            values: vec![40.0],
                        },
                    ],
                )
                .unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("randread iops"));
        assert!(text.contains("qd32"));
        assert!(text.contains("40.0"));
        // qd32 never reached 32k and 128k; those cells render as gaps.
        let gap_rows: Vec<&str> = text.lines().filter(|l| l.ends_with("-")).collect();
        assert_eq!(gap_rows.len(), 2);
    }
}
