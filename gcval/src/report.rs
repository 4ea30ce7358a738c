//! Validation reports: a CSV summary, Markdown and HTML narratives, a JSON document, and
//! diagnostic plots, all published through an `ArtifactSink`.
//!
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::compare::ComparisonRecord;
use crate::errors::Result;
use crate::plot;
use crate::sink::{put, ArtifactSink};
use crate::slice::TimeStep;
use crate::species::Species;
use crate::tolerance::Thresholds;
use crate::validator::{Outcome, ValidationOptions, Warning};

pub const CSV_NAME: &str = "validation_summary.csv";
pub const MARKDOWN_NAME: &str = "validation_report.md";
pub const HTML_NAME: &str = "validation_report.html";
pub const JSON_NAME: &str = "validation_report.json";
pub const PLOT_DIR: &str = "plots";

const TITLE: &str = "GEOS-Chem Scientific Validation Report";

/// How a validation was configured, as recorded in the report
#[derive(Clone, Debug, Serialize)]
pub struct Settings {
    pub reference: String,
    pub test: String,
    pub species: Vec<Species>,
    pub time_step: TimeStep,
    pub thresholds: Thresholds,
    pub custom_threshold: Option<f64>,
}

impl Settings {
    pub fn new(reference: &Path, test: &Path, options: &ValidationOptions) -> Self {
        Self {
            reference: reference.display().to_string(),
            test: test.display().to_string(),
            species: options.species.clone(),
            time_step: options.time_step,
            thresholds: options.thresholds,
            custom_threshold: options.custom_threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// One row of the CSV summary
#[derive(Debug, Serialize)]
pub struct SummaryRow<'a> {
    #[serde(rename = "Species")]
    pub species: &'a str,
    #[serde(rename = "Dataset")]
    pub dataset: &'a str,
    #[serde(rename = "Mean Reference")]
    pub mean_ref: f64,
    #[serde(rename = "Mean Test")]
    pub mean_test: f64,
    #[serde(rename = "Mean Difference")]
    pub mean_abs_diff: f64,
    #[serde(rename = "Max Difference")]
    pub max_abs_diff: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "Correlation")]
    pub corr_coef: f64,
    #[serde(rename = "Mean Rel Diff (%)")]
    pub mean_rel_diff_pct: f64,
    #[serde(rename = "Max Rel Diff (%)")]
    pub max_rel_diff_pct: f64,
    #[serde(rename = "Passes Validation")]
    pub passed: bool,
}

impl<'a> From<&'a ComparisonRecord> for SummaryRow<'a> {
    fn from(record: &'a ComparisonRecord) -> Self {
        let stats = &record.statistics;
        Self {
            species: record.species.as_str(),
            dataset: &record.file_id,
            mean_ref: stats.mean_ref,
            mean_test: stats.mean_test,
            mean_abs_diff: stats.mean_abs_diff,
            max_abs_diff: stats.max_abs_diff,
            rmse: stats.rmse,
            corr_coef: stats.corr_coef,
            mean_rel_diff_pct: stats.mean_rel_diff * 100.0,
            max_rel_diff_pct: stats.max_rel_diff * 100.0,
            passed: record.passed,
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    #[serde(flatten)]
    record: &'a ComparisonRecord,
    plot: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    settings: &'a Settings,
    summary: Summary,
    records: Vec<JsonRecord<'a>>,
    warnings: &'a [Warning],
}

/// Locations of everything written by `Report::publish`
#[derive(Clone, Debug, Default)]
pub struct Published {
    pub csv: String,
    pub markdown: String,
    pub html: String,
    pub json: String,
    pub plots: Vec<String>,
}

/// A complete validation report.
///
pub struct Report {
    pub settings: Settings,
    pub outcome: Outcome,
}

impl Report {
    pub fn new(settings: Settings, outcome: Outcome) -> Self {
        Self { settings, outcome }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total: self.outcome.total(),
            passed: self.outcome.passed(),
            failed: self.outcome.failed(),
        }
    }

    fn failed_records(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.outcome.records().filter(|record| !record.passed)
    }

    /// Species in the order they were requested, each with its records in file id order.
    fn by_species(&self) -> Vec<(&Species, Vec<&ComparisonRecord>)> {
        let mut grouped: Vec<(&Species, Vec<&ComparisonRecord>)> = vec![];
        for record in self.outcome.records() {
            match grouped.iter_mut().find(|(species, _)| **species == record.species) {
                Some((_, records)) => records.push(record),
                None => grouped.push((&record.species, vec![record])),
            }
        }

        grouped
    }

    /// Write the flat, one row per comparison, CSV summary.
    ///
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for record in self.outcome.records() {
            writer.serialize(SummaryRow::from(record))?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the machine readable report.
    ///
    /// # Arguments
    ///
    /// * `writer` - Where to write the JSON document.
    /// * `plots` - File names of plots that were successfully rendered, as produced by
    ///   `plot::file_name`. Records are linked to their plot only if it's in this set.
    ///
    pub fn write_json<W: Write>(&self, writer: W, plots: &BTreeSet<String>) -> Result<()> {
        let records = self
            .outcome
            .records()
            .map(|record| JsonRecord {
                record,
                plot: plot_link(record, plots),
            })
            .collect();
        let report = JsonReport {
            title: TITLE,
            settings: &self.settings,
            summary: self.summary(),
            records,
            warnings: &self.outcome.warnings,
        };
        serde_json::to_writer_pretty(writer, &report)?;

        Ok(())
    }

    /// Write the human readable report as Markdown.
    ///
    pub fn write_markdown<W: Write>(&self, mut w: W, plots: &BTreeSet<String>) -> Result<()> {
        let settings = &self.settings;
        writeln!(w, "# {TITLE}\n")?;

        writeln!(w, "## Validation Configuration\n")?;
        writeln!(w, "- Reference data: `{}`", settings.reference)?;
        writeln!(w, "- Test data: `{}`", settings.test)?;
        writeln!(w, "- Time step: {}", settings.time_step)?;
        match settings.custom_threshold {
            Some(threshold) => writeln!(w, "- Custom threshold: {threshold}")?,
            None => {
                let thresholds = &settings.thresholds;
                writeln!(w, "- Validation thresholds:")?;
                writeln!(w, "  - mean: {}", thresholds.mean)?;
                writeln!(w, "  - rmse: {}", thresholds.rmse)?;
                writeln!(w, "  - max_abs_diff: {}", thresholds.max_abs_diff)?;
            }
        }

        let summary = self.summary();
        writeln!(w, "\n## Validation Summary\n")?;
        writeln!(w, "- **Total tests**: {}", summary.total)?;
        writeln!(w, "- **Passed tests**: {}", summary.passed)?;
        writeln!(w, "- **Failed tests**: {}", summary.failed)?;

        if summary.failed > 0 {
            writeln!(w, "\n### Failed Tests\n")?;
            writeln!(
                w,
                "| Species | Dataset | Mean Rel Diff (%) | Max Rel Diff (%) | RMSE |"
            )?;
            writeln!(w, "|---|---|---:|---:|---:|")?;
            for record in self.failed_records() {
                let row = SummaryRow::from(record);
                writeln!(
                    w,
                    "| {} | {} | {:.6e} | {:.6e} | {:.6e} |",
                    row.species, row.dataset, row.mean_rel_diff_pct, row.max_rel_diff_pct, row.rmse
                )?;
            }
        }

        if !self.outcome.warnings.is_empty() {
            writeln!(w, "\n### Skipped Comparisons\n")?;
            for warning in &self.outcome.warnings {
                writeln!(w, "- {warning}")?;
            }
        }

        writeln!(w, "\n## Detailed Results\n")?;
        for (species, records) in self.by_species() {
            writeln!(w, "### {species}\n")?;
            for record in records {
                let stats = &record.statistics;
                let verdict = if record.passed { "**PASS**" } else { "**FAIL**" };
                writeln!(w, "#### {}\n", record.file_id)?;
                writeln!(w, "- Validation Result: {verdict}")?;
                writeln!(w, "- Mean Reference: {:.6e}", stats.mean_ref)?;
                writeln!(w, "- Mean Test: {:.6e}", stats.mean_test)?;
                writeln!(w, "- Mean Absolute Difference: {:.6e}", stats.mean_abs_diff)?;
                writeln!(w, "- Maximum Absolute Difference: {:.6e}", stats.max_abs_diff)?;
                writeln!(w, "- RMSE: {:.6e}", stats.rmse)?;
                writeln!(w, "- Correlation Coefficient: {:.6}", stats.corr_coef)?;
                writeln!(
                    w,
                    "- Mean Relative Difference: {:.6e}%",
                    stats.mean_rel_diff * 100.0
                )?;
                writeln!(
                    w,
                    "- Maximum Relative Difference: {:.6e}%\n",
                    stats.max_rel_diff * 100.0
                )?;

                if let Some(link) = plot_link(record, plots) {
                    writeln!(w, "![{} {} Comparison]({link})\n", species, record.file_id)?;
                }
            }
        }

        Ok(())
    }

    /// Write the human readable report as a standalone HTML page.
    ///
    pub fn write_html<W: Write>(&self, mut w: W, plots: &BTreeSet<String>) -> Result<()> {
        let settings = &self.settings;
        write!(w, "{}", HTML_HEAD)?;

        writeln!(w, "    <div class=\"summary-card\">")?;
        writeln!(w, "        <h2>Validation Configuration</h2>\n        <ul>")?;
        writeln!(
            w,
            "            <li><strong>Reference data:</strong> {}</li>",
            escape(&settings.reference)
        )?;
        writeln!(
            w,
            "            <li><strong>Test data:</strong> {}</li>",
            escape(&settings.test)
        )?;
        writeln!(
            w,
            "            <li><strong>Time step:</strong> {}</li>",
            settings.time_step
        )?;
        match settings.custom_threshold {
            Some(threshold) => writeln!(
                w,
                "            <li><strong>Custom threshold:</strong> {threshold}</li>"
            )?,
            None => {
                let thresholds = &settings.thresholds;
                writeln!(
                    w,
                    "            <li><strong>Validation thresholds:</strong>\n                <ul>"
                )?;
                writeln!(w, "                    <li>mean: {}</li>", thresholds.mean)?;
                writeln!(w, "                    <li>rmse: {}</li>", thresholds.rmse)?;
                writeln!(
                    w,
                    "                    <li>max_abs_diff: {}</li>",
                    thresholds.max_abs_diff
                )?;
                writeln!(w, "                </ul>\n            </li>")?;
            }
        }
        writeln!(w, "        </ul>\n    </div>")?;

        let summary = self.summary();
        writeln!(w, "    <div class=\"summary-card\">")?;
        writeln!(w, "        <h2>Validation Summary</h2>\n        <ul>")?;
        writeln!(
            w,
            "            <li><strong>Total tests:</strong> {}</li>",
            summary.total
        )?;
        writeln!(
            w,
            "            <li><strong>Passed tests:</strong> <span class=\"pass\">{}</span></li>",
            summary.passed
        )?;
        writeln!(
            w,
            "            <li><strong>Failed tests:</strong> <span class=\"fail\">{}</span></li>",
            summary.failed
        )?;
        writeln!(w, "        </ul>\n    </div>")?;

        if summary.failed > 0 {
            writeln!(w, "    <h2>Failed Tests</h2>\n    <table>")?;
            writeln!(
                w,
                "        <tr><th>Species</th><th>Dataset</th><th>Mean Rel Diff (%)</th>\
                 <th>Max Rel Diff (%)</th><th>RMSE</th></tr>"
            )?;
            for record in self.failed_records() {
                let row = SummaryRow::from(record);
                writeln!(
                    w,
                    "        <tr><td>{}</td><td>{}</td><td>{:.6e}</td><td>{:.6e}</td>\
                     <td>{:.6e}</td></tr>",
                    escape(row.species),
                    escape(row.dataset),
                    row.mean_rel_diff_pct,
                    row.max_rel_diff_pct,
                    row.rmse
                )?;
            }
            writeln!(w, "    </table>")?;
        }

        if !self.outcome.warnings.is_empty() {
            writeln!(w, "    <h2>Skipped Comparisons</h2>\n    <ul>")?;
            for warning in &self.outcome.warnings {
                writeln!(w, "        <li>{}</li>", escape(&warning.to_string()))?;
            }
            writeln!(w, "    </ul>")?;
        }

        writeln!(w, "    <h2>Detailed Results</h2>")?;
        for (species, records) in self.by_species() {
            writeln!(w, "    <h3>{}</h3>", escape(species.as_str()))?;
            for record in records {
                let stats = &record.statistics;
                let (class, verdict) = if record.passed {
                    ("pass", "PASS")
                } else {
                    ("fail", "FAIL")
                };
                writeln!(w, "    <h4>{}</h4>", escape(&record.file_id))?;
                writeln!(w, "    <div class=\"details\">\n        <ul>")?;
                writeln!(
                    w,
                    "            <li><strong>Validation Result:</strong> \
                     <span class=\"{class}\">{verdict}</span></li>"
                )?;
                let items = [
                    ("Mean Reference", format!("{:.6e}", stats.mean_ref)),
                    ("Mean Test", format!("{:.6e}", stats.mean_test)),
                    (
                        "Mean Absolute Difference",
                        format!("{:.6e}", stats.mean_abs_diff),
                    ),
                    (
                        "Maximum Absolute Difference",
                        format!("{:.6e}", stats.max_abs_diff),
                    ),
                    ("RMSE", format!("{:.6e}", stats.rmse)),
                    ("Correlation Coefficient", format!("{:.6}", stats.corr_coef)),
                    (
                        "Mean Relative Difference",
                        format!("{:.6e}%", stats.mean_rel_diff * 100.0),
                    ),
                    (
                        "Maximum Relative Difference",
                        format!("{:.6e}%", stats.max_rel_diff * 100.0),
                    ),
                ];
                for (label, value) in items {
                    writeln!(w, "            <li><strong>{label}:</strong> {value}</li>")?;
                }
                writeln!(w, "        </ul>\n    </div>")?;

                if let Some(link) = plot_link(record, plots) {
                    writeln!(w, "    <div class=\"chart-container\">")?;
                    writeln!(
                        w,
                        "        <img src=\"{}\" alt=\"{} {} Comparison\">",
                        escape(&link),
                        escape(species.as_str()),
                        escape(&record.file_id)
                    )?;
                    writeln!(w, "    </div>")?;
                }
            }
        }

        writeln!(w, "</body>\n</html>")?;

        Ok(())
    }

    /// Render a diagnostic plot for every comparison that kept its plot data.
    ///
    /// A plot that fails to render is logged and left out; it doesn't fail the report. Returns
    /// the file names of the plots that were written.
    ///
    pub fn publish_plots(&self, sink: &dyn ArtifactSink) -> Result<BTreeSet<String>> {
        let mut written = BTreeSet::new();
        for comparison in &self.outcome.comparisons {
            let diagnostics = match &comparison.diagnostics {
                Some(diagnostics) => diagnostics,
                None => continue,
            };

            let record = &comparison.record;
            match plot::render(record, diagnostics) {
                Ok(svg) => {
                    let name = plot::file_name(record);
                    put(sink, &format!("{PLOT_DIR}/{name}"), svg.as_bytes())?;
                    written.insert(name);
                }
                Err(err) => {
                    warn!(species = %record.species, file_id = %record.file_id, "{err}");
                }
            }
        }

        Ok(written)
    }

    /// Write every report artifact to `sink`.
    ///
    pub fn publish(&self, sink: &dyn ArtifactSink) -> Result<Published> {
        let plots = self.publish_plots(sink)?;
        if !plots.is_empty() {
            info!("Plots saved to {PLOT_DIR}/");
        }

        let mut stream = sink.store(CSV_NAME)?;
        self.write_csv(&mut stream)?;
        let csv = stream.finish()?;

        let mut stream = sink.store(MARKDOWN_NAME)?;
        self.write_markdown(&mut stream, &plots)?;
        let markdown = stream.finish()?;

        let mut stream = sink.store(HTML_NAME)?;
        self.write_html(&mut stream, &plots)?;
        let html = stream.finish()?;

        let mut stream = sink.store(JSON_NAME)?;
        self.write_json(&mut stream, &plots)?;
        let json = stream.finish()?;

        info!("Validation report saved");
        info!("  - CSV: {csv}");
        info!("  - Markdown: {markdown}");
        info!("  - HTML: {html}");
        info!("  - JSON: {json}");

        Ok(Published {
            csv,
            markdown,
            html,
            json,
            plots: plots
                .into_iter()
                .map(|name| format!("{PLOT_DIR}/{name}"))
                .collect(),
        })
    }
}

fn plot_link(record: &ComparisonRecord, plots: &BTreeSet<String>) -> Option<String> {
    let name = plot::file_name(record);
    plots
        .contains(&name)
        .then(|| format!("{PLOT_DIR}/{name}"))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>GEOS-Chem Scientific Validation Report</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 0; padding: 20px; color: #333; }
        h1, h2, h3, h4 { color: #2c3e50; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
        th, td { text-align: left; padding: 12px; border-bottom: 1px solid #ddd; }
        th { background-color: #f2f2f2; }
        tr:hover { background-color: #f5f5f5; }
        .summary-card { background-color: #f8f9fa; border-radius: 5px; padding: 15px; margin-bottom: 20px; }
        .chart-container { margin: 30px 0; text-align: center; }
        .chart-container img { max-width: 100%; height: auto; }
        .pass { color: green; font-weight: bold; }
        .fail { color: red; font-weight: bold; }
        .details { margin-top: 30px; }
    </style>
</head>
<body>
    <h1>GEOS-Chem Scientific Validation Report</h1>
"#;
