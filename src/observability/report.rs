use crate::metrics::Summary;
use crate::observability::ResourceUsage;
use crate::record::FlatRecord;

/// Console rendering of a finished run.
pub struct RunReport<'a> {
    summary: &'a Summary,
    resources: Option<&'a ResourceUsage>,
}

impl<'a> RunReport<'a> {
    pub fn new(summary: &'a Summary, resources: Option<&'a ResourceUsage>) -> Self {
        Self { summary, resources }
    }

    /// Headline latency, rate, drift and drop figures.
    pub fn brief(&self) -> String {
        let s = self.summary;
        let mut rows = vec![
            ("Latency p50", format!("{:.3} ms", s.p50_ms)),
            ("Latency p95", format!("{:.3} ms", s.p95_ms)),
            ("Latency p99", format!("{:.3} ms", s.p99_ms)),
            ("Latency spread (p95-p50)", format!("{:.3} ms", s.latency_spread_ms)),
            ("Jitter (std)", format!("{:.3} ms", s.jitter_std_ms)),
            ("Effective rate", format!("{:.2} Hz", s.effective_sample_rate_hz)),
            ("Drift", format!("{:+.3} ms/min", s.drift_ms_per_min)),
            ("Drops", format!("{:.2} %", s.drops_percentage)),
            ("Samples", format!("{} in {} chunks", s.total_sample_count, s.total_chunk_count)),
            ("Ring drops", s.ring_drops.to_string()),
        ];

        if let Some(usage) = self.resources {
            rows.push(("Process CPU avg", format!("{:.1} %", usage.process_cpu_percent_avg)));
            rows.push((
                "Process RSS avg",
                format!("{:.1} MiB", usage.process_rss_avg_bytes / (1024.0 * 1024.0)),
            ));
            rows.push(("System CPU avg", format!("{:.1} %", usage.system_cpu_percent_avg)));
        }

        render("=== Stream Timing Summary ===", &rows)
    }

    /// Every summary and resource field.
    pub fn verbose(&self) -> String {
        let mut rows: Vec<(&str, String)> = self
            .summary
            .fields()
            .into_iter()
            .map(|(name, value)| (name, format_value(value)))
            .collect();

        if let Some(usage) = self.resources {
            rows.extend(
                usage
                    .fields()
                    .into_iter()
                    .map(|(name, value)| (name, format_value(value))),
            );
        }

        render("=== Stream Timing Summary (all fields) ===", &rows)
    }

    /// The summary as a single line of JSON.
    pub fn json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self.summary)
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

fn render(title: &str, rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = String::from(title);
    out.push('\n');
    for (label, value) in rows {
        out.push_str(&format!("  {:<width$}  {}\n", label, value, width = width));
    }
    out
}
