//! Prometheus text exposition (format 0.0.4).

use std::fmt::Write;

use super::registry::{FamilySnapshot, RegistrySnapshot, SeriesValue};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn label_pairs(names: &[String], values: &[String]) -> Vec<String> {
    names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect()
}

fn braced(pairs: &[String]) -> String {
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

impl RegistrySnapshot {
    /// Render every family in Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for family in &self.families {
            render_family(family, &mut out);
        }
        out
    }
}

fn render_family(family: &FamilySnapshot, out: &mut String) {
    let name = &family.name;
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.help));
    let _ = writeln!(out, "# TYPE {} {}", name, family.kind.as_str());
    for series in &family.series {
        let pairs = label_pairs(&family.label_names, &series.labels);
        match &series.value {
            SeriesValue::Counter(v) => {
                let _ = writeln!(out, "{}{} {}", name, braced(&pairs), v);
            }
            SeriesValue::Gauge(v) => {
                let _ = writeln!(out, "{}{} {}", name, braced(&pairs), v);
            }
            SeriesValue::Histogram {
                buckets,
                sum,
                count,
            } => {
                for (le, n) in buckets {
                    let mut with_le = pairs.clone();
                    with_le.push(format!("le=\"{le}\""));
                    let _ = writeln!(out, "{}_bucket{} {}", name, braced(&with_le), n);
                }
                let mut inf = pairs.clone();
                inf.push("le=\"+Inf\"".to_string());
                let _ = writeln!(out, "{}_bucket{} {}", name, braced(&inf), count);
                let _ = writeln!(out, "{}_sum{} {}", name, braced(&pairs), sum);
                let _ = writeln!(out, "{}_count{} {}", name, braced(&pairs), count);
            }
        }
    }
}
