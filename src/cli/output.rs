// Output formatting for CLI

use std::io::Write;

use anyhow::Result;

use crate::cli::config::OutputFormat;

/// Format and output data
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Output one report object
    pub fn output(&self, report: &serde_json::Value, writer: &mut impl Write) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => {
                writeln!(writer, "{}", serde_json::to_string_pretty(report)?)?;
            }
            OutputFormat::Json => {
                writeln!(writer, "{}", serde_json::to_string(report)?)?;
            }
            OutputFormat::KeyValue => {
                self.output_key_value(report, writer)?;
            }
            OutputFormat::Table => {
                self.output_table(report, writer)?;
            }
        }
        Ok(())
    }

    /// Output as key-value pairs
    fn output_key_value(&self, report: &serde_json::Value, writer: &mut impl Write) -> Result<()> {
        for (key, value) in flatten(report) {
            match value {
                // one line per value of a repeated field
                serde_json::Value::Array(values) => {
                    for v in values {
                        writeln!(writer, "{}: {}", key, self.format_value(v))?;
                    }
                }
                _ => writeln!(writer, "{}: {}", key, self.format_value(value))?,
            }
        }
        Ok(())
    }

    /// Output as table
    fn output_table(&self, report: &serde_json::Value, writer: &mut impl Write) -> Result<()> {
        let rows = flatten(report);
        if rows.is_empty() {
            return Ok(());
        }
        let max_key_len = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

        writeln!(writer, "{}", "=".repeat(max_key_len + 30))?;

        for (key, value) in rows {
            writeln!(
                writer,
                "{:<width$}{}",
                format!("{}:", key),
                self.format_value(value),
                width = max_key_len + 2
            )?;
        }

        writeln!(writer, "{}", "=".repeat(max_key_len + 30))?;
        Ok(())
    }

    /// Format a JSON value for display
    fn format_value(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "(null)".to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(arr) => arr
                .iter()
                .map(|v| self.format_value(v))
                .collect::<Vec<_>>()
                .join("; "),
            serde_json::Value::Object(obj) => {
                if obj.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{{} items}}", obj.len())
                }
            }
        }
    }

    /// Print success message
    pub fn print_success(&self, message: &str) {
        if !self.quiet {
            println!("✓ {}", message);
        }
    }

    /// Print error message
    pub fn print_error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }

    /// Print info message
    pub fn print_info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
}

/// Top-level entries of `report`, with nested objects spliced in place
/// under their own keys.
fn flatten(report: &serde_json::Value) -> Vec<(&str, &serde_json::Value)> {
    fn walk<'a>(
        obj: &'a serde_json::Map<String, serde_json::Value>,
        rows: &mut Vec<(&'a str, &'a serde_json::Value)>,
    ) {
        for (key, value) in obj {
            match value {
                serde_json::Value::Object(inner) => walk(inner, rows),
                _ => rows.push((key.as_str(), value)),
            }
        }
    }

    let mut rows = Vec::new();
    if let Some(obj) = report.as_object() {
        walk(obj, &mut rows);
    }
    rows
}
