//! CLI output formatting module

use clap::ValueEnum;
use searchlog_core::{Result, SearchlogError};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Stdout, Write};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Compact,
    #[default]
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Compact => write!(f, "compact"),
            Self::Table => write!(f, "table"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = SearchlogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "compact" => Ok(Self::Compact),
            "table" => Ok(Self::Table),
            _ => Err(SearchlogError::validation(format!(
                "Invalid output format: {}",
                s
            ))),
        }
    }
}

/// Output formatter for CLI results
pub struct OutputFormatter<W: Write = Stdout> {
    format: OutputFormat,
    writer: W,
}

impl OutputFormatter<Stdout> {
    /// Create a formatter writing to stdout
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            writer: io::stdout(),
        }
    }
}

impl<W: Write> OutputFormatter<W> {
    /// Create a formatter with custom writer
    pub fn with_writer(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }

    /// Consume the formatter and return its writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Format and output a serializable value
    pub fn output<T: Serialize>(&mut self, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                writeln!(self.writer, "{}", serde_json::to_string_pretty(value)?)?;
            }
            OutputFormat::Yaml => {
                write!(self.writer, "{}", serde_yaml::to_string(value)?)?;
            }
            OutputFormat::Compact => {
                writeln!(self.writer, "{}", serde_json::to_string(value)?)?;
            }
            OutputFormat::Table => {
                let value = serde_json::to_value(value)?;
                self.format_as_table(&value)?;
            }
        }
        Ok(())
    }

    /// Output a plain message
    pub fn message(&mut self, msg: &str) -> Result<()> {
        writeln!(self.writer, "{}", msg)?;
        Ok(())
    }

    /// Output a success message
    pub fn success(&mut self, msg: &str) -> Result<()> {
        writeln!(self.writer, "✓ {}", msg)?;
        Ok(())
    }

    fn format_as_table(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Array(rows) if rows.is_empty() => {
                writeln!(self.writer, "(no rows)")?;
            }
            Value::Array(rows) => {
                let columns: Vec<String> = match &rows[0] {
                    Value::Object(map) => map.keys().cloned().collect(),
                    _ => vec!["value".to_string()],
                };
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| match row {
                        Value::Object(map) => columns
                            .iter()
                            .map(|column| map.get(column).map(cell).unwrap_or_default())
                            .collect(),
                        other => vec![cell(other)],
                    })
                    .collect();
                self.write_grid(&columns, &cells)?;
            }
            Value::Object(map) => {
                let columns = vec!["key".to_string(), "value".to_string()];
                let cells: Vec<Vec<String>> = map
                    .iter()
                    .map(|(key, val)| vec![key.clone(), cell(val)])
                    .collect();
                self.write_grid(&columns, &cells)?;
            }
            other => {
                writeln!(self.writer, "{}", cell(other))?;
            }
        }
        Ok(())
    }

    fn write_grid(&mut self, columns: &[String], rows: &[Vec<String>]) -> Result<()> {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                rows.iter()
                    .filter_map(|row| row.get(i))
                    .map(|value| value.chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let rule = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, segments.join(mid), right)
        };

        writeln!(self.writer, "{}", rule("┌", "┬", "┐"))?;
        self.write_row(columns, &widths)?;
        writeln!(self.writer, "{}", rule("├", "┼", "┤"))?;
        for row in rows {
            self.write_row(row, &widths)?;
        }
        writeln!(self.writer, "{}", rule("└", "┴", "┘"))?;
        Ok(())
    }

    fn write_row(&mut self, values: &[String], widths: &[usize]) -> Result<()> {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let value = values.get(i).map(String::as_str).unwrap_or("");
                format!(" {:<width$} ", value, width = width)
            })
            .collect();
        writeln!(self.writer, "│{}│", padded.join("│"))?;
        Ok(())
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
