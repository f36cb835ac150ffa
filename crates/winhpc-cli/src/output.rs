//! Output formatting for winhpc (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use winhpc_client::PropertyMap;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print a single value; bare in table mode, an object in JSON mode
    pub fn print_value(&self, key: &str, value: &str) {
        match self.format {
            OutputFormat::Table => println!("{}", value),
            OutputFormat::Json => {
                let mut object = serde_json::Map::new();
                object.insert(key.to_string(), serde_json::Value::from(value));
                println!(
                    "{}",
                    serde_json::to_string_pretty(&object).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print a property bag
    pub fn print_properties(&self, properties: &PropertyMap) {
        match self.format {
            OutputFormat::Table => {
                let rows: Vec<PropertyRow> = properties.iter().map(PropertyRow::from).collect();
                self.print(&rows);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(properties).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Property display for job/task commands
#[derive(Debug, Tabled, Serialize)]
pub struct PropertyRow {
    #[tabled(rename = "Property")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl From<(&String, &Option<String>)> for PropertyRow {
    fn from((name, value): (&String, &Option<String>)) -> Self {
        Self {
            name: name.clone(),
            value: value.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Cluster display for clusters command
#[derive(Debug, Tabled, Serialize)]
pub struct ClusterRow {
    #[tabled(rename = "Cluster")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_row_null_value() {
        let name = "EndTime".to_string();
        let row = PropertyRow::from((&name, &None));
        assert_eq!(row.value, "-");
    }

    #[test]
    fn test_output_format_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            output: OutputFormat,
        }
        let parsed: Wrapper = toml::from_str("output = \"json\"").unwrap();
        assert_eq!(parsed.output, OutputFormat::Json);
    }
}
