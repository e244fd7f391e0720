// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use gremlite::Value;

use super::commands::OutputFormat;

/// Values produced by one traversal run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub bytecode: String,
    pub values: Vec<Value>,
    pub execution_time_ms: u128,
}

/// Result formatter for different output formats
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(result: &RunResult, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(result),
            OutputFormat::Json => Self::format_json(result),
        }
    }

    fn format_table(result: &RunResult) -> String {
        if result.values.is_empty() {
            return format!("{}\n", "No results found".yellow());
        }

        let mut output = String::new();
        output.push_str(&format!("{}\n", "Traversal Results".bold().green()));
        output.push_str(&format!("Bytecode: {}\n", result.bytecode));
        output.push_str(&format!("Execution time: {} ms\n", result.execution_time_ms));
        output.push_str(&format!("Results returned: {}\n\n", result.values.len()));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("#").fg(Color::Green),
            Cell::new("value").fg(Color::Green),
            Cell::new("type").fg(Color::Green),
        ]);
        for (i, value) in result.values.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                value.to_string(),
                value.type_name().to_string(),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn format_json(result: &RunResult) -> String {
        let json = serde_json::json!({
            "status": "success",
            "bytecode": result.bytecode,
            "results": result.values.iter().map(Self::value_to_json).collect::<Vec<_>>(),
            "count": result.values.len(),
            "execution_time_ms": result.execution_time_ms as u64,
        });
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| {
            "{\"status\": \"error\", \"error\": \"Could not serialize results to JSON\"}".to_string()
        })
    }

    pub fn format_error(message: &str) -> String {
        let json = serde_json::json!({
            "status": "error",
            "error": message,
        });
        serde_json::to_string_pretty(&json)
            .unwrap_or_else(|_| format!("{{\"status\": \"error\", \"error\": {:?}}}", message))
    }

    /// Convert a Value to a JSON value
    pub fn value_to_json(value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::json!(i),
            Value::Float(n) => serde_json::json!(n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::value_to_json).collect())
            }
            Value::Map(entries) => {
                // JSON objects need string keys; anything else becomes a list of pairs
                if entries.iter().all(|(k, _)| k.as_str().is_some()) {
                    let mut map = serde_json::Map::new();
                    for (key, value) in entries {
                        map.insert(key.to_string(), Self::value_to_json(value));
                    }
                    serde_json::Value::Object(map)
                } else {
                    serde_json::Value::Array(
                        entries
                            .iter()
                            .map(|(k, v)| {
                                serde_json::json!([Self::value_to_json(k), Self::value_to_json(v)])
                            })
                            .collect(),
                    )
                }
            }
            Value::Vertex(vertex) => serde_json::json!({
                "type": "vertex",
                "id": Self::value_to_json(&vertex.id.to_value()),
                "label": vertex.label,
            }),
            Value::Edge(edge) => serde_json::json!({
                "type": "edge",
                "id": Self::value_to_json(&edge.id.to_value()),
                "label": edge.label,
                "out_v": Self::value_to_json(&edge.out_v.id.to_value()),
                "in_v": Self::value_to_json(&edge.in_v.id.to_value()),
            }),
            Value::Path(path) => serde_json::Value::Array(
                path.objects().iter().map(Self::value_to_json).collect(),
            ),
        }
    }
}
