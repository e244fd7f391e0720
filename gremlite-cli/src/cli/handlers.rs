// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for Gremlite

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::commands::OutputFormat;
use super::output::{ResultFormatter, RunResult};
use gremlite::{Bytecode, EngineConfig, GraphTraversalSource, MemoryGraph};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Configuration from `path`, or the defaults
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => {
            log::debug!("Loading engine configuration from {}", path.display());
            Ok(EngineConfig::from_file(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

pub fn load_bytecode(path: &Path) -> CliResult<Bytecode> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read bytecode {}: {}", path.display(), e))?;
    Ok(Bytecode::from_json(&json)?)
}

fn source(config: &EngineConfig, empty: bool) -> CliResult<GraphTraversalSource> {
    let graph = if empty {
        MemoryGraph::new()
    } else {
        MemoryGraph::modern()
    };
    Ok(GraphTraversalSource::with_config(Arc::new(graph), config)?)
}

/// Render the explanation of the traversal stored in `file`
pub fn explain(file: &Path, width: Option<usize>, config: &EngineConfig) -> CliResult<String> {
    let bytecode = load_bytecode(file)?;
    let traversal = source(config, false)?.traversal_from_bytecode(&bytecode)?;
    let explanation = traversal.explain()?;
    Ok(explanation.pretty_print(width.unwrap_or(config.explain_width))?)
}

/// Evaluate the traversal stored in `file`
pub fn run(file: &Path, config: &EngineConfig, empty: bool) -> CliResult<RunResult> {
    let bytecode = load_bytecode(file)?;
    let mut traversal = source(config, empty)?.traversal_from_bytecode(&bytecode)?;
    let started = Instant::now();
    let values = traversal.to_list()?;
    let elapsed = started.elapsed();
    log::info!(
        "Traversal {} produced {} result(s) in {:?}",
        bytecode,
        values.len(),
        elapsed
    );
    Ok(RunResult {
        bytecode: bytecode.to_string(),
        values,
        execution_time_ms: elapsed.as_millis(),
    })
}

/// Handle the explain command
pub fn handle_explain(
    file: PathBuf,
    width: Option<usize>,
    config: Option<PathBuf>,
) -> CliResult<()> {
    let config = load_config(config.as_deref())?;
    match explain(&file, width, &config) {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Failed to explain {}: {}", file.display(), e).red());
            Err(e)
        }
    }
}

/// Handle the run command
pub fn handle_run(
    file: PathBuf,
    format: OutputFormat,
    config: Option<PathBuf>,
    empty: bool,
) -> CliResult<()> {
    let config = load_config(config.as_deref())?;
    match run(&file, &config, empty) {
        Ok(result) => {
            print!("{}", ResultFormatter::format(&result, format));
            Ok(())
        }
        Err(e) => {
            match format {
                OutputFormat::Json => println!("{}", ResultFormatter::format_error(&e.to_string())),
                OutputFormat::Table => eprintln!("{}", format!("Error: {}", e).red()),
            }
            Err(e)
        }
    }
}

/// Handle the strategies command
pub fn handle_strategies(config: Option<PathBuf>) -> CliResult<()> {
    let config = load_config(config.as_deref())?;
    let source = source(&config, true)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Strategy").fg(Color::Green),
        Cell::new("Category").fg(Color::Green),
    ]);
    for (i, strategy) in source.strategies().iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            strategy.name().to_string(),
            format!("{:?}", strategy.category()),
        ]);
    }
    println!("{}", "Traversal Strategies".bold().green());
    println!("{}", table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlite::Value;
    use std::io::Write;

    fn bytecode_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    const PEOPLE_OVER_30: &str = r#"{
        "steps": [
            { "operator": "V" },
            { "operator": "hasLabel", "arguments": [{ "type": "value", "value": { "String": "person" } }] },
            {
                "operator": "has",
                "arguments": [
                    { "type": "value", "value": { "String": "age" } },
                    { "type": "predicate", "value": { "Compare": { "op": "Gt", "value": { "Integer": 30 } } } }
                ]
            },
            { "operator": "identity" },
            { "operator": "values", "arguments": [{ "type": "value", "value": { "String": "name" } }] }
        ]
    }"#;

    #[test]
    fn test_run_against_modern_graph() {
        let file = bytecode_file(PEOPLE_OVER_30);
        let result = run(file.path(), &EngineConfig::default(), false).unwrap();
        assert_eq!(result.values, vec![Value::from("josh"), Value::from("peter")]);

        let empty = run(file.path(), &EngineConfig::default(), true).unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn test_explain_uses_configured_strategies() {
        let file = bytecode_file(PEOPLE_OVER_30);
        let text = explain(file.path(), None, &EngineConfig::default()).unwrap();
        assert!(text.starts_with("Traversal Explanation"));
        assert!(text.contains("IdentityRemovalStrategy"));

        let config = EngineConfig::from_json(
            r#"{ "strategies": { "identity_removal": false, "inline_filter": false, "incident_to_adjacent": false } }"#,
        )
        .unwrap();
        let text = explain(file.path(), Some(120), &config).unwrap();
        assert!(!text.contains("IdentityRemovalStrategy"));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let missing = load_bytecode(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read bytecode"));

        let file = bytecode_file("{ not json");
        assert!(load_bytecode(file.path()).is_err());

        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }
}
