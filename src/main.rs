use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use boolean_search::config::ModelConfig;
use boolean_search::sql_compiler::SqlCompiler;
use boolean_search::{parse_boolean_search, ParseError};

const CONFIG_FILE: &str = "boolean_search.json";

/// 从工作目录加载模型配置，失败时使用默认配置
fn load_config() -> ModelConfig {
    match ModelConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            tracing::info!(
                base_table = %config.base_table,
                relationships = config.relationships.len(),
                "loaded {}",
                CONFIG_FILE
            );
            config
        }
        Err(e) => {
            tracing::warn!(error = %e, "using default model config");
            ModelConfig::default()
        }
    }
}

/// 打印输入，并在出错的 span 下方标出 ^
fn report_error(input: &str, error: &ParseError) {
    let span = error.span();
    let start = input[..span.start.min(input.len())].chars().count();
    let width = input
        .get(span.start..span.end)
        .map(|s| s.chars().count())
        .unwrap_or(0)
        .max(1);
    println!("  {}", input);
    println!("  {}{}", " ".repeat(start), "^".repeat(width));
    println!("✗ {}", error);
}

fn process(compiler: &SqlCompiler, input: &str) {
    let tree = match parse_boolean_search(input) {
        Ok(tree) => tree,
        Err(e) => {
            report_error(input, &e);
            return;
        }
    };

    println!("[canonical]: {}", tree);
    match serde_json::to_string_pretty(&tree) {
        Ok(json) => println!("[tree]:\n{}", json),
        Err(e) => println!("✗ cannot serialize tree: {}", e),
    }

    let params = tree.params();
    if !params.is_empty() {
        println!("[params]:");
        for (name, value) in params {
            println!("  {} = {}", name, value);
        }
    }

    match compiler.compile(&tree) {
        Ok(result) => {
            println!("[sql]: {}", result.sql);
            println!("[values]: {:?}", result.values);
        }
        Err(e) => println!("✗ cannot compile to SQL: {}", e),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let compiler = SqlCompiler::new(load_config());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        for input in &args {
            process(&compiler, input);
        }
        return Ok(());
    }

    println!("--- Boolean search: search string to condition tree and SQL ---");
    println!("e.g. field1=*foo* and not (field2==1 or parent.field3<=10.0)");

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                process(&compiler, line);
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
