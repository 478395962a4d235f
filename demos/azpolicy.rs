// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use azpolicy::{AliasTable, CompileOptions, Compiler, PolicyEvaluator, Value};

fn read_value(file: &str) -> Result<Value> {
    if file.ends_with(".json") {
        Value::from_json_file(file)
    } else if file.ends_with(".yaml") || file.ends_with(".yml") {
        Value::from_yaml_file(file)
    } else {
        bail!("Unsupported file `{file}`. Must be json or yaml.")
    }
}

fn compiler(max_depth: Option<usize>, max_nodes: Option<usize>) -> Compiler {
    let defaults = CompileOptions::default();
    Compiler::with_options(CompileOptions {
        max_depth: max_depth.unwrap_or(defaults.max_depth),
        max_nodes: max_nodes.unwrap_or(defaults.max_nodes),
        ..defaults
    })
}

fn policy_compile(rule: String, max_depth: Option<usize>, max_nodes: Option<usize>) -> Result<()> {
    let document = read_value(&rule)?;
    let compiled = compiler(max_depth, max_nodes)
        .compile(&document)
        .with_context(|| format!("Failed to compile {rule}"))?;

    println!("{}", serde_json::to_string_pretty(&compiled)?);
    Ok(())
}

fn policy_eval(
    rule: String,
    parameters: Option<String>,
    aliases: Option<String>,
    resources: &[String],
    trace: bool,
) -> Result<()> {
    let document = read_value(&rule)?;
    let compiled = Arc::new(
        Compiler::new()
            .compile(&document)
            .with_context(|| format!("Failed to compile {rule}"))?,
    );

    let parameters = match parameters {
        Some(file) => read_value(&file)?,
        None => Value::Null,
    };
    let bound = azpolicy::bind(&compiled, &parameters)?;

    let evaluator = match aliases {
        Some(file) => {
            let mut table = AliasTable::builtin();
            table.extend_from_value(&read_value(&file)?)?;
            PolicyEvaluator::with_aliases(Arc::new(table))
        }
        None => PolicyEvaluator::new(),
    };

    // A resource file may hold one document or an array of them.
    let mut documents = vec![];
    for file in resources {
        match read_value(file)? {
            Value::Array(items) => documents.extend(items.iter().cloned()),
            other => documents.push(other),
        }
    }

    let mut output = vec![];
    for entry in evaluator.evaluate_batch(&bound, &documents) {
        let result = match entry {
            Ok(mut result) => {
                if !trace {
                    result.trace.clear();
                }
                serde_json::to_value(&result)?
            }
            Err(fault) => serde_json::json!({ "error": fault.to_string() }),
        };
        output.push(result);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Compile a policy definition and print the rule tree.
    Compile {
        /// Policy definition file. json or yaml.
        rule: String,

        /// Maximum condition nesting depth.
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum number of condition nodes.
        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// Evaluate resources against a policy definition.
    Eval {
        /// Policy definition file. json or yaml.
        #[arg(long, short, value_name = "rule.json")]
        rule: String,

        /// Assignment parameter values. json or yaml.
        #[arg(long, short, value_name = "parameters.json")]
        parameters: Option<String>,

        /// Additional `{alias: path}` entries. json or yaml.
        #[arg(long, short, value_name = "aliases.json")]
        aliases: Option<String>,

        /// Resource documents. json or yaml.
        #[arg(required(true))]
        resources: Vec<String>,

        /// Include the evaluation trace in the output.
        #[arg(long, short)]
        trace: bool,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: PolicyCommand,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse and dispatch command.
    let cli = Cli::parse();
    match cli.command {
        PolicyCommand::Compile {
            rule,
            max_depth,
            max_nodes,
        } => policy_compile(rule, max_depth, max_nodes),
        PolicyCommand::Eval {
            rule,
            parameters,
            aliases,
            resources,
            trace,
        } => policy_eval(rule, parameters, aliases, &resources, trace),
    }
}
