use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value as Json};

use aaa_policy::config::load_config;
use aaa_policy::dictionary::Dictionary;
use aaa_policy::observability::logging;
use aaa_policy::request::{AttrList, Request};
use aaa_policy::{FilesModule, Phase};

#[derive(Parser)]
#[command(name = "policy-cli")]
#[command(about = "Check users files and run test lookups", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "policy.toml")]
    config: PathBuf,

    /// Log level for diagnostics on stderr.
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and index every configured policy file
    Check,
    /// Run one lookup and print the resulting lists
    Lookup {
        /// Processing phase (recv, recv_accounting, authenticate, send).
        #[arg(short, long, default_value = "recv")]
        phase: Phase,

        /// Request attributes as Name=value.
        #[arg(required = true)]
        attrs: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    let module = FilesModule::from_config(&config)?;

    match cli.command {
        Commands::Check => {
            let policies = module.policies();
            let files: Vec<Json> = policies
                .tables()
                .map(|table| {
                    json!({
                        "file": table.filename(),
                        "index": format!("{:?}", table.index().kind()).to_lowercase(),
                        "buckets": table.index().len(),
                        "defaults": table.defaults().map_or(0, |b| b.len()),
                        "entries": table.entries(),
                    })
                })
                .collect();
            let extractor = module.key_extractor();
            let key: Vec<&str> = extractor.attrs().iter().map(|def| def.name.as_str()).collect();
            print_json(&json!({
                "ok": true,
                "key": key,
                "key_type": extractor.key_type().to_string(),
                "files": files,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Lookup { phase, attrs } => {
            let mut request = build_request(module.dictionary(), &attrs)?;
            match module.process(phase, &mut request) {
                Ok(outcome) => {
                    print_json(&json!({
                        "phase": phase.as_str(),
                        "outcome": outcome.as_str(),
                        "reply": list_json(&request.reply),
                        "control": list_json(&request.control),
                    }))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    print_json(&json!({
                        "phase": phase.as_str(),
                        "outcome": "failed",
                        "error": e.to_string(),
                    }))?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn build_request(dict: &Dictionary, attrs: &[String]) -> Result<Request, Box<dyn std::error::Error>> {
    let mut request = Request::new();
    for pair in attrs {
        let (name, text) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected Name=value, got '{}'", pair))?;
        let def = dict.require(name.trim())?;
        let value = def.parse_value(text.trim())?;
        request = request.with_attr(def, value);
    }
    Ok(request)
}

fn list_json(list: &AttrList) -> Json {
    list.iter()
        .map(|attr| json!({ "attribute": attr.def.name, "value": attr.def.format_value(&attr.value) }))
        .collect()
}

fn print_json(value: &Json) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
