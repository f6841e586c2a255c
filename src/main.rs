use clap::{Arg, Command};
use log::LevelFilter;
use mail_triage::pipeline::collect_sources;
use mail_triage::reference_data::read_list;
use mail_triage::{Config, Pipeline, TyposquatIndex};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("mail-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Heuristic phishing and fraud scoring for reported emails")
        .arg(
            Arg::new("input")
                .value_name("PATH")
                .help("A .eml file or a directory of .eml files")
                .required_unless_present_any(["generate-config", "build-typosquat"]),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("mail-triage.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("build-typosquat")
                .long("build-typosquat")
                .value_names(["TLDS", "OUT"])
                .num_args(2)
                .help("Build the typosquat table from a TLD list and write it as JSON"),
        )
        .arg(
            Arg::new("workers")
                .short('j')
                .long("workers")
                .value_name("N")
                .help("Number of messages scored concurrently (overrides config)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the JSON report")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-check scores")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    if let Some(mut paths) = matches.get_many::<String>("build-typosquat") {
        match (paths.next(), paths.next()) {
            (Some(tlds), Some(out)) => build_typosquat_table(tlds, out),
            _ => {
                eprintln!("--build-typosquat needs a TLD list and an output path");
                process::exit(2);
            }
        }
        return;
    }

    let Some(input) = matches.get_one::<String>("input") else {
        eprintln!("No input path given");
        process::exit(2);
    };
    let Some(config_path) = matches.get_one::<String>("config") else {
        eprintln!("No configuration path given");
        process::exit(2);
    };

    let config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let workers = matches
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or(config.workers);

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            eprintln!("Error initialising pipeline: {e:#}");
            process::exit(1);
        }
    };

    let sources = match collect_sources(input) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Error reading input: {e:#}");
            process::exit(1);
        }
    };

    let report = pipeline.process_corpus(sources, workers).await;

    let json = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };

    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing report: {e}");
            process::exit(1);
        }
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
        }
        Err(e) => {
            eprintln!("Error writing configuration: {e:#}");
            process::exit(1);
        }
    }
}

fn build_typosquat_table(tlds_path: &str, out_path: &str) {
    let tlds = match read_list(tlds_path) {
        Ok(tlds) => tlds,
        Err(e) => {
            eprintln!("Error reading TLD list: {e:#}");
            process::exit(1);
        }
    };

    log::info!("Building typosquat table for {} TLDs", tlds.len());
    let index = TyposquatIndex::build(&tlds);

    let written = index
        .to_json_string()
        .and_then(|json| std::fs::write(out_path, json).map_err(Into::into));
    match written {
        Ok(()) => println!("Typosquat table with {} entries written to: {out_path}", index.len()),
        Err(e) => {
            eprintln!("Error writing typosquat table: {e:#}");
            process::exit(1);
        }
    }
}
