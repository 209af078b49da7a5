use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use ses_forwarder::{Config, Pipeline, SpamFilterMode, StdoutSink};
use std::io::Read;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("ses-forwarder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Spam filtering and forwarding decisions for SES inbound mail")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/ses-forwarder.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("events")
                .value_name("EVENT")
                .help("SES event JSON files to process, '-' reads stdin")
                .num_args(0..)
                .action(ArgAction::Append),
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
        match Config::default().to_file(generate_path) {
            Ok(()) => println!("Default configuration written to: {generate_path}"),
            Err(e) => {
                eprintln!("Error generating configuration: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/ses-forwarder.yaml");

    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        print_config_summary(config_path, &config);
        return;
    }

    let events: Vec<String> = matches
        .get_many::<String>("events")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if events.is_empty() {
        eprintln!("No events given. Pass SES event files or '-' for stdin.");
        process::exit(2);
    }

    let pipeline = Arc::new(Pipeline::new(Arc::new(config), Box::new(StdoutSink)));
    log::info!(
        "Processing {} event(s), spam filter {:?}, metrics under {}",
        events.len(),
        pipeline.config().spam_filter_mode,
        pipeline.config().namespace_root()
    );

    let mut handles = Vec::new();
    for source in events {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let outcome = process_event(&pipeline, &source);
            (source, outcome)
        }));
    }

    let mut failures = 0;
    for handle in handles {
        match handle.await {
            Ok((_, Ok(()))) => {}
            Ok((source, Err(e))) => {
                log::error!("{source}: {e:#}");
                failures += 1;
            }
            Err(e) => {
                log::error!("Event task failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}

fn read_event(source: &str) -> anyhow::Result<String> {
    use anyhow::Context;

    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read event from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read event: {source}"))
    }
}

fn process_event(pipeline: &Pipeline, source: &str) -> anyhow::Result<()> {
    let raw = read_event(source)?;
    let instruction = pipeline.handle_event(&raw)?;
    println!("{}", serde_json::to_string(&instruction)?);
    Ok(())
}

fn print_config_summary(path: &str, config: &Config) {
    println!("Configuration file: {path}");
    println!("  project: {}", config.project);
    println!("  metrics namespace: {}", config.namespace_root());
    println!("  sender: {}", config.recipient);
    println!("  spam filter: {:?}", config.spam_filter_mode);
    if config.spam_filter_mode == SpamFilterMode::Custom {
        println!(
            "  subject keywords: {}",
            config.subject_filter_keywords.len()
        );
        println!("  blocked recipients: {}", config.blocked_recipients.len());
    }
    println!("  plus-sign addressing: {}", config.allow_plus_sign);
    println!("  forwarding rules: {}", config.forwarding_rules.len());
    for (key, destinations) in &config.forwarding_rules {
        println!("    {key} -> {}", destinations.join(", "));
    }
    println!("Configuration is valid");
}
