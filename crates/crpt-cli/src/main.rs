use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crpt_api::{ClientConfig, Document, GateConfig, SubmissionService};

#[derive(Debug, PartialEq)]
struct Args {
    document: PathBuf,
    signature: String,
    copies: usize,
    limit: Option<usize>,
    period_ms: Option<u64>,
    url: Option<String>,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let args = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!(
                "Usage: crpt-submit <document.json> --signature <sig> [--copies N] [--limit L] [--period-ms MS] [--url URL]"
            );
            eprintln!();
            eprintln!("Arguments:");
            eprintln!("  <document.json>     Document to register (JSON)");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --signature <sig>   Detached document signature (required)");
            eprintln!("  --copies <N>        Number of concurrent submissions [default: 1]");
            eprintln!("  --limit <L>         Submissions per window [env: CRPT_REQUEST_LIMIT]");
            eprintln!("  --period-ms <MS>    Window length in milliseconds [env: CRPT_WINDOW_MS]");
            eprintln!("  --url <URL>         Registration endpoint [env: CRPT_API_URL]");
            process::exit(2);
        }
    };

    init_tracing();

    match run(args).await {
        Ok(0) => {}
        Ok(failed) => {
            tracing::error!(failed, "Some submissions failed");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

/// Initialize tracing with CRPT_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("CRPT_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("crpt_api={level},crpt_submit={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut document: Option<PathBuf> = None;
    let mut signature: Option<String> = None;
    let mut copies = 1;
    let mut limit = None;
    let mut period_ms = None;
    let mut url = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--signature" => {
                i += 1;
                signature = Some(args.get(i).ok_or("--signature requires a value")?.clone());
            }
            "--copies" => {
                i += 1;
                copies = parse_number(args.get(i), "--copies")?;
            }
            "--limit" => {
                i += 1;
                limit = Some(parse_number(args.get(i), "--limit")?);
            }
            "--period-ms" => {
                i += 1;
                period_ms = Some(parse_number(args.get(i), "--period-ms")?);
            }
            "--url" => {
                i += 1;
                url = Some(args.get(i).ok_or("--url requires a value")?.clone());
            }
            "--help" | "-h" => return Err("".to_string()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if document.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                document = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    if copies == 0 {
        return Err("--copies must be at least 1".to_string());
    }

    Ok(Args {
        document: document.ok_or("missing required argument: <document.json>")?,
        signature: signature.ok_or("missing required option: --signature")?,
        copies,
        limit,
        period_ms,
        url,
    })
}

fn parse_number<T: std::str::FromStr>(value: Option<&String>, flag: &str) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag} expects a number, got '{value}'"))
}

fn build_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.url {
        config = config.with_endpoint(url.clone());
    }
    let gate = GateConfig::new(
        args.limit.unwrap_or(config.gate.limit),
        args.period_ms
            .map(Duration::from_millis)
            .unwrap_or(config.gate.period),
    );
    Ok(config.with_gate(gate))
}

/// Returns the number of failed submissions.
async fn run(args: Args) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(&args.document)
        .with_context(|| format!("failed to read {}", args.document.display()))?;
    let document: Document = serde_json::from_str(&raw)
        .with_context(|| format!("invalid document in {}", args.document.display()))?;

    let config = build_config(&args)?;
    let service = SubmissionService::new(&config)?;

    let submissions =
        (0..args.copies).map(|_| service.create_document(&document, &args.signature));
    let results = futures::future::join_all(submissions).await;

    let mut failed = 0;
    for (n, result) in results.iter().enumerate() {
        match result {
            Ok(receipt) => println!("#{n}: created (HTTP {})", receipt.status),
            Err(e) => {
                failed += 1;
                println!("#{n}: {e}");
            }
        }
    }

    service.shutdown();
    Ok(failed)
}
