use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use netpulse::{AggregateReport, Config, Engine, Family, JsonFileCache, ip};

#[derive(Parser)]
#[command(name = "netpulse", version, about = "Reachability checks for critical internet infrastructure")]
struct Cli {
    /// Path to the configuration file (defaults to the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Probe all or selected families and print the report
    Check {
        /// Restrict the run to these families (comma-separated names)
        #[arg(long = "family", value_delimiter = ',')]
        families: Vec<String>,

        /// Print the JSON projection instead of text
        #[arg(long)]
        json: bool,
    },
    /// List known protocol families and their target counts
    Families,
    /// Discover the external IP, compare with the previous run, and
    /// optionally check its abuse reputation
    Ip {
        #[arg(long)]
        reputation: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_with_verbosity(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_config(cli.config.as_ref()).context("loading configuration")?;
    tracing::debug!("{config}");

    match cli.command.unwrap_or(Command::Check { families: Vec::new(), json: false }) {
        Command::Check { families, json } => check(config, &families, json).await,
        Command::Families => {
            list_families(&config);
            Ok(ExitCode::SUCCESS)
        }
        Command::Ip { reputation } => external_ip(reputation).await,
    }
}

async fn check(config: Config, family_names: &[String], json: bool) -> Result<ExitCode> {
    let families = resolve_families(family_names)?;
    let engine = Engine::new(config);
    let report = engine.run(&families).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_text(&report);
    }

    Ok(if report.fully_healthy() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn resolve_families(names: &[String]) -> Result<Vec<Family>> {
    if names.is_empty() {
        return Ok(Family::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            Family::from_name(name).with_context(|| {
                let known: Vec<&str> = Family::ALL.iter().map(|f| f.name()).collect();
                format!("unknown family {:?} (known: {})", name, known.join(", "))
            })
        })
        .collect()
}

fn render_text(report: &AggregateReport) {
    println!("Report generated at {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    for family in &report.families {
        let tag = if family.all_reachable { "ok" } else { "attention" };
        println!("[{tag}] {}: {}", family.family, family.summary());
        for outcome in family.outcomes.iter().filter(|o| !o.is_ok()) {
            println!(
                "    - {} [{}] {}",
                outcome.target,
                outcome.classification,
                outcome.detail.as_deref().unwrap_or("no detail")
            );
        }
    }

    println!();
    if report.fully_healthy() {
        println!("All monitored infrastructure is reachable.");
    } else {
        println!("Some targets need attention; see the lines above.");
    }
}

fn list_families(config: &Config) {
    let engine = Engine::new(config.clone());
    for family in Family::ALL {
        println!(
            "{:<24} {:>3} targets  {}",
            family.name(),
            engine.registry().targets(family).len(),
            family.describe()
        );
    }
}

async fn external_ip(reputation: bool) -> Result<ExitCode> {
    let address = ip::discover_external_ip().await?;
    println!("External IP: {address}");

    let mut cache = JsonFileCache::open_default().context("opening cache")?;
    match ip::remember_external_ip(&mut cache, &address).context("updating cache")? {
        Some(previous) => println!("Address changed since the last run (was {previous})."),
        None => println!("Address unchanged since the last run."),
    }

    if reputation {
        match cache.get_str(ip::ABUSE_API_KEY) {
            Some(api_key) => {
                let report = ip::check_ip_reputation(&address, &api_key).await?;
                print!("{}", ip::summarize_reputation(&report));
            }
            None => {
                warn!(
                    "no AbuseIPDB API key in the cache; store one under {:?} in {}",
                    ip::ABUSE_API_KEY,
                    cache.path().display()
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
