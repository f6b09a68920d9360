//! `rrl` command-line front end
//!
//! Repairs profiles, runs one-shot step recoveries and exercises the
//! stability watchdog from a terminal.

mod console;

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgMatches, Command};
use console::{ConsoleSink, FixtureSearch, LogNotifier};
use rrl_core::{ResilienceConfig, ResilienceSession, StoreConfig};
use rrl_profile::{DeviceProfile, IntegrityGuard};
use rrl_recovery::{LiteratureStep, LiveSearch, ReferenceDeviceStep, WorkflowStep};
use rrl_watchdog::ErrorRateLayer;
use serde_json::Value;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("rrl")
        .version(rrl_core::VERSION)
        .about("Resilience & Recovery Layer tools")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("repair")
                .about("Repair a device profile and print it as JSON")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .default_value("-")
                        .help("Profile JSON file, or - for stdin"),
                ),
        )
        .subcommand(
            Command::new("recover")
                .about("Run one step recovery and print the outcome")
                .arg(
                    Arg::new("step")
                        .long("step")
                        .required(true)
                        .value_parser(["reference-devices", "literature"])
                        .help("Workflow step to recover"),
                )
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .value_parser(value_parser!(PathBuf))
                        .help("Profile JSON file; repaired before use"),
                )
                .arg(
                    Arg::new("store-dir")
                        .long("store-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for the durable step cache"),
                )
                .arg(
                    Arg::new("live-fixture")
                        .long("live-fixture")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of records served as live results"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Install the watchdog, wait, and print its status")
                .arg(
                    Arg::new("seconds")
                        .long("seconds")
                        .default_value("5")
                        .value_parser(value_parser!(u64))
                        .help("How long to keep the watchdog running"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration as TOML")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("repair", args)) => {
            init_tracing(None);
            repair(args)
        }
        Some(("recover", args)) => recover(args).await,
        Some(("watch", args)) => watch(args).await,
        Some(("config", args)) => {
            init_tracing(None);
            let path = args
                .get_one::<PathBuf>("file")
                .or_else(|| args.get_one::<PathBuf>("config"));
            print!("{}", load_config(path.map(PathBuf::as_path))?.to_toml_string()?);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn init_tracing(error_layer: Option<ErrorRateLayer>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = subscriber(filter, error_layer).try_init();
}

/// Filtered stderr formatter plus, when given, the unfiltered error probe
fn subscriber(
    filter: EnvFilter,
    error_layer: Option<ErrorRateLayer>,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(error_layer)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResilienceConfig> {
    match path {
        Some(path) => ResilienceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ResilienceConfig::default()),
    }
}

/// Read JSON from a file or `-`; unreadable JSON becomes `null`
fn read_candidate(source: &str) -> anyhow::Result<Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading profile from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading profile {source}"))?
    };
    Ok(parse_candidate(&raw))
}

fn parse_candidate(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::warn!(%err, "profile is not valid JSON, starting from defaults");
        Value::Null
    })
}

fn repair(args: &ArgMatches) -> anyhow::Result<()> {
    let source = args
        .get_one::<String>("input")
        .map_or("-", String::as_str);
    let candidate = read_candidate(source)?;
    let profile = IntegrityGuard::new().repair(&candidate)?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn recover(args: &ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(dir) = args.get_one::<PathBuf>("store-dir") {
        config = config.with_store(StoreConfig::File { dir: dir.clone() });
    }

    let profile = match args.get_one::<PathBuf>("profile") {
        Some(path) => {
            let candidate = read_candidate(&path.to_string_lossy())?;
            Some(IntegrityGuard::new().repair(&candidate)?)
        }
        None => None,
    };

    let session = match &profile {
        Some(profile) => ResilienceSession::for_profile(config, &profile.id)?,
        None => ResilienceSession::new(config)?,
    };
    init_tracing(Some(session.watchdog().error_layer()));

    let fixture = args.get_one::<PathBuf>("live-fixture").map(PathBuf::as_path);
    let step = args
        .get_one::<String>("step")
        .map_or("reference-devices", String::as_str);
    let outcome = if step == "literature" {
        run_step::<LiteratureStep>(&session, profile.as_ref(), fixture).await?
    } else {
        run_step::<ReferenceDeviceStep>(&session, profile.as_ref(), fixture).await?
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_step<S: WorkflowStep>(
    session: &ResilienceSession,
    profile: Option<&DeviceProfile>,
    fixture: Option<&Path>,
) -> anyhow::Result<Value> {
    let live = fixture.map(FixtureSearch::<S>::load).transpose()?;
    let outcome = session
        .orchestrator()
        .recover::<S>(
            profile,
            live.as_ref().map(|search| search as &dyn LiveSearch<S>),
            &ConsoleSink,
            Some(&LogNotifier),
        )
        .await;
    Ok(serde_json::to_value(&outcome)?)
}

async fn watch(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let seconds = args.get_one::<u64>("seconds").copied().unwrap_or(5);

    let session = ResilienceSession::new(config)?;
    init_tracing(Some(session.watchdog().error_layer()));
    session.start()?;
    tracing::info!(seconds, "watchdog running");

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    println!("{}", serde_json::to_string_pretty(&session.status())?);
    session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn recover_arguments_parse() {
        let matches = cli()
            .try_get_matches_from([
                "rrl",
                "recover",
                "--step",
                "literature",
                "--store-dir",
                "/tmp/rrl",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();

        assert_eq!(name, "recover");
        assert_eq!(args.get_one::<String>("step").unwrap(), "literature");
        assert_eq!(
            args.get_one::<PathBuf>("store-dir").unwrap(),
            &PathBuf::from("/tmp/rrl")
        );
    }

    #[test]
    fn unknown_step_is_rejected() {
        let result = cli().try_get_matches_from(["rrl", "recover", "--step", "clinical"]);
        assert!(result.is_err());
    }

    #[test]
    fn candidate_parsing_falls_back_to_null() {
        assert_eq!(parse_candidate("   "), Value::Null);
        assert_eq!(parse_candidate("{ broken"), Value::Null);
        assert_eq!(parse_candidate(r#"{"name":"Stent"}"#)["name"], "Stent");
    }

    #[test]
    fn silenced_output_still_counts_errors() {
        use rrl_watchdog::{ManualClock, NullHost, Watchdog, WatchdogConfig};
        use std::sync::Arc;

        let watchdog = Watchdog::with_parts(
            WatchdogConfig::default().with_panic_hook(false),
            Arc::new(ManualClock::new()),
            Arc::new(NullHost),
        );
        let subscriber = subscriber(EnvFilter::new("off"), Some(watchdog.error_layer()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("upstream returned 502");
        });

        assert_eq!(watchdog.status().error_count, 1);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/rrl.toml"))).unwrap_err();
        assert!(err.to_string().contains("loading config"));
    }
}
