use std::env;

use anyhow::{Context, Result, bail};
use avs_bls_aggregator::config::{Config, LOG_LEVEL_ENV};
use avs_bls_aggregator::handlers::keys;
use avs_bls_aggregator::handlers::simulate::{Simulation, SimulationOutcome};
use clap::{Arg, ArgMatches, Command};
use dotenv::dotenv;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn private_key_arg() -> Arg {
    Arg::new("private-key")
        .long("private-key")
        .required(true)
        .help("BLS private key, hex encoded")
}

fn message_arg() -> Arg {
    Arg::new("message")
        .long("message")
        .required(true)
        .help("Message whose keccak256 digest is signed")
}

fn cli() -> Command {
    Command::new("avs-bls-aggregator")
        .about("BLS quorum certificate aggregation over BN254")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter, overrides AGGREGATOR_LOG_LEVEL"),
        )
        .subcommand(
            Command::new("keys")
                .about("Print the public keys and operator id of a private key")
                .arg(private_key_arg()),
        )
        .subcommand(
            Command::new("sign")
                .about("Sign the keccak256 digest of a message")
                .arg(private_key_arg())
                .arg(message_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify a signature produced by `sign`")
                .arg(
                    Arg::new("public-key-g2")
                        .long("public-key-g2")
                        .required(true)
                        .help("G2 public key as JSON"),
                )
                .arg(message_arg())
                .arg(
                    Arg::new("signature")
                        .long("signature")
                        .required(true)
                        .help("Signature as JSON"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Aggregate signatures of configured operators in memory")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .help("Path to the YAML configuration"),
                ),
        )
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing --{id}"))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let matches = cli().get_matches();
    let config = match matches.subcommand() {
        Some(("simulate", sub)) => Some(Config::load(required(sub, "config")?)?),
        _ => None,
    };
    let level = matches
        .get_one::<String>("log-level")
        .cloned()
        .or_else(|| config.as_ref().map(|config| config.log_level.clone()))
        .or_else(|| env::var(LOG_LEVEL_ENV).ok())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level);

    match matches.subcommand() {
        Some(("keys", sub)) => {
            let described = keys::describe_key(required(sub, "private-key")?)?;
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
        Some(("sign", sub)) => {
            let signed = keys::sign(required(sub, "private-key")?, required(sub, "message")?)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        Some(("verify", sub)) => {
            let valid = keys::verify(
                required(sub, "public-key-g2")?,
                required(sub, "message")?,
                required(sub, "signature")?,
            )?;
            println!("{valid}");
            if !valid {
                bail!("signature is invalid");
            }
        }
        Some(("simulate", _)) => {
            let config = config.context("simulate requires a configuration")?;
            let mut registry = Registry::default();
            match Simulation::new(config).run(&mut registry).await? {
                SimulationOutcome::Completed(response) => {
                    info!(task_index = response.task_index, "task completed");
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                SimulationOutcome::Expired(task_index) => {
                    info!(task_index, "task expired");
                    println!("task {task_index} expired before reaching its stake threshold");
                }
            }
            let mut encoded = String::new();
            encode(&mut encoded, &registry)?;
            print!("{encoded}");
        }
        _ => bail!("unknown command"),
    }
    Ok(())
}
