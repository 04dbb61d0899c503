//! Chaincode router demo binary
//!
//! Serves the demo asset contract against an in-memory ledger:
//!   chaincode-router [--config <path>] <function> [args...]

mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::FmtSubscriber;

use chaincode_router::{Chaincode, ChaincodeConfig, ContractChaincode, MockStub};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("--help" | "-h") | None => print_help(),
        Some("--version" | "-V") => {
            println!("chaincode-router {}", chaincode_router::VERSION);
        }
        Some(_) => match run(&args) {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(2);
            }
        },
    }
}

/// Invoke one function. Returns whether the response was successful.
fn run(args: &[String]) -> anyhow::Result<bool> {
    let mut config_path: Option<PathBuf> = None;
    let mut rest = args;
    if let [flag, path, tail @ ..] = rest {
        if flag == "--config" {
            config_path = Some(PathBuf::from(path));
            rest = tail;
        }
    } else if rest.first().is_some_and(|a| a == "--config") {
        bail!("--config requires a path");
    }

    let Some((function, params)) = rest.split_first() else {
        bail!("no function given");
    };

    let config = match &config_path {
        Some(path) => ChaincodeConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChaincodeConfig::default(),
    };

    // Initialize logging with EnvFilter to support RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let chaincode = ContractChaincode::builder()
        .config(config)
        .contract(demo::asset_contract()?)
        .build()?;

    let stub = MockStub::with_state(function.clone(), params.to_vec(), demo::seed_state());
    let response = chaincode.invoke(Arc::new(stub));

    println!("status:  {}", response.status);
    if response.is_ok() {
        println!("payload: {}", response.payload_str());
    } else {
        println!("message: {}", response.message);
    }
    Ok(response.is_ok())
}

fn print_help() {
    println!("chaincode-router v{}", chaincode_router::VERSION);
    println!("Contract routing demo over an in-memory ledger");
    println!();
    println!("USAGE:");
    println!("    chaincode-router [--config <path>] <function> [args...]");
    println!();
    println!("FUNCTIONS ({} is the default contract):", demo::CONTRACT_NAME);
    println!("    CreateAsset <id> <owner> <value>");
    println!("    ReadAsset <id>");
    println!("    AssetExists <id>");
    println!("    TransferAsset <id> <new-owner>");
    println!("    DeleteAsset <id>");
    println!("    org.hyperledger.fabric:GetMetadata");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>   TOML config (default_contract, metadata_path, log_level, info)");
    println!("    -h, --help        Print help");
    println!("    -V, --version     Print version");
    println!();
    println!("EXAMPLES:");
    println!("    chaincode-router ReadAsset asset1");
    println!("    RUST_LOG=debug chaincode-router assets:TransferAsset asset2 Max");
}
