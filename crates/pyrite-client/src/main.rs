//! pyrite-client — operational CLI for a running Pyrite node.
//!
//! Usage:
//!   pyrite-client generate    --keys <dir>
//!   pyrite-client get-balance --host <addr:port> --address <b58>
//!   pyrite-client transfer    --host <addr:port> --to <b58> --amount <n> [--fee <n>] --keys <dir>
//!   pyrite-client test        --host <addr:port>
//!
//! Exit code 0 on success, 1 on any handled error.

use std::path::PathBuf;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use serde_json::json;

use pyrite_core::{Address, Balance, Transaction};
use pyrite_crypto::KeyPair;

mod rpc_client;
use rpc_client::ApiClient;

#[derive(Parser, Debug)]
#[command(name = "pyrite-client", version, about = "Pyrite node client")]
struct Args {
    /// Node API endpoint (host:port).
    #[arg(long, global = true, default_value = "127.0.0.1:50051")]
    host: String,

    /// Directory holding the key pair.
    #[arg(long, global = true, default_value = "./pyrite-keys")]
    keys: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key pair into the keys directory and print the address.
    Generate,

    /// Print an account's balance.
    GetBalance {
        /// Account address (base58). Defaults to the local key's address.
        #[arg(long)]
        address: Option<String>,
    },

    /// Sign and submit a transfer.
    Transfer {
        /// Recipient address (base58).
        #[arg(long)]
        to: String,
        /// Amount to transfer (decimal).
        #[arg(long)]
        amount: String,
        /// Transaction fee.
        #[arg(long, default_value_t = 0)]
        fee: u64,
    },

    /// Probe node connectivity and print the chain tip.
    Test,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("warn,pyrite_client=info")
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = ApiClient::new(&args.host);
    match args.command {
        Command::Generate => {
            let keypair = KeyPair::generate();
            keypair
                .save_to_dir(&args.keys)
                .with_context(|| format!("writing keys to {}", args.keys.display()))?;
            let address = Address::from_public_key(&keypair.public_key_bytes());
            println!("address: {address}");
            println!("keys written to {}", args.keys.display());
        }

        Command::GetBalance { address } => {
            let address = match address {
                Some(address) => address,
                None => {
                    let keypair = KeyPair::load_from_dir(&args.keys)
                        .context("loading keys (pass --address to query without keys)")?;
                    Address::from_public_key(&keypair.public_key_bytes()).to_base58()
                }
            };
            let info = client
                .call("account_info", json!({ "address": address }))
                .await?;
            println!(
                "{address}: {} (nonce {})",
                info["balance"].as_str().unwrap_or("0"),
                info["nonce"].as_u64().unwrap_or(0)
            );
        }

        Command::Transfer { to, amount, fee } => {
            let keypair = KeyPair::load_from_dir(&args.keys)
                .with_context(|| format!("loading keys from {}", args.keys.display()))?;
            let from = Address::from_public_key(&keypair.public_key_bytes());
            let to = Address::from_base58(&to).context("parsing recipient address")?;
            let amount = Balance::from_dec_str(&amount).context("parsing amount")?;

            let mut tx = Transaction::new(
                from,
                to,
                amount,
                fee,
                chrono::Utc::now().timestamp() as u64,
                Vec::new(),
            )
            .context("building transaction")?;
            tx.sign(&keypair);

            let result = client
                .call(
                    "push_transaction",
                    json!({
                        "from": tx.from().to_base58(),
                        "to": tx.to().to_base58(),
                        "amount": tx.amount().to_string(),
                        "fee": tx.fee().to_string(),
                        "timestamp": tx.timestamp(),
                        "data": BASE64.encode(tx.data()),
                        "sign": tx.signature().to_base64(),
                    }),
                )
                .await?;
            println!(
                "submitted: {}",
                result["hash"].as_str().unwrap_or("(no hash)")
            );
        }

        Command::Test => {
            let info = client.call("last_block_info", json!({})).await?;
            println!(
                "node at {} is up: top block #{} ({})",
                args.host,
                info["top_block_number"].as_u64().unwrap_or(0),
                info["top_block_hash"].as_str().unwrap_or("?"),
            );
        }
    }
    Ok(())
}
