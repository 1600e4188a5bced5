//! Command-line front end for the operator workflows.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xchange_ops::ops::keypair_from_suri;
use xchange_ops::{MarketRole, Operator, OperatorConfig, Receipt};

#[derive(Parser)]
#[command(name = "xchange-ops", version, about = "Operator client for the device-leasing marketplace")]
struct Cli {
    /// Node websocket endpoint
    #[arg(long, global = true)]
    url: Option<String>,

    /// Signer secret URI
    #[arg(long, global = true, default_value = "//Alice")]
    suri: String,

    /// Deployment role: service or parachain
    #[arg(long, global = true)]
    role: Option<MarketRole>,

    /// Marketplace pallet name override
    #[arg(long, global = true)]
    market_pallet: Option<String>,

    /// Client-order pallet name override
    #[arg(long, global = true)]
    order_pallet: Option<String>,

    /// Messaging pallet name override
    #[arg(long, global = true)]
    messaging_pallet: Option<String>,

    /// Parachain id of this deployment
    #[arg(long, global = true)]
    para_id: Option<u32>,

    /// SS58 network version for rendered addresses
    #[arg(long, global = true)]
    ss58_version: Option<u16>,

    /// Seconds to wait for inclusion before giving up
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// JSON configuration file; CLI flags override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transfer funds to an address
    Fund {
        /// Destination SS58 address
        dest: String,
        /// Amount in base units
        amount: u128,
    },
    /// Register a parachain with the relay chain (sudo)
    RegisterPara {
        /// Parachain id to register
        id: u32,
        /// Path to the runtime wasm blob
        #[arg(long)]
        code: PathBuf,
        /// Path to the genesis head blob
        #[arg(long)]
        genesis: PathBuf,
    },
    /// Open a one-directional HRMP channel between two parachains (sudo)
    OpenChannel {
        /// Sender parachain id
        from: u32,
        /// Recipient parachain id
        to: u32,
    },
    /// Send an opaque upward message to the relay chain
    Ump {
        /// Message payload, hex
        msg: String,
    },
    /// Send an opaque lateral message to a sibling parachain
    Hrmp {
        /// Destination parachain id
        dest: u32,
        /// Message payload, hex
        msg: String,
    },
    /// Register this signer's device on the marketplace
    RegisterDevice {
        /// Penalty held against the device, in base units
        #[arg(long, default_value_t = 1_000_000_000)]
        penalty: u128,
        /// Worst-case duration of one service run, in moments
        #[arg(long, default_value_t = 3_600_000)]
        wcd: u64,
        /// Register in Off rather than Ready
        #[arg(long)]
        off: bool,
    },
    /// Toggle this signer's device between Off and Ready
    SetState {
        /// Target Off rather than Ready
        #[arg(long)]
        off: bool,
    },
    /// Place an order against a device
    Order {
        /// Device SS58 address
        device: String,
        /// Opaque numeric service argument
        args: u64,
        /// Fee offered, in base units
        #[arg(long, default_value_t = 200_000_000_000)]
        fee: u128,
        /// Order validity window, in moments past the chain's now
        #[arg(long, default_value_t = 10_000_000)]
        window: u64,
    },
    /// Cancel an overdue order held by a device
    Cancel {
        /// Device SS58 address
        device: String,
    },
    /// Accept the pending order on this signer's device
    Accept {
        /// Land in Off afterwards
        #[arg(long)]
        off: bool,
    },
    /// Reject the pending order on this signer's device
    Reject {
        /// Land in Off afterwards (doubles as a halt)
        #[arg(long)]
        off: bool,
    },
    /// Mark the accepted service done
    Done {
        /// Land in Off after the cooldown
        #[arg(long)]
        off: bool,
    },
    /// Print the device profile and account balances
    Info {
        /// Parachain ids whose sovereign accounts to report
        #[arg(long = "para")]
        paras: Vec<u32>,
        /// Extra accounts to report, as name=ss58-address
        #[arg(long)]
        account: Vec<String>,
    },
}

fn build_config(cli: &Cli) -> anyhow::Result<OperatorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("cannot parse {}", path.display()))?
        }
        None => OperatorConfig::default(),
    };
    if let Some(role) = cli.role {
        config.role = role;
        // a role flag alone retargets the marketplace pallet too
        if cli.market_pallet.is_none() && cli.config.is_none() {
            config.market_pallet = role.default_market_pallet().to_string();
        }
    }
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(pallet) = &cli.market_pallet {
        config.market_pallet = pallet.clone();
    }
    if let Some(pallet) = &cli.order_pallet {
        config.order_pallet = pallet.clone();
    }
    if let Some(pallet) = &cli.messaging_pallet {
        config.messaging_pallet = pallet.clone();
    }
    if let Some(id) = cli.para_id {
        config.para_id = id;
    }
    if let Some(version) = cli.ss58_version {
        config.ss58_version = version;
    }
    if let Some(secs) = cli.timeout {
        config.inclusion_timeout_secs = secs;
    }
    Ok(config)
}

fn decode_hex_msg(msg: &str) -> anyhow::Result<Vec<u8>> {
    let stripped = msg.strip_prefix("0x").unwrap_or(msg);
    hex::decode(stripped).context("message payload is not valid hex")
}

fn parse_named_account(entry: &str) -> anyhow::Result<(String, String)> {
    let (name, address) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=address, got `{}`", entry))?;
    Ok((name.to_string(), address.to_string()))
}

fn print_receipt(receipt: &Receipt) {
    match receipt.block_hash {
        Some(block) => println!(
            "extrinsic 0x{} included in block 0x{}",
            hex::encode(receipt.extrinsic_hash),
            hex::encode(block)
        ),
        None => println!(
            "extrinsic 0x{} submitted",
            hex::encode(receipt.extrinsic_hash)
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let signer = keypair_from_suri(&cli.suri)?;
    let operator = Operator::connect(config, signer).await?;

    match cli.command {
        Command::Fund { dest, amount } => {
            print_receipt(&operator.fund(&dest, amount).await?);
        }
        Command::RegisterPara { id, code, genesis } => {
            let validation_code = std::fs::read(&code)
                .with_context(|| format!("cannot read {}", code.display()))?;
            let genesis_head = std::fs::read(&genesis)
                .with_context(|| format!("cannot read {}", genesis.display()))?;
            print_receipt(
                &operator
                    .register_parachain(id, validation_code, genesis_head)
                    .await?,
            );
        }
        Command::OpenChannel { from, to } => {
            print_receipt(&operator.open_channel(from, to).await?);
        }
        Command::Ump { msg } => {
            print_receipt(&operator.send_upward(decode_hex_msg(&msg)?).await?);
        }
        Command::Hrmp { dest, msg } => {
            print_receipt(&operator.send_lateral(dest, decode_hex_msg(&msg)?).await?);
        }
        Command::RegisterDevice { penalty, wcd, off } => {
            print_receipt(&operator.register_device(penalty, wcd, !off).await?);
        }
        Command::SetState { off } => {
            print_receipt(&operator.set_device_state(!off).await?);
        }
        Command::Order {
            device,
            args,
            fee,
            window,
        } => {
            print_receipt(&operator.place_order(&device, args, fee, window).await?);
        }
        Command::Cancel { device } => {
            print_receipt(&operator.cancel_order(&device).await?);
        }
        Command::Accept { off } => {
            print_receipt(&operator.accept_order(false, !off).await?);
        }
        Command::Reject { off } => {
            print_receipt(&operator.accept_order(true, !off).await?);
        }
        Command::Done { off } => {
            print_receipt(&operator.complete(!off).await?);
        }
        Command::Info { paras, account } => {
            let paras = if paras.is_empty() {
                vec![operator.config().para_id]
            } else {
                paras
            };
            let named = account
                .iter()
                .map(|entry| parse_named_account(entry))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let summary = operator.summary(&paras, &named).await?;

            match &summary.device {
                Some(profile) => println!(
                    "device {}: {:?}, penalty {}, wcd {}, paraid {}",
                    summary.device_address,
                    profile.state,
                    profile.penalty,
                    profile.wcd,
                    profile.paraid
                ),
                None => println!("device {}: not registered", summary.device_address),
            }
            for line in &summary.accounts {
                match line.free {
                    Some(free) => println!("{:<12} {} {}", line.name, line.address, free),
                    None => println!("{:<12} {} (absent)", line.name, line.address),
                }
            }
        }
    }

    Ok(())
}
