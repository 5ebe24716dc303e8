use btc2_rpc::RpcConfig;
use btc2_wallet::WalletConfig;
use clap::{Parser, Subcommand};
use std::time::Duration;

mod commands;
mod wedge;

/// BTC2 web wallet command-line interface.
#[derive(Parser)]
#[command(name = "btc2-wallet-cli")]
#[command(about = "Terminal client for a BTC2 web wallet backend")]
#[command(version)]
struct Cli {
    /// Wallet backend URL.
    #[arg(long, env = "BTC2_WALLET_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Username for HTTP Basic auth in front of the backend.
    #[arg(long)]
    rpc_user: Option<String>,

    /// Password for HTTP Basic auth in front of the backend.
    #[arg(long)]
    rpc_password: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Seconds between background balance/history refreshes.
    #[arg(long, default_value = "30")]
    refresh_interval: u64,

    /// Confirmation target (in blocks) for the fee estimate.
    #[arg(long, default_value = "6")]
    fee_blocks: u32,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet and print its keys once.
    Create,

    /// Log in and open an interactive wallet session (default).
    Shell,

    /// Print a QR code for an address. Works offline.
    Qr {
        /// Address to encode.
        address: String,
    },
}

/// Application context shared across commands.
struct AppContext {
    rpc: RpcConfig,
    wallet: WalletConfig,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Self {
        let rpc = RpcConfig {
            url: cli.server.clone(),
            username: cli.rpc_user.clone(),
            password: cli.rpc_password.clone(),
            timeout: Duration::from_secs(cli.timeout),
            ..Default::default()
        };

        let wallet = WalletConfig {
            fee_target_blocks: cli.fee_blocks,
            refresh_interval: Duration::from_secs(cli.refresh_interval.max(1)),
            ..Default::default()
        };

        Self { rpc, wallet }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = AppContext::from_cli(&cli);

    let result = match cli.command.unwrap_or(Commands::Shell) {
        Commands::Create => commands::create_wallet(&ctx).await,
        Commands::Shell => commands::shell(&ctx).await,
        Commands::Qr { address } => commands::show_qr(&ctx, &address),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
