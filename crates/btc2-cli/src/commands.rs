//! CLI command implementations.

use crate::wedge::{Lines, WedgeScanner};
use crate::AppContext;
use btc2_rpc::WalletApi;
use btc2_types::TICKER;
use btc2_wallet::qr::render_terminal;
use btc2_wallet::{
    QrScanner, RefreshOutcome, RemoteWalletService, StreamStatus, WalletController,
};
use std::io::Write;

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn prompt_key() -> std::result::Result<String, Box<dyn std::error::Error>> {
    let key = rpassword::prompt_password("Encrypted key: ")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("encrypted key cannot be empty".into());
    }
    Ok(key.to_string())
}

fn prompt() {
    print!("btc2> ");
    let _ = std::io::stdout().flush();
}

fn short_txid(txid: &str) -> String {
    if txid.chars().count() > 16 {
        format!("{}...", txid.chars().take(16).collect::<String>())
    } else {
        txid.to_string()
    }
}

fn print_help() {
    println!("Commands:");
    println!("  balance                 show balance and fee estimate");
    println!("  history                 show transaction history");
    println!("  refresh                 fetch balance and history now");
    println!("  send <address> <amount> send {} to an address", TICKER);
    println!("  to <address>            set the draft recipient");
    println!("  amount <value>          set the draft amount");
    println!("  draft                   show the draft");
    println!("  send                    submit the draft");
    println!("  scan                    fill the recipient from a QR scanner");
    println!("  address                 show your address and its QR code");
    println!("  logout | quit           end the session");
    println!();
}

fn print_balance<S: RemoteWalletService>(c: &WalletController<S>) {
    let view = c.view();
    let stale = match &view.balance_status {
        StreamStatus::Failed(_) => " (stale)",
        _ => "",
    };
    println!("Balance: {} {}{}", view.balance.to_fixed(), TICKER, stale);
    println!("Fee:     {} {} per transaction", view.fee.to_fixed(), TICKER);
    if let Some(at) = view.last_refresh {
        println!("Updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}

fn print_history<S: RemoteWalletService>(c: &WalletController<S>) {
    let history = c.history();
    if history.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!("{:<10} {:>20} {:>6} TXID", "Type", "Amount", "Conf");
    println!("{}", "-".repeat(60));
    for tx in &history {
        println!(
            "{:<10} {:>20} {:>6} {}",
            tx.category.label(),
            tx.amount.to_string(),
            tx.confirmations,
            short_txid(&tx.txid),
        );
    }
}

fn print_draft<S: RemoteWalletService>(c: &WalletController<S>) {
    let form = c.send_form();
    println!("To:     {}", if form.recipient.is_empty() { "-" } else { form.recipient.as_str() });
    println!("Amount: {}", if form.amount.is_empty() { "-" } else { form.amount.as_str() });
}

fn print_address<S: RemoteWalletService>(c: &WalletController<S>) {
    let Some(address) = c.address() else {
        println!("Not logged in.");
        return;
    };
    println!("Address: {}", address);
    if let Some(since) = c.view().session_started {
        println!("Session: since {}", since.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    match c.address_qr_terminal() {
        Ok(qr) => println!("{}", qr),
        Err(e) => println!("(QR unavailable: {})", e),
    }
}

// ─── Shell actions ──────────────────────────────────────────────────────────

async fn refresh<S: RemoteWalletService>(c: &WalletController<S>) {
    match c.refresh().await {
        Ok(RefreshOutcome::Skipped) => println!("A refresh is already running."),
        Ok(RefreshOutcome::Discarded) => {}
        Ok(RefreshOutcome::Completed(_)) => match c.error() {
            Some(msg) => println!("Error: {}", msg),
            None => print_balance(c),
        },
        Err(e) => println!("Error: {}", e.user_message()),
    }
}

async fn send<S: RemoteWalletService>(c: &WalletController<S>) {
    match c.send().await {
        Ok(receipt) => {
            println!("Transaction sent: {}", receipt.txid);
            println!(
                "  {} {} to {} (fee ~{} {})",
                receipt.amount.to_fixed(),
                TICKER,
                receipt.recipient,
                receipt.estimated_fee.to_fixed(),
                TICKER
            );
            print_balance(c);
        }
        Err(e) => println!("Error: {}", e.user_message()),
    }
}

async fn scan<S: RemoteWalletService>(c: &WalletController<S>) {
    let scan = c.scan_address();
    tokio::pin!(scan);

    let result = loop {
        tokio::select! {
            r = &mut scan => break r,
            _ = tokio::signal::ctrl_c() => c.cancel_scan(),
        }
    };

    match result {
        Ok(Some(address)) => println!("Recipient set to {}", address),
        Ok(None) => println!("Scan cancelled; recipient unchanged."),
        Err(e) => println!("Error: {}", e.user_message()),
    }
}

/// Read and run commands until `logout`, `quit`, Ctrl-C, or EOF.
async fn repl<S: RemoteWalletService>(c: &WalletController<S>, lines: &Lines) -> Result {
    print_help();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next() => match line {
                Some(l) => l,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
        };

        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match (cmd, args.as_slice()) {
            ("balance", []) => print_balance(c),
            ("history", []) => print_history(c),
            ("refresh", []) => refresh(c).await,
            ("to", [address]) => c.set_recipient(*address),
            ("amount", [amount]) => c.set_amount(*amount),
            ("draft", []) => print_draft(c),
            ("send", []) => send(c).await,
            ("send", [address, amount]) => {
                c.set_recipient(*address);
                c.set_amount(*amount);
                send(c).await;
            }
            ("scan", []) => scan(c).await,
            ("address", []) => print_address(c),
            ("logout" | "quit" | "exit", []) => return Ok(()),
            ("help", _) => print_help(),
            _ => println!("Unknown command '{}'. Type 'help' for a list.", line.trim()),
        }
    }
}

// ─── Commands ───────────────────────────────────────────────────────────────

pub async fn create_wallet(ctx: &AppContext) -> Result {
    let api = WalletApi::with_config(ctx.rpc.clone())?;
    let controller = WalletController::new(api, ctx.wallet.clone());

    controller.open_wallet_creation()?;
    let created = controller
        .create_wallet()
        .await
        .map_err(|e| e.user_message())?;

    println!("Wallet created.");
    println!();
    println!("IMPORTANT: Save these values now. They are shown only once.");
    println!("If you lose the encrypted key, you will lose access to your funds.");
    println!();
    println!("Address:        {}", created.address);
    println!("Encrypted key:  {}", created.encrypted_key);
    println!("Private key:    {}", created.private_key);
    println!();
    println!("Use the encrypted key to log in with 'shell'.");

    controller.back_to_login()?;
    Ok(())
}

pub async fn shell(ctx: &AppContext) -> Result {
    let key = prompt_key()?;

    let lines = Lines::spawn_stdin();
    let api = WalletApi::with_config(ctx.rpc.clone())?;
    let scanner = QrScanner::new(Box::new(WedgeScanner::new(lines.clone())));
    let controller = WalletController::new(api, ctx.wallet.clone()).with_scanner(scanner);

    let address = controller
        .login(&key)
        .await
        .map_err(|e| e.user_message())?;
    drop(key);

    println!("Logged in as {}", address);
    print_balance(&controller);
    if let Some(msg) = controller.error() {
        println!("Warning: {}", msg);
    }
    println!();

    let auto_refresh = controller.run_auto_refresh();
    tokio::pin!(auto_refresh);

    let outcome = tokio::select! {
        _ = &mut auto_refresh => Ok(()),
        res = repl(&controller, &lines) => res,
    };

    controller.logout().await;
    println!("Logged out.");
    outcome
}

pub fn show_qr(ctx: &AppContext, address: &str) -> Result {
    let address = address.trim();
    if address.is_empty() {
        return Err("address cannot be empty".into());
    }
    println!("{}", render_terminal(address, ctx.wallet.qr.ec_level)?);
    println!("{}", address);
    Ok(())
}
