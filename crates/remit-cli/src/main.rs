use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use remit_core::account::{
    AccountService, AccountState, AccountWorkflow, Amount, ApplyDeposit, ApplyWithdraw,
    DepositHandler, FailureInjector, QUERY_GET_ACCOUNT, TransferDetails, WithdrawHandler,
};
use remit_core::app::{Host, HostBuilder, HostConfig};
use remit_core::domain::{ExecutionId, HostError};
use remit_core::typed::Activity;

#[derive(Parser)]
#[command(author, version, about = "Durable money-transfer account workflows", long_about = None)]
struct Cli {
    /// Host configuration (YAML). REMIT_* environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist execution history under this directory.
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Fail the first N deposit attempts to exercise retries.
    #[arg(long, default_value_t = 0)]
    fail_first: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open an account, deposit 300 twice, withdraw 100 and wait for completion.
    Demo,
    /// Replay stored executions and print their state.
    Recover,
}

#[derive(Serialize)]
struct Report {
    #[serde(rename = "accountID")]
    account_id: ExecutionId,
    status: String,
    account: Option<AccountState>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let host = Arc::new(build_host(config, cli.fail_first)?);

    let result = match cli.command {
        Command::Demo => demo(&host).await,
        Command::Recover => recover(&host).await,
    };

    host.shutdown().await;
    result
}

fn load_config(cli: &Cli) -> Result<HostConfig> {
    let config = match &cli.config {
        Some(path) => HostConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HostConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(dir) = &cli.history_dir {
        config.history_dir = Some(dir.clone());
    }
    Ok(config)
}

fn build_host(config: HostConfig, fail_first: u32) -> Result<Host> {
    let workflow = AccountWorkflow::new(config.signal_channel.clone());
    let host = HostBuilder::new(config)
        .register_activity::<ApplyDeposit, _>(FailureInjector::transient(DepositHandler, fail_first))?
        .register_activity::<ApplyWithdraw, _>(WithdrawHandler)?
        .register_workflow(workflow)?
        .expect_activities(&[ApplyDeposit::TYPE, ApplyWithdraw::TYPE])
        .build()?;
    Ok(host)
}

fn amount(value: i64) -> Result<Amount> {
    Ok(Amount::new(Decimal::from(value))?)
}

async fn demo(host: &Arc<Host>) -> Result<()> {
    let service = AccountService::new(Arc::clone(host));

    let created = service.create_account().await?;
    let id = created.account_id;
    println!("{}", serde_json::to_string_pretty(&created)?);

    service
        .deposit(id, TransferDetails::deposit(amount(300)?, "demo-savings", "demo-1"))
        .await?;
    service
        .deposit(id, TransferDetails::deposit(amount(300)?, "demo-savings", "demo-2"))
        .await?;

    let account = loop {
        let account = service.get_account(id).await?;
        if account.transfers.len() >= 2 {
            break account;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    info!(%id, amount = %account.amount, "both deposits applied, workflow still open");

    service
        .withdraw(id, TransferDetails::withdrawal(amount(100)?, "demo-savings", "demo-3"))
        .await?;
    let state = host.await_completion(id).await?;

    let report = Report {
        account_id: id,
        status: state.status.to_string(),
        account: Some(service.get_account(id).await?),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn recover(host: &Arc<Host>) -> Result<()> {
    if host.config().history_dir.is_none() {
        anyhow::bail!("nothing to recover: no history directory configured");
    }

    let recovered = host.recover().await?;
    info!(count = recovered.len(), "executions recovered");

    for id in recovered {
        let description = host.describe(id).await?;
        let account = match host.query_as::<AccountState>(id, QUERY_GET_ACCOUNT).await {
            Ok(account) => Some(account),
            Err(HostError::QueryRejected { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        let report = Report {
            account_id: id,
            status: description.status.to_string(),
            account,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
