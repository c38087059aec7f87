mod cli;
mod config;
mod routes;
mod storage;
mod views;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use lockbox_core::{accounts::AccountStore, codec::CredentialCodec};
use lockbox_storage::key_source::{encode_key, generate_key};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_CHECK_EMAIL: &str = "health-check";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(cli::Command::Serve) {
        cli::Command::Serve => serve(&config).await?,
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Keygen => println!("{}", encode_key(&generate_key())),
        cli::Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("lockbox {}", env!("CARGO_PKG_VERSION"));
}

async fn serve(config: &config::Config) -> Result<()> {
    let auth = storage::authenticator_from_config(config).await?;
    let public_dir = config.public_dir();
    let app = routes::router(auth, &public_dir);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, ?public_dir, "server running on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

/// Runs a quick health check of the key, codec and account store.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let auth = storage::authenticator_from_config(config).await?;
    run_credential_health(auth.store(), auth.codec()).await?;
    println!("Storage: ok");
    Ok(())
}

async fn run_credential_health<S: AccountStore, C: CredentialCodec>(
    store: &S,
    codec: &C,
) -> Result<()> {
    let sealed = codec.encrypt(HEALTH_CHECK_EMAIL)?;
    let opened = codec.decrypt(&sealed)?;
    if opened != HEALTH_CHECK_EMAIL {
        color_eyre::eyre::bail!("codec round-trip failed");
    }
    // Read-only: the check never lands in the collection.
    store.find_by_email(HEALTH_CHECK_EMAIL).await?;
    Ok(())
}

fn init_config(path_override: Option<&std::path::Path>) -> Result<()> {
    let path = match path_override {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let path = config::write_if_missing(&config::Config::starter(), &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
