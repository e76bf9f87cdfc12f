use crate::{
    directory::{Directory, DirectoryConfig},
    health, ldap,
    password::Hasher,
    store::{mysql::redact_dsn, MySqlStore, Store},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{future::Future, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub listen: String,
    pub dsn: SecretString,
    pub base_dn: String,
    pub user_ou: Option<String>,
    pub group_ou: Option<String>,
    pub bcrypt_cost: u32,
    pub health_port: Option<u16>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable
/// or a listener cannot be bound.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = DirectoryConfig::new(
        &args.base_dn,
        args.user_ou.as_deref(),
        args.group_ou.as_deref(),
    )
    .context("Invalid directory configuration")?;

    let hasher = Hasher::new(args.bcrypt_cost).context("Invalid bcrypt cost")?;

    let store: Arc<dyn Store> = Arc::new(
        MySqlStore::connect(args.dsn.expose_secret())
            .await
            .context("Failed to connect to database")?,
    );

    let directory = Arc::new(Directory::new(Arc::clone(&store), config, hasher));

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind LDAP listener on {}", args.listen))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let health = match args.health_port {
        Some(port) => {
            let listener = TcpListener::bind(format!("::0:{port}"))
                .await
                .with_context(|| format!("Failed to bind health listener on port {port}"))?;
            Some(tokio::spawn(health::serve(
                listener,
                Arc::clone(&store),
                stopped(stop_rx.clone()),
            )))
        }
        None => None,
    };

    ldap::serve(listener, directory, stopped(stop_rx))
        .await
        .context("LDAP listener failed")?;

    if let Some(task) = health {
        task.await
            .context("Health endpoint task panicked")?
            .context("Health endpoint failed")?;
    }

    Ok(())
}

fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", args.listen.clone()),
        ("dsn", redact_dsn(args.dsn.expose_secret())),
        ("base_dn", args.base_dn.clone()),
        (
            "user_ou",
            args.user_ou.clone().unwrap_or_else(|| "default".to_string()),
        ),
        (
            "group_ou",
            args.group_ou
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        ),
        ("bcrypt_cost", args.bcrypt_cost.to_string()),
        (
            "health_port",
            args.health_port
                .map_or_else(|| "disabled".to_string(), |port| port.to_string()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "ldapgate {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
