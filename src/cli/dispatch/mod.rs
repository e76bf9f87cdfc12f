use crate::cli::{
    actions::{server::Args, Action},
    commands::{directory, ARG_BCRYPT_COST, ARG_DSN, ARG_HEALTH_PORT, ARG_LISTEN},
};
use crate::password::DEFAULT_BCRYPT_COST;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let listen = matches
        .get_one::<String>(ARG_LISTEN)
        .cloned()
        .context("missing required argument: --listen")?;

    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --dsn")?;

    let base_dn = matches
        .get_one::<String>(directory::ARG_BASE_DN)
        .cloned()
        .context("missing required argument: --base-dn")?;

    Ok(Action::Server(Args {
        listen,
        dsn,
        base_dn,
        user_ou: matches.get_one::<String>(directory::ARG_USER_OU).cloned(),
        group_ou: matches.get_one::<String>(directory::ARG_GROUP_OU).cloned(),
        bcrypt_cost: matches
            .get_one::<u32>(ARG_BCRYPT_COST)
            .copied()
            .unwrap_or(DEFAULT_BCRYPT_COST),
        health_port: matches.get_one::<u16>(ARG_HEALTH_PORT).copied(),
    }))
}
