use crate::directory::config::{DEFAULT_GROUP_OU, DEFAULT_USER_OU};
use clap::{Arg, Command};

pub const ARG_BASE_DN: &str = "base-dn";
pub const ARG_USER_OU: &str = "user-ou";
pub const ARG_GROUP_OU: &str = "group-ou";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_DN)
                .short('b')
                .long("base-dn")
                .help("Directory suffix, example: dc=example,dc=com")
                .env("LDAPGATE_BASE_DN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USER_OU)
                .long("user-ou")
                .help(format!("Container for user entries (default: {DEFAULT_USER_OU})"))
                .env("LDAPGATE_USER_OU"),
        )
        .arg(
            Arg::new(ARG_GROUP_OU)
                .long("group-ou")
                .help(format!("Container for group entries (default: {DEFAULT_GROUP_OU})"))
                .env("LDAPGATE_GROUP_OU"),
        )
}
