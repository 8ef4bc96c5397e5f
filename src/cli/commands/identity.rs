//! CLI arguments for the external identity store.

use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_CREDENTIAL: &str = "identity-credential";
pub const ARG_CLIENT_CLASS: &str = "client-class";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub credential: Option<SecretString>,
    pub client_class: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the identity URL is missing or not a valid URL.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_IDENTITY_URL)
            .cloned()
            .context("missing required argument: --identity-url")?;
        Url::parse(&url).with_context(|| format!("invalid identity URL: {url}"))?;
        let credential = matches
            .get_one::<String>(ARG_IDENTITY_CREDENTIAL)
            .map(|value| SecretString::from(value.clone()));
        let client_class = matches
            .get_one::<String>(ARG_CLIENT_CLASS)
            .cloned()
            .unwrap_or_else(|| "reliable".to_string());
        Ok(Self {
            url,
            credential,
            client_class,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Base URL of the external identity store")
                .env("SENTINELA_IDENTITY_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_CREDENTIAL)
                .long(ARG_IDENTITY_CREDENTIAL)
                .help("Long-lived credential kept alive by the continuity watchdog")
                .env("SENTINELA_IDENTITY_CREDENTIAL"),
        )
        .arg(
            Arg::new(ARG_CLIENT_CLASS)
                .long(ARG_CLIENT_CLASS)
                .help("Network client class of this process: reliable or unstable-mobile")
                .env("SENTINELA_CLIENT_CLASS")
                .value_parser(["reliable", "unstable-mobile"])
                .default_value("reliable"),
        )
}
