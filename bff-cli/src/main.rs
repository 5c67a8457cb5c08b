// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
#![warn(unused_imports)]

use anyhow::{Context, Result};
use bff::{
  common::{auth::SigningKey, transport::QuicSettings},
  config::{env, DownstreamConfig, GatewayConfig, DEFAULT_LISTEN},
  util::validators::{parse_socketaddr, validate_non_empty, validate_socketaddr},
};
use clap::{Arg, ArgMatches, Command};

mod server;
mod token;

fn jwt_key_arg() -> Arg<'static> {
  Arg::new("jwt-key")
    .long("jwt-key")
    .env(env::JWT_KEY)
    .hide_env_values(true)
    .takes_value(true)
    .help("Shared HMAC secret for bearer tokens; falls back to a development default")
}

fn app() -> Command<'static> {
  Command::new(env!("CARGO_BIN_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .subcommand(
      Command::new("serve")
        .about("Connect to both downstream services and serve the gateway")
        .arg(
          Arg::new("listen")
            .long("listen")
            .short('l')
            .env(env::LISTEN)
            .validator(validate_socketaddr)
            .default_value(DEFAULT_LISTEN)
            .takes_value(true),
        )
        .arg(
          Arg::new("user-addr")
            .long("user-addr")
            .env(env::USER_ADDR)
            .takes_value(true)
            .help("User service address, optionally prefixed with quic:// to tunnel"),
        )
        .arg(
          Arg::new("resource-addr")
            .long("resource-addr")
            .env(env::RESOURCE_ADDR)
            .takes_value(true)
            .help("Resource service address, optionally prefixed with quic:// to tunnel"),
        )
        .arg(jwt_key_arg())
        .arg(
          Arg::new("quic-alpn")
            .long("quic-alpn")
            .env(env::QUIC_ALPN)
            .takes_value(true),
        )
        .arg(
          Arg::new("quic-insecure-skip-verify")
            .long("quic-insecure-skip-verify")
            .env(env::QUIC_INSECURE_SKIP_VERIFY)
            .takes_value(true)
            .help("Certificate verification for tunnels is skipped unless this is 0, false, no or off"),
        ),
    )
    .subcommand(
      Command::new("token")
        .about("Mint a bearer token for local testing")
        .arg(jwt_key_arg())
        .arg(
          Arg::new("user-id")
            .long("user-id")
            .short('u')
            .takes_value(true),
        )
        .arg(Arg::new("subject").long("subject").takes_value(true))
        .arg(
          Arg::new("id")
            .long("id")
            .validator(|v| v.parse::<i64>())
            .takes_value(true),
        )
        .arg(Arg::new("email").long("email").takes_value(true))
        .arg(Arg::new("nickname").long("nickname").takes_value(true))
        .arg(
          Arg::new("role")
            .long("role")
            .takes_value(true)
            .multiple_occurrences(true),
        )
        .arg(
          Arg::new("ttl-secs")
            .long("ttl-secs")
            .validator(|v| v.parse::<u64>())
            .default_value("3600")
            .takes_value(true)
            .help("Token lifetime; 0 issues a token without expiry"),
        )
        .arg(
          Arg::new("issuer")
            .long("issuer")
            .validator(validate_non_empty)
            .takes_value(true),
        ),
    )
    .subcommand_required(true)
    .arg_required_else_help(true)
}

fn main() {
  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quinn=warn,quinn_proto=warn,info"));
  let collector = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .finish();
  tracing::subscriber::set_global_default(collector).expect("Logger init must succeed");
  let matches = app().get_matches();
  let mode = matches.subcommand_name().unwrap_or("<No subcommand?>");
  let handler = main_args_handler(&matches);
  let rt = tokio::runtime::Builder::new_multi_thread()
    .thread_name("tokio-reactor-worker")
    .enable_all()
    .build()
    .expect("Tokio Runtime setup failure");
  match rt.block_on(handler) {
    Err(err) => {
      tracing::error!(mode = mode, err = ?err, "dispatch_command_failure");
      std::process::exit(1);
    }
    Ok(_) => tracing::info!("{} exited successfully", mode),
  }
}

fn signing_key(args: &ArgMatches) -> SigningKey {
  SigningKey::from_env_value(args.value_of("jwt-key").map(String::from))
}

pub fn gateway_config(args: &ArgMatches) -> Result<GatewayConfig> {
  let listen = args.value_of("listen").unwrap_or(DEFAULT_LISTEN);
  Ok(GatewayConfig {
    listen: parse_socketaddr(listen).with_context(|| format!("Invalid listen address {:?}", listen))?,
    // Missing addresses are reported by the connector, before anything is dialed
    downstream: DownstreamConfig {
      user_addr: args.value_of("user-addr").unwrap_or_default().to_owned(),
      resource_addr: args.value_of("resource-addr").unwrap_or_default().to_owned(),
    },
    signing_key: signing_key(args),
    quic: QuicSettings::from_env_values(
      args.value_of("quic-alpn"),
      args.value_of("quic-insecure-skip-verify"),
    ),
  })
}

pub fn token_args(args: &ArgMatches) -> Result<token::TokenArgs> {
  let text = |name: &str| args.value_of(name).unwrap_or_default().to_owned();
  Ok(token::TokenArgs {
    user_id: text("user-id"),
    subject: text("subject"),
    id: args.value_of("id").map(str::parse::<i64>).transpose()?.unwrap_or(0),
    email: text("email"),
    nickname: text("nickname"),
    issuer: text("issuer"),
    roles: args
      .values_of("role")
      .map(|roles| roles.map(String::from).collect())
      .unwrap_or_default(),
    ttl_secs: args.value_of("ttl-secs").map(str::parse::<u64>).transpose()?.unwrap_or(0),
    signing_key: signing_key(args),
  })
}

async fn main_args_handler(matches: &'_ ArgMatches) -> Result<()> {
  match matches
    .subcommand()
    .expect("Subcommand is marked as required")
  {
    ("serve", opts) => {
      let config = gateway_config(opts)?;
      tracing::info!("Running gateway with config {:#?}", config);
      server::server_main(config).await
    }
    ("token", opts) => token::token_main(token_args(opts)?),
    (_, _) => unreachable!(),
  }
}
