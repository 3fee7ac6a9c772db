//! ZLM command line.
//!
//! Usage:
//!   zlm hostid
//!   zlm keygen --out vendor.key
//!   zlm issue --key vendor.key --product "My Product" --version 1 --customer Acme
//!   zlm check --product "My Product" --version 1.0 --path ./licenses --all

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;
use zlm_cli::{
    CheckRequest, check, engine_config, generate_keypair, load_signing_key, parse_binding,
    public_key_path,
};
use zlm_issuer::LicenseBuilder;
use zlm_license::{HostIdentity, host_identity_json};

#[derive(Parser, Debug)]
#[command(name = "zlm")]
#[command(about = "ZLM license tooling")]
struct Args {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print this machine's identity as JSON
    Hostid,

    /// Generate an issuer key pair
    Keygen {
        /// Secret key file; the public key goes to <OUT>.pub
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Sign a license entry and print it
    Issue {
        /// Secret key file written by `zlm keygen`
        #[arg(short, long)]
        key: PathBuf,

        #[arg(long, default_value = "")]
        product: String,

        #[arg(long, default_value = "")]
        version: String,

        #[arg(long, default_value = "")]
        customer: String,

        /// YYYY-MM-DD or "never"
        #[arg(long, default_value = "never")]
        expiry: String,

        #[arg(long, default_value = "")]
        userdata: String,

        /// Bind to this machine's fingerprint
        #[arg(long)]
        bind_host: bool,

        /// Bind to a host attribute, as attribute=value (repeatable)
        #[arg(long = "bind")]
        bindings: Vec<String>,
    },

    /// Validate license data for a product and version
    Check {
        #[arg(long, default_value = "")]
        product: String,

        #[arg(long, default_value = "")]
        version: String,

        /// Search path of license files and directories
        #[arg(long, default_value = "")]
        path: String,

        /// License text, or @FILE to read it from a file
        #[arg(long, default_value = "")]
        license: String,

        /// Additional trusted issuer public key, hex (repeatable)
        #[arg(long = "trusted-key")]
        trusted_keys: Vec<String>,

        /// Walk every valid entry of the bundle
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Hostid => {
            println!("{}", host_identity_json()?);
        }
        Command::Keygen { out } => {
            let public = generate_keypair(&out)?;
            println!("{}", public.to_hex());
            eprintln!("Public key written to {:?}", public_key_path(&out));
        }
        Command::Issue {
            key,
            product,
            version,
            customer,
            expiry,
            userdata,
            bind_host,
            bindings,
        } => {
            let signing_key = load_signing_key(&key)?;
            let mut builder = LicenseBuilder::new()
                .product(product)
                .version(version)
                .customer(customer)
                .expiry(expiry)
                .userdata(userdata);
            if bind_host {
                builder = builder.bind_host(&HostIdentity::current()?);
            }
            for arg in &bindings {
                let (attribute, value) = parse_binding(arg)?;
                builder = builder.bind(attribute, value);
            }
            debug!(payload = ?builder.payload(), "signing license entry");
            println!("{}", builder.sign(&signing_key)?);
        }
        Command::Check {
            product,
            version,
            path,
            license,
            trusted_keys,
            all,
        } => {
            let license = match license.strip_prefix('@') {
                Some(file) => fs::read_to_string(file)
                    .with_context(|| format!("Failed to read license file {file:?}"))?,
                None => license,
            };
            let request = CheckRequest {
                product,
                version,
                argv0: std::env::args().next().unwrap_or_default(),
                path,
                license,
                all,
            };
            let reports = check(engine_config(&trusted_keys)?, &request)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }
    Ok(())
}
