use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use cert_extractor::config::{Config, DEFAULT_DEST, DEFAULT_TIMEOUT};
use cert_extractor::toolkit::Openssl;
use cert_extractor::InstallOutcome;

/// Extracts PKCS7 formatted certificates and outputs PEM certificates
#[derive(Parser, Debug)]
#[command(name = "cert-extractor", version)]
struct Cli {
    /// PKCS7 input file to extract certificates from
    #[arg(value_name = "PKCS7")]
    pkcs7: PathBuf,

    /// Output directory, cleared on every run
    #[arg(short, long, value_name = "DESTINATION", default_value = DEFAULT_DEST)]
    dest: PathBuf,

    /// Split the certificates into separate files
    #[arg(short, long)]
    split: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Install the certificates into ACAS (implies --split)
    #[arg(long)]
    acas: bool,

    /// Install the certificates into the OS trust anchors (Red Hat family)
    #[arg(long)]
    os: bool,

    /// Seconds to wait for each external command
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// openssl binary to use instead of the one on PATH
    #[arg(long, value_name = "PATH")]
    openssl: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            dest: self.dest.clone(),
            split: self.split,
            install_acas: self.acas,
            install_os: self.os,
            timeout: Duration::from_secs(self.timeout),
            openssl: self.openssl.clone(),
            ..Config::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(
            "cert_extractor",
            if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            },
        )
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&cli.pkcs7, &cli.config()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(input: &Path, config: &Config) -> anyhow::Result<()> {
    let openssl = Openssl::locate(config).context("openssl is required to extract certificates")?;

    let extraction = cert_extractor::extract(&openssl, input, config)?;

    println!(
        "Successfully extracted {} certificates to {} in PEM format.",
        extraction.count,
        config.dest.display()
    );

    let report = cert_extractor::install(&extraction.paths, config);
    if let Some(outcome) = &report.acas {
        print_outcome("ACAS", outcome);
    }
    if let Some(outcome) = &report.os {
        print_outcome("OS trust store", outcome);
    }

    Ok(())
}

fn print_outcome(store: &str, outcome: &InstallOutcome) {
    if !outcome.installed.is_empty() {
        println!(
            "Installed {} certificates into the {}.",
            outcome.installed.len(),
            store
        );
    }
    for err in &outcome.errors {
        eprintln!("{} installation failed: {}", store, err);
    }
}
