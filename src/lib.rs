//! Extract the certificates in a PKCS7 bundle into PEM files and optionally
//! install them into ACAS or the operating system trust store.
//!
//! Decoding is done by the `openssl` command line tool; see [`toolkit`].
//! A run goes through [`extract`] and then [`install`]:
//!
//! ```rust,ignore
//! use cert_extractor::{config::Config, toolkit::Openssl};
//!
//! let config = Config { split: true, ..Config::default() };
//! let openssl = Openssl::locate(&config)?;
//! let extraction = cert_extractor::extract(&openssl, "bundle.p7b".as_ref(), &config)?;
//! let report = cert_extractor::install(&extraction.paths, &config);
//! ```

use std::path::{Path, PathBuf};

pub mod acas;
pub mod command;
pub mod config;
pub mod error;
#[cfg(target_os = "linux")]
mod linux;
pub mod splitter;
pub mod toolkit;
pub mod writer;

use config::Config;
use error::{InstallError, Result};
use toolkit::{Encoding, Toolkit};

/// What a successful extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub encoding: Encoding,
    /// Number of certificates found in the bundle.
    pub count: usize,
    /// Files written, each listed once.
    pub paths: Vec<PathBuf>,
}

/// Result of handing files to one installer.
#[derive(Debug, Default)]
pub struct InstallOutcome {
    pub installed: Vec<PathBuf>,
    pub errors: Vec<InstallError>,
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Installer outcomes; `None` where the installer was not requested.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub acas: Option<InstallOutcome>,
    pub os: Option<InstallOutcome>,
}

/// Clear the destination, detect the input encoding, convert, split and write.
/// Any failure here is fatal.
pub fn extract<T: Toolkit + ?Sized>(toolkit: &T, input: &Path, config: &Config) -> Result<Extraction> {
    writer::prepare_destination(&config.dest)?;

    let bundle = toolkit::detect(toolkit, input)?;
    let text = toolkit.convert(&bundle)?;
    let blocks = splitter::split(&text)?;
    let paths = writer::write(toolkit, &blocks, config)?;

    Ok(Extraction {
        encoding: bundle.encoding(),
        count: blocks.len(),
        paths,
    })
}

/// Run whichever installers `config` asks for. Installer failures are
/// collected, never returned as errors, and written files stay in place.
pub fn install(paths: &[PathBuf], config: &Config) -> InstallReport {
    InstallReport {
        acas: config
            .install_acas
            .then(|| acas::install_ca(paths, &config.acas, config.timeout)),
        os: config.install_os.then(|| install_os(paths, config)),
    }
}

pub fn install_os(paths: &[PathBuf], config: &Config) -> InstallOutcome {
    #[cfg(target_os = "linux")]
    return crate::linux::install_ca(paths, &config.os_store, config.timeout);

    #[cfg(not(target_os = "linux"))]
    {
        let _ = paths;
        InstallOutcome {
            installed: Vec::new(),
            errors: vec![InstallError::UnsupportedPlatform {
                anchors: config.os_store.anchors_dir.clone(),
                pretty_name: std::env::consts::OS.to_string(),
            }],
        }
    }
}
