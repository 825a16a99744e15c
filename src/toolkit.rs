//! The external certificate toolkit.
//!
//! Decoding PKCS7 and rendering certificates is left to `openssl`. The
//! [`Toolkit`] trait is the seam the rest of the crate talks to, so the
//! pipeline can run against a stand-in in tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use which::which;

use crate::command;
use crate::config::Config;
use crate::error::{CommandError, ExtractError, ParseError, Result};
use crate::splitter::CertificateBlock;

/// How the PKCS7 input is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pem,
    Der,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Pem => write!(f, "PEM"),
            Encoding::Der => write!(f, "DER"),
        }
    }
}

/// The input file together with its detected encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    path: PathBuf,
    encoding: Encoding,
}

impl CertificateBundle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

pub trait Toolkit {
    /// Whether `path` decodes as PKCS7 in `encoding`. Only a failure to run
    /// the toolkit at all is an error.
    fn probe(&self, path: &Path, encoding: Encoding) -> std::result::Result<bool, CommandError>;

    /// Every certificate in the bundle as concatenated PEM text.
    fn convert(&self, bundle: &CertificateBundle) -> Result<String>;

    /// Human readable description of one certificate, including its
    /// `Subject:` line.
    fn describe(&self, block: &CertificateBlock) -> Result<String>;
}

/// Work out whether `path` is PEM or DER PKCS7, trying PEM first.
pub fn detect<T: Toolkit + ?Sized>(toolkit: &T, path: &Path) -> Result<CertificateBundle> {
    log::debug!("Detecting format of {}", path.display());

    std::fs::File::open(path).map_err(|source| ExtractError::InputNotReadable {
        path: path.to_path_buf(),
        source,
    })?;

    for encoding in [Encoding::Pem, Encoding::Der] {
        if toolkit.probe(path, encoding)? {
            log::debug!("{} is {} formatted", path.display(), encoding);
            return Ok(CertificateBundle {
                path: path.to_path_buf(),
                encoding,
            });
        }
    }

    Err(ExtractError::InputFormat {
        path: path.to_path_buf(),
    })
}

/// Pull the subject common name out of `openssl x509 -text` output.
///
/// Accepts both `CN = name` (OpenSSL 1.1 and later) and `CN=name`. The name
/// runs from the last `CN` attribute to the end of the line, so unescaped
/// commas inside it are kept.
pub fn common_name(description: &str) -> std::result::Result<String, ParseError> {
    let subject = subject_pattern()
        .captures(description)
        .and_then(|c| c.name("subject"))
        .map(|m| m.as_str().trim())
        .ok_or(ParseError::MissingSubject)?;

    let cn = cn_pattern()
        .captures(subject)
        .and_then(|c| c.name("cn"))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| ParseError::MissingCommonName {
            subject: subject.to_string(),
        })?;

    if cn.is_empty() {
        return Err(ParseError::EmptyCommonName {
            subject: subject.to_string(),
        });
    }

    Ok(cn.to_string())
}

fn subject_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*Subject:(?P<subject>.*)$").expect("subject pattern compiles")
    })
}

fn cn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:.*[,/])?\s*CN\s*=(?P<cn>.*)$").expect("CN pattern compiles")
    })
}

/// `openssl` on the command line.
#[derive(Debug, Clone)]
pub struct Openssl {
    binary: PathBuf,
    timeout: Duration,
    temp_dir: PathBuf,
}

impl Openssl {
    /// Use the configured binary, or find `openssl` on `PATH`.
    pub fn locate(config: &Config) -> std::result::Result<Self, CommandError> {
        let binary = match &config.openssl {
            Some(binary) => binary.clone(),
            None => which("openssl").map_err(|_| CommandError::NotFound {
                program: "openssl".to_string(),
            })?,
        };

        log::debug!("Using {}", binary.display());

        Ok(Openssl {
            binary,
            timeout: config.timeout,
            temp_dir: std::env::temp_dir(),
        })
    }

    /// Directory the converter's scratch file is created in.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    fn pkcs7(&self, path: &Path, encoding: Encoding) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("pkcs7").arg("-in").arg(path);
        if encoding == Encoding::Der {
            cmd.args(["-inform", "DER"]);
        }
        cmd
    }
}

impl Toolkit for Openssl {
    fn probe(&self, path: &Path, encoding: Encoding) -> std::result::Result<bool, CommandError> {
        let mut cmd = self.pkcs7(path, encoding);
        cmd.arg("-noout");
        Ok(command::run(cmd, None, self.timeout)?.success())
    }

    fn convert(&self, bundle: &CertificateBundle) -> Result<String> {
        let pem_file = tempfile::Builder::new()
            .prefix("cert-extractor-")
            .suffix(".pem")
            .tempfile_in(&self.temp_dir)?;

        log::debug!("Converting certificates into {}", pem_file.path().display());

        let mut cmd = self.pkcs7(bundle.path(), bundle.encoding());
        cmd.arg("-print_certs").arg("-out").arg(pem_file.path());

        let out = command::run(cmd, None, self.timeout)?;
        if !out.success() {
            return Err(ExtractError::Conversion {
                path: bundle.path().to_path_buf(),
                message: out.stderr_text(),
            });
        }

        // pem_file is removed when it drops, on this path and every error path.
        Ok(std::fs::read_to_string(pem_file.path())?)
    }

    fn describe(&self, block: &CertificateBlock) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["x509", "-text", "-noout"]);

        let out = command::run(cmd, Some(block.as_bytes()), self.timeout)?;
        if !out.success() {
            return Err(ExtractError::Describe {
                message: out.stderr_text(),
            });
        }

        Ok(out.stdout_text())
    }
}
