use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEST: &str = "certs_extracted";
pub const COMBINED_FILE_NAME: &str = "certs.pem";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ACAS_IMPORTER: &str = "/opt/sc/support/bin/php";
pub const ACAS_IMPORTER_SCRIPT: &str = "/opt/sc/src/tools/installCA.php";

pub const OS_ANCHORS_DIR: &str = "/etc/pki/ca-trust/source/anchors";
pub const OS_TRUST_REFRESH: &str = "update-ca-trust";
pub const OS_RELEASE_FILE: &str = "/etc/os-release";

/// Everything a run needs to know, built once from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Destination directory. Cleared at the start of every run.
    pub dest: PathBuf,
    /// One file per certificate instead of `certs.pem`.
    pub split: bool,
    pub install_acas: bool,
    pub install_os: bool,
    /// Upper bound on every external program invocation.
    pub timeout: Duration,
    /// Explicit toolkit binary; looked up on `PATH` when unset.
    pub openssl: Option<PathBuf>,
    pub acas: AcasConfig,
    pub os_store: OsStoreConfig,
}

#[derive(Debug, Clone)]
pub struct AcasConfig {
    pub importer: PathBuf,
    /// Arguments placed before the certificate path.
    pub importer_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OsStoreConfig {
    pub anchors_dir: PathBuf,
    pub refresh_command: String,
    pub refresh_args: Vec<String>,
    pub release_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dest: PathBuf::from(DEFAULT_DEST),
            split: false,
            install_acas: false,
            install_os: false,
            timeout: DEFAULT_TIMEOUT,
            openssl: None,
            acas: AcasConfig::default(),
            os_store: OsStoreConfig::default(),
        }
    }
}

impl Default for AcasConfig {
    fn default() -> Self {
        AcasConfig {
            importer: PathBuf::from(ACAS_IMPORTER),
            importer_args: vec![ACAS_IMPORTER_SCRIPT.to_string()],
        }
    }
}

impl Default for OsStoreConfig {
    fn default() -> Self {
        OsStoreConfig {
            anchors_dir: PathBuf::from(OS_ANCHORS_DIR),
            refresh_command: OS_TRUST_REFRESH.to_string(),
            refresh_args: vec!["extract".to_string()],
            release_file: PathBuf::from(OS_RELEASE_FILE),
        }
    }
}

impl Config {
    /// The ACAS importer takes one certificate per file, so it forces split
    /// output.
    pub fn split_output(&self) -> bool {
        self.split || self.install_acas
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dest.join(COMBINED_FILE_NAME)
    }
}
