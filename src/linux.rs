use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use which::which;

use crate::command;
use crate::config::OsStoreConfig;
use crate::error::InstallError;
use crate::InstallOutcome;

struct TrustStoreMetadata<'a> {
    dir: &'a Path,
    bin: &'a str,
    args: &'a [String],
}

fn get_trust_store_command(config: &OsStoreConfig) -> Result<TrustStoreMetadata<'_>, InstallError> {
    if let Ok(md) = std::fs::metadata(&config.anchors_dir) {
        if md.is_dir() {
            return Ok(TrustStoreMetadata {
                dir: &config.anchors_dir,
                bin: &config.refresh_command,
                args: &config.refresh_args,
            });
        }
    }

    Err(InstallError::UnsupportedPlatform {
        anchors: config.anchors_dir.clone(),
        pretty_name: os_pretty_name(&config.release_file),
    })
}

/// `PRETTY_NAME` from an os-release file, falling back to `NAME`.
fn os_pretty_name(release_file: &Path) -> String {
    let contents = match std::fs::read_to_string(release_file) {
        Ok(contents) => contents,
        Err(e) => {
            log::debug!("Unable to read {}: {}", release_file.display(), e);
            return "unknown".to_string();
        }
    };

    let field = |key: &str| {
        contents.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        })
    };

    field("PRETTY_NAME")
        .or_else(|| field("NAME"))
        .unwrap_or_else(|| "unknown".to_string())
}

fn template_filename(filename: &Path, tsc: &TrustStoreMetadata) -> Result<PathBuf, InstallError> {
    let name = filename.file_name().ok_or_else(|| InstallError::Io {
        path: filename.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file name"),
    })?;

    Ok(tsc.dir.join(name.to_string_lossy().replace(' ', "_")))
}

fn update_ca(tsc: &TrustStoreMetadata, timeout: Duration) -> Result<(), InstallError> {
    let bin = which(tsc.bin).map_err(|_| InstallError::NotFound {
        program: tsc.bin.to_string(),
        path: PathBuf::from(tsc.bin),
    })?;

    log::debug!("Executing {} {:?}", bin.display(), tsc.args);

    let mut cmd = Command::new(&bin);
    cmd.args(tsc.args);

    let out = command::run(cmd, None, timeout).map_err(|e| InstallError::from_command(e, bin))?;

    if !out.success() {
        return Err(InstallError::Failed {
            program: tsc.bin.to_string(),
            status: out.status.to_string(),
            stderr: out.stderr_text(),
        });
    }

    Ok(())
}

/// Copy every file into the anchors directory, then refresh the store once.
pub fn install_ca(paths: &[PathBuf], config: &OsStoreConfig, timeout: Duration) -> InstallOutcome {
    let mut outcome = InstallOutcome::default();

    let tsc = match get_trust_store_command(config) {
        Ok(tsc) => tsc,
        Err(e) => {
            outcome.errors.push(e);
            return outcome;
        }
    };

    for filename in paths {
        let new_filename = match template_filename(filename, &tsc) {
            Ok(path) => path,
            Err(e) => {
                outcome.errors.push(e);
                continue;
            }
        };

        log::debug!(
            "copying cert from {} to {}",
            filename.display(),
            new_filename.display()
        );

        match std::fs::copy(filename, &new_filename) {
            Ok(_) => outcome.installed.push(new_filename),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                outcome.errors.push(InstallError::NotRoot {
                    path: tsc.dir.to_path_buf(),
                });
                break;
            }
            Err(source) => outcome.errors.push(InstallError::Io {
                path: new_filename,
                source,
            }),
        }
    }

    if !outcome.installed.is_empty() {
        if let Err(e) = update_ca(&tsc, timeout) {
            outcome.errors.push(e);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn store(dir: &Path, refresh: &str) -> OsStoreConfig {
        let anchors_dir = dir.join("anchors");
        std::fs::create_dir_all(&anchors_dir).unwrap();
        OsStoreConfig {
            anchors_dir,
            refresh_command: refresh.to_string(),
            refresh_args: vec![],
            release_file: dir.join("os-release"),
        }
    }

    fn cert(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "cert").unwrap();
        path
    }

    #[test]
    fn test_install() {
        let dir = TempDir::new("os_store").unwrap();
        let config = store(dir.path(), "true");

        for filename in ["Root_CA.pem", "file with spaces.pem"] {
            let test_pem = cert(dir.path(), filename);
            let outcome = install_ca(&[test_pem], &config, TIMEOUT);

            assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
            let expected = config.anchors_dir.join(filename.replace(' ', "_"));
            assert_eq!(outcome.installed, vec![expected.clone()]);
            assert_eq!(std::fs::read_to_string(expected).unwrap(), "cert");
        }
    }

    #[test]
    fn test_unsupported_platform_reports_distro() {
        let dir = TempDir::new("os_store").unwrap();
        let config = OsStoreConfig {
            anchors_dir: dir.path().join("missing/anchors"),
            release_file: dir.path().join("os-release"),
            ..OsStoreConfig::default()
        };
        std::fs::write(
            &config.release_file,
            "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nPRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\n",
        )
        .unwrap();

        let outcome = install_ca(&[cert(dir.path(), "Leaf.pem")], &config, TIMEOUT);

        assert!(outcome.installed.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        match &outcome.errors[0] {
            InstallError::UnsupportedPlatform { pretty_name, .. } => {
                assert_eq!(pretty_name, "Ubuntu 22.04.3 LTS")
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(outcome.errors[0].to_string().contains("Ubuntu 22.04.3 LTS"));
    }

    #[test]
    fn test_os_pretty_name_fallbacks() {
        let dir = TempDir::new("os_store").unwrap();
        let release = dir.path().join("os-release");

        assert_eq!(os_pretty_name(&release), "unknown");

        std::fs::write(&release, "ID=alpine\nNAME='Alpine Linux'\n").unwrap();
        assert_eq!(os_pretty_name(&release), "Alpine Linux");

        std::fs::write(&release, "ID=debian\n").unwrap();
        assert_eq!(os_pretty_name(&release), "unknown");
    }

    #[test]
    fn test_missing_refresh_command() {
        let dir = TempDir::new("os_store").unwrap();
        let config = store(dir.path(), "cert-extractor-no-such-update-ca-trust");

        let outcome = install_ca(&[cert(dir.path(), "Leaf.pem")], &config, TIMEOUT);

        assert_eq!(outcome.installed.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], InstallError::NotFound { .. }));
    }

    #[test]
    fn test_failed_refresh() {
        let dir = TempDir::new("os_store").unwrap();
        let config = store(dir.path(), "false");

        let outcome = install_ca(&[cert(dir.path(), "Leaf.pem")], &config, TIMEOUT);

        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], InstallError::Failed { .. }));
    }

    #[test]
    fn test_nothing_copied_skips_refresh() {
        let dir = TempDir::new("os_store").unwrap();
        let config = store(dir.path(), "cert-extractor-no-such-update-ca-trust");

        let outcome = install_ca(&[], &config, TIMEOUT);

        assert!(outcome.installed.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
