//! Import certificates into ACAS (Tenable.sc) with its CA importer.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::command;
use crate::config::AcasConfig;
use crate::error::{CommandError, InstallError};
use crate::InstallOutcome;

const PROGRAM: &str = "ACAS";

/// Run the importer once per certificate file. A failing file does not stop
/// the rest; an importer that cannot be started at all does.
///
/// Only a spawn that fails with "not found" counts as ACAS not being
/// installed. Permission and other I/O failures are reported as such.
pub fn install_ca(paths: &[PathBuf], config: &AcasConfig, timeout: Duration) -> InstallOutcome {
    let mut outcome = InstallOutcome::default();

    for path in paths {
        log::debug!(
            "Running {} against {} to install the cert",
            config.importer.display(),
            path.display()
        );

        let mut cmd = Command::new(&config.importer);
        cmd.args(&config.importer_args).arg(path);

        match command::run(cmd, None, timeout) {
            Ok(out) if out.success() => outcome.installed.push(path.clone()),
            Ok(out) => outcome.errors.push(InstallError::Failed {
                program: format!("{} importer for {}", PROGRAM, path.display()),
                status: out.status.to_string(),
                stderr: out.stderr_text(),
            }),
            Err(CommandError::NotFound { .. }) => {
                outcome.errors.push(InstallError::NotFound {
                    program: PROGRAM.to_string(),
                    path: config.importer.clone(),
                });
                break;
            }
            Err(err @ CommandError::Timeout { .. }) => outcome
                .errors
                .push(InstallError::from_command(err, config.importer.clone())),
            Err(err) => {
                outcome
                    .errors
                    .push(InstallError::from_command(err, config.importer.clone()));
                break;
            }
        }
    }

    outcome
}
