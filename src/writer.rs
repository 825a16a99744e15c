//! Writes extracted certificates into the destination directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{ExtractError, Result};
use crate::splitter::CertificateBlock;
use crate::toolkit::{self, Toolkit};

/// Remove `dest` and everything under it, then create it again empty.
///
/// Two runs sharing a destination will clobber each other.
pub fn prepare_destination(dest: &Path) -> Result<()> {
    let wrap = |source| ExtractError::Destination {
        path: dest.to_path_buf(),
        source,
    };

    if dest.exists() {
        log::debug!("Clearing {}", dest.display());
        std::fs::remove_dir_all(dest).map_err(wrap)?;
    }

    log::debug!("Creating {}", dest.display());
    std::fs::create_dir_all(dest).map_err(wrap)?;

    Ok(())
}

/// File name for a certificate with common name `cn`.
pub fn file_name_for(cn: &str) -> String {
    format!("{}.pem", cn.replace([' ', '/', '\\'], "_"))
}

/// Write `blocks` under `config.dest` and return the paths written, each
/// once, in the order they were first written.
pub fn write<T: Toolkit + ?Sized>(
    toolkit: &T,
    blocks: &[CertificateBlock],
    config: &Config,
) -> Result<Vec<PathBuf>> {
    if config.split_output() {
        write_split(toolkit, blocks, &config.dest)
    } else {
        write_combined(blocks, &config.combined_path())
    }
}

fn write_combined(blocks: &[CertificateBlock], path: &Path) -> Result<Vec<PathBuf>> {
    if blocks.is_empty() {
        return Ok(Vec::new());
    }

    log::debug!("Writing {} certificate(s) to {}", blocks.len(), path.display());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for block in blocks {
        file.write_all(block.as_bytes())?;
    }

    Ok(vec![path.to_path_buf()])
}

fn write_split<T: Toolkit + ?Sized>(
    toolkit: &T,
    blocks: &[CertificateBlock],
    dest: &Path,
) -> Result<Vec<PathBuf>> {
    log::debug!("Writing individual certificates to files");

    let mut written: Vec<PathBuf> = Vec::with_capacity(blocks.len());

    for block in blocks {
        let cn = toolkit::common_name(&toolkit.describe(block)?)?;
        let path = dest.join(file_name_for(&cn));

        if written.contains(&path) {
            log::warn!(
                "{} is overwritten by a later certificate with the same common name '{}'",
                path.display(),
                cn
            );
        } else {
            written.push(path.clone());
        }

        log::debug!("{}", path.display());
        std::fs::write(&path, block.as_bytes())?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, ParseError};
    use crate::splitter;
    use crate::toolkit::{CertificateBundle, Encoding};

    /// Describes each block by echoing its first body line as the CN.
    struct BodyAsName;

    impl Toolkit for BodyAsName {
        fn probe(&self, _: &Path, _: Encoding) -> std::result::Result<bool, CommandError> {
            unreachable!()
        }

        fn convert(&self, _: &CertificateBundle) -> Result<String> {
            unreachable!()
        }

        fn describe(&self, block: &CertificateBlock) -> Result<String> {
            let body = block.as_str().lines().nth(1).unwrap_or_default();
            if body == "NOCN" {
                return Ok("        Subject: O = Example\n".to_string());
            }
            Ok(format!("        Subject: O = Example, CN = {}\n", body))
        }
    }

    fn block(body: &str) -> CertificateBlock {
        let text = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            body
        );
        splitter::split(&text).unwrap().remove(0)
    }

    fn config(dir: &Path, split: bool) -> Config {
        Config {
            dest: dir.join("out"),
            split,
            ..Config::default()
        }
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("Root CA"), "Root_CA.pem");
        assert_eq!(file_name_for("Leaf"), "Leaf.pem");
        assert_eq!(file_name_for("a/b\\c d"), "a_b_c_d.pem");
        assert_eq!(file_name_for("Acme, Inc Root"), "Acme,_Inc_Root.pem");
    }

    #[test]
    fn test_prepare_destination_clears_stale_files() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir_all(dest.join("nested")).unwrap();
        std::fs::write(dest.join("stale.pem"), "old").unwrap();

        prepare_destination(&dest).unwrap();

        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_destination_rejects_file() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let dest = dir.path().join("out");
        std::fs::write(&dest, "not a directory").unwrap();

        assert!(matches!(
            prepare_destination(&dest).unwrap_err(),
            ExtractError::Destination { .. }
        ));
    }

    #[test]
    fn test_combined() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = config(dir.path(), false);
        prepare_destination(&config.dest).unwrap();

        let blocks = vec![block("Root CA"), block("Leaf")];
        let paths = write(&BodyAsName, &blocks, &config).unwrap();

        assert_eq!(paths, vec![config.dest.join("certs.pem")]);
        let contents = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(contents, format!("{}{}", blocks[0], blocks[1]));
        assert_eq!(splitter::split(&contents).unwrap(), blocks);
    }

    #[test]
    fn test_combined_without_certificates() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = config(dir.path(), false);
        prepare_destination(&config.dest).unwrap();

        assert!(write(&BodyAsName, &[], &config).unwrap().is_empty());
        assert!(!config.combined_path().exists());
    }

    #[test]
    fn test_split() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = config(dir.path(), true);
        prepare_destination(&config.dest).unwrap();

        let blocks = vec![block("Root CA"), block("Intermediate CA"), block("Leaf")];
        let paths = write(&BodyAsName, &blocks, &config).unwrap();

        assert_eq!(
            paths,
            vec![
                config.dest.join("Root_CA.pem"),
                config.dest.join("Intermediate_CA.pem"),
                config.dest.join("Leaf.pem"),
            ]
        );
        for (path, block) in paths.iter().zip(&blocks) {
            assert_eq!(std::fs::read_to_string(path).unwrap(), block.as_str());
        }
    }

    #[test]
    fn test_split_forced_by_acas() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = Config {
            install_acas: true,
            ..config(dir.path(), false)
        };
        prepare_destination(&config.dest).unwrap();

        let paths = write(&BodyAsName, &[block("Leaf")], &config).unwrap();
        assert_eq!(paths, vec![config.dest.join("Leaf.pem")]);
        assert!(!config.combined_path().exists());
    }

    #[test]
    fn test_split_collision_last_write_wins() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = config(dir.path(), true);
        prepare_destination(&config.dest).unwrap();

        // "Root CA" and "Root_CA" normalise to the same file name.
        let blocks = vec![block("Root CA"), block("Leaf"), block("Root_CA")];
        let paths = write(&BodyAsName, &blocks, &config).unwrap();

        assert_eq!(
            paths,
            vec![config.dest.join("Root_CA.pem"), config.dest.join("Leaf.pem")]
        );
        assert_eq!(
            std::fs::read_to_string(config.dest.join("Root_CA.pem")).unwrap(),
            blocks[2].as_str()
        );
    }

    #[test]
    fn test_split_missing_common_name() {
        let dir = tempdir::TempDir::new("writer").unwrap();
        let config = config(dir.path(), true);
        prepare_destination(&config.dest).unwrap();

        let err = write(&BodyAsName, &[block("NOCN")], &config).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Parse(ParseError::MissingCommonName { .. })
        ));
    }
}
