//! Splits PEM text into individual certificates.

use std::fmt;

use crate::error::ParseError;

pub const BEGIN_MARKER: &str = "-----BEGIN CERTIFICATE-----";
pub const END_MARKER: &str = "-----END CERTIFICATE-----";

/// One certificate: its BEGIN line through its END line, line endings intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBlock(String);

impl CertificateBlock {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CertificateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collect every `BEGIN CERTIFICATE` .. `END CERTIFICATE` span in `text`, in
/// order. Text between spans is skipped. A block that never ends, or a BEGIN
/// inside an open block, rejects the whole input.
pub fn split(text: &str) -> Result<Vec<CertificateBlock>, ParseError> {
    let mut blocks = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;

        if line.starts_with(BEGIN_MARKER) {
            if current.is_some() {
                return Err(ParseError::NestedBegin { line: line_no });
            }
            current = Some((line_no, line.to_string()));
        } else if let Some((_, cert)) = current.as_mut() {
            cert.push_str(line);
            if line.starts_with(END_MARKER) {
                if let Some((_, cert)) = current.take() {
                    blocks.push(CertificateBlock(cert));
                }
            }
        }
    }

    if let Some((line, _)) = current {
        return Err(ParseError::UnterminatedBlock { line });
    }

    log::debug!("Found {} certificate block(s)", blocks.len());

    Ok(blocks)
}
