//! Header consistency verification
//!
//! The reference and SIMD implementations of BLAKE2 ship their own copy of
//! `blake2.h`. Only one of them is ever translated, so the pair must be
//! byte-identical before the translated bindings can stand in for both.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("reading header {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "headers differ: {reference} and {accelerated} first diverge at byte {offset} (line {line}); reconcile them before regenerating"
    )]
    Mismatch {
        reference: PathBuf,
        accelerated: PathBuf,
        offset: usize,
        line: usize,
    },
}

/// A C header on disk together with its full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSource {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

impl HeaderSource {
    pub fn read(path: &Path) -> Result<Self, ConsistencyError> {
        let content = std::fs::read(path).map_err(|source| ConsistencyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read {} bytes from {}", content.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            content,
        })
    }
}

/// Position of the first byte where `a` and `b` differ, if they differ at all.
/// When one is a prefix of the other, that's the length of the shorter one.
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    if a == b {
        return None;
    }
    let common = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    Some(common)
}

/// Read both headers and require their contents to be identical.
///
/// Returns the reference header on success so the caller translates exactly
/// the bytes that were compared.
pub fn verify_identical(
    reference: &Path,
    accelerated: &Path,
) -> Result<HeaderSource, ConsistencyError> {
    log::info!(
        "verifying {} matches {}",
        reference.display(),
        accelerated.display()
    );
    let reference = HeaderSource::read(reference)?;
    let accelerated = HeaderSource::read(accelerated)?;

    match first_difference(&reference.content, &accelerated.content) {
        None => Ok(reference),
        Some(offset) => {
            let line = reference.content[..offset]
                .iter()
                .filter(|&&b| b == b'\n')
                .count()
                + 1;
            Err(ConsistencyError::Mismatch {
                reference: reference.path,
                accelerated: accelerated.path,
                offset,
                line,
            })
        }
    }
}
