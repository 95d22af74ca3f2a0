//! Verify-then-emit driver.

use std::path::{Component, Path, PathBuf};

use crate::{
    audit::Summary,
    config::{GenerationConfig, Variant},
    emit::{EmissionError, Emitted, Emitter},
    headers::{verify_identical, ConsistencyError, HeaderSource},
    translate::Translate,
};

pub const REFERENCE_HEADER: &str = "BLAKE2/ref/blake2.h";
pub const ACCELERATED_HEADER: &str = "BLAKE2/sse/blake2.h";
pub const OUTPUT: &str = "bindings/blake2.rs";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Emission(#[from] EmissionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Project root; relative paths below are resolved against it.
    pub root: PathBuf,
    pub reference: PathBuf,
    pub accelerated: PathBuf,
    pub output: PathBuf,
    pub config: GenerationConfig,
}

impl Pipeline {
    /// The BLAKE2 layout under `root` with the given variant's config.
    pub fn blake2(root: impl Into<PathBuf>, variant: Variant) -> Self {
        Self {
            root: root.into(),
            reference: REFERENCE_HEADER.into(),
            accelerated: ACCELERATED_HEADER.into(),
            output: OUTPUT.into(),
            config: GenerationConfig::for_variant(variant),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Header name as written into the output: relative to the root with
    /// `/` separators, so it reads the same on every machine. An absolute
    /// header outside the root is named by its file name alone.
    fn label(&self) -> String {
        let relative = if self.reference.is_absolute() {
            match self.reference.strip_prefix(&self.root) {
                Ok(relative) => relative,
                Err(_) => self.reference.file_name().map_or(Path::new(""), Path::new),
            }
        } else {
            self.reference.as_path()
        };
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn verify(&self) -> Result<HeaderSource, PipelineError> {
        Ok(verify_identical(
            &self.resolve(&self.reference),
            &self.resolve(&self.accelerated),
        )?)
    }

    /// Verify the headers, then translate and replace the output file.
    pub fn generate<T: Translate + ?Sized>(
        &self,
        translator: &T,
    ) -> Result<Emitted, PipelineError> {
        let header = self.verify()?;
        let emitted = Emitter::new(translator, &self.config).emit(
            &header,
            &self.label(),
            &self.resolve(&self.output),
        )?;
        Ok(emitted)
    }

    /// Verify the headers and confirm the committed output is current.
    pub fn check<T: Translate + ?Sized>(&self, translator: &T) -> Result<Summary, PipelineError> {
        let header = self.verify()?;
        let summary = Emitter::new(translator, &self.config).check(
            &header,
            &self.label(),
            &self.resolve(&self.output),
        )?;
        Ok(summary)
    }
}
