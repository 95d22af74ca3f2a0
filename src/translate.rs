//! C header translation
//!
//! The translation itself is delegated to `bindgen`; this module only turns a
//! [`GenerationConfig`] into the builder calls that implement it.

use std::path::PathBuf;

use mockall::*;
use thiserror::Error;

use crate::{
    config::GenerationConfig,
    headers::HeaderSource,
    rules::{Action, RuleError, RuleTable},
};

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("header path {0:?} is not valid UTF-8")]
    NonUtf8Path(PathBuf),
    #[error("header {0:?} is not valid UTF-8")]
    NonUtf8Content(PathBuf),
    #[error("bindgen: {0}")]
    Bindgen(#[from] bindgen::BindgenError),
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

/// Turns a C header into Rust declarations.
///
/// The header is translated from `header.content`, not re-read from
/// `header.path`; the path only locates relative includes. Implementations
/// must not write anything; the emitter owns the output.
#[automock]
pub trait Translate {
    fn translate(
        &self,
        header: &HeaderSource,
        config: &GenerationConfig,
    ) -> Result<String, TranslateError>;
}

/// Translation through the `bindgen` library (needs libclang at runtime).
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindgen;

impl Bindgen {
    /// Builder with every directive of `config` applied.
    pub fn builder(
        header: &HeaderSource,
        config: &GenerationConfig,
    ) -> Result<bindgen::Builder, TranslateError> {
        let rules = RuleTable::from_config(config)?;
        let name = header
            .path
            .to_str()
            .ok_or_else(|| TranslateError::NonUtf8Path(header.path.clone()))?;
        let contents = std::str::from_utf8(&header.content)
            .map_err(|_| TranslateError::NonUtf8Content(header.path.clone()))?;

        let mut builder = bindgen::Builder::default()
            .header_contents(name, contents)
            .default_enum_style(bindgen::EnumVariation::Rust {
                non_exhaustive: false,
            })
            .layout_tests(!config.disable_layout_assertions)
            .sort_semantically(true)
            .formatter(bindgen::Formatter::Prettyplease)
            .clang_args(&config.clang_args);

        if let Some(prefix) = &config.ctypes_prefix {
            builder = builder.ctypes_prefix(prefix);
        }
        for name in rules.names(Action::ConstifyModule) {
            log::debug!("constifying enum {name}");
            builder = builder.constified_enum_module(RuleTable::exact_pattern(name));
        }
        for name in rules.names(Action::Exclude) {
            log::debug!("excluding type {name}");
            builder = builder.blocklist_type(RuleTable::exact_pattern(name));
        }
        Ok(builder)
    }
}

impl Translate for Bindgen {
    fn translate(
        &self,
        header: &HeaderSource,
        config: &GenerationConfig,
    ) -> Result<String, TranslateError> {
        log::info!(
            "translating {} ({} bytes) with bindgen",
            header.path.display(),
            header.content.len()
        );
        let bindings = Self::builder(header, config)?.generate()?;
        Ok(bindings.to_string())
    }
}
