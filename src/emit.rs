//! Binding emission
//!
//! Translates the verified header, audits the result, and replaces the
//! checked-in bindings file in one step: the file on disk is either the
//! previous version or the complete new one.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    audit::{audit, AuditError, Summary, Violation},
    config::GenerationConfig,
    headers::HeaderSource,
    rules::{RuleError, RuleTable},
    translate::{Translate, TranslateError},
};

#[derive(Debug, thiserror::Error)]
pub enum EmissionError {
    #[error("invalid generation config: {0}")]
    Rules(#[from] RuleError),
    #[error("translating {header}: {source}")]
    Translate {
        header: PathBuf,
        source: TranslateError,
    },
    #[error("translation of {header} produced invalid Rust: {source}")]
    Unparseable { header: PathBuf, source: syn::Error },
    #[error("bindings for {header} do not honor the config:{}", list(.violations))]
    Contract {
        header: PathBuf,
        violations: Vec<Violation>,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is out of date; regenerate the bindings")]
    Stale { path: PathBuf },
}

fn list(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("\n  - {v}")).collect()
}

/// Result of a successful emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub path: PathBuf,
    pub bytes: usize,
    pub summary: Summary,
}

pub struct Emitter<'a, T: Translate + ?Sized> {
    translator: &'a T,
    config: &'a GenerationConfig,
}

impl<'a, T: Translate + ?Sized> Emitter<'a, T> {
    pub fn new(translator: &'a T, config: &'a GenerationConfig) -> Self {
        Self { translator, config }
    }

    /// Fixed preamble of the generated file. `label` names the header in a
    /// machine-independent way.
    pub fn banner(&self, label: &str) -> String {
        let mut banner = format!(
            "// Generated by blake2-regen from {label}. Do not edit by hand;\n\
             // rerun `blake2-regen generate` after changing the header or config.\n"
        );
        if let Some(prefix) = &self.config.ctypes_prefix {
            banner.push_str(&format!(
                "// Primitive C types are referenced through `{prefix}`.\n"
            ));
        }
        if self.config.disable_layout_assertions {
            banner.push_str(
                "//\n\
                 // Layout assertions are disabled. The generated size and alignment\n\
                 // of some types disagree with the native ABI on 32-bit and Windows\n\
                 // targets, so nothing in this file checks struct layout at compile\n\
                 // time. Do not rely on these definitions for size or alignment.\n",
            );
        }
        banner.push('\n');
        banner
    }

    /// Translate and audit `header`, returning the full file content.
    pub fn render(
        &self,
        header: &HeaderSource,
        label: &str,
    ) -> Result<(String, Summary), EmissionError> {
        RuleTable::from_config(self.config)?;
        if self.config.disable_layout_assertions {
            log::warn!("layout assertions disabled; generated types are not layout-checked");
        }

        let translated = self
            .translator
            .translate(header, self.config)
            .map_err(|source| EmissionError::Translate {
                header: header.path.clone(),
                source,
            })?;
        log::debug!("translator produced {} bytes", translated.len());

        let summary = audit(&translated, self.config).map_err(|e| match e {
            AuditError::Parse(source) => EmissionError::Unparseable {
                header: header.path.clone(),
                source,
            },
            AuditError::Violations(violations) => EmissionError::Contract {
                header: header.path.clone(),
                violations,
            },
        })?;
        log::info!(
            "{} functions, {} structs, {} enums, {} constant groups",
            summary.functions.len(),
            summary.structs.len(),
            summary.enums.len(),
            summary.constant_groups.len()
        );

        let mut content = self.banner(label);
        content.push_str(&translated);
        if !content.ends_with('\n') {
            content.push('\n');
        }
        Ok((content, summary))
    }

    /// Render and atomically replace `output`.
    pub fn emit(
        &self,
        header: &HeaderSource,
        label: &str,
        output: &Path,
    ) -> Result<Emitted, EmissionError> {
        let (content, summary) = self.render(header, label)?;
        write_atomically(output, content.as_bytes()).map_err(|source| EmissionError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        log::info!("wrote {} bytes to {}", content.len(), output.display());
        Ok(Emitted {
            path: output.to_path_buf(),
            bytes: content.len(),
            summary,
        })
    }

    /// Render and compare with the committed `output` without touching it.
    pub fn check(
        &self,
        header: &HeaderSource,
        label: &str,
        output: &Path,
    ) -> Result<Summary, EmissionError> {
        let (content, summary) = self.render(header, label)?;
        let existing = match fs::read(output) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EmissionError::Stale {
                    path: output.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(EmissionError::Write {
                    path: output.to_path_buf(),
                    source,
                })
            }
        };
        if existing != content.as_bytes() {
            return Err(EmissionError::Stale {
                path: output.to_path_buf(),
            });
        }
        log::info!("{} is up to date", output.display());
        Ok(summary)
    }
}

/// Write `content` to a temporary file next to `path`, then rename it over
/// `path`. Readers never see a partially written file.
pub fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::translate::MockTranslate;

    const BINDINGS: &str = "extern \"C\" {\n    pub fn hash_init(S: *mut state) -> ::cty::c_int;\n}\n";

    fn config() -> GenerationConfig {
        GenerationConfig {
            ctypes_prefix: Some("::cty".into()),
            disable_layout_assertions: true,
            ..Default::default()
        }
    }

    fn header() -> HeaderSource {
        HeaderSource {
            path: "blake2.h".into(),
            content: b"int hash_init(state *S);\n".to_vec(),
        }
    }

    fn translating_to(output: &'static str) -> MockTranslate {
        let mut translator = MockTranslate::new();
        translator
            .expect_translate()
            .returning(move |_, _| Ok(output.to_string()));
        translator
    }

    #[test]
    fn emits_banner_and_bindings() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("src/sys.rs");
        let config = config();
        let translator = translating_to(BINDINGS);

        let emitted = Emitter::new(&translator, &config)
            .emit(&header(), "BLAKE2/ref/blake2.h", &out)
            .unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(emitted.bytes, written.len());
        assert!(written.starts_with("// Generated by blake2-regen from BLAKE2/ref/blake2.h."));
        assert!(written.contains("through `::cty`"));
        assert!(written.contains("Layout assertions are disabled"));
        assert!(written.ends_with(BINDINGS));
        assert!(emitted.summary.functions.contains("hash_init"));
    }

    #[test]
    fn banner_omits_notes_that_do_not_apply() {
        let config = GenerationConfig::default();
        let translator = MockTranslate::new();
        let banner = Emitter::new(&translator, &config).banner("blake2.h");
        assert!(!banner.contains("Layout assertions"));
        assert!(!banner.contains("Primitive C types"));
    }

    #[test]
    fn repeated_emission_is_byte_identical() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sys.rs");
        let config = config();
        let translator = translating_to(BINDINGS);
        let emitter = Emitter::new(&translator, &config);

        emitter.emit(&header(), "blake2.h", &out).unwrap();
        let first = fs::read(&out).unwrap();
        emitter.emit(&header(), "blake2.h", &out).unwrap();
        assert_eq!(first, fs::read(&out).unwrap());
    }

    #[test]
    fn translation_failure_leaves_output_untouched() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sys.rs");
        fs::write(&out, "previous").unwrap();

        let config = config();
        let mut translator = MockTranslate::new();
        translator.expect_translate().returning(|_, _| {
            Err(TranslateError::Internal("unresolvable include".into()))
        });

        let err = Emitter::new(&translator, &config)
            .emit(&header(), "blake2.h", &out)
            .unwrap_err();
        assert!(matches!(err, EmissionError::Translate { .. }));
        assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn contract_violation_leaves_output_untouched() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sys.rs");
        fs::write(&out, "previous").unwrap();

        let config = GenerationConfig {
            excluded_types: ["max_align_t".to_string()].into(),
            ..config()
        };
        let translator = translating_to("pub type max_align_t = f64;\n");

        let err = Emitter::new(&translator, &config)
            .emit(&header(), "blake2.h", &out)
            .unwrap_err();
        match &err {
            EmissionError::Contract { violations, .. } => assert_eq!(
                violations,
                &[Violation::ExcludedTypePresent {
                    name: "max_align_t".into()
                }]
            ),
            other => panic!("expected contract error, got {other:?}"),
        }
        assert!(err.to_string().contains("excluded type `max_align_t` is declared"));
        assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
    }

    #[test]
    fn unparseable_output_is_rejected() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sys.rs");
        let config = config();
        let translator = translating_to("pub fn (");

        let err = Emitter::new(&translator, &config)
            .emit(&header(), "blake2.h", &out)
            .unwrap_err();
        assert!(matches!(err, EmissionError::Unparseable { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn invalid_rules_fail_before_translation() {
        let config = GenerationConfig {
            excluded_types: ["Mode".to_string()].into(),
            constified_enum_modules: ["Mode".to_string()].into(),
            ..Default::default()
        };
        let mut translator = MockTranslate::new();
        translator.expect_translate().never();

        let err = Emitter::new(&translator, &config)
            .render(&header(), "blake2.h")
            .unwrap_err();
        assert!(matches!(err, EmissionError::Rules(RuleError::Conflict(_))));
    }

    #[test]
    fn check_detects_stale_and_missing_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sys.rs");
        let config = config();
        let translator = translating_to(BINDINGS);
        let emitter = Emitter::new(&translator, &config);

        assert!(matches!(
            emitter.check(&header(), "blake2.h", &out),
            Err(EmissionError::Stale { .. })
        ));

        emitter.emit(&header(), "blake2.h", &out).unwrap();
        emitter.check(&header(), "blake2.h", &out).unwrap();

        fs::write(&out, "stale").unwrap();
        assert!(matches!(
            emitter.check(&header(), "blake2.h", &out),
            Err(EmissionError::Stale { .. })
        ));
        assert_eq!(fs::read_to_string(&out).unwrap(), "stale");
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("a/b/sys.rs");
        write_atomically(&out, b"content").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"content");
    }
}
