use std::{fs, path::Path};

use sysgen::{
    config::{GenerationConfig, Variant},
    headers::ConsistencyError,
    translate::MockTranslate,
    Pipeline, PipelineError,
};

use tempfile::tempdir;

const MODE_HEADER: &str = "\
typedef struct state { unsigned long long h[8]; } state;
enum Mode { MODE_A, MODE_B };
void hash_init(state *S);
";

// What the translator produces for MODE_HEADER with `Mode` constified.
const MODE_BINDINGS: &str = r#"/* automatically generated by rust-bindgen 0.69.4 */

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct state {
    pub h: [::cty::c_ulonglong; 8usize],
}
pub mod Mode {
    pub type Type = ::cty::c_uint;
    pub const MODE_A: Type = 0;
    pub const MODE_B: Type = 1;
}
extern "C" {
    pub fn hash_init(S: *mut state);
}
"#;

fn mode_pipeline(root: &Path) -> Pipeline {
    fs::create_dir_all(root.join("ref")).unwrap();
    fs::create_dir_all(root.join("sse")).unwrap();
    fs::write(root.join("ref/mode.h"), MODE_HEADER).unwrap();
    fs::write(root.join("sse/mode.h"), MODE_HEADER).unwrap();
    Pipeline {
        root: root.to_path_buf(),
        reference: "ref/mode.h".into(),
        accelerated: "sse/mode.h".into(),
        output: "src/sys.rs".into(),
        config: GenerationConfig {
            ctypes_prefix: Some("::cty".into()),
            disable_layout_assertions: true,
            constified_enum_modules: ["Mode".to_string()].into(),
            ..Default::default()
        },
    }
}

#[test]
fn test_identical_headers_generate_constified_bindings() {
    let root = tempdir().unwrap();
    let pipeline = mode_pipeline(root.path());

    let mut translator = MockTranslate::new();
    translator
        .expect_translate()
        .withf(|header, config| {
            header.path.ends_with("ref/mode.h")
                && header.content == MODE_HEADER.as_bytes()
                && config.constified_enum_modules.contains("Mode")
        })
        .times(1)
        .returning(|_, _| Ok(MODE_BINDINGS.to_string()));

    let emitted = pipeline.generate(&translator).unwrap();
    assert!(emitted.summary.functions.contains("hash_init"));
    assert!(emitted.summary.constant_groups.contains("Mode"));
    assert!(!emitted.summary.enums.contains("Mode"));

    let written = fs::read_to_string(root.path().join("src/sys.rs")).unwrap();
    assert!(written.starts_with("// Generated by blake2-regen from ref/mode.h."));
    assert!(written.contains("pub fn hash_init(S: *mut state);"));
    assert!(written.contains("pub mod Mode {"));
    assert!(!written.contains("pub enum Mode"));
}

#[test]
fn test_translator_gets_the_bytes_that_were_verified() {
    let root = tempdir().unwrap();
    let pipeline = mode_pipeline(root.path());
    let reference = root.path().join("ref/mode.h");

    let mut translator = MockTranslate::new();
    translator.expect_translate().times(1).returning(move |header, _| {
        // the header on disk changes after verification
        fs::write(&reference, "int unrelated;\n").unwrap();
        assert_eq!(header.content, MODE_HEADER.as_bytes());
        Ok(MODE_BINDINGS.to_string())
    });

    let emitted = pipeline.generate(&translator).unwrap();
    assert!(emitted.summary.functions.contains("hash_init"));
}

#[test]
fn test_inserted_comment_fails_before_output_is_touched() {
    let root = tempdir().unwrap();
    let pipeline = mode_pipeline(root.path());
    fs::write(
        root.path().join("sse/mode.h"),
        format!("/* sse */\n{MODE_HEADER}"),
    )
    .unwrap();
    fs::create_dir_all(root.path().join("src")).unwrap();
    fs::write(root.path().join("src/sys.rs"), "// previous bindings\n").unwrap();

    let mut translator = MockTranslate::new();
    translator.expect_translate().never();

    let err = pipeline.generate(&translator).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Consistency(ConsistencyError::Mismatch { offset: 0, line: 1, .. })
    ));
    assert!(err.to_string().contains("reconcile"));
    assert_eq!(
        fs::read_to_string(root.path().join("src/sys.rs")).unwrap(),
        "// previous bindings\n"
    );
}

#[test]
fn test_missing_accelerated_header_is_an_io_error() {
    let root = tempdir().unwrap();
    let pipeline = mode_pipeline(root.path());
    fs::remove_file(root.path().join("sse/mode.h")).unwrap();

    let mut translator = MockTranslate::new();
    translator.expect_translate().never();

    match pipeline.generate(&translator) {
        Err(PipelineError::Consistency(ConsistencyError::Read { path, .. })) => {
            assert!(path.ends_with("sse/mode.h"))
        }
        other => panic!("expected read error, got {other:?}"),
    }
    assert!(!root.path().join("src/sys.rs").exists());
}

#[test]
fn test_generate_then_check() {
    let root = tempdir().unwrap();
    let pipeline = mode_pipeline(root.path());

    let mut translator = MockTranslate::new();
    translator
        .expect_translate()
        .times(3)
        .returning(|_, _| Ok(MODE_BINDINGS.to_string()));

    pipeline.generate(&translator).unwrap();
    pipeline.check(&translator).unwrap();

    fs::write(root.path().join("src/sys.rs"), "// hand edited\n").unwrap();
    assert!(matches!(
        pipeline.check(&translator),
        Err(PipelineError::Emission(
            sysgen::emit::EmissionError::Stale { .. }
        ))
    ));
}

#[test]
fn test_checked_in_blake2_headers_are_identical() {
    let pipeline = Pipeline::blake2(env!("CARGO_MANIFEST_DIR"), Variant::Cty);
    let header = pipeline.verify().unwrap();
    assert!(header.path.ends_with("BLAKE2/ref/blake2.h"));
    let content = String::from_utf8(header.content).unwrap();
    assert!(content.contains("enum blake2b_constant"));
    assert!(content.contains("int blake2b_init( blake2b_state *S, size_t outlen );"));
}
