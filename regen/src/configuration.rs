use std::path::{Path, PathBuf};

use sysgen::config::{GenerationConfig, GenerationOverrides, Variant};

pub const DEFAULT_CONFIG_FILE: &str = "regen.toml";

/// Generation settings that hold a list of names or arguments. In the
/// environment they are written comma-separated.
const LIST_KEYS: [&str; 3] = [
    "generation.constified_enum_modules",
    "generation.excluded_types",
    "generation.clang_args",
];

/// Driver settings. Every field is optional; unset paths fall back to the
/// BLAKE2 layout.
#[derive(serde::Deserialize, Debug, Default, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root, used when `--root` is not given. A relative root is
    /// taken relative to the working directory, like `--root`.
    pub root: Option<PathBuf>,
    /// Header of the reference implementation.
    pub reference: Option<PathBuf>,
    /// Header of the SIMD implementation; must match `reference` byte for byte.
    pub accelerated: Option<PathBuf>,
    /// Checked-in bindings file.
    pub output: Option<PathBuf>,
    pub variant: Option<Variant>,
    /// Overrides on top of the variant's generation config.
    pub generation: GenerationOverrides,
}

impl Config {
    pub fn generation_config(&self, variant: Option<Variant>) -> GenerationConfig {
        let variant = variant.or(self.variant).unwrap_or_default();
        self.generation
            .clone()
            .apply(GenerationConfig::for_variant(variant))
    }
}

/// `REGEN_*` variables, e.g. `REGEN_ROOT` or
/// `REGEN_GENERATION__EXCLUDED_TYPES=max_align_t,blake2xs_state`.
pub fn environment() -> config::Environment {
    LIST_KEYS.iter().fold(
        config::Environment::with_prefix("REGEN")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .try_parsing(true),
        |env, key| env.with_list_parse_key(key),
    )
}

/// Load `config_path` (required if given) or `regen.toml` under `dir` (if
/// present), layered with `REGEN_*` environment variables.
pub fn get_configuration(dir: &Path, config_path: Option<&Path>) -> Result<Config, config::ConfigError> {
    get_configuration_from(dir, config_path, environment())
}

pub fn get_configuration_from(
    dir: &Path,
    config_path: Option<&Path>,
    env: config::Environment,
) -> Result<Config, config::ConfigError> {
    let file = match config_path {
        Some(path) => {
            log::info!("loading configuration from {path:?}");
            config::File::from(path).required(true)
        }
        None => config::File::from(dir.join(DEFAULT_CONFIG_FILE)).required(false),
    };

    let config = config::Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?;

    config.try_deserialize()
}
