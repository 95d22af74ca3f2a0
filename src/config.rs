use std::collections::BTreeSet;

use serde::Deserialize;

/// Enums that carry overlapping sizes (`OUTBYTES == KEYBYTES`) and are used
/// as plain integers by callers.
pub const BLAKE2_CONSTANT_ENUMS: [&str; 2] = ["blake2s_constant", "blake2b_constant"];

/// Alignment probe pulled in through `<stddef.h>`; its generated layout is
/// wrong on several targets.
pub const ALIGNMENT_PROBE: &str = "max_align_t";

/// Namespace the `cty` variant routes primitive C types through.
pub const CTY_PREFIX: &str = "::cty";

/// Directives handed to the translation step.
///
/// Sets are ordered so the directives, and anything derived from them, come
/// out the same way on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Path prefix for primitive C types, e.g. `::cty` gives `::cty::c_int`.
    pub ctypes_prefix: Option<String>,
    /// Skip size/alignment assertions for translated types.
    ///
    /// The state structs have a different size on 32-bit targets and Windows
    /// aligns them differently, so the assertions fail on correct builds.
    pub disable_layout_assertions: bool,
    /// Enums emitted as a module of integer constants instead of a Rust enum.
    pub constified_enum_modules: BTreeSet<String>,
    /// Types left out of the output entirely.
    pub excluded_types: BTreeSet<String>,
    /// Extra arguments for the C front end (include paths, defines).
    pub clang_args: Vec<String>,
}

/// Version-controlled configurations for the BLAKE2 bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Primitive types through `::cty`, usable without `std`.
    #[default]
    Cty,
    /// Primitive types from `std::os::raw`.
    Std,
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cty" => Ok(Self::Cty),
            "std" => Ok(Self::Std),
            other => Err(format!("unknown variant {other:?} (expected `cty` or `std`)")),
        }
    }
}

impl GenerationConfig {
    pub fn for_variant(variant: Variant) -> Self {
        let ctypes_prefix = match variant {
            Variant::Cty => Some(CTY_PREFIX.to_string()),
            Variant::Std => None,
        };
        Self {
            ctypes_prefix,
            disable_layout_assertions: true,
            constified_enum_modules: BLAKE2_CONSTANT_ENUMS.iter().map(|s| s.to_string()).collect(),
            excluded_types: BTreeSet::from([ALIGNMENT_PROBE.to_string()]),
            clang_args: Vec::new(),
        }
    }
}

/// Field-by-field overrides applied on top of a variant.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationOverrides {
    pub ctypes_prefix: Option<String>,
    pub no_ctypes_prefix: bool,
    pub disable_layout_assertions: Option<bool>,
    pub constified_enum_modules: Option<BTreeSet<String>>,
    pub excluded_types: Option<BTreeSet<String>>,
    pub clang_args: Option<Vec<String>>,
}

impl GenerationOverrides {
    pub fn apply(self, mut config: GenerationConfig) -> GenerationConfig {
        if self.no_ctypes_prefix {
            config.ctypes_prefix = None;
        } else if let Some(prefix) = self.ctypes_prefix {
            config.ctypes_prefix = Some(prefix);
        }
        if let Some(disable) = self.disable_layout_assertions {
            config.disable_layout_assertions = disable;
        }
        if let Some(enums) = self.constified_enum_modules {
            config.constified_enum_modules = enums;
        }
        if let Some(types) = self.excluded_types {
            config.excluded_types = types;
        }
        if let Some(args) = self.clang_args {
            config.clang_args = args;
        }
        config
    }
}
