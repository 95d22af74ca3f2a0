//! Checks translated bindings against the configuration that produced them.
//!
//! The translator is treated as a black box, so before anything is written
//! the emitted Rust is parsed and every directive is confirmed to have taken
//! effect.

use std::{collections::BTreeSet, fmt};

use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use syn::{visit::Visit, ForeignItem, Item};

use crate::config::GenerationConfig;

/// Name of the integer alias inside a constified enum module.
const CONSTIFIED_REPR: &str = "Type";

/// Prefix of the per-struct layout test functions.
const LAYOUT_TEST_PREFIX: &str = "bindgen_test_layout_";

/// Primitive C type aliases that must go through the configured prefix.
const C_PRIMITIVES: [&str; 14] = [
    "c_char",
    "c_schar",
    "c_uchar",
    "c_short",
    "c_ushort",
    "c_int",
    "c_uint",
    "c_long",
    "c_ulong",
    "c_longlong",
    "c_ulonglong",
    "c_float",
    "c_double",
    "c_void",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Violation {
    ExcludedTypePresent { name: String },
    ConstifiedEnumMissing { name: String },
    ConstifiedEnumAsType { name: String },
    UnlistedEnumConstified { name: String },
    LayoutAssertionPresent { name: String },
    LayoutAssertionMissing { name: String },
    UnprefixedPrimitive { path: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedTypePresent { name } => write!(f, "excluded type `{name}` is declared"),
            Self::ConstifiedEnumMissing { name } => {
                write!(f, "constified enum `{name}` has no constant module")
            }
            Self::ConstifiedEnumAsType { name } => {
                write!(f, "constified enum `{name}` is emitted as a Rust enum")
            }
            Self::UnlistedEnumConstified { name } => {
                write!(f, "enum `{name}` is emitted as constants but not listed for it")
            }
            Self::LayoutAssertionPresent { name } => {
                write!(f, "layout assertion for `{name}` despite assertions being disabled")
            }
            Self::LayoutAssertionMissing { name } => {
                write!(f, "struct `{name}` has no layout assertion")
            }
            Self::UnprefixedPrimitive { path } => {
                write!(f, "primitive type `{path}` is not under the ctypes prefix")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("bindings are not valid Rust: {0}")]
    Parse(#[from] syn::Error),
    #[error("{} contract violation(s)", .0.len())]
    Violations(Vec<Violation>),
}

/// What the translated bindings declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub functions: BTreeSet<String>,
    pub structs: BTreeSet<String>,
    pub unions: BTreeSet<String>,
    pub enums: BTreeSet<String>,
    pub constant_groups: BTreeSet<String>,
    pub aliases: BTreeSet<String>,
    pub constants: BTreeSet<String>,
    /// Types covered by a size/alignment assertion.
    pub layout_assertions: BTreeSet<String>,
    /// Every other declared name (statics, impl targets, modules).
    other: BTreeSet<String>,
    /// Structs whose layout is known (not forward declarations or generics).
    sized_structs: BTreeSet<String>,
    /// Multi-segment paths ending in a primitive C type.
    primitive_paths: BTreeSet<String>,
}

impl Summary {
    pub fn declares(&self, name: &str) -> bool {
        [
            &self.functions,
            &self.structs,
            &self.unions,
            &self.enums,
            &self.constant_groups,
            &self.aliases,
            &self.constants,
            &self.other,
        ]
        .iter()
        .any(|set| set.contains(name))
    }

    fn collect(file: &syn::File) -> Self {
        let mut summary = Self::default();
        for item in &file.items {
            summary.item(item);
        }
        let mut paths = PrimitivePaths::default();
        paths.visit_file(file);
        summary.primitive_paths = paths.0;
        summary
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Struct(s) => {
                let name = s.ident.to_string();
                let forward_declared = s
                    .fields
                    .iter()
                    .all(|f| f.ident.as_ref().is_some_and(|i| i == "_unused"));
                if s.generics.params.is_empty() && !forward_declared {
                    self.sized_structs.insert(name.clone());
                }
                self.structs.insert(name);
            }
            Item::Union(u) => {
                self.unions.insert(u.ident.to_string());
            }
            Item::Enum(e) => {
                self.enums.insert(e.ident.to_string());
            }
            Item::Type(t) => {
                self.aliases.insert(t.ident.to_string());
            }
            Item::Const(c) if c.ident == "_" => {
                layout_assertion_targets(&c.expr.to_token_stream(), &mut self.layout_assertions);
            }
            Item::Const(c) => {
                self.constants.insert(c.ident.to_string());
            }
            Item::Static(s) => {
                self.other.insert(s.ident.to_string());
            }
            Item::Mod(m) => {
                let name = m.ident.to_string();
                let is_constant_group = m.content.as_ref().is_some_and(|(_, items)| {
                    items
                        .iter()
                        .any(|i| matches!(i, Item::Type(t) if t.ident == CONSTIFIED_REPR))
                });
                if is_constant_group {
                    self.constant_groups.insert(name);
                } else {
                    self.other.insert(name);
                }
            }
            Item::Fn(f) => {
                let name = f.sig.ident.to_string();
                match name.strip_prefix(LAYOUT_TEST_PREFIX) {
                    Some(target) => {
                        self.layout_assertions.insert(target.to_string());
                    }
                    None => {
                        self.functions.insert(name);
                    }
                }
            }
            Item::ForeignMod(m) => {
                for foreign in &m.items {
                    match foreign {
                        ForeignItem::Fn(f) => {
                            self.functions.insert(f.sig.ident.to_string());
                        }
                        ForeignItem::Static(s) => {
                            self.other.insert(s.ident.to_string());
                        }
                        ForeignItem::Type(t) => {
                            self.aliases.insert(t.ident.to_string());
                        }
                        _ => {}
                    }
                }
            }
            Item::Impl(i) => {
                if let syn::Type::Path(p) = i.self_ty.as_ref() {
                    if let Some(last) = p.path.segments.last() {
                        self.other.insert(last.ident.to_string());
                    }
                }
            }
            _ => {}
        }
    }
}

/// Finds `T` in `size_of::<T>` / `align_of::<T>` inside an assertion block.
fn layout_assertion_targets(tokens: &TokenStream, out: &mut BTreeSet<String>) {
    let trees: Vec<TokenTree> = tokens.clone().into_iter().collect();
    for (i, tree) in trees.iter().enumerate() {
        match tree {
            TokenTree::Group(g) => layout_assertion_targets(&g.stream(), out),
            TokenTree::Ident(ident) if ident == "size_of" || ident == "align_of" => {
                let rest = &trees[i + 1..];
                if let [TokenTree::Punct(a), TokenTree::Punct(b), TokenTree::Punct(lt), TokenTree::Ident(target), ..] =
                    rest
                {
                    if a.as_char() == ':' && b.as_char() == ':' && lt.as_char() == '<' {
                        out.insert(target.to_string());
                    }
                }
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct PrimitivePaths(BTreeSet<String>);

impl<'ast> Visit<'ast> for PrimitivePaths {
    fn visit_path(&mut self, path: &'ast syn::Path) {
        let is_primitive = path
            .segments
            .last()
            .is_some_and(|s| C_PRIMITIVES.iter().any(|p| s.ident == p));
        if is_primitive && (path.segments.len() > 1 || path.leading_colon.is_some()) {
            self.0.insert(render_path(path));
        }
        syn::visit::visit_path(self, path);
    }
}

fn render_path(path: &syn::Path) -> String {
    let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
    let joined = segments.join("::");
    if path.leading_colon.is_some() {
        format!("::{joined}")
    } else {
        joined
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches("::")
        .to_string()
}

/// Parse `source` and check it honors every directive in `config`.
///
/// All violations are collected rather than stopping at the first, so a
/// single run shows everything that needs fixing.
pub fn audit(source: &str, config: &GenerationConfig) -> Result<Summary, AuditError> {
    let file = syn::parse_file(source)?;
    let summary = Summary::collect(&file);
    let mut violations = BTreeSet::new();

    for name in &config.excluded_types {
        if summary.declares(name) || summary.layout_assertions.contains(name) {
            violations.insert(Violation::ExcludedTypePresent { name: name.clone() });
        }
    }

    for name in &config.constified_enum_modules {
        if summary.enums.contains(name) {
            violations.insert(Violation::ConstifiedEnumAsType { name: name.clone() });
        }
        if !summary.constant_groups.contains(name) {
            violations.insert(Violation::ConstifiedEnumMissing { name: name.clone() });
        }
    }
    for name in &summary.constant_groups {
        if !config.constified_enum_modules.contains(name) {
            violations.insert(Violation::UnlistedEnumConstified { name: name.clone() });
        }
    }

    if config.disable_layout_assertions {
        for name in &summary.layout_assertions {
            violations.insert(Violation::LayoutAssertionPresent { name: name.clone() });
        }
    } else {
        for name in &summary.sized_structs {
            if !summary.layout_assertions.contains(name) {
                violations.insert(Violation::LayoutAssertionMissing { name: name.clone() });
            }
        }
    }

    if let Some(prefix) = &config.ctypes_prefix {
        let prefix = normalize_prefix(prefix);
        for path in &summary.primitive_paths {
            let under_prefix = path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with("::"));
            if !under_prefix {
                violations.insert(Violation::UnprefixedPrimitive { path: path.clone() });
            }
        }
    }

    if violations.is_empty() {
        Ok(summary)
    } else {
        Err(AuditError::Violations(violations.into_iter().collect()))
    }
}
