//! Call-site metadata protocol.
//!
//! The instrumentation encodes a call site as
//! `name>>=type_1>>=...>>=type_n>>=[ret>>=]`, where every `type_k` is the
//! textual LLVM type of the k-th value. `>>=` cannot appear inside an LLVM
//! type token or a symbol name, so splitting on it is unambiguous.

use std::fmt;
use std::str::FromStr;

pub const DELIM: &str = ">>=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    Half,
    BFloat,
    Float,
    Double,
    Fp128,
    X86Fp80,
    PpcFp128,
}

impl FloatKind {
    /// Known kinds in promotion order. Everything up to and including
    /// `Fp128` travels in the double slot, the rest in the extended slot.
    pub const ALL: [FloatKind; 7] = [
        FloatKind::Half,
        FloatKind::BFloat,
        FloatKind::Float,
        FloatKind::Double,
        FloatKind::Fp128,
        FloatKind::X86Fp80,
        FloatKind::PpcFp128,
    ];

    const DOUBLE_SLOT_MAX_INDEX: usize = 4;

    pub fn as_str(self) -> &'static str {
        match self {
            FloatKind::Half => "half",
            FloatKind::BFloat => "bfloat",
            FloatKind::Float => "float",
            FloatKind::Double => "double",
            FloatKind::Fp128 => "fp128",
            FloatKind::X86Fp80 => "x86_fp80",
            FloatKind::PpcFp128 => "ppc_fp128",
        }
    }

    pub fn index(self) -> usize {
        FloatKind::ALL
            .iter()
            .position(|k| *k == self)
            .unwrap_or(FloatKind::ALL.len())
    }

    /// Whether a by-value argument of this kind arrives promoted to `double`.
    pub fn promotes_to_double(self) -> bool {
        self.index() <= Self::DOUBLE_SLOT_MAX_INDEX
    }

    /// In-memory size of a value of this kind, as read through a pointer.
    pub fn storage_bytes(self) -> usize {
        match self {
            FloatKind::Half | FloatKind::BFloat => 2,
            FloatKind::Float => 4,
            FloatKind::Double => 8,
            FloatKind::X86Fp80 => 10,
            FloatKind::Fp128 | FloatKind::PpcFp128 => 16,
        }
    }
}

impl fmt::Display for FloatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FloatKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FloatKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// Static type of one reported value, classified from its type token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    SignedInt { width: u32 },
    Float(FloatKind),
    FunctionPointer,
    Pointer { base: Box<TypeTag>, level: u32 },
    Struct,
    Void,
    Unknown,
}

impl TypeTag {
    pub fn parse(token: &str) -> TypeTag {
        let token = token.trim();
        if let Some(width) = parse_int_width(token) {
            return TypeTag::SignedInt { width };
        }
        if let Ok(kind) = FloatKind::from_str(token) {
            return TypeTag::Float(kind);
        }
        if token.contains('(') {
            return TypeTag::FunctionPointer;
        }
        let (base, level) = strip_pointer_markers(token);
        if level > 0 {
            if base.is_empty() {
                return TypeTag::Unknown;
            }
            // `base` has no trailing marker left, so this recurses once.
            return TypeTag::Pointer {
                base: Box::new(TypeTag::parse(base)),
                level,
            };
        }
        if token == "void" {
            return TypeTag::Void;
        }
        if token.starts_with('%') || token.starts_with('{') || token.starts_with("<{") {
            return TypeTag::Struct;
        }
        TypeTag::Unknown
    }

    /// Data pointers, which the callee may write through.
    pub fn is_data_pointer(&self) -> bool {
        matches!(self, TypeTag::Pointer { .. })
    }
}

/// Split `i32 * *` into `("i32", 2)`.
fn strip_pointer_markers(token: &str) -> (&str, u32) {
    let mut base = token;
    let mut level = 0u32;
    while let Some(rest) = base.trim_end().strip_suffix('*') {
        base = rest;
        level = level.saturating_add(1);
    }
    (base.trim_end(), level)
}

fn parse_int_width(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('i')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&w| w != 0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteMetadata {
    pub name: String,
    pub types: Vec<String>,
}

impl CallSiteMetadata {
    /// The trailing token, which a return-site call always carries.
    pub fn return_type(&self) -> Option<&str> {
        self.types.last().map(String::as_str)
    }

    /// Parameter tokens of a return-site call (everything but the return type).
    pub fn return_site_params(&self) -> &[String] {
        match self.types.split_last() {
            Some((_, params)) => params,
            None => &[],
        }
    }
}

pub fn parse_meta(meta: &str) -> CallSiteMetadata {
    let mut parts = meta.split(DELIM);
    let name = parts.next().unwrap_or_default().to_string();
    let mut types: Vec<String> = parts.map(str::to_string).collect();
    // A well-formed string ends with the delimiter, leaving one empty tail.
    if types.last().is_some_and(|t| t.is_empty()) {
        types.pop();
    }
    CallSiteMetadata { name, types }
}

pub fn encode_meta<S: AsRef<str>>(name: &str, types: &[S]) -> String {
    let mut out = String::with_capacity(name.len() + DELIM.len() * (types.len() + 1));
    out.push_str(name);
    out.push_str(DELIM);
    for t in types {
        out.push_str(t.as_ref());
        out.push_str(DELIM);
    }
    out
}
