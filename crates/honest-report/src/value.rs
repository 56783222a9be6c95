use serde::{Deserialize, Serialize};

pub const UNKNOWN_VALUE: &str = "Unknown Type Value";
pub const UNKNOWN_TYPE: &str = "unknown";
pub const FUNC_POINTER: &str = "func_pointer";
pub const STRUCT_VALUE: &str = "a struct";
pub const VOID: &str = "void";

pub const PTR_NULL: &str = "ptr[]";
pub const PTR_VOID: &str = "ptr[]: void";
pub const PTR_UNSUPPORTED: &str = "ptr[]: base type not supported";
pub const PTR_FREED: &str = "ptr[]: pointer already freed";

/// One decoded value plus the type token it was decoded with.
///
/// Ordering and equality are structural over `(value, type)`, which is what
/// the report table keys on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaggedValue {
    pub value: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TaggedValue {
    pub fn new(value: impl Into<String>, ty: impl Into<String>) -> Self {
        TaggedValue {
            value: value.into(),
            ty: ty.into(),
        }
    }

    /// Output placeholder for functions that return nothing.
    pub fn void() -> Self {
        TaggedValue::new(VOID, VOID)
    }

    pub fn unknown(ty: impl Into<String>) -> Self {
        TaggedValue::new(UNKNOWN_VALUE, ty)
    }
}

/// Inputs or outputs of one observed call, in argument order.
pub type TaggedSequence = Vec<TaggedValue>;
