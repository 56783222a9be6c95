//! Typed value buffer passed across the C ABI.
//!
//! Each reported value travels as a `ReportSlot`: a kind tag plus a payload
//! union. The kind says how the payload is stored, the metadata token says
//! what the value means.

use std::ffi::c_void;

pub const SLOT_INT: u32 = 1;
pub const SLOT_DOUBLE: u32 = 2;
pub const SLOT_EXTENDED: u32 = 3;
pub const SLOT_POINTER: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone)]
pub union ReportSlotPayload {
    pub int: i64,
    pub float: f64,
    /// Raw little-endian bytes of an `x86_fp80`, `fp128` or `ppc_fp128`.
    pub ext: [u8; 16],
    pub ptr: *const c_void,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct ReportSlot {
    pub kind: u32,
    pub payload: ReportSlotPayload,
}

/// Safe view of one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    Int(i64),
    Double(f64),
    Extended([u8; 16]),
    Pointer(usize),
    Invalid(u32),
}

impl ReportSlot {
    pub fn int(v: i64) -> Self {
        ReportSlot {
            kind: SLOT_INT,
            payload: ReportSlotPayload { int: v },
        }
    }

    pub fn double(v: f64) -> Self {
        ReportSlot {
            kind: SLOT_DOUBLE,
            payload: ReportSlotPayload { float: v },
        }
    }

    pub fn extended(bytes: [u8; 16]) -> Self {
        ReportSlot {
            kind: SLOT_EXTENDED,
            payload: ReportSlotPayload { ext: bytes },
        }
    }

    pub fn pointer<T>(p: *const T) -> Self {
        ReportSlot {
            kind: SLOT_POINTER,
            payload: ReportSlotPayload {
                ptr: p as *const c_void,
            },
        }
    }

    pub fn value(&self) -> SlotValue {
        // SAFETY: every arm reads the field its kind tag was built with; all
        // payload fields are plain data, so any bit pattern is valid.
        unsafe {
            match self.kind {
                SLOT_INT => SlotValue::Int(self.payload.int),
                SLOT_DOUBLE => SlotValue::Double(self.payload.float),
                SLOT_EXTENDED => SlotValue::Extended(self.payload.ext),
                SLOT_POINTER => SlotValue::Pointer(self.payload.ptr as usize),
                other => SlotValue::Invalid(other),
            }
        }
    }
}

impl std::fmt::Debug for ReportSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSlot")
            .field("kind", &self.kind)
            .field("value", &self.value())
            .finish()
    }
}

/// Borrow `len` slots from a raw buffer handed over by instrumented code.
///
/// # Safety
/// `slots` must be null or point to `len` initialized `ReportSlot`s that
/// stay alive for `'a`.
pub unsafe fn slots_from_raw<'a>(slots: *const ReportSlot, len: i32) -> &'a [ReportSlot] {
    if slots.is_null() || len <= 0 {
        return &[];
    }
    std::slice::from_raw_parts(slots, len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_views_match_constructors() {
        assert_eq!(ReportSlot::int(-3).value(), SlotValue::Int(-3));
        assert_eq!(ReportSlot::double(1.5).value(), SlotValue::Double(1.5));
        assert_eq!(
            ReportSlot::extended([7; 16]).value(),
            SlotValue::Extended([7; 16])
        );
        let x = 5i32;
        assert_eq!(
            ReportSlot::pointer(&x as *const i32).value(),
            SlotValue::Pointer(&x as *const i32 as usize)
        );
    }

    #[test]
    fn unknown_kind_is_invalid() {
        let slot = ReportSlot {
            kind: 42,
            payload: ReportSlotPayload { int: 0 },
        };
        assert_eq!(slot.value(), SlotValue::Invalid(42));
    }

    #[test]
    fn raw_null_or_empty_is_empty() {
        let empty = unsafe { slots_from_raw(std::ptr::null(), 3) };
        assert!(empty.is_empty());
        let one = [ReportSlot::int(1)];
        let view = unsafe { slots_from_raw(one.as_ptr(), 0) };
        assert!(view.is_empty());
        let view = unsafe { slots_from_raw(one.as_ptr(), 1) };
        assert_eq!(view.len(), 1);
    }
}
