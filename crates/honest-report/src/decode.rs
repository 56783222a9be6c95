//! Slot decoding: one `TaggedValue` per reported slot, never failing.
//!
//! Exactly one slot is consumed per value. A descriptor that cannot be
//! classified, or a slot whose storage kind disagrees with its descriptor,
//! yields the unknown placeholder for that position only.

use crate::float;
use crate::probe;
use crate::slot::{ReportSlot, SlotValue};
use crate::tags::{CallSiteMetadata, TypeTag};
use crate::value::{
    TaggedSequence, TaggedValue, FUNC_POINTER, PTR_FREED, PTR_NULL, PTR_UNSUPPORTED, PTR_VOID,
    STRUCT_VALUE, UNKNOWN_TYPE, UNKNOWN_VALUE,
};

const MAX_POINTEE_INT_WIDTH: u32 = 128;

/// Decode the slots of one entry (`is_return == false`) or return call.
///
/// At a return site the last metadata token is the return type and the
/// slots are `[return value, pointer params...]`; a `void` return takes no
/// slot and is recorded as the `{"void","void"}` placeholder. With
/// `pointer_outputs` off, re-reported pointer params are consumed but not
/// kept.
pub fn decode_call(
    meta: &CallSiteMetadata,
    is_return: bool,
    slots: &[ReportSlot],
    pointer_outputs: bool,
) -> TaggedSequence {
    if !is_return {
        return decode_values(&meta.types, slots);
    }

    let Some(ret) = meta.return_type() else {
        return decode_values::<&str>(&[], slots);
    };
    let pointer_params = meta
        .return_site_params()
        .iter()
        .filter(|t| TypeTag::parse(t).is_data_pointer())
        .map(String::as_str);

    let mut out = TaggedSequence::with_capacity(slots.len() + 1);
    let (ret_slots, descriptors): (usize, Vec<&str>) = if TypeTag::parse(ret) == TypeTag::Void {
        out.push(TaggedValue::void());
        (0, pointer_params.collect())
    } else {
        (1, std::iter::once(ret).chain(pointer_params).collect())
    };
    let decoded = decode_values(&descriptors, slots);
    let keep = if pointer_outputs {
        decoded.len()
    } else {
        ret_slots.min(decoded.len())
    };
    out.extend(decoded.into_iter().take(keep));
    out
}

/// Decode `slots` positionally against `types`; surplus slots are unknown.
pub fn decode_values<S: AsRef<str>>(types: &[S], slots: &[ReportSlot]) -> TaggedSequence {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| match types.get(i) {
            Some(token) => decode_value(token.as_ref(), slot),
            None => TaggedValue::unknown(UNKNOWN_TYPE),
        })
        .collect()
}

pub fn decode_value(token: &str, slot: &ReportSlot) -> TaggedValue {
    let tag = TypeTag::parse(token);
    let value = match (&tag, slot.value()) {
        (TypeTag::SignedInt { width }, SlotValue::Int(v)) => render_int_slot(*width, v),
        (TypeTag::Float(kind), SlotValue::Double(v)) if kind.promotes_to_double() => {
            float::format_f64(v)
        }
        (TypeTag::Float(kind), SlotValue::Extended(bytes)) if !kind.promotes_to_double() => {
            match float::widen(*kind, &bytes) {
                Some(v) => float::format_f64(v),
                None => UNKNOWN_VALUE.to_string(),
            }
        }
        (TypeTag::FunctionPointer, _) => FUNC_POINTER.to_string(),
        (TypeTag::Pointer { base, level }, SlotValue::Pointer(addr)) => {
            render_pointer(base, *level, addr)
        }
        (TypeTag::Struct, _) => STRUCT_VALUE.to_string(),
        (TypeTag::Unknown, _) => UNKNOWN_VALUE.to_string(),
        (_, got) => {
            tracing::warn!(
                target: "honest_report",
                token,
                slot = ?got,
                "slot kind does not match its type token"
            );
            UNKNOWN_VALUE.to_string()
        }
    };
    TaggedValue::new(value, token)
}

fn render_int_slot(width: u32, v: i64) -> String {
    let mut buf = itoa::Buffer::new();
    match width {
        1 => buf.format(v & 1).to_string(),
        // Narrow integers arrive promoted to `int`.
        2..=32 => buf.format(v as i32).to_string(),
        _ => buf.format(v).to_string(),
    }
}

/// `ptr[...]` rendering of a `level`-deep pointer, following intermediate
/// hops through the fault-isolated probe. The wrapper is applied once
/// whatever the level: `i32**` pointing at 5 renders `ptr[5]`.
pub fn render_pointer(base: &TypeTag, level: u32, addr: usize) -> String {
    if addr == 0 {
        return PTR_NULL.to_string();
    }
    let mut addr = addr;
    for _ in 1..level {
        match probe::read_usize(addr) {
            Ok(0) => return PTR_NULL.to_string(),
            Ok(next) => addr = next,
            Err(fault) => {
                tracing::debug!(target: "honest_report", %fault, "intermediate pointer unreadable");
                return PTR_FREED.to_string();
            }
        }
    }
    match render_pointee(base, addr) {
        Ok(text) => format!("ptr[{text}]"),
        Err(diag) => diag.to_string(),
    }
}

fn render_pointee(base: &TypeTag, addr: usize) -> Result<String, &'static str> {
    let mut buf = [0u8; 16];
    match base {
        TypeTag::Void => Err(PTR_VOID),
        TypeTag::SignedInt { width } if *width <= MAX_POINTEE_INT_WIDTH => {
            let n = width.div_ceil(8) as usize;
            read_pointee(addr, &mut buf[..n])?;
            Ok(render_int_bytes(*width, &buf[..n]))
        }
        TypeTag::Float(kind) => {
            let n = kind.storage_bytes();
            read_pointee(addr, &mut buf[..n])?;
            float::widen(*kind, &buf[..n])
                .map(float::format_f64)
                .ok_or(PTR_UNSUPPORTED)
        }
        _ => Err(PTR_UNSUPPORTED),
    }
}

fn read_pointee(addr: usize, out: &mut [u8]) -> Result<(), &'static str> {
    probe::read_into(addr, out).map_err(|fault| {
        tracing::debug!(target: "honest_report", %fault, "pointee unreadable");
        PTR_FREED
    })
}

fn render_int_bytes(width: u32, bytes: &[u8]) -> String {
    let raw = bytes.iter().enumerate().fold(0u128, |acc, (i, b)| {
        let shift = if cfg!(target_endian = "little") {
            8 * i
        } else {
            8 * (bytes.len() - 1 - i)
        };
        acc | (u128::from(*b) << shift)
    });
    let mut buf = itoa::Buffer::new();
    if width == 1 {
        return buf.format(raw & 1).to_string();
    }
    let shift = 128 - width;
    let v = ((raw << shift) as i128) >> shift;
    buf.format(v).to_string()
}
