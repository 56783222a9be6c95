//! Float widening and textual formatting.
//!
//! Every float kind is widened to the nearest `f64` before formatting. For
//! `x86_fp80`, `fp128` and `ppc_fp128` that loses precision.

use crate::tags::FloatKind;

/// Shortest round-trip text, `nan`/`inf`/`-inf` for non-finite values.
pub fn format_f64(v: f64) -> String {
    let mut buf = ryu::Buffer::new();
    let s: &str = if v.is_nan() {
        "nan"
    } else if v == f64::INFINITY {
        "inf"
    } else if v == f64::NEG_INFINITY {
        "-inf"
    } else {
        buf.format_finite(v)
    };
    s.strip_suffix(".0").unwrap_or(s).to_string()
}

/// Widen the in-memory representation of `kind` (little-endian) to `f64`.
///
/// `bytes` must hold at least `kind.storage_bytes()` bytes.
pub fn widen(kind: FloatKind, bytes: &[u8]) -> Option<f64> {
    let v = match kind {
        FloatKind::Half => half_to_f64(u16::from_le_bytes(take(bytes)?)),
        FloatKind::BFloat => bfloat_to_f64(u16::from_le_bytes(take(bytes)?)),
        FloatKind::Float => f64::from(f32::from_le_bytes(take(bytes)?)),
        FloatKind::Double => f64::from_le_bytes(take(bytes)?),
        FloatKind::Fp128 => fp128_to_f64(u128::from_le_bytes(take(bytes)?)),
        FloatKind::X86Fp80 => x86_fp80_to_f64(take(bytes)?),
        FloatKind::PpcFp128 => ppc_fp128_to_f64(take(bytes)?),
    };
    Some(v)
}

fn take<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1f);
    let frac = f64::from(bits & 0x3ff);
    let mag = match exp {
        0 => ldexp(frac, -24),
        0x1f if frac == 0.0 => f64::INFINITY,
        0x1f => f64::NAN,
        _ => ldexp(1024.0 + frac, exp - 25),
    };
    sign * mag
}

fn bfloat_to_f64(bits: u16) -> f64 {
    f64::from(f32::from_bits(u32::from(bits) << 16))
}

fn fp128_to_f64(bits: u128) -> f64 {
    let negative = bits >> 127 != 0;
    let exp = ((bits >> 112) & 0x7fff) as i32;
    let mant = bits & ((1u128 << 112) - 1);
    let mag = match exp {
        0 => ldexp(mant as f64, -16382 - 112),
        0x7fff if mant == 0 => f64::INFINITY,
        0x7fff => f64::NAN,
        _ => ldexp((mant | (1u128 << 112)) as f64, exp - 16383 - 112),
    };
    if negative {
        -mag
    } else {
        mag
    }
}

fn x86_fp80_to_f64(bytes: [u8; 10]) -> f64 {
    let mut mant_bytes = [0u8; 8];
    mant_bytes.copy_from_slice(&bytes[..8]);
    let mant = u64::from_le_bytes(mant_bytes);
    let se = u16::from_le_bytes([bytes[8], bytes[9]]);
    let negative = se & 0x8000 != 0;
    let exp = i32::from(se & 0x7fff);
    let mag = match exp {
        // The integer bit is explicit, so the mantissa is taken as-is.
        0 => ldexp(mant as f64, -16382 - 63),
        0x7fff if mant << 1 == 0 => f64::INFINITY,
        0x7fff => f64::NAN,
        _ => ldexp(mant as f64, exp - 16383 - 63),
    };
    if negative {
        -mag
    } else {
        mag
    }
}

fn ppc_fp128_to_f64(bytes: [u8; 16]) -> f64 {
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[..8]);
    lo.copy_from_slice(&bytes[8..]);
    f64::from_le_bytes(hi) + f64::from_le_bytes(lo)
}

/// `x * 2^exp` without overflowing the intermediate power.
fn ldexp(mut x: f64, mut exp: i32) -> f64 {
    while exp > 1023 {
        x *= 2f64.powi(1023);
        exp -= 1023;
        if x.is_infinite() {
            return x;
        }
    }
    while exp < -1022 {
        x *= 2f64.powi(-1022);
        exp += 1022;
        if x == 0.0 {
            return x;
        }
    }
    x * 2f64.powi(exp)
}
