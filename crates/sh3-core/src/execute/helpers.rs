//! Pure arithmetic helpers for the flag-producing instructions.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::fn_params_excessive_bools)]

/// `a + b + carry`, returning the sum and the carry out.
#[must_use]
pub const fn add_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool) {
    let (partial, c1) = a.overflowing_add(b);
    let (sum, c2) = partial.overflowing_add(carry as u32);
    (sum, c1 || c2)
}

/// `a - b - borrow`, returning the difference and the borrow out.
#[must_use]
pub const fn sub_with_borrow(a: u32, b: u32, borrow: bool) -> (u32, bool) {
    let (partial, b1) = a.overflowing_sub(b);
    let (diff, b2) = partial.overflowing_sub(borrow as u32);
    (diff, b1 || b2)
}

/// Signed addition, returning the wrapped sum and whether it overflowed.
#[must_use]
pub const fn add_overflow(a: u32, b: u32) -> (u32, bool) {
    let (sum, overflow) = (a as i32).overflowing_add(b as i32);
    (sum as u32, overflow)
}

/// Signed subtraction, returning the wrapped difference and whether it overflowed.
#[must_use]
pub const fn sub_overflow(a: u32, b: u32) -> (u32, bool) {
    let (diff, overflow) = (a as i32).overflowing_sub(b as i32);
    (diff as u32, overflow)
}

/// `CMP/STR`: whether any byte of `a` equals the same byte of `b`.
#[must_use]
pub const fn any_byte_equal(a: u32, b: u32) -> bool {
    let x = a ^ b;
    x & 0xFF00_0000 == 0 || x & 0x00FF_0000 == 0 || x & 0x0000_FF00 == 0 || x & 0x0000_00FF == 0
}

/// One step of non-restoring division.
///
/// Takes the dividend register, divisor, Q, M and T and returns the new
/// dividend register, Q and T.
#[must_use]
pub const fn div1(rn: u32, rm: u32, q: bool, m: bool, t: bool) -> (u32, bool, bool) {
    let msb = rn & 0x8000_0000 != 0;
    let shifted = (rn << 1) | t as u32;
    let (result, carry) = if q == m {
        shifted.overflowing_sub(rm)
    } else {
        shifted.overflowing_add(rm)
    };
    let new_q = msb ^ carry ^ m;
    (result, new_q, new_q == m)
}

/// `SHAD`: arithmetic shift by a signed register amount.
#[must_use]
pub const fn shift_arithmetic_dynamic(value: u32, amount: u32) -> u32 {
    let sh = amount as i32;
    if sh >= 0 {
        value << (amount & 0x1F)
    } else if amount & 0x1F == 0 {
        if (value as i32) < 0 {
            u32::MAX
        } else {
            0
        }
    } else {
        ((value as i32) >> ((!amount & 0x1F) + 1)) as u32
    }
}

/// `SHLD`: logical shift by a signed register amount.
#[must_use]
pub const fn shift_logical_dynamic(value: u32, amount: u32) -> u32 {
    let sh = amount as i32;
    if sh >= 0 {
        value << (amount & 0x1F)
    } else if amount & 0x1F == 0 {
        0
    } else {
        value >> ((!amount & 0x1F) + 1)
    }
}

/// `SWAP.B`: exchanges the two low bytes.
#[must_use]
pub const fn swap_low_bytes(value: u32) -> u32 {
    (value & 0xFFFF_0000) | ((value & 0xFF) << 8) | ((value >> 8) & 0xFF)
}

/// Adds a signed 64-bit product to MACH:MACL, saturating to 48 bits when S is set.
#[must_use]
pub const fn mac_long(mach: u32, macl: u32, product: i64, saturate: bool) -> (u32, u32) {
    let acc = (((mach as u64) << 32) | macl as u64) as i64;
    let mut sum = acc.wrapping_add(product);
    if saturate {
        const MAX48: i64 = 0x0000_7FFF_FFFF_FFFF;
        const MIN48: i64 = -0x0000_8000_0000_0000;
        if sum > MAX48 {
            sum = MAX48;
        } else if sum < MIN48 {
            sum = MIN48;
        }
    }
    ((sum >> 32) as u32, sum as u32)
}

/// Adds a signed 32-bit product to the accumulator.
///
/// With S set only MACL accumulates, saturating at 32 bits, and MACH is set
/// to 1 on overflow.
#[must_use]
pub const fn mac_word(mach: u32, macl: u32, product: i32, saturate: bool) -> (u32, u32) {
    if saturate {
        let (sum, overflow) = (macl as i32).overflowing_add(product);
        if overflow {
            let clamped = if product < 0 { i32::MIN } else { i32::MAX };
            (1, clamped as u32)
        } else {
            (mach, sum as u32)
        }
    } else {
        mac_long(mach, macl, product as i64, false)
    }
}
