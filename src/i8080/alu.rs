// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use i8080::registers::{FLAG_AUX_CARRY, FLAG_CARRY, FLAG_PARITY, FLAG_SIGN,
                       FLAG_ZERO};
use utils::arithmetic::{even_parity, is_negative};

// The 8-bit arithmetic/logic unit. Every operation takes the flag register
// and its target byte as mutable references plus a mask naming the flags
// the instruction is allowed to touch; flags outside the mask are
// preserved. The mask contract exists because 8080 instructions genuinely
// differ in which flags they update: INR and DCR leave Carry alone, AND
// computes Auxiliary Carry by a special rule, rotates touch only Carry.

/// Adds `addend` (plus an optional carry-in) to the target byte. Carry is
/// the overflow out of bit 7, Auxiliary Carry the overflow out of bit 3,
/// both computed from the single combined addition so that ADC derives
/// correct flags without a second add.
pub fn adder(f: &mut u8, target: &mut u8, addend: u8, carry_in: bool, mask: u8) {
    let carry = carry_in as u16;
    let sum = *target as u16 + addend as u16 + carry;
    let half = (*target & 0x0F) as u16 + (addend & 0x0F) as u16 + carry;
    let result = sum as u8;

    if mask & FLAG_CARRY != 0 {
        set_flag(f, FLAG_CARRY, sum > 0xFF);
    }
    if mask & FLAG_AUX_CARRY != 0 {
        set_flag(f, FLAG_AUX_CARRY, half > 0x0F);
    }
    update_result_flags(f, result, mask);

    *target = result;
}

/// Subtracts `subtrahend` (plus an optional borrow-in) from the target
/// byte using two's complement arithmetic: the subtraction runs through
/// the adder as `target + !subtrahend + !borrow_in` and the resulting
/// Carry is inverted so that a set Carry means a borrow occurred, the 8080
/// convention. Auxiliary Carry falls out of the underlying addition.
pub fn subtract(f: &mut u8, target: &mut u8, subtrahend: u8, borrow_in: bool, mask: u8) {
    adder(f, target, !subtrahend, !borrow_in, mask);
    if mask & FLAG_CARRY != 0 {
        *f ^= FLAG_CARRY;
    }
}

/// Bitwise AND into the target byte. Carry is cleared. Auxiliary Carry is
/// set to the OR of bit 3 of the two operands, an erratum straight from
/// the 8080 data sheet that programs depend on.
pub fn logical_and(f: &mut u8, target: &mut u8, operand: u8, mask: u8) {
    let aux = (*target | operand) & 0x08 != 0;
    *target &= operand;

    if mask & FLAG_CARRY != 0 {
        set_flag(f, FLAG_CARRY, false);
    }
    if mask & FLAG_AUX_CARRY != 0 {
        set_flag(f, FLAG_AUX_CARRY, aux);
    }
    update_result_flags(f, *target, mask);
}

/// Bitwise OR into the target byte. Carry and Auxiliary Carry are cleared.
pub fn logical_or(f: &mut u8, target: &mut u8, operand: u8, mask: u8) {
    *target |= operand;
    clear_carries(f, mask);
    update_result_flags(f, *target, mask);
}

/// Bitwise XOR into the target byte. Carry and Auxiliary Carry are
/// cleared.
pub fn logical_xor(f: &mut u8, target: &mut u8, operand: u8, mask: u8) {
    *target ^= operand;
    clear_carries(f, mask);
    update_result_flags(f, *target, mask);
}

/// Updates the Zero, Sign and Parity flags from a result byte, subject to
/// the mask.
fn update_result_flags(f: &mut u8, result: u8, mask: u8) {
    if mask & FLAG_ZERO != 0 {
        set_flag(f, FLAG_ZERO, result == 0);
    }
    if mask & FLAG_SIGN != 0 {
        set_flag(f, FLAG_SIGN, is_negative(result));
    }
    if mask & FLAG_PARITY != 0 {
        set_flag(f, FLAG_PARITY, even_parity(result));
    }
}

fn clear_carries(f: &mut u8, mask: u8) {
    if mask & FLAG_CARRY != 0 {
        set_flag(f, FLAG_CARRY, false);
    }
    if mask & FLAG_AUX_CARRY != 0 {
        set_flag(f, FLAG_AUX_CARRY, false);
    }
}

fn set_flag(f: &mut u8, mask: u8, state: bool) {
    if state {
        *f |= mask;
    } else {
        *f &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8080::registers::FLAG_ALL;

    #[test]
    fn adder_wraps_and_sets_carry_and_aux_carry() {
        // 0xFF + 1 overflows both bit 3 and bit 7 and lands on zero, which
        // has even parity.
        let mut f = 0x02;
        let mut target = 0xFF;
        adder(&mut f, &mut target, 0x01, false, FLAG_ALL);

        assert_eq!(target, 0x00);
        assert_ne!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_AUX_CARRY, 0);
        assert_ne!(f & FLAG_ZERO, 0);
        assert_eq!(f & FLAG_SIGN, 0);
        assert_ne!(f & FLAG_PARITY, 0);
    }

    #[test]
    fn adder_only_touches_masked_flags() {
        let mut f = 0x02 | FLAG_ZERO | FLAG_SIGN;
        let mut target = 0x0F;
        adder(&mut f, &mut target, 0x01, false, FLAG_AUX_CARRY);

        assert_eq!(target, 0x10);
        assert_ne!(f & FLAG_AUX_CARRY, 0);
        // Zero and Sign were set before the call and are outside the mask.
        assert_ne!(f & FLAG_ZERO, 0);
        assert_ne!(f & FLAG_SIGN, 0);
    }

    #[test]
    fn adder_folds_the_carry_in_into_one_addition() {
        // 0x7F + 0x80 + carry = 0x100: without the combined addition the
        // carry out of bit 7 would be missed.
        let mut f = 0x02;
        let mut target = 0x7F;
        adder(&mut f, &mut target, 0x80, true, FLAG_ALL);

        assert_eq!(target, 0x00);
        assert_ne!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_ZERO, 0);
    }

    #[test]
    fn subtract_reports_borrow_through_carry() {
        // 1 - 2 borrows, leaving 0xFF with Sign set.
        let mut f = 0x02;
        let mut target = 0x01;
        subtract(&mut f, &mut target, 0x02, false, FLAG_ALL);

        assert_eq!(target, 0xFF);
        assert_ne!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_SIGN, 0);
        assert_eq!(f & FLAG_ZERO, 0);
        assert_ne!(f & FLAG_PARITY, 0);
    }

    #[test]
    fn subtracting_a_byte_from_itself_sets_aux_carry() {
        // The two's complement addition x + !x + 1 always carries out of
        // bit 3, so SUB A leaves AC set with a clear borrow.
        let mut f = 0x02;
        let mut target = 0x3A;
        subtract(&mut f, &mut target, 0x3A, false, FLAG_ALL);

        assert_eq!(target, 0x00);
        assert_eq!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_AUX_CARRY, 0);
        assert_ne!(f & FLAG_ZERO, 0);
        assert_ne!(f & FLAG_PARITY, 0);
        assert_eq!(f & FLAG_SIGN, 0);
    }

    #[test]
    fn subtract_folds_the_borrow_in_into_one_operation() {
        // 0x10 - 0x0F - borrow = 0x00 exactly; a separate second
        // subtraction for the borrow would double-count the flag updates.
        let mut f = 0x02;
        let mut target = 0x10;
        subtract(&mut f, &mut target, 0x0F, true, FLAG_ALL);

        assert_eq!(target, 0x00);
        assert_eq!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_ZERO, 0);
    }

    #[test]
    fn and_derives_aux_carry_from_bit_3_of_the_operands() {
        // Neither operand has bit 3 set: AC clear.
        let mut f = 0x02;
        let mut target = 0xF0;
        logical_and(&mut f, &mut target, 0x07, FLAG_ALL);
        assert_eq!(target, 0x00);
        assert_eq!(f & FLAG_AUX_CARRY, 0);
        assert_eq!(f & FLAG_CARRY, 0);

        // One operand has bit 3 set: AC set even though the result is 0.
        let mut f = 0x02;
        let mut target = 0x08;
        logical_and(&mut f, &mut target, 0x07, FLAG_ALL);
        assert_eq!(target, 0x00);
        assert_ne!(f & FLAG_AUX_CARRY, 0);
    }

    #[test]
    fn or_clears_both_carries_and_sets_parity() {
        let mut f = 0x02 | FLAG_CARRY | FLAG_AUX_CARRY;
        let mut target = 0x00;
        logical_or(&mut f, &mut target, 0x0F, FLAG_ALL);

        assert_eq!(target, 0x0F);
        assert_eq!(f & FLAG_CARRY, 0);
        assert_eq!(f & FLAG_AUX_CARRY, 0);
        assert_eq!(f & FLAG_ZERO, 0);
        assert_eq!(f & FLAG_SIGN, 0);
        assert_ne!(f & FLAG_PARITY, 0);
    }

    #[test]
    fn xor_with_self_zeroes_the_target() {
        let mut f = 0x02 | FLAG_CARRY;
        let mut target = 0xA5;
        logical_xor(&mut f, &mut target, 0xA5, FLAG_ALL);

        assert_eq!(target, 0x00);
        assert_eq!(f & FLAG_CARRY, 0);
        assert_ne!(f & FLAG_ZERO, 0);
        assert_ne!(f & FLAG_PARITY, 0);
    }
}
