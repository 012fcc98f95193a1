use std::fmt::Debug;
use std::mem::size_of;
use std::ops::RangeInclusive;

/// Helper methods to manipulate bits on plain unsigned integers.
///
/// The index (`bit_idx`) runs from lsb to msb (right to left). Used in place of
/// packed bitfield structs for every hardware register in this crate: masking and
/// shifting explicitly is portable and costs nothing once inlined.
pub trait Bits
where
    Self: Clone + Sized + Into<u128> + TryFrom<u128> + From<bool> + TryInto<u8> + From<u8>,
    <Self as TryFrom<u128>>::Error: Debug,
    <Self as TryInto<u8>>::Error: Debug,
{
    fn is_bit_on(&self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
        let bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask: u128 = 0b1 << bit_idx;
        (bitwise & mask) != 0
    }

    fn is_bit_off(&self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
        let bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask = 0b1 << bit_idx;
        (bitwise & mask) == 0
    }

    fn set_bit_on(&mut self, bit_idx: u8) {
        debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
        let mut bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask = 0b1 << bit_idx;
        bitwise |= mask;
        *self = <Self as TryFrom<u128>>::try_from(bitwise).unwrap();
    }

    fn set_bit_off(&mut self, bit_idx: u8) {
        let mut bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask = !(0b1 << bit_idx);
        bitwise &= mask;
        *self = <Self as TryFrom<u128>>::try_from(bitwise).unwrap();
    }

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        match value {
            false => self.set_bit_off(bit_idx),
            true => self.set_bit_on(bit_idx),
        }
    }

    fn get_bit(&self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    fn get_bits(&self, bits_range: RangeInclusive<u8>) -> Self {
        let mut bits = 0b0;
        for (shift_value, bit_index) in bits_range.enumerate() {
            let bit_value: u128 = self.get_bit(bit_index).into();
            bits |= bit_value << shift_value;
        }
        bits.try_into().unwrap()
    }

    fn get_byte(&self, byte_nth: u8) -> u8 {
        debug_assert!(byte_nth < size_of::<Self>() as u8);
        self.get_bits(byte_nth * 8..=byte_nth * 8 + 7)
            .try_into()
            .unwrap()
    }

    fn set_byte(&mut self, byte_nth: u8, value: u8) {
        debug_assert!(byte_nth < size_of::<Self>() as u8);

        let mut bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask: u128 = !(0xFF << (8 * byte_nth));
        let shifted_value: u128 = (value as u128) << (8 * byte_nth);
        bitwise = (bitwise & mask) | shifted_value;
        *self = <Self as TryFrom<u128>>::try_from(bitwise).unwrap();
    }
}

impl Bits for u128 {}
impl Bits for u64 {}
impl Bits for u32 {}
impl Bits for u16 {}
impl Bits for u8 {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_is_on() {
        let b = 0b110011101_u32;
        assert!(b.is_bit_on(0));
        assert!(!b.is_bit_on(1));
        assert!(b.is_bit_on(8));
        assert!(!b.is_bit_on(31));
    }

    #[test]
    fn test_set_bit() {
        let mut b = 0b1100110_u32;
        b.set_bit(0, true);
        b.set_bit(2, false);
        assert_eq!(b, 0b1100011);
    }

    #[test]
    fn test_get_bits() {
        let b = 0b1011001110_u32;
        assert_eq!(b.get_bits(0..=3), 0b1110);
        assert_eq!(b.get_bits(4..=7), 0b1100);
        assert_eq!(b.get_bits(0..=9), 0b10_1100_1110);
    }

    #[test]
    fn test_get_byte() {
        let b: u32 = 0b00000001_00100010_00000100_01001000;
        assert_eq!(b.get_byte(0), 0b01001000_u8);
        assert_eq!(b.get_byte(1), 0b00000100_u8);
        assert_eq!(b.get_byte(2), 0b00100010_u8);
        assert_eq!(b.get_byte(3), 0b00000001_u8);
    }

    #[test]
    fn test_set_byte() {
        let mut b: u32 = 0;
        b.set_byte(1, 0b1010_1010);
        assert_eq!(b >> 8, 0b1010_1010);
    }

    #[test]
    #[should_panic]
    fn get_byte_out_of_range_panics() {
        let b: u32 = 0;
        b.get_byte(4);
    }

    #[test]
    fn set_bit_round_trips_on_random_values() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let original: u32 = rng.gen();
            let bit_idx = rng.gen_range(0..32);
            let was_set = original.get_bit(bit_idx);

            let mut flipped = original;
            flipped.set_bit(bit_idx, !was_set);
            assert_ne!(flipped.get_bit(bit_idx), was_set);

            let mut restored = flipped;
            restored.set_bit(bit_idx, was_set);
            assert_eq!(restored, original);
        }
    }
}
