//! The per-pixel compositor: a single unsigned compare decides whether an
//! incoming layer's pixel is drawn in front of, blended with, or discarded
//! behind whatever is already in the row.
//!
//! Every candidate pixel is a [`Pixel`](crate::color::Pixel) with its
//! priority and target/finalized state packed into the high byte (see
//! [`crate::color::flags`]), which is why `color < current` alone is enough
//! to answer "does this pixel belong in front".

use crate::color::{self, flags, Pixel};

/// Composites `color` into `row[offset]`.
///
/// `blda`/`bldb` are the alpha-blend coefficients (`BLDALPHA`'s EVA/EVB,
/// already clamped to 0-16) used only on the path where both sides are
/// tagged as alpha-blend targets.
pub fn composite(row: &mut [Pixel], offset: usize, color: Pixel, blda: u32, bldb: u32) {
    let current = row[offset];

    row[offset] = if color < current {
        if current & flags::UNWRITTEN != 0 {
            color
        } else if color & flags::TARGET_1 == 0 || current & flags::TARGET_2 == 0 {
            color | flags::FINALIZED
        } else {
            color::mix(bldb, current, blda, color) | flags::FINALIZED
        }
    } else if current & flags::TARGET_1 != 0 && color & flags::TARGET_2 != 0 {
        color::mix(blda, current, bldb, color) | flags::FINALIZED
    } else {
        current | flags::FINALIZED
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn backdrop() -> Pixel {
        flags::UNWRITTEN | flags::priority(3) | flags::IS_BACKGROUND
    }

    #[test]
    fn higher_priority_overwrites_unwritten_backdrop_without_finalizing() {
        let mut row = [backdrop()];
        let sprite = flags::priority(0) | 0x0000_00F8;
        composite(&mut row, 0, sprite, 8, 8);
        assert_eq!(row[0], sprite);
        assert_eq!(row[0] & flags::FINALIZED, 0);
    }

    #[test]
    fn higher_priority_over_finalized_non_target_overwrites_and_finalizes() {
        let current = flags::priority(2) | flags::FINALIZED | 0x00F8_0000;
        let mut row = [current];
        let incoming = flags::priority(0) | 0x0000_00F8;
        composite(&mut row, 0, incoming, 8, 8);
        assert_eq!(row[0], incoming | flags::FINALIZED);
    }

    #[test]
    fn higher_priority_alpha_targets_blend_instead_of_overwriting() {
        let red = color::expand_15_to_24(0b0_00000_00000_11111);
        let blue = color::expand_15_to_24(0b0_11111_00000_00000);
        let current = flags::priority(2) | flags::TARGET_2 | blue;
        let mut row = [current];
        let incoming = flags::priority(0) | flags::TARGET_1 | red;
        composite(&mut row, 0, incoming, 8, 8);
        assert_eq!(row[0] & color::COLOR_MASK, 0x0078_0078);
        assert!(row[0] & flags::FINALIZED != 0);
    }

    #[test]
    fn equal_or_lower_priority_non_target_just_finalizes_current() {
        let current = flags::priority(1) | 0x0000_00F8;
        let mut row = [current];
        let incoming = flags::priority(1) | flags::IS_BACKGROUND | 0x00F8_0000;
        composite(&mut row, 0, incoming, 8, 8);
        assert_eq!(row[0], current | flags::FINALIZED);
    }

    #[test]
    fn equal_priority_sprite_beats_background_via_is_background_tiebreak() {
        // Sprite pixels never set IS_BACKGROUND, so they compare lower than
        // a background pixel at the same priority and win the `color <
        // current` branch.
        let background_first = flags::priority(1) | flags::IS_BACKGROUND | flags::UNWRITTEN;
        let mut row = [background_first];
        let sprite = flags::priority(1) | 0x0000_00F8;
        composite(&mut row, 0, sprite, 8, 8);
        assert_eq!(row[0], sprite);
    }
}
