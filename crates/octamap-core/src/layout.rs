//! Atlas packing of the projected levels.
//!
//! Level 0 sits at full resolution in the left part of the atlas. Every
//! further level owns a band of the right-hand strip whose height halves from
//! one level to the next, so the bands of all levels always fit into the atlas
//! height. Each level is inset by a one-texel gutter at the top of its band,
//! which keeps it apart from its neighbours, and a one-texel column separates
//! the strip from level 0.

use glam::{Vec2, Vec3};

use crate::error::{OctamapError, Result};
use crate::geometry::octahedral_uv;

/// Upper bound on processed levels.
pub const MAX_LEVELS: usize = 6;

/// Gutter between packed regions, in texels.
pub const GUTTER: u32 = 1;

/// Maximum mip level for a number of input cube maps, or `None` without inputs.
pub fn maximum_mipmap_level(input_count: usize) -> Option<usize> {
    input_count.min(MAX_LEVELS).checked_sub(1)
}

/// Atlas width for a level-0 edge length of `original_size`, or `None` if it
/// does not fit into a `u32`.
pub fn atlas_width(original_size: u32) -> Option<u32> {
    original_size
        .checked_mul(3)
        .map(|triple| triple / 2)?
        .checked_add(2 * GUTTER)
}

/// A texel rectangle inside the atlas, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    /// One past the last column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the last row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether at least `gap` texels separate the two rectangles.
    pub fn is_separated_from(&self, other: &AtlasRect, gap: u32) -> bool {
        self.right() + gap <= other.x
            || other.right() + gap <= self.x
            || self.bottom() + gap <= other.y
            || other.bottom() + gap <= self.y
    }
}

/// Placement of every level inside the atlas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasLayout {
    original_size: u32,
    width: u32,
    rects: Vec<AtlasRect>,
}

impl AtlasLayout {
    /// Packs `level_count` levels for a level-0 edge of `original_size` texels.
    ///
    /// Level k >= 1 owns the band of `original_size >> k` rows that starts
    /// where the band of level k - 1 ends. Its rect starts one gutter row into
    /// the band and is one gutter narrower than the band, except for one-texel
    /// bands, which have no room for an inset and may end on the bottom edge.
    /// Fails only when a level would have no texels.
    pub fn new(original_size: u32, level_count: usize) -> Result<Self> {
        if level_count == 0 || level_count > MAX_LEVELS {
            return Err(OctamapError::InvalidLevelCount(level_count));
        }
        let overflow = || OctamapError::AtlasOverflow {
            original_size,
            level_count,
        };
        if original_size == 0 {
            return Err(overflow());
        }
        let width = atlas_width(original_size).ok_or_else(overflow)?;

        let mut rects = Vec::with_capacity(level_count);
        rects.push(AtlasRect {
            x: 0,
            y: 0,
            width: original_size,
            height: original_size,
        });

        let strip_x = original_size + GUTTER;
        let mut band_start = 0;
        for level in 1..level_count {
            let band = original_size >> level;
            if band == 0 {
                return Err(overflow());
            }
            let size = band.saturating_sub(GUTTER).max(1);
            rects.push(AtlasRect {
                x: strip_x,
                y: band_start + GUTTER,
                width: size,
                height: size,
            });
            band_start += band;
        }

        Ok(Self {
            original_size,
            width,
            rects,
        })
    }

    /// Edge length of level 0.
    pub fn original_size(&self) -> u32 {
        self.original_size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.original_size
    }

    pub fn level_count(&self) -> usize {
        self.rects.len()
    }

    pub fn rects(&self) -> &[AtlasRect] {
        &self.rects
    }

    pub fn rect(&self, level: usize) -> Option<AtlasRect> {
        self.rects.get(level).copied()
    }

    /// Remaps a level-local texture coordinate into atlas texture space.
    pub fn atlas_uv(&self, level: usize, local_uv: Vec2) -> Option<Vec2> {
        let rect = self.rect(level)?;
        let texel = Vec2::new(rect.x as f32, rect.y as f32)
            + local_uv * Vec2::new(rect.width as f32, rect.height as f32);
        Some(texel / Vec2::new(self.width() as f32, self.height() as f32))
    }

    /// Atlas texture coordinate at which `direction` is stored for `level`.
    pub fn sample_uv(&self, direction: Vec3, level: usize) -> Option<Vec2> {
        self.atlas_uv(level, octahedral_uv(direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_maximum_mipmap_level() {
        assert_eq!(maximum_mipmap_level(0), None);
        assert_eq!(maximum_mipmap_level(1), Some(0));
        assert_eq!(maximum_mipmap_level(6), Some(5));
        assert_eq!(maximum_mipmap_level(8), Some(5));
    }

    #[test]
    fn test_six_level_layout() {
        // Face widths 128..4 give an original size of 256.
        let layout = AtlasLayout::new(256, 6).unwrap();
        assert_eq!(layout.width(), 386);
        assert_eq!(layout.height(), 256);
        assert_eq!(
            layout.rects(),
            &[
                AtlasRect { x: 0, y: 0, width: 256, height: 256 },
                AtlasRect { x: 257, y: 1, width: 127, height: 127 },
                AtlasRect { x: 257, y: 129, width: 63, height: 63 },
                AtlasRect { x: 257, y: 193, width: 31, height: 31 },
                AtlasRect { x: 257, y: 225, width: 15, height: 15 },
                AtlasRect { x: 257, y: 241, width: 7, height: 7 },
            ]
        );
    }

    #[test]
    fn test_small_six_level_chains_pack() {
        // Face widths 64..2.
        let layout = AtlasLayout::new(128, 6).unwrap();
        assert_eq!((layout.width(), layout.height()), (194, 128));
        assert_eq!(layout.rect(5), Some(AtlasRect { x: 129, y: 121, width: 3, height: 3 }));

        // Face widths 16..1: the last band is a single texel.
        let layout = AtlasLayout::new(32, 6).unwrap();
        assert_eq!((layout.width(), layout.height()), (50, 32));
        assert_eq!(layout.rect(4), Some(AtlasRect { x: 33, y: 29, width: 1, height: 1 }));
        assert_eq!(layout.rect(5), Some(AtlasRect { x: 33, y: 31, width: 1, height: 1 }));
    }

    #[test]
    fn test_atlas_width_overflow() {
        assert_eq!(atlas_width(256), Some(386));
        assert_eq!(atlas_width(u32::MAX / 2), None);
        assert!(matches!(
            AtlasLayout::new(u32::MAX - 1, 1),
            Err(OctamapError::AtlasOverflow { .. })
        ));
    }

    #[test]
    fn test_level_zero_takes_two_thirds() {
        let layout = AtlasLayout::new(512, 1).unwrap();
        assert_eq!(layout.width(), 770);
        assert_eq!(layout.level_count(), 1);
        let ratio = 512.0 / layout.width() as f32;
        assert!((ratio - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_overflow_and_invalid_counts() {
        assert!(matches!(
            AtlasLayout::new(16, 6),
            Err(OctamapError::AtlasOverflow { .. })
        ));
        assert!(matches!(
            AtlasLayout::new(2, 3),
            Err(OctamapError::AtlasOverflow { .. })
        ));
        assert!(matches!(
            AtlasLayout::new(256, 0),
            Err(OctamapError::InvalidLevelCount(0))
        ));
        assert!(matches!(
            AtlasLayout::new(256, 7),
            Err(OctamapError::InvalidLevelCount(7))
        ));
    }

    #[test]
    fn test_atlas_uv_remap() {
        let layout = AtlasLayout::new(256, 6).unwrap();
        let uv = layout.atlas_uv(0, Vec2::new(1.0, 1.0)).unwrap();
        assert!((uv - Vec2::new(256.0 / 386.0, 1.0)).length() < 1e-6);

        let center = layout.atlas_uv(1, Vec2::splat(0.5)).unwrap();
        assert!((center - Vec2::new(320.5 / 386.0, 64.5 / 256.0)).length() < 1e-6);

        assert!(layout.atlas_uv(6, Vec2::ZERO).is_none());
    }

    #[test]
    fn test_sample_uv_lands_in_level_rect() {
        let layout = AtlasLayout::new(256, 6).unwrap();
        let uv = layout.sample_uv(Vec3::NEG_Y, 2).unwrap();
        let texel = uv * Vec2::new(386.0, 256.0);
        let rect = layout.rect(2).unwrap();
        assert!((texel.x - (rect.x as f32 + 15.5)).abs() < 1e-3);
        assert!((texel.y - (rect.y as f32 + 15.5)).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_regions_keep_gutters(half in 1u32..2048, level_count in 1usize..=MAX_LEVELS) {
            let original_size = half * 2;
            let layout = AtlasLayout::new(original_size, level_count);
            if original_size >> (level_count - 1) == 0 {
                prop_assert!(
                    matches!(layout, Err(OctamapError::AtlasOverflow { .. })),
                    "expected overflow"
                );
                return Ok(());
            }
            let layout = layout.unwrap();
            let rects = layout.rects();
            prop_assert_eq!(rects.len(), level_count);

            for (i, a) in rects.iter().enumerate() {
                prop_assert!(a.width > 0 && a.height > 0);
                prop_assert!(a.right() <= layout.width());
                prop_assert!(a.bottom() <= layout.height());
                for b in &rects[i + 1..] {
                    prop_assert!(a.is_separated_from(b, GUTTER));
                }
            }

            for strip in &rects[1..] {
                prop_assert!(strip.y >= GUTTER);
                prop_assert!(strip.right() + GUTTER <= layout.width());
                if strip.height > 1 {
                    prop_assert!(strip.bottom() + GUTTER <= layout.height());
                }
            }
        }

        #[test]
        fn prop_every_halving_chain_fits(face in 1u32..4096, level_count in 1usize..=MAX_LEVELS) {
            let original_size = face * 2;
            prop_assume!(original_size >> (level_count - 1) >= 1);
            let layout = AtlasLayout::new(original_size, level_count).unwrap();
            prop_assert_eq!(layout.width(), original_size * 3 / 2 + 2);
            prop_assert_eq!(layout.height(), original_size);
        }
    }
}
