//! Blend descriptors and the eight effective blend directions
//!
//! Map data encodes a blend as one of four canonical directions plus a flip
//! flag. The flip mirrors the direction across the opposite axis:
//! - RIGHT <-> LEFT
//! - TOP <-> BOTTOM
//! - TOP_RIGHT <-> BOTTOM_RIGHT
//! - TOP_LEFT <-> BOTTOM_LEFT
//!
//! Descriptors are resolved into an `EffectiveDirection` once, when the
//! descriptor table is built, so the edge/diagonal classification and the
//! mask-key tables below are exhaustive matches over eight values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical direction as stored in map data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendDirection {
    #[serde(alias = "BLEND_TOWARDS_RIGHT")]
    Right,
    #[serde(alias = "BLEND_TOWARDS_TOP")]
    Top,
    #[serde(alias = "BLEND_TOWARDS_TOP_RIGHT")]
    TopRight,
    #[serde(alias = "BLEND_TOWARDS_TOP_LEFT")]
    TopLeft,
}

/// Blend direction after applying the flip flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveDirection {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge blends look at one neighbor, diagonal blends at three.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionClass {
    Edge,
    Diagonal,
}

impl EffectiveDirection {
    pub const ALL: [EffectiveDirection; 8] = [
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    pub fn from_canonical(direction: BlendDirection, flipped: bool) -> Self {
        match (direction, flipped) {
            (BlendDirection::Right, false) => Self::Right,
            (BlendDirection::Right, true) => Self::Left,
            (BlendDirection::Top, false) => Self::Top,
            (BlendDirection::Top, true) => Self::Bottom,
            (BlendDirection::TopRight, false) => Self::TopRight,
            (BlendDirection::TopRight, true) => Self::BottomRight,
            (BlendDirection::TopLeft, false) => Self::TopLeft,
            (BlendDirection::TopLeft, true) => Self::BottomLeft,
        }
    }

    pub fn class(self) -> DirectionClass {
        match self {
            Self::Left | Self::Right | Self::Top | Self::Bottom => DirectionClass::Edge,
            Self::TopLeft | Self::TopRight | Self::BottomLeft | Self::BottomRight => {
                DirectionClass::Diagonal
            }
        }
    }

    /// Unit step in tile-grid space (y grows towards the top of the map).
    pub fn unit_offset(self) -> (i32, i32) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Top => (0, 1),
            Self::Bottom => (0, -1),
            Self::TopLeft => (-1, 1),
            Self::TopRight => (1, 1),
            Self::BottomLeft => (-1, -1),
            Self::BottomRight => (1, -1),
        }
    }

    /// Mask used for an edge blend. `None` for diagonal directions.
    pub fn edge_mask(self) -> Option<MaskKey> {
        match self {
            Self::Left => Some(MaskKey::Left),
            Self::Right => Some(MaskKey::Right),
            Self::Top => Some(MaskKey::Top),
            Self::Bottom => Some(MaskKey::Bottom),
            _ => None,
        }
    }

    /// Mask used when only the diagonal neighbor carries the target texture.
    pub fn diagonal_mask(self) -> Option<MaskKey> {
        match self {
            Self::TopLeft => Some(MaskKey::TopLeft),
            Self::TopRight => Some(MaskKey::TopRight),
            Self::BottomLeft => Some(MaskKey::BottomLeft),
            Self::BottomRight => Some(MaskKey::BottomRight),
            _ => None,
        }
    }

    /// Mask used when two or more corner neighbors carry the target texture.
    pub fn corner_mask(self) -> Option<MaskKey> {
        match self {
            Self::TopLeft => Some(MaskKey::TopLeftCorner),
            Self::TopRight => Some(MaskKey::TopRightCorner),
            Self::BottomLeft => Some(MaskKey::BottomLeftCorner),
            Self::BottomRight => Some(MaskKey::BottomRightCorner),
            _ => None,
        }
    }
}

/// The twelve alpha-mask variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKey {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopLeftCorner,
    TopRightCorner,
    BottomLeftCorner,
    BottomRightCorner,
}

impl MaskKey {
    pub const ALL: [MaskKey; 12] = [
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::TopLeftCorner,
        Self::TopRightCorner,
        Self::BottomLeftCorner,
        Self::BottomRightCorner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
            Self::TopLeftCorner => "top_left_corner",
            Self::TopRightCorner => "top_right_corner",
            Self::BottomLeftCorner => "bottom_left_corner",
            Self::BottomRightCorner => "bottom_right_corner",
        }
    }
}

impl fmt::Display for MaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blend descriptor as read from map data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendDescriptor {
    pub direction: BlendDirection,
    #[serde(default)]
    pub flipped: bool,
    /// Tile value addressing the texture blended in.
    pub secondary_tile: u32,
}

impl BlendDescriptor {
    pub fn effective_direction(&self) -> EffectiveDirection {
        EffectiveDirection::from_canonical(self.direction, self.flipped)
    }
}

/// A descriptor with its direction already resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedBlend {
    pub direction: EffectiveDirection,
    pub secondary_tile: u32,
}

/// Ordered descriptor table addressed by blend-layer values.
#[derive(Clone, Debug, Default)]
pub struct DescriptorTable {
    blends: Vec<ResolvedBlend>,
}

impl DescriptorTable {
    pub fn new(descriptors: &[BlendDescriptor]) -> Self {
        let blends = descriptors
            .iter()
            .map(|d| ResolvedBlend {
                direction: d.effective_direction(),
                secondary_tile: d.secondary_tile,
            })
            .collect();
        Self { blends }
    }

    /// Look up a blend-layer value. 0 means "no blend"; value `n` addresses
    /// descriptor `n - 1`.
    pub fn lookup(&self, layer_value: u32) -> Option<&ResolvedBlend> {
        let index = layer_value.checked_sub(1)?;
        self.blends.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.blends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_flip_mirrors_across_opposite_axis() {
        use BlendDirection as C;
        use EffectiveDirection as E;
        let cases = [
            (C::Right, E::Right, E::Left),
            (C::Top, E::Top, E::Bottom),
            (C::TopRight, E::TopRight, E::BottomRight),
            (C::TopLeft, E::TopLeft, E::BottomLeft),
        ];
        for (canonical, plain, flipped) in cases {
            assert_eq!(E::from_canonical(canonical, false), plain);
            assert_eq!(E::from_canonical(canonical, true), flipped);
        }
    }

    #[test]
    fn test_every_direction_has_exactly_its_class_masks() {
        for dir in EffectiveDirection::ALL {
            match dir.class() {
                DirectionClass::Edge => {
                    assert!(dir.edge_mask().is_some());
                    assert!(dir.diagonal_mask().is_none());
                    assert!(dir.corner_mask().is_none());
                }
                DirectionClass::Diagonal => {
                    assert!(dir.edge_mask().is_none());
                    assert!(dir.diagonal_mask().is_some());
                    assert!(dir.corner_mask().is_some());
                }
            }
        }
    }

    #[test]
    fn test_mask_tables_cover_all_twelve_keys() {
        let keys: HashSet<MaskKey> = EffectiveDirection::ALL
            .iter()
            .flat_map(|d| [d.edge_mask(), d.diagonal_mask(), d.corner_mask()])
            .flatten()
            .collect();
        assert_eq!(keys.len(), 12);
        assert_eq!(MaskKey::TopLeftCorner.as_str(), "top_left_corner");
    }

    #[test]
    fn test_descriptor_lookup_is_one_based() {
        let table = DescriptorTable::new(&[
            BlendDescriptor {
                direction: BlendDirection::Right,
                flipped: true,
                secondary_tile: 12,
            },
        ]);
        assert!(table.lookup(0).is_none());
        assert!(table.lookup(2).is_none());
        let blend = table.lookup(1).unwrap();
        assert_eq!(blend.direction, EffectiveDirection::Left);
        assert_eq!(blend.secondary_tile, 12);
    }

    #[test]
    fn test_descriptor_accepts_container_direction_names() {
        let json = r#"{"direction": "BLEND_TOWARDS_TOP_LEFT", "flipped": true, "secondary_tile": 4}"#;
        let d: BlendDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.effective_direction(), EffectiveDirection::BottomLeft);
    }
}
