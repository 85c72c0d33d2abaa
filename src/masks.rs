//! Blend alpha masks
//!
//! Four source masks are loaded from disk and mirrored into the twelve
//! directional variants:
//! - horizontal: `left` as is, `right` flipped horizontally
//! - vertical: `top` as is, `bottom` flipped vertically
//! - diagonal: `top_right` as is, the other three corners mirrored
//! - diagonal with neighbors: the four `*_corner` keys, mirrored the same way

use std::collections::HashMap;
use std::path::Path;

use image::{imageops, RgbaImage};

use crate::blend::MaskKey;
use crate::error::{ExportError, ExportResult};

pub const HORIZONTAL_MASK_FILE: &str = "horizontal.png";
pub const VERTICAL_MASK_FILE: &str = "vertical.png";
pub const DIAGONAL_MASK_FILE: &str = "diagonal.png";
pub const DIAGONAL_WITH_NEIGHBORS_MASK_FILE: &str = "diagonal_with_neighbors.png";

/// An alpha template. Only the alpha channel is used when blending, but
/// flips keep every channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    image: RgbaImage,
}

impl Mask {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[3]
    }

    #[cfg(test)]
    fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Column `x` swaps with `width - 1 - x`.
    pub fn flip_horizontal(&self) -> Self {
        Self::new(imageops::flip_horizontal(&self.image))
    }

    /// Row `y` swaps with `height - 1 - y`.
    pub fn flip_vertical(&self) -> Self {
        Self::new(imageops::flip_vertical(&self.image))
    }

    pub fn flip_both(&self) -> Self {
        self.flip_horizontal().flip_vertical()
    }

    fn fit_to(self, size: u32) -> Self {
        if self.image.dimensions() == (size, size) {
            return self;
        }
        log::debug!(
            "resizing {}x{} mask to {}px cells",
            self.width(),
            self.height(),
            size
        );
        Self::new(imageops::resize(&self.image, size, size, imageops::FilterType::Nearest))
    }
}

/// The four masks the twelve variants are derived from.
pub struct MaskSources {
    pub horizontal: Mask,
    pub vertical: Mask,
    pub diagonal: Mask,
    pub diagonal_with_neighbors: Mask,
}

impl MaskSources {
    pub fn load(dir: &Path) -> ExportResult<Self> {
        Ok(Self {
            horizontal: load_mask(dir, HORIZONTAL_MASK_FILE)?,
            vertical: load_mask(dir, VERTICAL_MASK_FILE)?,
            diagonal: load_mask(dir, DIAGONAL_MASK_FILE)?,
            diagonal_with_neighbors: load_mask(dir, DIAGONAL_WITH_NEIGHBORS_MASK_FILE)?,
        })
    }
}

fn load_mask(dir: &Path, file: &str) -> ExportResult<Mask> {
    let path = dir.join(file);
    let image = image::open(&path).map_err(|e| {
        ExportError::configuration(format!("cannot load blend mask {}: {}", path.display(), e))
    })?;
    Ok(Mask::new(image.to_rgba8()))
}

/// All twelve keyed masks, built once and shared read-only.
#[derive(Clone, Debug)]
pub struct MaskLibrary {
    masks: HashMap<MaskKey, Mask>,
}

impl MaskLibrary {
    /// Load the source masks from `dir` and derive every variant at `cell_size` pixels.
    pub fn load(dir: &Path, cell_size: u32) -> ExportResult<Self> {
        Ok(Self::from_sources(MaskSources::load(dir)?, cell_size))
    }

    pub fn from_sources(sources: MaskSources, cell_size: u32) -> Self {
        let horizontal = sources.horizontal.fit_to(cell_size);
        let vertical = sources.vertical.fit_to(cell_size);
        let diagonal = sources.diagonal.fit_to(cell_size);
        let corner = sources.diagonal_with_neighbors.fit_to(cell_size);

        let mut masks = HashMap::with_capacity(MaskKey::ALL.len());

        masks.insert(MaskKey::Right, horizontal.flip_horizontal());
        masks.insert(MaskKey::Left, horizontal);
        masks.insert(MaskKey::Bottom, vertical.flip_vertical());
        masks.insert(MaskKey::Top, vertical);

        masks.insert(MaskKey::TopLeft, diagonal.flip_horizontal());
        masks.insert(MaskKey::BottomRight, diagonal.flip_vertical());
        masks.insert(MaskKey::BottomLeft, diagonal.flip_both());
        masks.insert(MaskKey::TopRight, diagonal);

        masks.insert(MaskKey::TopLeftCorner, corner.flip_horizontal());
        masks.insert(MaskKey::BottomRightCorner, corner.flip_vertical());
        masks.insert(MaskKey::BottomLeftCorner, corner.flip_both());
        masks.insert(MaskKey::TopRightCorner, corner);

        Self { masks }
    }

    pub fn get(&self, key: MaskKey) -> Option<&Mask> {
        self.masks.get(&key)
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn patterned(w: u32, h: u32) -> Mask {
        Mask::new(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([x as u8, y as u8, (x * 7 + y) as u8, (x * 31 + y * 5) as u8])
        }))
    }

    fn sources(size: u32) -> MaskSources {
        MaskSources {
            horizontal: patterned(size, size),
            vertical: patterned(size, size).flip_both(),
            diagonal: patterned(size, size).flip_vertical(),
            diagonal_with_neighbors: patterned(size, size).flip_horizontal(),
        }
    }

    #[test]
    fn test_flips_are_involutive() {
        let mask = patterned(5, 3);
        assert_eq!(mask.flip_horizontal().flip_horizontal(), mask);
        assert_eq!(mask.flip_vertical().flip_vertical(), mask);
        assert_eq!(mask.flip_both().flip_both(), mask);
    }

    #[test]
    fn test_flip_swaps_mirror_pixels() {
        let mask = patterned(5, 3);
        let h = mask.flip_horizontal();
        let v = mask.flip_vertical();
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(h.image().get_pixel(x, y), mask.image().get_pixel(4 - x, y));
                assert_eq!(v.image().get_pixel(x, y), mask.image().get_pixel(x, 2 - y));
            }
        }
    }

    #[test]
    fn test_library_has_all_twelve_keys() {
        let library = MaskLibrary::from_sources(sources(4), 4);
        assert_eq!(library.len(), 12);
        for key in MaskKey::ALL {
            assert!(library.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_right_mirrors_left() {
        let library = MaskLibrary::from_sources(sources(4), 4);
        let left = library.get(MaskKey::Left).unwrap();
        let right = library.get(MaskKey::Right).unwrap();
        assert_eq!(right.alpha(3, 1), left.alpha(0, 1));
        assert_eq!(&right.flip_horizontal(), left);
    }

    #[test]
    fn test_masks_are_fitted_to_cell_size() {
        let library = MaskLibrary::from_sources(sources(8), 4);
        let mask = library.get(MaskKey::TopLeftCorner).unwrap();
        assert_eq!((mask.width(), mask.height()), (4, 4));
    }

    #[test]
    fn test_missing_mask_directory_is_configuration_error() {
        let err = MaskLibrary::load(Path::new("no/such/masks"), 32).unwrap_err();
        assert!(err.is_fatal_for_run());
    }
}
