//! Perceptual-hash view hierarchy cache.
//!
//! Hierarchy dumps are the slowest part of an observation, but most
//! observations land on a screen the engine has already seen. The cache
//! keys entries by screenshot: a perceptual hash narrows candidates
//! cheaply, then a pixel-level compare confirms the match before a stored
//! hierarchy is reused.

use std::collections::VecDeque;

use image::{ImageFormat, RgbaImage};
use image_hasher::{HashAlg, HasherConfig, ImageHash};

use droidpilot_core::element::UiElement;
use droidpilot_core::prelude::*;

use crate::config::CacheConfig;

/// Why a lookup did or did not produce a stored hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A stored entry matched; the dump was skipped.
    Hit,
    /// No entry within perceptual hash range.
    MissHash,
    /// A candidate hashed close but failed the pixel compare.
    MissPixels,
    /// The cache is disabled or empty.
    MissEmpty,
}

impl CacheOutcome {
    pub fn is_hit(self) -> bool {
        matches!(self, CacheOutcome::Hit)
    }
}

struct CacheEntry {
    hash: ImageHash,
    pixels: RgbaImage,
    hierarchy: UiElement,
}

/// Most-recently-used cache of screen -> hierarchy associations.
pub struct HierarchyCache {
    entries: VecDeque<CacheEntry>,
    config: CacheConfig,
}

impl HierarchyCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up a hierarchy for the given screenshot.
    ///
    /// `strict` switches to the tighter pixel threshold used while text
    /// is being typed, where a one-character difference must not match.
    pub fn lookup(&mut self, png: &[u8], strict: bool) -> (CacheOutcome, Option<UiElement>) {
        if !self.config.enabled || self.entries.is_empty() {
            return (CacheOutcome::MissEmpty, None);
        }
        let Ok(img) = decode_png(png) else {
            return (CacheOutcome::MissEmpty, None);
        };
        let hash = hash_image(&img);

        let mut candidates: Vec<(usize, u32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, entry.hash.dist(&hash)))
            .filter(|(_, dist)| *dist <= self.config.hash_distance_max)
            .collect();
        if candidates.is_empty() {
            return (CacheOutcome::MissHash, None);
        }
        // Flat screens hash alike, so several entries can tie on
        // distance; the pixel compare decides which, if any, really
        // matches. Stable sort keeps ties in most-recently-used order.
        candidates.sort_by_key(|(_, dist)| *dist);

        let threshold = if strict {
            self.config.typed_text_pixel_match_threshold
        } else {
            self.config.pixel_match_threshold
        };
        for (index, _) in candidates {
            let fraction = pixel_match_fraction(&self.entries[index].pixels, &img);
            if fraction < threshold {
                debug!(fraction, threshold, "cache candidate failed pixel compare");
                continue;
            }
            // Keep the freshest match at the front.
            if let Some(entry) = self.entries.remove(index) {
                let hierarchy = entry.hierarchy.clone();
                self.entries.push_front(entry);
                return (CacheOutcome::Hit, Some(hierarchy));
            }
        }
        (CacheOutcome::MissPixels, None)
    }

    /// Store a screenshot -> hierarchy association.
    ///
    /// Callers only insert dumps that produced a tree; a screen that
    /// yielded no nodes must be re-dumped next time, not remembered.
    pub fn insert(&mut self, png: &[u8], hierarchy: &UiElement) {
        if !self.config.enabled {
            return;
        }
        let Ok(pixels) = decode_png(png) else {
            return;
        };
        let hash = hash_image(&pixels);
        self.entries.push_front(CacheEntry {
            hash,
            pixels,
            hierarchy: hierarchy.clone(),
        });
        while self.entries.len() > self.config.max_entries {
            self.entries.pop_back();
        }
    }
}

/// Compute the base64 perceptual hash of a PNG screenshot, as recorded on
/// observations.
pub fn screenshot_hash(png: &[u8]) -> Result<String> {
    let img = decode_png(png)?;
    Ok(hash_image(&img).to_base64())
}

fn decode_png(png: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|e| Error::image(format!("cannot decode screenshot: {e}")))?;
    Ok(img.to_rgba8())
}

fn hash_image(img: &RgbaImage) -> ImageHash {
    // Gradient hash on an 8x8 grid. Small enough to compare in
    // nanoseconds, coarse enough that scrolling or dialogs move it well
    // past the distance cutoff.
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(8, 8)
        .to_hasher();
    hasher.hash_image(img)
}

/// Fraction of pixels that match between two decoded screenshots.
///
/// A small per-channel tolerance absorbs compression and dithering noise
/// without letting real content changes through. Size mismatch is a
/// definitive non-match.
pub fn pixel_match_fraction(a: &RgbaImage, b: &RgbaImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let total = (a.width() as u64) * (a.height() as u64);
    if total == 0 {
        return 0.0;
    }
    let matching = a
        .pixels()
        .zip(b.pixels())
        .filter(|(pa, pb)| {
            pa.0.iter()
                .zip(pb.0.iter())
                .all(|(ca, cb)| ca.abs_diff(*cb) <= 2)
        })
        .count() as u64;
    matching as f64 / total as f64
}
