use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// The eraser always writes this color, regardless of the configured empty fill.
pub const ERASER_COLOR: [u8; 3] = [255, 255, 255];

/// The server-authoritative raster: a contiguous `width * height * 3` byte
/// buffer plus the hash and timestamp of its last mutation.
///
/// The Applier is the only component that ever mutates `bitmap` in place;
/// everywhere else in the system a `Canvas` is a read-only snapshot.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub bitmap: Vec<u8>,
    pub hash: String,
    pub last_updated: DateTime<Utc>,
}

impl Canvas {
    /// Build an all-`fill` canvas of the given dimensions, stamped with the
    /// current time and a freshly computed hash.
    pub fn blank(width: u32, height: u32, fill: [u8; 3]) -> Self {
        let mut bitmap = vec![0u8; width as usize * height as usize * 3];
        if fill != [0, 0, 0] {
            for chunk in bitmap.chunks_exact_mut(3) {
                chunk.copy_from_slice(&fill);
            }
        }
        let hash = hash_bitmap(&bitmap);
        Self {
            width,
            height,
            bitmap,
            hash,
            last_updated: Utc::now(),
        }
    }

    /// Byte offset of pixel (x, y) in `bitmap`. Caller must have already
    /// bounds-checked x < width and y < height.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    #[inline]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Overwrite the pixel at (x, y). Caller must have bounds-checked first.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let offset = self.offset(x, y);
        self.bitmap[offset..offset + 3].copy_from_slice(&rgb);
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.offset(x, y);
        [self.bitmap[offset], self.bitmap[offset + 1], self.bitmap[offset + 2]]
    }

    /// Recompute `hash` from the current `bitmap` and bump `last_updated`.
    pub fn rehash(&mut self) {
        self.hash = hash_bitmap(&self.bitmap);
        self.last_updated = Utc::now();
    }
}

/// Hex-encoded SHA-256 of raw (uncompressed) bitmap bytes, lowercase.
pub fn hash_bitmap(bitmap: &[u8]) -> String {
    let digest = Sha256::digest(bitmap);
    hex::encode(digest)
}

/// Parse a `#RRGGBB` string (case-insensitive) into RGB bytes.
pub fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    if color.len() != 7 || !color.starts_with('#') {
        return None;
    }
    let bytes = color.as_bytes();
    if !bytes[1..].iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&color[1..3], 16).ok()?;
    let g = u8::from_str_radix(&color[3..5], 16).ok()?;
    let b = u8::from_str_radix(&color[5..7], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_canvas_is_uniform_and_hashed() {
        let canvas = Canvas::blank(4, 2, [0, 0, 0]);
        assert_eq!(canvas.bitmap.len(), 4 * 2 * 3);
        assert!(canvas.bitmap.iter().all(|&b| b == 0));
        assert_eq!(canvas.hash, hash_bitmap(&canvas.bitmap));
    }

    #[test]
    fn set_pixel_updates_only_that_pixel() {
        let mut canvas = Canvas::blank(3, 3, [0, 0, 0]);
        canvas.set_pixel(1, 1, [255, 0, 0]);
        assert_eq!(canvas.get_pixel(1, 1), [255, 0, 0]);
        assert_eq!(canvas.get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(canvas.get_pixel(2, 2), [0, 0, 0]);
    }

    #[test]
    fn parse_hex_color_accepts_mixed_case() {
        assert_eq!(parse_hex_color("#FF0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("#ff0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(parse_hex_color("FF0000"), None);
        assert_eq!(parse_hex_color("#FF00"), None);
    }
}
