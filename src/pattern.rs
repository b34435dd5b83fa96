// Software test pattern
//
// Fills a mapped, linearly tiled RGBA8-class image with a grid of opaque
// white lines on a transparent background. Rows are addressed through the
// image's row pitch, which may be larger than width * 4.

use thiserror::Error;

/// Bytes per pixel of every canvas format we accept
pub const BYTES_PER_PIXEL: usize = 4;

/// Opaque white in any 8-bit-per-channel 4-component format
pub const GRID_COLOR: u32 = 0xffff_ffff;

/// Distance between grid lines used by the demo
pub const DEFAULT_GRID_SPACING: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("row pitch {pitch} is smaller than one row of pixels ({min} bytes)")]
    PitchTooSmall { pitch: usize, min: usize },

    #[error("pixel buffer holds {len} bytes, pattern needs {needed}")]
    BufferTooSmall { len: usize, needed: usize },

    #[error("grid spacing must be non-zero")]
    ZeroSpacing,
}

/// Returns true when pixel (x, y) lies on a grid line
#[inline]
pub fn is_grid_pixel(x: u32, y: u32, spacing: u32) -> bool {
    x % spacing == 0 || y % spacing == 0
}

/// Minimum number of bytes a `width` x `height` image with `row_pitch` occupies.
///
/// The last row only needs `width * 4` bytes, drivers are free to trim the
/// trailing padding.
pub fn required_len(width: u32, height: u32, row_pitch: usize) -> usize {
    if height == 0 {
        return 0;
    }
    row_pitch * (height as usize - 1) + width as usize * BYTES_PER_PIXEL
}

/// Draw the grid into `pixels`.
///
/// Every pixel with `x % spacing == 0 || y % spacing == 0` becomes
/// [`GRID_COLOR`], every other pixel becomes zero. Bytes between the end of
/// a row and the next row pitch boundary are left untouched.
pub fn draw_grid(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    spacing: u32,
) -> Result<(), PatternError> {
    if spacing == 0 {
        return Err(PatternError::ZeroSpacing);
    }

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    if row_pitch < row_bytes {
        return Err(PatternError::PitchTooSmall {
            pitch: row_pitch,
            min: row_bytes,
        });
    }

    let needed = required_len(width, height, row_pitch);
    if pixels.len() < needed {
        return Err(PatternError::BufferTooSmall {
            len: pixels.len(),
            needed,
        });
    }

    if row_bytes == 0 {
        return Ok(());
    }

    let white = GRID_COLOR.to_ne_bytes();
    let clear = 0u32.to_ne_bytes();

    for (y, row) in pixels.chunks_mut(row_pitch).take(height as usize).enumerate() {
        let y = y as u32;
        for (x, texel) in row[..row_bytes].chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let color = if is_grid_pixel(x as u32, y, spacing) { white } else { clear };
            texel.copy_from_slice(&color);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(buf: &[u8], pitch: usize, x: u32, y: u32) -> u32 {
        let at = y as usize * pitch + x as usize * BYTES_PER_PIXEL;
        u32::from_ne_bytes(buf[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn full_hd_grid() {
        let (w, h) = (1920, 1080);
        let pitch = w as usize * 4;
        let mut buf = vec![0xAB; required_len(w, h, pitch)];

        draw_grid(&mut buf, w, h, pitch, DEFAULT_GRID_SPACING).unwrap();

        assert_eq!(pixel(&buf, pitch, 0, 0), GRID_COLOR);
        assert_eq!(pixel(&buf, pitch, 50, 50), 0);
        for x in (0..w).step_by(100) {
            assert_eq!(pixel(&buf, pitch, x, 537), GRID_COLOR, "column {x}");
        }
        for y in (0..h).step_by(100) {
            assert_eq!(pixel(&buf, pitch, 1234, y), GRID_COLOR, "row {y}");
        }
        assert_eq!(pixel(&buf, pitch, 1919, 1079), 0);
    }

    #[test]
    fn exactly_grid_pixels_are_white() {
        let (w, h) = (257, 203);
        let pitch = w as usize * 4;
        let mut buf = vec![0x55; required_len(w, h, pitch)];

        draw_grid(&mut buf, w, h, pitch, 100).unwrap();

        for y in 0..h {
            for x in 0..w {
                let expected = if x % 100 == 0 || y % 100 == 0 { GRID_COLOR } else { 0 };
                assert_eq!(pixel(&buf, pitch, x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn padding_past_row_is_untouched() {
        let (w, h) = (150, 120);
        let pitch = 640; // 600 bytes of pixels + 40 bytes padding
        let mut buf = vec![0x7F; required_len(w, h, pitch)];

        draw_grid(&mut buf, w, h, pitch, 100).unwrap();

        for y in 0..(h as usize - 1) {
            let padding = &buf[y * pitch + 600..(y + 1) * pitch];
            assert!(padding.iter().all(|&b| b == 0x7F), "row {y} padding clobbered");
        }
        assert_eq!(pixel(&buf, pitch, 100, 7), GRID_COLOR);
        assert_eq!(pixel(&buf, pitch, 101, 7), 0);
        assert_eq!(pixel(&buf, pitch, 3, 100), GRID_COLOR);
    }

    #[test]
    fn rejects_short_pitch() {
        let mut buf = vec![0; 4096];
        assert_eq!(
            draw_grid(&mut buf, 64, 4, 255, 100),
            Err(PatternError::PitchTooSmall { pitch: 255, min: 256 })
        );
    }

    #[test]
    fn rejects_short_buffer() {
        let mut buf = vec![0; 100];
        assert_eq!(
            draw_grid(&mut buf, 10, 3, 40, 100),
            Err(PatternError::BufferTooSmall { len: 100, needed: 120 })
        );
    }

    #[test]
    fn last_row_may_omit_padding() {
        let mut buf = vec![0; required_len(10, 2, 64)];
        assert_eq!(buf.len(), 104);
        draw_grid(&mut buf, 10, 2, 64, 100).unwrap();
        assert_eq!(pixel(&buf, 64, 0, 1), GRID_COLOR);
        assert_eq!(pixel(&buf, 64, 9, 1), 0);
    }

    #[test]
    fn zero_spacing_is_an_error() {
        let mut buf = vec![0; 16];
        assert_eq!(draw_grid(&mut buf, 2, 2, 8, 0), Err(PatternError::ZeroSpacing));
    }

    #[test]
    fn empty_extent_is_a_no_op() {
        let mut buf: Vec<u8> = Vec::new();
        draw_grid(&mut buf, 0, 0, 0, 100).unwrap();
    }
}
