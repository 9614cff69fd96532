//! Color conversion between packed pixels and JPEG components.
//!
//! RGB<->YCbCr uses the JFIF equations in 16-bit fixed point with the same
//! rounding as libjpeg, so output matches libjpeg-turbo's accurate path.

use crate::pixel_format::PixelFormat;

const SCALE_BITS: u32 = 16;
const ONE_HALF: i32 = 1 << (SCALE_BITS - 1);
const CBCR_OFFSET: i32 = 128 << SCALE_BITS;

const FIX_0_29900: i32 = 19595;
const FIX_0_58700: i32 = 38470;
const FIX_0_11400: i32 = 7471;
const FIX_0_16874: i32 = 11059;
const FIX_0_33126: i32 = 21709;
const FIX_0_50000: i32 = 32768;
const FIX_0_41869: i32 = 27439;
const FIX_0_08131: i32 = 5329;
const FIX_1_40200: i32 = 91881;
const FIX_1_77200: i32 = 116130;
const FIX_0_34414: i32 = 22554;
const FIX_0_71414: i32 = 46802;

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline]
pub fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    ((FIX_0_29900 * r + FIX_0_58700 * g + FIX_0_11400 * b + ONE_HALF) >> SCALE_BITS) as u8
}

#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (ri, gi, bi) = (r as i32, g as i32, b as i32);
    let cb = (-FIX_0_16874 * ri - FIX_0_33126 * gi + FIX_0_50000 * bi + CBCR_OFFSET + ONE_HALF - 1) >> SCALE_BITS;
    let cr = (FIX_0_50000 * ri - FIX_0_41869 * gi - FIX_0_08131 * bi + CBCR_OFFSET + ONE_HALF - 1) >> SCALE_BITS;
    (rgb_to_luma(r, g, b), clamp(cb), clamp(cr))
}

#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as i32;
    let cb = cb as i32 - 128;
    let cr = cr as i32 - 128;
    let r = y + ((FIX_1_40200 * cr + ONE_HALF) >> SCALE_BITS);
    let g = y + ((-FIX_0_34414 * cb - FIX_0_71414 * cr + ONE_HALF) >> SCALE_BITS);
    let b = y + ((FIX_1_77200 * cb + ONE_HALF) >> SCALE_BITS);
    (clamp(r), clamp(g), clamp(b))
}

/// CMYK to YCCK (Adobe transform 2): the inverted CMY channels go through
/// the YCbCr transform, K is kept.
#[inline]
pub fn cmyk_to_ycck(c: u8, m: u8, y: u8, k: u8) -> [u8; 4] {
    let (luma, cb, cr) = rgb_to_ycbcr(255 - c, 255 - m, 255 - y);
    [luma, cb, cr, k]
}

#[inline]
pub fn ycck_to_cmyk(y: u8, cb: u8, cr: u8, k: u8) -> [u8; 4] {
    let (r, g, b) = ycbcr_to_rgb(y, cb, cr);
    [255 - r, 255 - g, 255 - b, k]
}

/// Reads red, green and blue from one packed pixel. Gray pixels replicate.
#[inline]
pub fn unpack_rgb(format: PixelFormat, pixel: &[u8]) -> (u8, u8, u8) {
    match (format.red_offset(), format.green_offset(), format.blue_offset()) {
        (Some(r), Some(g), Some(b)) => (pixel[r], pixel[g], pixel[b]),
        _ => (pixel[0], pixel[0], pixel[0]),
    }
}

/// Writes red, green and blue into one packed pixel, filling the alpha or
/// padding byte with 0xFF. Gray formats receive the luma of the color.
#[inline]
pub fn pack_rgb(format: PixelFormat, pixel: &mut [u8], r: u8, g: u8, b: u8) {
    match (format.red_offset(), format.green_offset(), format.blue_offset()) {
        (Some(ro), Some(go), Some(bo)) => {
            pixel[ro] = r;
            pixel[go] = g;
            pixel[bo] = b;
            if let Some(filler) = format.filler_offset() {
                pixel[filler] = 0xFF;
            }
        }
        _ => pixel[0] = rgb_to_luma(r, g, b),
    }
}

/// Writes a gray level into one packed pixel of any non-CMYK format.
#[inline]
pub fn pack_gray(format: PixelFormat, pixel: &mut [u8], value: u8) {
    if format == PixelFormat::Gray {
        pixel[0] = value;
    } else {
        pack_rgb(format, pixel, value, value, value);
    }
}
