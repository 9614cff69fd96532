//! Chroma subsampling: the TurboJPEG subsampling modes, sample planes, and
//! the down/upsampling filters.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::JpegError;
use crate::jpeg1::dct::BLOCK_SIZE;

/// Chroma subsampling mode, numbered like TurboJPEG's `TJSAMP_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Subsampling {
    S444 = 0,
    #[default]
    S422 = 1,
    S420 = 2,
    Gray = 3,
    S440 = 4,
    S411 = 5,
    S441 = 6,
}

const COLOR_MODES: [Subsampling; 6] = [
    Subsampling::S444,
    Subsampling::S422,
    Subsampling::S420,
    Subsampling::S440,
    Subsampling::S411,
    Subsampling::S441,
];

impl Subsampling {
    pub fn from_code(code: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(code).map_err(|_| JpegError::InvalidArgumentSubsampling)
    }

    /// Horizontal and vertical sampling factors of the luma component; the
    /// chroma components use 1x1.
    pub const fn luma_factors(self) -> (u8, u8) {
        match self {
            Self::S444 | Self::Gray => (1, 1),
            Self::S422 => (2, 1),
            Self::S420 => (2, 2),
            Self::S440 => (1, 2),
            Self::S411 => (4, 1),
            Self::S441 => (1, 4),
        }
    }

    /// MCU width in pixels.
    pub const fn mcu_width(self) -> usize {
        self.luma_factors().0 as usize * BLOCK_SIZE
    }

    /// MCU height in pixels.
    pub const fn mcu_height(self) -> usize {
        self.luma_factors().1 as usize * BLOCK_SIZE
    }

    /// Identifies the mode from per-component sampling factors, or `None` for
    /// layouts TurboJPEG cannot name.
    pub fn from_factors(factors: &[(u8, u8)]) -> Option<Self> {
        match factors {
            [_] => Some(Self::Gray),
            [luma, chroma @ ..] if factors.len() == 3 || factors.len() == 4 => {
                let (cb, cr) = (chroma[0], chroma[1]);
                if cb != cr || cb.0 == 0 || cb.1 == 0 {
                    return None;
                }
                if factors.len() == 4 && chroma[2] != *luma {
                    return None;
                }
                if luma.0 % cb.0 != 0 || luma.1 % cb.1 != 0 {
                    return None;
                }
                let ratio = (luma.0 / cb.0, luma.1 / cb.1);
                COLOR_MODES.into_iter().find(|mode| mode.luma_factors() == ratio)
            }
            _ => None,
        }
    }
}

/// One 8-bit sample plane, rows packed without padding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Result<Self, JpegError> {
        if data.len() != width * height {
            return Err(JpegError::InvalidArgument);
        }
        Ok(Self { width, height, data })
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Copy grown to `width`x`height` by replicating the last column and row.
    pub fn padded(&self, width: usize, height: usize) -> Plane {
        let mut out = Plane::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let src = self.row(y.min(self.height - 1));
            let dst = out.row_mut(y);
            let copied = self.width.min(width);
            dst[..copied].copy_from_slice(&src[..copied]);
            let last = src[self.width - 1];
            dst[copied..].fill(last);
        }
        out
    }

    /// Top-left `width`x`height` region.
    pub fn cropped(&self, width: usize, height: usize) -> Plane {
        if width == self.width && height <= self.height {
            let mut data = self.data.clone();
            data.truncate(width * height);
            return Plane { width, height, data };
        }
        let mut out = Plane::new(width, height);
        for y in 0..height {
            out.row_mut(y).copy_from_slice(&self.row(y)[..width]);
        }
        out
    }
}

/// Planar YUV image: one luma plane plus, unless gray, two chroma planes at
/// the resolution implied by the subsampling mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvPlanes {
    pub width: u32,
    pub height: u32,
    pub subsampling: Subsampling,
    pub planes: Vec<Plane>,
}

impl YuvPlanes {
    /// Width of plane `component` for an image `width` pixels wide, following
    /// TurboJPEG's `tjPlaneWidth`.
    pub fn plane_width(component: usize, width: u32, subsampling: Subsampling) -> usize {
        let (h, _) = subsampling.luma_factors();
        let padded = (width as usize).div_ceil(h as usize) * h as usize;
        if component == 0 { padded } else { padded / h as usize }
    }

    pub fn plane_height(component: usize, height: u32, subsampling: Subsampling) -> usize {
        let (_, v) = subsampling.luma_factors();
        let padded = (height as usize).div_ceil(v as usize) * v as usize;
        if component == 0 { padded } else { padded / v as usize }
    }

    pub fn plane_count(subsampling: Subsampling) -> usize {
        if subsampling == Subsampling::Gray { 1 } else { 3 }
    }

    /// Checks plane count and sizes against the image geometry.
    pub fn validate(&self) -> Result<(), JpegError> {
        if self.width == 0 {
            return Err(JpegError::InvalidArgumentWidth);
        }
        if self.height == 0 {
            return Err(JpegError::InvalidArgumentHeight);
        }
        if self.planes.len() != Self::plane_count(self.subsampling) {
            return Err(JpegError::InvalidArgument);
        }
        for (component, plane) in self.planes.iter().enumerate() {
            if plane.width != Self::plane_width(component, self.width, self.subsampling)
                || plane.height != Self::plane_height(component, self.height, self.subsampling)
                || plane.data.len() != plane.width * plane.height
            {
                return Err(JpegError::InvalidArgument);
            }
        }
        Ok(())
    }

    /// Total bytes of all planes, TurboJPEG's `tjBufSizeYUV` with no row padding.
    pub fn buffer_size(width: u32, height: u32, subsampling: Subsampling) -> usize {
        (0..Self::plane_count(subsampling))
            .map(|c| Self::plane_width(c, width, subsampling) * Self::plane_height(c, height, subsampling))
            .sum()
    }
}

/// Box-filter downsampling. The plane dimensions must be multiples of the
/// ratios.
pub fn downsample(plane: &Plane, h_ratio: usize, v_ratio: usize) -> Plane {
    if h_ratio == 1 && v_ratio == 1 {
        return plane.clone();
    }
    let width = plane.width / h_ratio;
    let height = plane.height / v_ratio;
    let count = (h_ratio * v_ratio) as u32;
    let mut out = Plane::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            for dy in 0..v_ratio {
                let row = plane.row(y * v_ratio + dy);
                sum += row[x * h_ratio..(x + 1) * h_ratio].iter().map(|&s| s as u32).sum::<u32>();
            }
            // Alternating bias as in libjpeg avoids a systematic drift.
            let bias = if (x + y) % 2 == 0 { count / 2 - 1 } else { count / 2 };
            out.data[y * width + x] = ((sum + bias) / count) as u8;
        }
    }
    out
}

/// Upsamples a plane by integral ratios. The "fancy" triangle filter is used
/// for 2x1, 1x2 and 2x2 ratios unless `fast` is set; everything else
/// replicates.
pub fn upsample(plane: &Plane, h_ratio: usize, v_ratio: usize, fast: bool) -> Plane {
    match (h_ratio, v_ratio, fast) {
        (1, 1, _) => plane.clone(),
        (2, 1, false) if plane.width > 1 => upsample_h2v1_fancy(plane),
        (1, 2, false) => upsample_h1v2_fancy(plane),
        (2, 2, false) if plane.width > 1 => upsample_h2v2_fancy(plane),
        _ => upsample_replicate(plane, h_ratio, v_ratio),
    }
}

fn upsample_replicate(plane: &Plane, h_ratio: usize, v_ratio: usize) -> Plane {
    let mut out = Plane::new(plane.width * h_ratio, plane.height * v_ratio);
    for y in 0..plane.height {
        let src = plane.row(y);
        let first = y * v_ratio;
        {
            let dst = out.row_mut(first);
            for (x, &sample) in src.iter().enumerate() {
                dst[x * h_ratio..(x + 1) * h_ratio].fill(sample);
            }
        }
        for dy in 1..v_ratio {
            let width = out.width;
            out.data.copy_within(first * width..(first + 1) * width, (first + dy) * width);
        }
    }
    out
}

fn upsample_h2v1_fancy(plane: &Plane) -> Plane {
    let mut out = Plane::new(plane.width * 2, plane.height);
    for y in 0..plane.height {
        let src = plane.row(y);
        let dst = out.row_mut(y);
        let n = src.len();
        dst[0] = src[0];
        dst[1] = ((src[0] as u32 * 3 + src[1] as u32 + 2) >> 2) as u8;
        for i in 1..n - 1 {
            let this = src[i] as u32 * 3;
            dst[2 * i] = ((this + src[i - 1] as u32 + 1) >> 2) as u8;
            dst[2 * i + 1] = ((this + src[i + 1] as u32 + 2) >> 2) as u8;
        }
        dst[2 * n - 2] = ((src[n - 1] as u32 * 3 + src[n - 2] as u32 + 1) >> 2) as u8;
        dst[2 * n - 1] = src[n - 1];
    }
    out
}

// Each output row weighs its source row 3:1 against the nearer neighbor row.
fn upsample_h1v2_fancy(plane: &Plane) -> Plane {
    let mut out = Plane::new(plane.width, plane.height * 2);
    for y in 0..plane.height {
        let this_row = plane.row(y);
        let neighbors = [(y.saturating_sub(1), 1u32), ((y + 1).min(plane.height - 1), 2u32)];
        for (half, &(neighbor, bias)) in neighbors.iter().enumerate() {
            let other = plane.row(neighbor);
            let dst = out.row_mut(2 * y + half);
            for (slot, (&a, &b)) in dst.iter_mut().zip(this_row.iter().zip(other)) {
                *slot = ((a as u32 * 3 + b as u32 + bias) >> 2) as u8;
            }
        }
    }
    out
}

fn upsample_h2v2_fancy(plane: &Plane) -> Plane {
    let mut out = Plane::new(plane.width * 2, plane.height * 2);
    let n = plane.width;
    let mut column_sums = vec![0u32; n];
    for y in 0..plane.height {
        let this_row = plane.row(y);
        let neighbors = [y.saturating_sub(1), (y + 1).min(plane.height - 1)];
        for (half, &neighbor) in neighbors.iter().enumerate() {
            let other = plane.row(neighbor);
            for (sum, (&a, &b)) in column_sums.iter_mut().zip(this_row.iter().zip(other)) {
                *sum = a as u32 * 3 + b as u32;
            }
            let dst = out.row_mut(2 * y + half);
            dst[0] = ((column_sums[0] * 4 + 8) >> 4) as u8;
            dst[1] = ((column_sums[0] * 3 + column_sums[1] + 7) >> 4) as u8;
            for i in 1..n - 1 {
                let this = column_sums[i] * 3;
                dst[2 * i] = ((this + column_sums[i - 1] + 8) >> 4) as u8;
                dst[2 * i + 1] = ((this + column_sums[i + 1] + 7) >> 4) as u8;
            }
            dst[2 * n - 2] = ((column_sums[n - 1] * 3 + column_sums[n - 2] + 8) >> 4) as u8;
            dst[2 * n - 1] = ((column_sums[n - 1] * 4 + 7) >> 4) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_modes_from_factors() {
        assert_eq!(Subsampling::from_factors(&[(2, 2)]), Some(Subsampling::Gray));
        assert_eq!(
            Subsampling::from_factors(&[(2, 2), (1, 1), (1, 1)]),
            Some(Subsampling::S420)
        );
        assert_eq!(
            Subsampling::from_factors(&[(2, 1), (1, 1), (1, 1)]),
            Some(Subsampling::S422)
        );
        assert_eq!(
            Subsampling::from_factors(&[(2, 2), (2, 2), (2, 2)]),
            Some(Subsampling::S444)
        );
        assert_eq!(
            Subsampling::from_factors(&[(1, 4), (1, 1), (1, 1), (1, 4)]),
            Some(Subsampling::S441)
        );
        assert_eq!(Subsampling::from_factors(&[(2, 2), (1, 1), (2, 1)]), None);
        assert_eq!(Subsampling::from_factors(&[(3, 1), (2, 1), (2, 1)]), None);
    }

    #[test]
    fn plane_sizes_follow_turbojpeg() {
        assert_eq!(YuvPlanes::plane_width(0, 5, Subsampling::S420), 6);
        assert_eq!(YuvPlanes::plane_width(1, 5, Subsampling::S420), 3);
        assert_eq!(YuvPlanes::plane_height(2, 7, Subsampling::S420), 4);
        assert_eq!(YuvPlanes::plane_width(1, 9, Subsampling::S411), 3);
        assert_eq!(YuvPlanes::buffer_size(4, 4, Subsampling::S420), 16 + 4 + 4);
        assert_eq!(YuvPlanes::buffer_size(4, 4, Subsampling::Gray), 16);
    }

    #[test]
    fn padding_replicates_edges() {
        let plane = Plane::from_vec(2, 2, vec![1, 2, 3, 4]).unwrap();
        let padded = plane.padded(3, 3);
        assert_eq!(padded.data, vec![1, 2, 2, 3, 4, 4, 3, 4, 4]);
        assert_eq!(padded.cropped(2, 2), plane);
    }

    #[test]
    fn flat_planes_survive_resampling() {
        let plane = Plane::from_vec(4, 4, vec![77; 16]).unwrap();
        for (h, v) in [(2, 1), (2, 2), (1, 2), (4, 1)] {
            let down = downsample(&plane, h, v);
            assert!(down.data.iter().all(|&s| s == 77));
            for fast in [false, true] {
                let up = upsample(&down, h, v, fast);
                assert_eq!((up.width, up.height), (4, 4));
                assert!(up.data.iter().all(|&s| s == 77));
            }
        }
    }

    #[test]
    fn fancy_upsampling_interpolates() {
        let plane = Plane::from_vec(2, 1, vec![0, 100]).unwrap();
        let up = upsample(&plane, 2, 1, false);
        assert_eq!(up.data, vec![0, 25, 75, 100]);
        let fast = upsample(&plane, 2, 1, true);
        assert_eq!(fast.data, vec![0, 0, 100, 100]);
    }

    #[test]
    fn vertical_fancy_upsampling_interpolates() {
        let plane = Plane::from_vec(2, 2, vec![0, 40, 100, 40]).unwrap();
        let up = upsample(&plane, 1, 2, false);
        assert_eq!((up.width, up.height), (2, 4));
        assert_eq!(up.data, vec![0, 40, 25, 40, 75, 40, 100, 40]);
        let fast = upsample(&plane, 1, 2, true);
        assert_eq!(fast.data, vec![0, 40, 0, 40, 100, 40, 100, 40]);
    }
}
