//! Discrete Cosine Transform (DCT) implementation for JPEG 1.
//!
//! The integer transforms are the accurate ("islow") Loeffler-Ligtenberg-Moschytz
//! factorisation with 13-bit fixed-point constants. The float transforms use a
//! separable cosine basis, which also yields the reduced and enlarged inverse
//! transforms needed for N/8 scaled decoding.

use std::f32::consts::{FRAC_1_SQRT_2, PI};
use std::sync::OnceLock;

use crate::error::JpegError;

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;
pub const MAXIMUM_SCALED_BLOCK_SIZE: usize = 16;

const CONST_BITS: u32 = 13;
const PASS1_BITS: u32 = 2;

const FIX_0_298631336: i64 = 2446;
const FIX_0_390180644: i64 = 3196;
const FIX_0_541196100: i64 = 4433;
const FIX_0_765366865: i64 = 6270;
const FIX_0_899976223: i64 = 7373;
const FIX_1_175875602: i64 = 9633;
const FIX_1_501321110: i64 = 12299;
const FIX_1_847759065: i64 = 15137;
const FIX_1_961570560: i64 = 16069;
const FIX_2_053119869: i64 = 16819;
const FIX_2_562915447: i64 = 20995;
const FIX_3_072711026: i64 = 25172;

/// Selects between the accurate integer and the faster float transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DctMethod {
    #[default]
    IntegerSlow,
    Float,
}

#[inline]
fn descale(x: i64, n: u32) -> i64 {
    (x + (1 << (n - 1))) >> n
}

/// Odd-part butterfly shared by the forward and inverse transforms.
/// Returns the products for inputs (in7, in5, in3, in1) ordering of jfdctint.
#[inline]
fn odd_part(t0: i64, t1: i64, t2: i64, t3: i64) -> [i64; 4] {
    let z1 = t0 + t3;
    let z2 = t1 + t2;
    let z3 = t0 + t2;
    let z4 = t1 + t3;
    let z5 = (z3 + z4) * FIX_1_175875602;

    let t0 = t0 * FIX_0_298631336;
    let t1 = t1 * FIX_2_053119869;
    let t2 = t2 * FIX_3_072711026;
    let t3 = t3 * FIX_1_501321110;
    let z1 = -z1 * FIX_0_899976223;
    let z2 = -z2 * FIX_2_562915447;
    let z3 = -z3 * FIX_1_961570560 + z5;
    let z4 = -z4 * FIX_0_390180644 + z5;

    [t0 + z1 + z3, t1 + z2 + z4, t2 + z2 + z3, t3 + z1 + z4]
}

/// Accurate integer forward DCT of level-shifted samples. The output is
/// scaled up by 8 relative to the ISO/IEC 10918-1 definition.
pub fn fdct_islow(samples: &[i32; BLOCK_DIM], output: &mut [i32; BLOCK_DIM]) {
    let mut workspace = [0i64; BLOCK_DIM];

    // Pass 1: rows, results scaled up by 2^PASS1_BITS.
    for row in 0..BLOCK_SIZE {
        let d = |i: usize| samples[row * BLOCK_SIZE + i] as i64;
        let ws = &mut workspace[row * BLOCK_SIZE..(row + 1) * BLOCK_SIZE];
        transform_fdct_line(
            [d(0), d(1), d(2), d(3), d(4), d(5), d(6), d(7)],
            ws,
            |v| v << PASS1_BITS,
            CONST_BITS - PASS1_BITS,
        );
    }

    // Pass 2: columns, removing the PASS1_BITS scaling.
    let mut column = [0i64; BLOCK_SIZE];
    for col in 0..BLOCK_SIZE {
        let d = |i: usize| workspace[i * BLOCK_SIZE + col];
        transform_fdct_line(
            [d(0), d(1), d(2), d(3), d(4), d(5), d(6), d(7)],
            &mut column,
            |v| descale(v, PASS1_BITS),
            CONST_BITS + PASS1_BITS,
        );
        for (i, &value) in column.iter().enumerate() {
            output[i * BLOCK_SIZE + col] = value as i32;
        }
    }
}

fn transform_fdct_line(
    d: [i64; 8],
    out: &mut [i64],
    scale_even: impl Fn(i64) -> i64,
    shift: u32,
) {
    let tmp0 = d[0] + d[7];
    let tmp7 = d[0] - d[7];
    let tmp1 = d[1] + d[6];
    let tmp6 = d[1] - d[6];
    let tmp2 = d[2] + d[5];
    let tmp5 = d[2] - d[5];
    let tmp3 = d[3] + d[4];
    let tmp4 = d[3] - d[4];

    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    out[0] = scale_even(tmp10 + tmp11);
    out[4] = scale_even(tmp10 - tmp11);

    let z1 = (tmp12 + tmp13) * FIX_0_541196100;
    out[2] = descale(z1 + tmp13 * FIX_0_765366865, shift);
    out[6] = descale(z1 - tmp12 * FIX_1_847759065, shift);

    let [o7, o5, o3, o1] = odd_part(tmp4, tmp5, tmp6, tmp7);
    out[7] = descale(o7, shift);
    out[5] = descale(o5, shift);
    out[3] = descale(o3, shift);
    out[1] = descale(o1, shift);
}

/// One 8-point inverse transform. `d` holds dequantized coefficients.
fn transform_idct_line(d: [i64; 8], shift: u32) -> [i64; 8] {
    let z2 = d[2];
    let z3 = d[6];
    let z1 = (z2 + z3) * FIX_0_541196100;
    let tmp2 = z1 - z3 * FIX_1_847759065;
    let tmp3 = z1 + z2 * FIX_0_765366865;

    let tmp0 = (d[0] + d[4]) << CONST_BITS;
    let tmp1 = (d[0] - d[4]) << CONST_BITS;

    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    let [o0, o1, o2, o3] = odd_part(d[7], d[5], d[3], d[1]);

    [
        descale(tmp10 + o3, shift),
        descale(tmp11 + o2, shift),
        descale(tmp12 + o1, shift),
        descale(tmp13 + o0, shift),
        descale(tmp13 - o0, shift),
        descale(tmp12 - o1, shift),
        descale(tmp11 - o2, shift),
        descale(tmp10 - o3, shift),
    ]
}

#[inline]
fn clamp_sample(value: i64) -> u8 {
    (value + 128).clamp(0, 255) as u8
}

/// Accurate integer inverse DCT. Writes an 8x8 block of samples into
/// `output` with the given row stride.
pub fn idct_islow(coefficients: &[i32; BLOCK_DIM], output: &mut [u8], stride: usize) {
    let mut workspace = [0i64; BLOCK_DIM];

    // Pass 1: columns, results scaled up by 2^PASS1_BITS.
    for col in 0..BLOCK_SIZE {
        let c = |i: usize| coefficients[i * BLOCK_SIZE + col] as i64;
        let values = if (1..BLOCK_SIZE).all(|i| c(i) == 0) {
            [c(0) << PASS1_BITS; BLOCK_SIZE]
        } else {
            transform_idct_line(
                [c(0), c(1), c(2), c(3), c(4), c(5), c(6), c(7)],
                CONST_BITS - PASS1_BITS,
            )
        };
        for (row, value) in values.into_iter().enumerate() {
            workspace[row * BLOCK_SIZE + col] = value;
        }
    }

    // Pass 2: rows, removing PASS1_BITS and the factor 8.
    for row in 0..BLOCK_SIZE {
        let ws = &workspace[row * BLOCK_SIZE..(row + 1) * BLOCK_SIZE];
        let out = &mut output[row * stride..row * stride + BLOCK_SIZE];
        if ws[1..].iter().all(|&v| v == 0) {
            out.fill(clamp_sample(descale(ws[0], PASS1_BITS + 3)));
            continue;
        }
        let values = transform_idct_line(
            [ws[0], ws[1], ws[2], ws[3], ws[4], ws[5], ws[6], ws[7]],
            CONST_BITS + PASS1_BITS + 3,
        );
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = clamp_sample(value);
        }
    }
}

/// Cosine basis `C(u)/2 * cos((2x+1)uπ/2N)` laid out as `[x * 8 + u]`.
fn cosine_basis(size: usize) -> Vec<f32> {
    let mut basis = vec![0.0f32; size * BLOCK_SIZE];
    for x in 0..size {
        for u in 0..BLOCK_SIZE {
            let scale = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
            let angle = ((2 * x + 1) * u) as f32 * PI / (2 * size) as f32;
            basis[x * BLOCK_SIZE + u] = 0.5 * scale * angle.cos();
        }
    }
    basis
}

fn basis_8x8() -> &'static [f32] {
    static BASIS: OnceLock<Vec<f32>> = OnceLock::new();
    BASIS.get_or_init(|| cosine_basis(BLOCK_SIZE))
}

/// Float forward DCT, scaled like [`fdct_islow`].
pub fn fdct_float(samples: &[i32; BLOCK_DIM], output: &mut [i32; BLOCK_DIM]) {
    let basis = basis_8x8();
    let mut rows = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            rows[y * BLOCK_SIZE + u] = (0..BLOCK_SIZE)
                .map(|x| samples[y * BLOCK_SIZE + x] as f32 * basis[x * BLOCK_SIZE + u])
                .sum();
        }
    }
    for v in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            let value: f32 = (0..BLOCK_SIZE)
                .map(|y| rows[y * BLOCK_SIZE + u] * basis[y * BLOCK_SIZE + v])
                .sum();
            output[v * BLOCK_SIZE + u] = (value * 8.0).round() as i32;
        }
    }
}

pub fn forward_dct(method: DctMethod, samples: &[i32; BLOCK_DIM], output: &mut [i32; BLOCK_DIM]) {
    match method {
        DctMethod::IntegerSlow => fdct_islow(samples, output),
        DctMethod::Float => fdct_float(samples, output),
    }
}

/// Float inverse DCT producing `size`x`size` samples from an 8x8 block.
///
/// Sizes below 8 discard the frequencies the smaller grid cannot represent;
/// sizes above 8 resample the full basis.
#[derive(Debug, Clone)]
pub struct ScaledIdct {
    size: usize,
    basis: Vec<f32>,
}

impl ScaledIdct {
    pub fn new(size: usize) -> Result<Self, JpegError> {
        if !(1..=MAXIMUM_SCALED_BLOCK_SIZE).contains(&size) {
            return Err(JpegError::InvalidArgumentScalingFactor);
        }
        Ok(Self {
            size,
            basis: cosine_basis(size),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn transform(&self, coefficients: &[i32; BLOCK_DIM], output: &mut [u8], stride: usize) {
        let size = self.size;
        let used = size.min(BLOCK_SIZE);
        let mut rows = [0.0f32; BLOCK_SIZE * MAXIMUM_SCALED_BLOCK_SIZE];
        for v in 0..used {
            for x in 0..size {
                rows[v * MAXIMUM_SCALED_BLOCK_SIZE + x] = (0..used)
                    .map(|u| coefficients[v * BLOCK_SIZE + u] as f32 * self.basis[x * BLOCK_SIZE + u])
                    .sum();
            }
        }
        for y in 0..size {
            let out = &mut output[y * stride..y * stride + size];
            for (x, slot) in out.iter_mut().enumerate() {
                let value: f32 = (0..used)
                    .map(|v| rows[v * MAXIMUM_SCALED_BLOCK_SIZE + x] * self.basis[y * BLOCK_SIZE + v])
                    .sum();
                *slot = (value.round() as i64 + 128).clamp(0, 255) as u8;
            }
        }
    }
}

/// Inverse transform chosen once per decode from the DCT method and the
/// output block size.
#[derive(Debug, Clone)]
pub enum InverseDct {
    IntegerSlow,
    Float(ScaledIdct),
}

impl InverseDct {
    pub fn new(method: DctMethod, block_size: usize) -> Result<Self, JpegError> {
        if method == DctMethod::IntegerSlow && block_size == BLOCK_SIZE {
            Ok(Self::IntegerSlow)
        } else {
            ScaledIdct::new(block_size).map(Self::Float)
        }
    }

    pub fn block_size(&self) -> usize {
        match self {
            Self::IntegerSlow => BLOCK_SIZE,
            Self::Float(idct) => idct.size(),
        }
    }

    pub fn transform(&self, coefficients: &[i32; BLOCK_DIM], output: &mut [u8], stride: usize) {
        match self {
            Self::IntegerSlow => idct_islow(coefficients, output, stride),
            Self::Float(idct) => idct.transform(coefficients, output, stride),
        }
    }
}
