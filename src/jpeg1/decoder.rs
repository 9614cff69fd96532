//! Sequential Huffman JPEG decoder.
//!
//! Decoding runs in two stages: entropy decoding of every scan into a
//! [`CoefficientImage`], then pixel reconstruction (dequantization, inverse
//! DCT, upsampling and color conversion).

use crate::constants::MAXIMUM_SCAN_COUNT;
use crate::error::{JpegError, JpegWarning};
use crate::jpeg_marker_code::{JPEG_RESTART_MARKER_BASE, JPEG_RESTART_MARKER_RANGE, is_restart_marker};
use crate::jpeg_stream_reader::{JpegHeader, JpegStreamReader, MarkerSegment, ScanHeader};
use crate::jpeg1::bit_io::JpegBitReader;
use crate::jpeg1::coefficients::{Block, CoefficientImage};
use crate::jpeg1::color::{pack_gray, pack_rgb, ycbcr_to_rgb, ycck_to_cmyk};
use crate::jpeg1::dct::{BLOCK_DIM, InverseDct};
use crate::jpeg1::huffman::HuffmanTable;
use crate::jpeg1::quantization::{ZIGZAG_ORDER, dequantize_block};
use crate::jpeg1::sampling::{Plane, YuvPlanes, upsample};
use crate::options::DecodeOptions;
use crate::pixel_format::{ColorSpace, PixelFormat};
use tracing::{debug, warn};

pub struct Jpeg1Decoder<'a> {
    reader: JpegStreamReader<'a>,
    header: Option<JpegHeader>,
    warnings: Vec<JpegWarning>,
}

impl<'a> Jpeg1Decoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: JpegStreamReader::new(source),
            header: None,
            warnings: Vec::new(),
        }
    }

    /// Parses the stream up to the first scan. Repeated calls return the
    /// cached header.
    pub fn read_header(&mut self) -> Result<JpegHeader, JpegError> {
        if let Some(header) = &self.header {
            return Ok(header.clone());
        }
        self.reader.read_header()?;
        let header = self.reader.header()?;
        self.header = Some(header.clone());
        Ok(header)
    }

    /// Warnings raised so far, in order.
    pub fn warnings(&self) -> &[JpegWarning] {
        &self.warnings
    }

    /// APPn and COM segments seen so far.
    pub fn markers(&self) -> &[MarkerSegment] {
        self.reader.markers()
    }

    fn warn(&mut self, warning: JpegWarning, options: &DecodeOptions) -> Result<(), JpegError> {
        warn!(%warning, "corrupt JPEG data");
        self.warnings.push(warning);
        if options.stop_on_warning {
            return Err(warning.into());
        }
        Ok(())
    }

    /// Entropy-decodes every scan into quantized coefficients.
    pub fn read_coefficients(&mut self, options: &DecodeOptions) -> Result<CoefficientImage, JpegError> {
        let header = self.read_header()?;
        check_pixel_limit(&header, options.max_pixels)?;
        let mut image = CoefficientImage::new(
            header.width,
            header.height,
            header.color_space,
            &header.components,
            [None; 4],
        )?;

        let mut scan_count = 0usize;
        while let Some(scan) = self.reader.read_next_scan()? {
            scan_count += 1;
            if options.limit_scans && scan_count > MAXIMUM_SCAN_COUNT {
                return Err(JpegError::TooManyScans);
            }
            for scan_component in &scan.components {
                let slot = image.components[scan_component.component_index].info.quant_table_index as usize;
                if image.quantization_tables[slot].is_none() {
                    image.quantization_tables[slot] =
                        Some(self.reader.quantization_tables[slot].ok_or(JpegError::MissingQuantizationTable)?);
                }
            }

            let mut bits = JpegBitReader::new(self.reader.remaining_data());
            let scan_warnings = decode_scan(&mut bits, &self.reader, &scan, &mut image)?;
            self.reader.advance(bits.position());
            debug!(scan = scan_count, components = scan.components.len(), bytes = bits.position(), "decoded scan");
            for warning in scan_warnings {
                self.warn(warning, options)?;
            }
        }

        if self.reader.is_truncated() && !self.warnings.contains(&JpegWarning::PrematureEndOfData) {
            self.warn(JpegWarning::PrematureEndOfData, options)?;
        }
        Ok(image)
    }

    /// Decodes into `destination` with the given row pitch in bytes (0 means
    /// packed rows).
    pub fn decode(&mut self, options: &DecodeOptions, destination: &mut [u8], pitch: usize) -> Result<(), JpegError> {
        let header = self.read_header()?;
        let scaling = options.scaling.validate()?;
        if !header.color_space.converts_to(options.pixel_format) {
            return Err(JpegError::UnsupportedColorConversion);
        }
        let width = scaling.scale(header.width) as usize;
        let height = scaling.scale(header.height) as usize;
        let row_size = width * options.pixel_format.pixel_size();
        let pitch = if pitch == 0 { row_size } else { pitch };
        if pitch < row_size {
            return Err(JpegError::InvalidArgumentPitch);
        }
        if destination.len() < pitch * (height - 1) + row_size {
            return Err(JpegError::DestinationTooSmall);
        }

        let image = self.read_coefficients(options)?;
        image.check_integral_sampling()?;
        let planes = component_planes(&image, options)?;
        let (max_h, max_v) = (image.max_h_samp_factor(), image.max_v_samp_factor());
        let full: Vec<Plane> = planes
            .iter()
            .zip(&image.components)
            .map(|(plane, component)| {
                let h_ratio = max_h / component.info.h_samp_factor as usize;
                let v_ratio = max_v / component.info.v_samp_factor as usize;
                fit_plane(&upsample(plane, h_ratio, v_ratio, options.fast_upsample), width, height)
            })
            .collect();

        for y in 0..height {
            let out_y = if options.bottom_up { height - 1 - y } else { y };
            let row = &mut destination[out_y * pitch..out_y * pitch + row_size];
            convert_row(&full, y, image.color_space, options.pixel_format, row);
        }
        Ok(())
    }

    /// Decodes to planar YUV at the (scaled) component resolution.
    pub fn decode_to_yuv(&mut self, options: &DecodeOptions) -> Result<YuvPlanes, JpegError> {
        let header = self.read_header()?;
        let scaling = options.scaling.validate()?;
        if !matches!(header.color_space, ColorSpace::YCbCr | ColorSpace::Gray) {
            return Err(JpegError::UnsupportedColorConversion);
        }
        let subsampling = header.subsampling.ok_or(JpegError::InvalidSamplingFactor)?;
        let width = scaling.scale(header.width);
        let height = scaling.scale(header.height);

        let image = self.read_coefficients(options)?;
        let planes = component_planes(&image, options)?
            .iter()
            .enumerate()
            .map(|(component, plane)| {
                fit_plane(
                    plane,
                    YuvPlanes::plane_width(component, width, subsampling),
                    YuvPlanes::plane_height(component, height, subsampling),
                )
            })
            .collect();
        Ok(YuvPlanes {
            width,
            height,
            subsampling,
            planes,
        })
    }
}

fn check_pixel_limit(header: &JpegHeader, max_pixels: Option<u64>) -> Result<(), JpegError> {
    match max_pixels {
        Some(limit) if header.width as u64 * header.height as u64 > limit => Err(JpegError::ImageTooLarge),
        _ => Ok(()),
    }
}

/// Decodes the entropy-coded data of one scan. Recoverable corruption is
/// returned as warnings; decoding always runs to the end of the scan.
fn decode_scan(
    bits: &mut JpegBitReader,
    reader: &JpegStreamReader,
    scan: &ScanHeader,
    image: &mut CoefficientImage,
) -> Result<Vec<JpegWarning>, JpegError> {
    let mut tables: Vec<(&HuffmanTable, &HuffmanTable)> = Vec::with_capacity(scan.components.len());
    for scan_component in &scan.components {
        let dc = reader.huffman_tables_dc[scan_component.dc_table_dest as usize]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable)?;
        let ac = reader.huffman_tables_ac[scan_component.ac_table_dest as usize]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable)?;
        tables.push((dc, ac));
    }

    let interleaved = scan.components.len() > 1;
    let (units_wide, units_high) = if interleaved {
        (image.mcus_per_row(), image.mcu_rows())
    } else {
        let component = &image.components[scan.components[0].component_index];
        (component.width_in_blocks, component.height_in_blocks)
    };

    let mut warnings = Vec::new();
    let mut predictors = vec![0i32; scan.components.len()];
    let restart_interval = reader.restart_interval as usize;
    let mut next_restart = 0u32;

    for unit in 0..units_wide * units_high {
        if restart_interval > 0 && unit > 0 && unit % restart_interval == 0 {
            process_restart(bits, next_restart, &mut warnings);
            next_restart = (next_restart + 1) % JPEG_RESTART_MARKER_RANGE as u32;
            predictors.fill(0);
        }
        let (unit_x, unit_y) = (unit % units_wide, unit / units_wide);
        for (k, scan_component) in scan.components.iter().enumerate() {
            let component = &mut image.components[scan_component.component_index];
            let (dc, ac) = tables[k];
            if interleaved {
                let h = component.info.h_samp_factor as usize;
                let v = component.info.v_samp_factor as usize;
                for block_y in 0..v {
                    for block_x in 0..h {
                        let block = component.block_mut(unit_x * h + block_x, unit_y * v + block_y);
                        decode_block(bits, dc, ac, &mut predictors[k], block);
                    }
                }
            } else {
                decode_block(bits, dc, ac, &mut predictors[k], component.block_mut(unit_x, unit_y));
            }
        }
    }

    if bits.overrun() {
        warnings.push(JpegWarning::PrematureEndOfData);
    }
    if bits.corrupt() {
        warnings.push(JpegWarning::CorruptHuffmanCode);
    }
    // Corrupt data can end the scan early; resume at the next marker.
    if bits.skip_to_marker() > 0 {
        warnings.push(JpegWarning::ExtraneousBytesBeforeMarker);
    }
    Ok(warnings)
}

/// Moves past the RSTn marker expected at the end of a restart interval.
/// A wrong marker is consumed, a missing one is left in place so decoding
/// continues on zero bits.
fn process_restart(bits: &mut JpegBitReader, expected: u32, warnings: &mut Vec<JpegWarning>) {
    if bits.skip_to_marker() > 0 {
        warnings.push(JpegWarning::ExtraneousBytesBeforeMarker);
    }
    match bits.marker() {
        Some(code) if code == JPEG_RESTART_MARKER_BASE + expected as u8 => {
            bits.take_marker();
        }
        Some(code) if is_restart_marker(code) => {
            warnings.push(JpegWarning::RestartMarkerMismatch);
            bits.take_marker();
        }
        _ => warnings.push(JpegWarning::RestartMarkerMismatch),
    }
}

/// Decodes one 8x8 block (ISO/IEC 10918-1 F.2.2) into natural order.
fn decode_block(
    bits: &mut JpegBitReader,
    dc_table: &HuffmanTable,
    ac_table: &HuffmanTable,
    predictor: &mut i32,
    block: &mut Block,
) {
    *block = [0; BLOCK_DIM];
    let category = dc_table.decode(bits);
    *predictor = predictor.wrapping_add(bits.receive_extend(category));
    block[0] = (*predictor).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

    let mut k = 1;
    while k < BLOCK_DIM {
        let symbol = ac_table.decode(bits);
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;
        if size == 0 {
            if run != 15 {
                break;
            }
            k += 16;
            continue;
        }
        k += run;
        if k >= BLOCK_DIM {
            break;
        }
        block[ZIGZAG_ORDER[k]] = bits.receive_extend(size) as i16;
        k += 1;
    }
}

/// Reconstructs every component at its (scaled) resolution, cropped to the
/// visible area.
pub fn component_planes(image: &CoefficientImage, options: &DecodeOptions) -> Result<Vec<Plane>, JpegError> {
    let scaling = options.scaling.validate()?;
    let idct = InverseDct::new(options.dct_method, scaling.block_size())?;
    let size = idct.block_size();
    let (max_h, max_v) = (image.max_h_samp_factor(), image.max_v_samp_factor());

    let mut planes = Vec::with_capacity(image.components.len());
    for (index, component) in image.components.iter().enumerate() {
        let table = image.quantization_table(index)?;
        let mut plane = Plane::new(component.blocks_wide * size, component.blocks_high * size);
        let stride = plane.width;
        let mut dequantized = [0i32; BLOCK_DIM];
        for block_y in 0..component.blocks_high {
            for block_x in 0..component.blocks_wide {
                dequantize_block(component.block(block_x, block_y), table, &mut dequantized);
                let offset = block_y * size * stride + block_x * size;
                idct.transform(&dequantized, &mut plane.data[offset..], stride);
            }
        }

        let (h, v) = (component.info.h_samp_factor as u64, component.info.v_samp_factor as u64);
        let width = (image.width as u64 * h * size as u64).div_ceil(max_h as u64 * 8) as usize;
        let height = (image.height as u64 * v * size as u64).div_ceil(max_v as u64 * 8) as usize;
        planes.push(fit_plane(&plane, width, height));
    }
    Ok(planes)
}

/// Crops or edge-extends a plane to exactly `width`x`height`.
fn fit_plane(plane: &Plane, width: usize, height: usize) -> Plane {
    if plane.width == width && plane.height == height {
        plane.clone()
    } else if plane.width >= width && plane.height >= height {
        plane.cropped(width, height)
    } else {
        plane
            .cropped(plane.width.min(width), plane.height.min(height))
            .padded(width, height)
    }
}

fn convert_row(planes: &[Plane], y: usize, color_space: ColorSpace, format: PixelFormat, row: &mut [u8]) {
    let pixel_size = format.pixel_size();
    match color_space {
        ColorSpace::Gray => {
            for (pixel, &value) in row.chunks_exact_mut(pixel_size).zip(planes[0].row(y)) {
                pack_gray(format, pixel, value);
            }
        }
        ColorSpace::YCbCr => {
            let (luma, cb, cr) = (planes[0].row(y), planes[1].row(y), planes[2].row(y));
            for (x, pixel) in row.chunks_exact_mut(pixel_size).enumerate() {
                if format == PixelFormat::Gray {
                    pixel[0] = luma[x];
                } else {
                    let (r, g, b) = ycbcr_to_rgb(luma[x], cb[x], cr[x]);
                    pack_rgb(format, pixel, r, g, b);
                }
            }
        }
        ColorSpace::Rgb => {
            let (red, green, blue) = (planes[0].row(y), planes[1].row(y), planes[2].row(y));
            for (x, pixel) in row.chunks_exact_mut(pixel_size).enumerate() {
                pack_rgb(format, pixel, red[x], green[x], blue[x]);
            }
        }
        ColorSpace::Cmyk => {
            for (x, pixel) in row.chunks_exact_mut(pixel_size).enumerate() {
                for (channel, plane) in planes.iter().enumerate() {
                    pixel[channel] = plane.row(y)[x];
                }
            }
        }
        ColorSpace::Ycck => {
            let rows: Vec<&[u8]> = planes.iter().map(|plane| plane.row(y)).collect();
            for (x, pixel) in row.chunks_exact_mut(pixel_size).enumerate() {
                pixel.copy_from_slice(&ycck_to_cmyk(rows[0][x], rows[1][x], rows[2][x], rows[3][x]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg1::encoder::{Jpeg1Encoder, SourceImage};
    use crate::jpeg1::sampling::Subsampling;
    use crate::options::EncodeOptions;
    use test_log::test;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, 96]);
            }
        }
        pixels
    }

    fn encode(width: usize, height: usize, options: &EncodeOptions) -> Vec<u8> {
        let pixels = gradient(width, height);
        let source = SourceImage::packed(&pixels, width as u32, height as u32, 0, PixelFormat::Rgb).unwrap();
        Jpeg1Encoder::new(*options).encode_to_vec(&source).unwrap()
    }

    fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
        a.iter().zip(b).map(|(&x, &y)| (x as i32 - y as i32).abs() as f64).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn decodes_own_output() {
        let jpeg = encode(37, 21, &EncodeOptions { quality: 95, ..EncodeOptions::default() });
        let mut decoder = Jpeg1Decoder::new(&jpeg);
        let header = decoder.read_header().unwrap();
        assert_eq!((header.width, header.height), (37, 21));
        let mut pixels = vec![0u8; 37 * 21 * 3];
        decoder.decode(&DecodeOptions::default(), &mut pixels, 0).unwrap();
        assert!(mean_abs_diff(&pixels, &gradient(37, 21)) < 3.0);
        assert!(decoder.warnings().is_empty());
    }

    #[test]
    fn restart_intervals_are_followed() {
        let options = EncodeOptions {
            restart_interval: crate::options::RestartInterval::Mcus(1),
            subsampling: Subsampling::S420,
            ..EncodeOptions::default()
        };
        let jpeg = encode(40, 40, &options);
        let mut decoder = Jpeg1Decoder::new(&jpeg);
        let mut pixels = vec![0u8; 40 * 40 * 3];
        decoder.decode(&DecodeOptions::default(), &mut pixels, 0).unwrap();
        assert!(decoder.warnings().is_empty());
        assert!(mean_abs_diff(&pixels, &gradient(40, 40)) < 4.0);
    }

    #[test]
    fn truncated_data_warns_and_stops_on_request() {
        let jpeg = encode(64, 64, &EncodeOptions::default());
        let sos = jpeg.windows(2).position(|w| w == [0xFF, 0xDA]).unwrap();
        let scan_start = sos + 2 + u16::from_be_bytes([jpeg[sos + 2], jpeg[sos + 3]]) as usize;
        // Cut inside the entropy-coded data.
        let truncated = &jpeg[..scan_start + (jpeg.len() - scan_start) / 2];
        let mut pixels = vec![0u8; 64 * 64 * 3];

        let mut decoder = Jpeg1Decoder::new(truncated);
        decoder.decode(&DecodeOptions::default(), &mut pixels, 0).unwrap();
        assert!(decoder.warnings().contains(&JpegWarning::PrematureEndOfData));

        let strict = DecodeOptions {
            stop_on_warning: true,
            ..DecodeOptions::default()
        };
        let mut decoder = Jpeg1Decoder::new(truncated);
        assert_eq!(
            decoder.decode(&strict, &mut pixels, 0),
            Err(JpegError::PrematureEndOfData)
        );
    }

    #[test]
    fn pitch_and_pixel_limit_are_checked() {
        let jpeg = encode(16, 16, &EncodeOptions::default());
        let mut pixels = vec![0u8; 16 * 16 * 3];
        assert_eq!(
            Jpeg1Decoder::new(&jpeg).decode(&DecodeOptions::default(), &mut pixels, 10),
            Err(JpegError::InvalidArgumentPitch)
        );
        assert_eq!(
            Jpeg1Decoder::new(&jpeg).decode(&DecodeOptions::default(), &mut pixels[..100], 0),
            Err(JpegError::DestinationTooSmall)
        );
        let limited = DecodeOptions {
            max_pixels: Some(100),
            ..DecodeOptions::default()
        };
        assert_eq!(
            Jpeg1Decoder::new(&jpeg).read_coefficients(&limited).unwrap_err(),
            JpegError::ImageTooLarge
        );
        let cmyk = DecodeOptions::default().with_pixel_format(PixelFormat::Cmyk);
        assert_eq!(
            Jpeg1Decoder::new(&jpeg).decode(&cmyk, &mut pixels, 0),
            Err(JpegError::UnsupportedColorConversion)
        );
    }

    #[test]
    fn yuv_planes_follow_subsampling() {
        let jpeg = encode(
            35,
            19,
            &EncodeOptions {
                subsampling: Subsampling::S420,
                ..EncodeOptions::default()
            },
        );
        let yuv = Jpeg1Decoder::new(&jpeg).decode_to_yuv(&DecodeOptions::default()).unwrap();
        assert_eq!(yuv.planes.len(), 3);
        assert_eq!((yuv.planes[0].width, yuv.planes[0].height), (36, 20));
        assert_eq!((yuv.planes[1].width, yuv.planes[1].height), (18, 10));
        yuv.validate().unwrap();
    }

    #[test]
    fn corrupt_restart_marker_is_a_warning() {
        let options = EncodeOptions {
            restart_interval: crate::options::RestartInterval::Mcus(2),
            subsampling: Subsampling::S444,
            ..EncodeOptions::default()
        };
        let mut jpeg = encode(64, 8, &options);
        let rst = jpeg
            .windows(2)
            .position(|w| w[0] == 0xFF && w[1] == 0xD0)
            .unwrap();
        jpeg[rst + 1] = 0xD3;
        let mut decoder = Jpeg1Decoder::new(&jpeg);
        decoder.read_coefficients(&DecodeOptions::default()).unwrap();
        assert!(decoder.warnings().contains(&JpegWarning::RestartMarkerMismatch));
    }
}
