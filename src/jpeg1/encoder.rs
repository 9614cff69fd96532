//! Baseline JPEG encoder.
//!
//! Pixels (or planar YUV) are turned into a [`CoefficientImage`], which
//! [`write_coefficients`] then entropy-codes. Lossless transforms feed their
//! own coefficient images through the same writer.

use crate::constants::{HEADER_SIZE_BOUND, JFIF_IDENTIFIER, ADOBE_IDENTIFIER, MAXIMUM_DIMENSION, TABLE_SLOT_COUNT};
use crate::error::JpegError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::{MarkerSegment, ScanComponent};
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::jpeg1::bit_io::JpegBitWriter;
use crate::jpeg1::coefficients::{Block, CoefficientImage, ComponentCoefficients, ComponentInfo};
use crate::jpeg1::color::{cmyk_to_ycck, rgb_to_luma, rgb_to_ycbcr, unpack_rgb};
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE, DctMethod, forward_dct};
use crate::jpeg1::huffman::{HuffmanTable, encode_magnitude, magnitude_category};
use crate::jpeg1::quantization::{QuantizationTable, ZIGZAG_ORDER, quantize_block};
use crate::jpeg1::sampling::{Plane, Subsampling, YuvPlanes, downsample};
use crate::options::{EncodeOptions, RestartInterval};
use crate::pixel_format::{ColorSpace, PixelFormat};
use tracing::{debug, trace};

// Largest magnitude categories an 8-bit baseline stream may carry.
const MAXIMUM_DC_CATEGORY: u8 = 11;
const MAXIMUM_AC_CATEGORY: u8 = 10;

/// Packed pixel input borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct SourceImage<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    pitch: usize,
    pixel_format: PixelFormat,
}

impl<'a> SourceImage<'a> {
    /// `pitch` is the distance between rows in bytes; 0 means packed rows.
    pub fn packed(data: &'a [u8], width: u32, height: u32, pitch: usize, pixel_format: PixelFormat) -> Result<Self, JpegError> {
        if width == 0 || width > MAXIMUM_DIMENSION {
            return Err(JpegError::InvalidArgumentWidth);
        }
        if height == 0 || height > MAXIMUM_DIMENSION {
            return Err(JpegError::InvalidArgumentHeight);
        }
        let row_size = width as usize * pixel_format.pixel_size();
        let pitch = if pitch == 0 { row_size } else { pitch };
        if pitch < row_size {
            return Err(JpegError::InvalidArgumentPitch);
        }
        if data.len() < pitch * (height as usize - 1) + row_size {
            return Err(JpegError::SourceTooSmall);
        }
        Ok(Self {
            data,
            width,
            height,
            pitch,
            pixel_format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn row(&self, y: usize) -> &'a [u8] {
        let data = self.data;
        let start = y * self.pitch;
        &data[start..start + self.width as usize * self.pixel_format.pixel_size()]
    }
}

/// Settings for entropy-coding an existing coefficient image.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoefficientWriteOptions<'m> {
    pub optimize_huffman: bool,
    pub restart_interval: RestartInterval,
    /// APPn/COM segments copied after the JFIF/Adobe header.
    pub markers: &'m [MarkerSegment],
}

pub struct Jpeg1Encoder {
    options: EncodeOptions,
}

impl Jpeg1Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    fn color_space_for(&self, pixel_format: PixelFormat) -> Result<ColorSpace, JpegError> {
        let gray = self.options.is_gray() || pixel_format == PixelFormat::Gray;
        match (pixel_format, gray) {
            (PixelFormat::Cmyk, true) => Err(JpegError::UnsupportedColorConversion),
            (PixelFormat::Cmyk, false) => Ok(ColorSpace::Ycck),
            (_, true) => Ok(ColorSpace::Gray),
            (_, false) => Ok(ColorSpace::YCbCr),
        }
    }

    fn quantization_tables(&self, color_space: ColorSpace) -> Result<[Option<QuantizationTable>; TABLE_SLOT_COUNT], JpegError> {
        let mut tables = [None; TABLE_SLOT_COUNT];
        tables[0] = Some(QuantizationTable::luminance(self.options.quality)?);
        if color_space != ColorSpace::Gray {
            tables[1] = Some(QuantizationTable::chrominance(self.options.quality)?);
        }
        Ok(tables)
    }

    /// Converts, downsamples and quantizes packed pixels.
    pub fn coefficients_from_pixels(&self, source: &SourceImage) -> Result<CoefficientImage, JpegError> {
        self.options.validate()?;
        let color_space = self.color_space_for(source.pixel_format)?;
        let subsampling = if color_space == ColorSpace::Gray {
            Subsampling::Gray
        } else {
            self.options.subsampling
        };
        let mut image = CoefficientImage::new(
            source.width,
            source.height,
            color_space,
            &component_layout(color_space, subsampling),
            self.quantization_tables(color_space)?,
        )?;

        let planes = color_convert(source, color_space, self.options.bottom_up);
        let grid_width = image.mcus_per_row() * image.max_h_samp_factor() * BLOCK_SIZE;
        let grid_height = image.mcu_rows() * image.max_v_samp_factor() * BLOCK_SIZE;
        let (max_h, max_v) = (image.max_h_samp_factor(), image.max_v_samp_factor());
        for (index, plane) in planes.iter().enumerate() {
            let table = *image.quantization_table(index)?;
            let component = &mut image.components[index];
            let h_ratio = max_h / component.info.h_samp_factor as usize;
            let v_ratio = max_v / component.info.v_samp_factor as usize;
            let sampled = downsample(&plane.padded(grid_width, grid_height), h_ratio, v_ratio);
            quantize_plane(&sampled, component, &table, self.options.dct_method);
        }
        debug!(
            width = source.width,
            height = source.height,
            ?color_space,
            ?subsampling,
            quality = self.options.quality,
            "quantized image"
        );
        Ok(image)
    }

    /// Quantizes planar YUV. The subsampling of the planes wins over the
    /// encoder option.
    pub fn coefficients_from_yuv(&self, yuv: &YuvPlanes) -> Result<CoefficientImage, JpegError> {
        self.options.validate()?;
        yuv.validate()?;
        let color_space = if yuv.subsampling == Subsampling::Gray {
            ColorSpace::Gray
        } else {
            ColorSpace::YCbCr
        };
        let mut image = CoefficientImage::new(
            yuv.width,
            yuv.height,
            color_space,
            &component_layout(color_space, yuv.subsampling),
            self.quantization_tables(color_space)?,
        )?;
        for (index, plane) in yuv.planes.iter().enumerate() {
            let table = *image.quantization_table(index)?;
            let component = &mut image.components[index];
            let padded = plane.padded(component.blocks_wide * BLOCK_SIZE, component.blocks_high * BLOCK_SIZE);
            quantize_plane(&padded, component, &table, self.options.dct_method);
        }
        Ok(image)
    }

    fn write_options(&self) -> CoefficientWriteOptions<'static> {
        CoefficientWriteOptions {
            optimize_huffman: self.options.optimize_huffman,
            restart_interval: self.options.restart_interval,
            markers: &[],
        }
    }

    /// Encodes into `destination` and returns the number of bytes written.
    pub fn encode(&self, source: &SourceImage, destination: &mut [u8]) -> Result<usize, JpegError> {
        let image = self.coefficients_from_pixels(source)?;
        write_coefficients(&image, &self.write_options(), destination)
    }

    pub fn encode_to_vec(&self, source: &SourceImage) -> Result<Vec<u8>, JpegError> {
        let image = self.coefficients_from_pixels(source)?;
        write_coefficients_to_vec(&image, &self.write_options())
    }

    pub fn encode_yuv(&self, yuv: &YuvPlanes, destination: &mut [u8]) -> Result<usize, JpegError> {
        let image = self.coefficients_from_yuv(yuv)?;
        write_coefficients(&image, &self.write_options(), destination)
    }

    pub fn encode_yuv_to_vec(&self, yuv: &YuvPlanes) -> Result<Vec<u8>, JpegError> {
        let image = self.coefficients_from_yuv(yuv)?;
        write_coefficients_to_vec(&image, &self.write_options())
    }
}

/// Component ids, sampling factors and table slots libjpeg uses for each
/// color space.
pub fn component_layout(color_space: ColorSpace, subsampling: Subsampling) -> Vec<ComponentInfo> {
    let (h, v) = subsampling.luma_factors();
    let luma = |id| ComponentInfo {
        id,
        h_samp_factor: h,
        v_samp_factor: v,
        quant_table_index: 0,
    };
    let chroma = |id| ComponentInfo {
        id,
        h_samp_factor: 1,
        v_samp_factor: 1,
        quant_table_index: 1,
    };
    match color_space {
        ColorSpace::Gray => vec![ComponentInfo {
            id: 1,
            h_samp_factor: 1,
            v_samp_factor: 1,
            quant_table_index: 0,
        }],
        ColorSpace::Cmyk | ColorSpace::Ycck => vec![luma(1), chroma(2), chroma(3), luma(4)],
        ColorSpace::YCbCr | ColorSpace::Rgb => vec![luma(1), chroma(2), chroma(3)],
    }
}

/// Full-resolution component planes for the target color space.
fn color_convert(source: &SourceImage, color_space: ColorSpace, bottom_up: bool) -> Vec<Plane> {
    let (width, height) = (source.width as usize, source.height as usize);
    let mut planes = vec![Plane::new(width, height); color_space.component_count()];
    let format = source.pixel_format;
    let pixel_size = format.pixel_size();

    for y in 0..height {
        let row = source.row(if bottom_up { height - 1 - y } else { y });
        for (x, pixel) in row.chunks_exact(pixel_size).enumerate() {
            let offset = y * width + x;
            match color_space {
                ColorSpace::Gray => {
                    planes[0].data[offset] = if format == PixelFormat::Gray {
                        pixel[0]
                    } else {
                        let (r, g, b) = unpack_rgb(format, pixel);
                        rgb_to_luma(r, g, b)
                    };
                }
                ColorSpace::Ycck | ColorSpace::Cmyk => {
                    let ycck = cmyk_to_ycck(pixel[0], pixel[1], pixel[2], pixel[3]);
                    for (plane, value) in planes.iter_mut().zip(ycck) {
                        plane.data[offset] = value;
                    }
                }
                ColorSpace::YCbCr | ColorSpace::Rgb => {
                    let (r, g, b) = unpack_rgb(format, pixel);
                    let (luma, cb, cr) = rgb_to_ycbcr(r, g, b);
                    planes[0].data[offset] = luma;
                    planes[1].data[offset] = cb;
                    planes[2].data[offset] = cr;
                }
            }
        }
    }
    planes
}

/// Forward DCT and quantization of a plane covering the component's whole
/// block grid.
fn quantize_plane(plane: &Plane, component: &mut ComponentCoefficients, table: &QuantizationTable, method: DctMethod) {
    let mut samples = [0i32; BLOCK_DIM];
    let mut transformed = [0i32; BLOCK_DIM];
    for block_y in 0..component.blocks_high {
        for block_x in 0..component.blocks_wide {
            for y in 0..BLOCK_SIZE {
                let row = &plane.row(block_y * BLOCK_SIZE + y)[block_x * BLOCK_SIZE..(block_x + 1) * BLOCK_SIZE];
                for (x, &sample) in row.iter().enumerate() {
                    samples[y * BLOCK_SIZE + x] = sample as i32 - 128;
                }
            }
            forward_dct(method, &samples, &mut transformed);
            quantize_block(&transformed, table, component.block_mut(block_x, block_y));
        }
    }
}

/// TurboJPEG's `tjBufSize` worst-case bound for a baseline JPEG.
pub fn max_encoded_size(width: u32, height: u32, subsampling: Subsampling) -> usize {
    let mcu_width = subsampling.mcu_width();
    let mcu_height = subsampling.mcu_height();
    let chroma_factor = if subsampling == Subsampling::Gray {
        0
    } else {
        4 * BLOCK_DIM / (mcu_width * mcu_height)
    };
    (width as usize).div_ceil(mcu_width) * mcu_width * (height as usize).div_ceil(mcu_height) * mcu_height * (2 + chroma_factor)
        + HEADER_SIZE_BOUND
}

/// Entropy-codes a coefficient image into a growing buffer.
pub fn write_coefficients_to_vec(image: &CoefficientImage, options: &CoefficientWriteOptions) -> Result<Vec<u8>, JpegError> {
    let subsampling = image.subsampling().unwrap_or(Subsampling::S444);
    let markers_size: usize = options.markers.iter().map(|m| m.data.len() + 4).sum();
    let mut capacity = max_encoded_size(image.width, image.height, subsampling) * image.components.len().max(3) / 3
        + markers_size;
    loop {
        let mut buffer = vec![0u8; capacity];
        match write_coefficients(image, options, &mut buffer) {
            Ok(length) => {
                buffer.truncate(length);
                return Ok(buffer);
            }
            Err(JpegError::DestinationTooSmall) => {
                trace!(capacity, "output buffer too small, growing");
                capacity *= 2;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Huffman table slot for a component: luma-like components use slot 0.
fn huffman_slot(color_space: ColorSpace, component: usize) -> u8 {
    match (color_space, component) {
        (_, 0) => 0,
        (ColorSpace::Cmyk | ColorSpace::Ycck, 3) => 0,
        _ => 1,
    }
}

/// Entropy-codes a coefficient image as a baseline JPEG: one interleaved scan
/// when the MCU allows it, otherwise one scan per component.
pub fn write_coefficients(
    image: &CoefficientImage,
    options: &CoefficientWriteOptions,
    destination: &mut [u8],
) -> Result<usize, JpegError> {
    let infos = image.component_infos();
    let mut writer = JpegStreamWriter::new(destination);
    writer.write_start_of_image()?;

    let adobe_transform = image.color_space.adobe_transform();
    match adobe_transform {
        None => writer.write_jfif_app0()?,
        Some(transform) => writer.write_adobe_app14(transform)?,
    }
    for segment in options.markers {
        let duplicate = match segment.marker {
            JpegMarkerCode::ApplicationData0 => adobe_transform.is_none() && segment.data.starts_with(JFIF_IDENTIFIER),
            JpegMarkerCode::ApplicationData14 => adobe_transform.is_some() && segment.data.starts_with(ADOBE_IDENTIFIER),
            _ => false,
        };
        if !duplicate {
            writer.write_marker_segment(segment.marker, &segment.data)?;
        }
    }

    let mut written = [false; TABLE_SLOT_COUNT];
    let mut extended = false;
    for index in 0..image.components.len() {
        let slot = infos[index].quant_table_index as usize;
        if !written[slot] {
            let table = image.quantization_table(index)?;
            extended |= table.is_16_bit();
            writer.write_dqt(slot as u8, table)?;
            written[slot] = true;
        }
    }
    writer.write_start_of_frame_segment(extended, image.width, image.height, &infos)?;

    let scans: Vec<Vec<usize>> = if image.components.len() == 1 || image.fits_interleaved_scan() {
        vec![(0..image.components.len()).collect()]
    } else {
        (0..image.components.len()).map(|c| vec![c]).collect()
    };

    if !options.optimize_huffman {
        let mut slots: Vec<u8> = (0..image.components.len())
            .map(|c| huffman_slot(image.color_space, c))
            .collect();
        slots.sort_unstable();
        slots.dedup();
        for slot in slots {
            let (dc, ac) = standard_tables(slot);
            writer.write_dht(0, slot, &dc)?;
            writer.write_dht(1, slot, &ac)?;
        }
    }

    let mut current_interval = 0u16;
    for scan in &scans {
        let units_per_row = if scan.len() > 1 {
            image.mcus_per_row()
        } else {
            image.components[scan[0]].width_in_blocks
        };
        let interval = match options.restart_interval {
            RestartInterval::None => 0,
            RestartInterval::Mcus(count) => count,
            RestartInterval::Rows(rows) => (rows as usize * units_per_row).min(u16::MAX as usize) as u16,
        };
        if interval != current_interval {
            writer.write_dri(interval)?;
            current_interval = interval;
        }

        let slots: Vec<u8> = scan.iter().map(|&c| huffman_slot(image.color_space, c)).collect();
        let mut tables: Vec<(HuffmanTable, HuffmanTable)> = Vec::with_capacity(scan.len());
        if options.optimize_huffman {
            let mut statistics = SymbolStatistics::new(&slots);
            emit_scan(image, scan, interval as usize, &mut statistics)?;
            let mut emitted = [false; TABLE_SLOT_COUNT];
            for &slot in &slots {
                let slot_index = slot as usize;
                let dc = HuffmanTable::optimal(&statistics.dc[slot_index])?;
                let ac = HuffmanTable::optimal(&statistics.ac[slot_index])?;
                if !emitted[slot_index] {
                    writer.write_dht(0, slot, &dc)?;
                    writer.write_dht(1, slot, &ac)?;
                    emitted[slot_index] = true;
                }
                tables.push((dc, ac));
            }
        } else {
            tables.extend(slots.iter().map(|&slot| standard_tables(slot)));
        }

        let selectors: Vec<ScanComponent> = scan
            .iter()
            .zip(&slots)
            .map(|(&component_index, &slot)| ScanComponent {
                component_index,
                dc_table_dest: slot,
                ac_table_dest: slot,
            })
            .collect();
        writer.write_sos_segment(&infos, &selectors)?;

        let mut sink = HuffmanSink {
            bits: JpegBitWriter::new(writer.remaining_slice()),
            tables: &tables,
        };
        emit_scan(image, scan, interval as usize, &mut sink)?;
        sink.bits.flush()?;
        let length = sink.bits.len();
        writer.advance(length);
    }

    writer.write_end_of_image()?;
    debug!(bytes = writer.len(), scans = scans.len(), optimized = options.optimize_huffman, "wrote JPEG");
    Ok(writer.len())
}

fn standard_tables(slot: u8) -> (HuffmanTable, HuffmanTable) {
    if slot == 0 {
        (HuffmanTable::standard_luminance_dc(), HuffmanTable::standard_luminance_ac())
    } else {
        (HuffmanTable::standard_chrominance_dc(), HuffmanTable::standard_chrominance_ac())
    }
}

/// Receiver of the Huffman symbols of a scan. `position` is the index of the
/// component within the scan.
trait SymbolSink {
    fn dc(&mut self, position: usize, category: u8, bits: u32) -> Result<(), JpegError>;
    fn ac(&mut self, position: usize, symbol: u8, bits: u32) -> Result<(), JpegError>;
    fn restart(&mut self, index: u32) -> Result<(), JpegError>;
}

/// Symbol frequencies per table slot, gathered in a dry run of the scan.
struct SymbolStatistics {
    // Table slot of each scan position.
    slots: Vec<u8>,
    dc: [[u32; 256]; TABLE_SLOT_COUNT],
    ac: [[u32; 256]; TABLE_SLOT_COUNT],
}

impl SymbolStatistics {
    fn new(slots: &[u8]) -> Self {
        Self {
            slots: slots.to_vec(),
            dc: [[0; 256]; TABLE_SLOT_COUNT],
            ac: [[0; 256]; TABLE_SLOT_COUNT],
        }
    }
}

impl SymbolSink for SymbolStatistics {
    fn dc(&mut self, position: usize, category: u8, _bits: u32) -> Result<(), JpegError> {
        self.dc[self.slots[position] as usize][category as usize] += 1;
        Ok(())
    }

    fn ac(&mut self, position: usize, symbol: u8, _bits: u32) -> Result<(), JpegError> {
        self.ac[self.slots[position] as usize][symbol as usize] += 1;
        Ok(())
    }

    fn restart(&mut self, _index: u32) -> Result<(), JpegError> {
        Ok(())
    }
}

struct HuffmanSink<'w, 't> {
    bits: JpegBitWriter<'w>,
    tables: &'t [(HuffmanTable, HuffmanTable)],
}

impl SymbolSink for HuffmanSink<'_, '_> {
    fn dc(&mut self, position: usize, category: u8, bits: u32) -> Result<(), JpegError> {
        self.tables[position].0.encode(&mut self.bits, category)?;
        self.bits.write_bits(bits, category as u32)
    }

    fn ac(&mut self, position: usize, symbol: u8, bits: u32) -> Result<(), JpegError> {
        self.tables[position].1.encode(&mut self.bits, symbol)?;
        self.bits.write_bits(bits, (symbol & 0x0F) as u32)
    }

    fn restart(&mut self, index: u32) -> Result<(), JpegError> {
        self.bits.write_restart_marker(index)
    }
}

/// Walks a scan in coding order and feeds every symbol to `sink`.
fn emit_scan<S: SymbolSink>(
    image: &CoefficientImage,
    scan: &[usize],
    restart_interval: usize,
    sink: &mut S,
) -> Result<(), JpegError> {
    let interleaved = scan.len() > 1;
    let (units_wide, units_high) = if interleaved {
        (image.mcus_per_row(), image.mcu_rows())
    } else {
        let component = &image.components[scan[0]];
        (component.width_in_blocks, component.height_in_blocks)
    };

    let mut predictors = vec![0i32; scan.len()];
    let mut restart_index = 0u32;
    for unit in 0..units_wide * units_high {
        if restart_interval > 0 && unit > 0 && unit % restart_interval == 0 {
            sink.restart(restart_index)?;
            restart_index = restart_index.wrapping_add(1);
            predictors.fill(0);
        }
        let (unit_x, unit_y) = (unit % units_wide, unit / units_wide);
        for (position, &component_index) in scan.iter().enumerate() {
            let component = &image.components[component_index];
            if interleaved {
                let h = component.info.h_samp_factor as usize;
                let v = component.info.v_samp_factor as usize;
                for block_y in 0..v {
                    for block_x in 0..h {
                        let block = component.block(unit_x * h + block_x, unit_y * v + block_y);
                        emit_block(block, position, &mut predictors[position], sink)?;
                    }
                }
            } else {
                emit_block(component.block(unit_x, unit_y), position, &mut predictors[position], sink)?;
            }
        }
    }
    Ok(())
}

/// Emits the DC difference and the run-length coded AC coefficients of one
/// block (ISO/IEC 10918-1 F.1.2).
fn emit_block<S: SymbolSink>(block: &Block, position: usize, predictor: &mut i32, sink: &mut S) -> Result<(), JpegError> {
    let dc = block[0] as i32;
    let diff = dc - *predictor;
    *predictor = dc;
    let category = magnitude_category(diff);
    if category > MAXIMUM_DC_CATEGORY {
        return Err(JpegError::InvalidData);
    }
    sink.dc(position, category, encode_magnitude(diff, category))?;

    let mut run = 0u8;
    for &natural in &ZIGZAG_ORDER[1..] {
        let value = block[natural] as i32;
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink.ac(position, 0xF0, 0)?;
            run -= 16;
        }
        let category = magnitude_category(value);
        if category > MAXIMUM_AC_CATEGORY {
            return Err(JpegError::InvalidData);
        }
        sink.ac(position, (run << 4) | category, encode_magnitude(value, category))?;
        run = 0;
    }
    if run > 0 {
        sink.ac(position, 0x00, 0)?;
    }
    Ok(())
}
