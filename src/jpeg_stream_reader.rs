use crate::FrameInfo;
use crate::constants::{
    ADOBE_IDENTIFIER, BITS_PER_SAMPLE, JFIF_IDENTIFIER, MAXIMUM_BLOCKS_IN_MCU, MAXIMUM_COMPONENT_COUNT_IN_SCAN,
    MAXIMUM_SAMPLING_FACTOR, TABLE_SLOT_COUNT,
};
use crate::error::JpegError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::coefficients::ComponentInfo;
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE};
use crate::jpeg1::huffman::HuffmanTable;
use crate::jpeg1::quantization::QuantizationTable;
use crate::jpeg1::sampling::Subsampling;
use crate::pixel_format::ColorSpace;
use tracing::{debug, trace};

/// Component selection and table destinations of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub component_index: usize,
    pub dc_table_dest: u8,
    pub ac_table_dest: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approximation_high: u8,
    pub approximation_low: u8,
}

/// Contents of a JFIF APP0 segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JfifHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
}

/// Contents of an Adobe APP14 segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdobeHeader {
    pub version: u16,
    pub flags0: u16,
    pub flags1: u16,
    pub transform: u8,
}

/// An APPn or COM segment kept verbatim (payload without the length field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSegment {
    pub marker: JpegMarkerCode,
    pub data: Vec<u8>,
}

/// Frame facts available once the header has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub color_space: ColorSpace,
    /// `None` when the sampling factors match no TurboJPEG mode.
    pub subsampling: Option<Subsampling>,
    pub components: Vec<ComponentInfo>,
    pub restart_interval: u16,
    pub jfif: Option<JfifHeader>,
    pub adobe: Option<AdobeHeader>,
    pub mcu_width: usize,
    pub mcu_height: usize,
}

impl JpegHeader {
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegStreamReaderState {
    BeforeStartOfImage,
    HeaderSection,
    ScanSection,
    EndOfImage,
}

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
    state: JpegStreamReaderState,
    frame_info: FrameInfo,
    frame_marker: Option<JpegMarkerCode>,
    jfif: Option<JfifHeader>,
    adobe: Option<AdobeHeader>,
    markers: Vec<MarkerSegment>,
    truncated: bool,
    pub quantization_tables: [Option<QuantizationTable>; TABLE_SLOT_COUNT],
    pub huffman_tables_dc: [Option<HuffmanTable>; TABLE_SLOT_COUNT],
    pub huffman_tables_ac: [Option<HuffmanTable>; TABLE_SLOT_COUNT],
    pub components: Vec<ComponentInfo>,
    pub restart_interval: u16,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            state: JpegStreamReaderState::BeforeStartOfImage,
            frame_info: FrameInfo::default(),
            frame_marker: None,
            jfif: None,
            adobe: None,
            markers: Vec::new(),
            truncated: false,
            quantization_tables: [None; TABLE_SLOT_COUNT],
            huffman_tables_dc: [const { None }; TABLE_SLOT_COUNT],
            huffman_tables_ac: [const { None }; TABLE_SLOT_COUNT],
            components: Vec::new(),
            restart_interval: 0,
        }
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.frame_info
    }

    pub fn state(&self) -> JpegStreamReaderState {
        self.state
    }

    pub fn jfif(&self) -> Option<JfifHeader> {
        self.jfif
    }

    pub fn adobe(&self) -> Option<AdobeHeader> {
        self.adobe
    }

    /// APPn and COM segments in stream order.
    pub fn markers(&self) -> &[MarkerSegment] {
        &self.markers
    }

    /// True when the data ended without an EOI marker.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        let source = self.source;
        &source[self.position.min(source.len())..]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn advance(&mut self, count: usize) {
        self.position = (self.position + count).min(self.source.len());
    }

    /// Reads everything up to (not including) the first SOS marker.
    pub fn read_header(&mut self) -> Result<(), JpegError> {
        if self.state != JpegStreamReaderState::BeforeStartOfImage {
            return Err(JpegError::InvalidOperation);
        }
        self.read_start_of_image()?;

        loop {
            let marker = self.read_marker()?;
            match marker {
                JpegMarkerCode::StartOfScan => {
                    if self.frame_marker.is_none() {
                        return Err(JpegError::UnexpectedStartOfScanMarker);
                    }
                    self.position -= 2;
                    self.state = JpegStreamReaderState::HeaderSection;
                    break;
                }
                JpegMarkerCode::EndOfImage => {
                    return Err(if self.frame_marker.is_none() {
                        JpegError::UnexpectedEndOfImageMarker
                    } else {
                        JpegError::MissingScanData
                    });
                }
                marker if marker.is_restart() => return Err(JpegError::UnexpectedRestartMarker),
                marker => self.read_segment(marker)?,
            }
        }

        debug!(
            width = self.frame_info.width,
            height = self.frame_info.height,
            components = self.frame_info.component_count,
            color_space = ?self.color_space(),
            "read JPEG header"
        );
        Ok(())
    }

    /// Reads table and marker segments up to the next SOS and returns its
    /// header, or `None` at EOI or at the end of the data.
    pub fn read_next_scan(&mut self) -> Result<Option<ScanHeader>, JpegError> {
        match self.state {
            JpegStreamReaderState::BeforeStartOfImage => return Err(JpegError::InvalidOperation),
            JpegStreamReaderState::EndOfImage => return Ok(None),
            _ => {}
        }

        loop {
            if self.position + 1 >= self.source.len() {
                self.truncated = true;
                self.state = JpegStreamReaderState::EndOfImage;
                return Ok(None);
            }
            let marker = self.read_marker()?;
            match marker {
                JpegMarkerCode::StartOfScan => {
                    let scan = self.read_start_of_scan_segment()?;
                    self.state = JpegStreamReaderState::ScanSection;
                    return Ok(Some(scan));
                }
                JpegMarkerCode::EndOfImage => {
                    self.state = JpegStreamReaderState::EndOfImage;
                    return Ok(None);
                }
                marker if marker.is_restart() => {
                    trace!(?marker, "ignoring stray restart marker");
                }
                marker => self.read_segment(marker)?,
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, JpegError> {
        let value = *self.source.get(self.position).ok_or(JpegError::SourceTooSmall)?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, JpegError> {
        let b1 = self.read_u8()? as u16;
        let b2 = self.read_u8()? as u16;
        Ok((b1 << 8) | b2)
    }

    /// Reads a marker, skipping `FF` fill bytes in front of the code.
    pub fn read_marker(&mut self) -> Result<JpegMarkerCode, JpegError> {
        if self.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(JpegError::JpegMarkerStartByteNotFound);
        }
        let mut code = self.read_u8()?;
        while code == JPEG_MARKER_START_BYTE {
            code = self.read_u8()?;
        }
        let marker = JpegMarkerCode::from_byte(code)?;
        trace!(?marker, position = self.position - 2, "marker");
        Ok(marker)
    }

    fn read_start_of_image(&mut self) -> Result<(), JpegError> {
        if self.read_u8()? != JPEG_MARKER_START_BYTE
            || self.read_u8()? != JpegMarkerCode::StartOfImage as u8
        {
            return Err(JpegError::StartOfImageMarkerNotFound);
        }
        self.state = JpegStreamReaderState::HeaderSection;
        Ok(())
    }

    fn read_segment(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        use JpegMarkerCode::*;
        match marker {
            StartOfFrameBaseline | StartOfFrameExtendedSequential => self.read_start_of_frame_segment(marker),
            StartOfFrameProgressive | StartOfFrameDifferentialProgressive => Err(JpegError::ProgressiveNotSupported),
            StartOfFrameLossless | StartOfFrameDifferentialLossless => Err(JpegError::LosslessNotSupported),
            StartOfFrameDifferentialSequential | DefineHierarchicalProgression | ExpandReferenceComponents => {
                Err(JpegError::HierarchicalNotSupported)
            }
            StartOfFrameArithmeticSequential
            | StartOfFrameArithmeticProgressive
            | StartOfFrameArithmeticLossless
            | StartOfFrameArithmeticDifferentialSequential
            | StartOfFrameArithmeticDifferentialProgressive
            | StartOfFrameArithmeticDifferentialLossless
            | DefineArithmeticCoding => Err(JpegError::ArithmeticCodingNotSupported),
            DefineQuantizationTable => self.read_dqt_segment(),
            DefineHuffmanTable => self.read_dht_segment(),
            DefineRestartInterval => self.read_dri_segment(),
            DefineNumberOfLines => Err(JpegError::DefineNumberOfLinesNotSupported),
            StartOfImage => Err(JpegError::DuplicateStartOfImageMarker),
            Temporary => Ok(()),
            Comment => self.read_marker_segment(marker),
            _ if marker.application_index().is_some() => self.read_marker_segment(marker),
            _ => Err(JpegError::UnknownJpegMarkerFound),
        }
    }

    /// Reads a segment length and returns the position where the segment ends.
    fn read_segment_end(&mut self) -> Result<usize, JpegError> {
        let length = self.read_u16()? as usize;
        if length < 2 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        let end = self.position + length - 2;
        if end > self.source.len() {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        Ok(end)
    }

    pub fn skip_segment(&mut self) -> Result<(), JpegError> {
        self.position = self.read_segment_end()?;
        Ok(())
    }

    fn read_start_of_frame_segment(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        if self.frame_marker.is_some() {
            return Err(JpegError::DuplicateStartOfFrameMarker);
        }
        let end = self.read_segment_end()?;
        let precision = self.read_u8()?;
        let height = self.read_u16()? as u32;
        let width = self.read_u16()? as u32;
        let component_count = self.read_u8()? as usize;

        if end != self.position + component_count * 3 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        if precision != BITS_PER_SAMPLE {
            return Err(JpegError::UnsupportedPrecision);
        }
        if height == 0 {
            return Err(JpegError::DefineNumberOfLinesNotSupported);
        }
        if width == 0 {
            return Err(JpegError::InvalidParameterWidth);
        }
        if !matches!(component_count, 1 | 3 | 4) {
            return Err(JpegError::InvalidParameterComponentCount);
        }

        let mut components = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let id = self.read_u8()?;
            let sampling = self.read_u8()?;
            let quant_table_index = self.read_u8()?;
            let (h_samp_factor, v_samp_factor) = (sampling >> 4, sampling & 0x0F);
            if !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&h_samp_factor)
                || !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&v_samp_factor)
            {
                return Err(JpegError::InvalidSamplingFactor);
            }
            if quant_table_index as usize >= TABLE_SLOT_COUNT {
                return Err(JpegError::InvalidQuantizationTable);
            }
            if components.iter().any(|c: &ComponentInfo| c.id == id) {
                return Err(JpegError::DuplicateComponentIdInSofSegment);
            }
            components.push(ComponentInfo {
                id,
                h_samp_factor,
                v_samp_factor,
                quant_table_index,
            });
        }

        self.frame_marker = Some(marker);
        self.components = components;
        self.frame_info = FrameInfo {
            width,
            height,
            bits_per_sample: precision as i32,
            component_count: component_count as i32,
        };
        Ok(())
    }

    pub fn read_start_of_scan_segment(&mut self) -> Result<ScanHeader, JpegError> {
        if self.frame_marker.is_none() {
            return Err(JpegError::UnexpectedStartOfScanMarker);
        }
        let end = self.read_segment_end()?;
        let component_count = self.read_u8()? as usize;
        if end != self.position + component_count * 2 + 3 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        if !(1..=MAXIMUM_COMPONENT_COUNT_IN_SCAN).contains(&component_count) {
            return Err(JpegError::InvalidScanParameters);
        }

        let mut components: Vec<ScanComponent> = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let id = self.read_u8()?;
            let selector = self.read_u8()?;
            let component_index = self
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or(JpegError::UnknownComponentId)?;
            if components.iter().any(|c| c.component_index == component_index) {
                return Err(JpegError::DuplicateComponentIdInScan);
            }
            let (dc_table_dest, ac_table_dest) = (selector >> 4, selector & 0x0F);
            if dc_table_dest as usize >= TABLE_SLOT_COUNT || ac_table_dest as usize >= TABLE_SLOT_COUNT {
                return Err(JpegError::InvalidHuffmanTable);
            }
            components.push(ScanComponent {
                component_index,
                dc_table_dest,
                ac_table_dest,
            });
        }

        let spectral_start = self.read_u8()?;
        let spectral_end = self.read_u8()?;
        let approximation = self.read_u8()?;
        let scan = ScanHeader {
            components,
            spectral_start,
            spectral_end,
            approximation_high: approximation >> 4,
            approximation_low: approximation & 0x0F,
        };
        if scan.spectral_start != 0
            || scan.spectral_end as usize != BLOCK_DIM - 1
            || scan.approximation_high != 0
            || scan.approximation_low != 0
        {
            return Err(JpegError::InvalidScanParameters);
        }
        if scan.components.len() > 1 {
            let blocks: usize = scan
                .components
                .iter()
                .map(|sc| {
                    let c = &self.components[sc.component_index];
                    c.h_samp_factor as usize * c.v_samp_factor as usize
                })
                .sum();
            if blocks > MAXIMUM_BLOCKS_IN_MCU {
                return Err(JpegError::TooManyBlocksInMcu);
            }
        }
        trace!(components = scan.components.len(), "start of scan");
        Ok(scan)
    }

    pub fn read_dqt_segment(&mut self) -> Result<(), JpegError> {
        let end = self.read_segment_end()?;
        while self.position < end {
            let pq_tq = self.read_u8()?;
            let precision = pq_tq >> 4;
            let id = (pq_tq & 0x0F) as usize;
            if id >= TABLE_SLOT_COUNT || precision > 1 {
                return Err(JpegError::InvalidQuantizationTable);
            }
            let entry_size = if precision == 0 { 1 } else { 2 };
            if self.position + BLOCK_DIM * entry_size > end {
                return Err(JpegError::InvalidMarkerSegmentSize);
            }
            let mut zigzag = [0u16; BLOCK_DIM];
            for value in zigzag.iter_mut() {
                *value = if precision == 0 {
                    self.read_u8()? as u16
                } else {
                    self.read_u16()?
                };
            }
            trace!(id, precision, "quantization table");
            self.quantization_tables[id] = Some(QuantizationTable::from_zigzag(&zigzag));
        }
        Ok(())
    }

    pub fn read_dht_segment(&mut self) -> Result<(), JpegError> {
        let end = self.read_segment_end()?;
        while self.position < end {
            let tc_th = self.read_u8()?;
            let class = tc_th >> 4;
            let id = (tc_th & 0x0F) as usize;
            if id >= TABLE_SLOT_COUNT || class > 1 {
                return Err(JpegError::InvalidHuffmanTable);
            }
            if self.position + 16 > end {
                return Err(JpegError::InvalidMarkerSegmentSize);
            }

            let mut lengths = [0u8; 16];
            for length in lengths.iter_mut() {
                *length = self.read_u8()?;
            }
            let total_values: usize = lengths.iter().map(|&count| count as usize).sum();
            if total_values > 256 {
                return Err(JpegError::InvalidHuffmanTable);
            }
            if self.position + total_values > end {
                return Err(JpegError::InvalidMarkerSegmentSize);
            }
            let values = self.source[self.position..self.position + total_values].to_vec();
            self.position += total_values;
            if class == 0 && values.iter().any(|&symbol| symbol > 15) {
                return Err(JpegError::InvalidHuffmanTable);
            }

            let table = HuffmanTable::build_from_dht(&lengths, &values)?;
            trace!(class, id, symbols = total_values, "Huffman table");
            if class == 0 {
                self.huffman_tables_dc[id] = Some(table);
            } else {
                self.huffman_tables_ac[id] = Some(table);
            }
        }
        Ok(())
    }

    pub fn read_dri_segment(&mut self) -> Result<(), JpegError> {
        let length = self.read_u16()?;
        if length != 4 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        self.restart_interval = self.read_u16()?;
        Ok(())
    }

    fn read_marker_segment(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        let end = self.read_segment_end()?;
        let data = &self.source[self.position..end];
        match marker {
            JpegMarkerCode::ApplicationData0 if self.jfif.is_none() => self.jfif = parse_jfif(data),
            JpegMarkerCode::ApplicationData14 if self.adobe.is_none() => self.adobe = parse_adobe(data),
            _ => {}
        }
        self.markers.push(MarkerSegment {
            marker,
            data: data.to_vec(),
        });
        self.position = end;
        Ok(())
    }

    /// Color space inferred with libjpeg's rules.
    pub fn color_space(&self) -> ColorSpace {
        match self.components.len() {
            1 => ColorSpace::Gray,
            3 => {
                if self.jfif.is_some() {
                    return ColorSpace::YCbCr;
                }
                if let Some(adobe) = self.adobe {
                    return if adobe.transform == 0 { ColorSpace::Rgb } else { ColorSpace::YCbCr };
                }
                let ids: Vec<u8> = self.components.iter().map(|c| c.id).collect();
                if ids == [b'R', b'G', b'B'] {
                    ColorSpace::Rgb
                } else {
                    ColorSpace::YCbCr
                }
            }
            _ => match self.adobe {
                Some(adobe) if adobe.transform != 0 => ColorSpace::Ycck,
                _ => ColorSpace::Cmyk,
            },
        }
    }

    pub fn header(&self) -> Result<JpegHeader, JpegError> {
        if self.frame_marker.is_none() {
            return Err(JpegError::InvalidOperation);
        }
        let factors: Vec<(u8, u8)> = self
            .components
            .iter()
            .map(|c| (c.h_samp_factor, c.v_samp_factor))
            .collect();
        let (mcu_width, mcu_height) = if self.components.len() == 1 {
            (BLOCK_SIZE, BLOCK_SIZE)
        } else {
            let max_h = factors.iter().map(|f| f.0).max().unwrap_or(1) as usize;
            let max_v = factors.iter().map(|f| f.1).max().unwrap_or(1) as usize;
            (max_h * BLOCK_SIZE, max_v * BLOCK_SIZE)
        };
        Ok(JpegHeader {
            width: self.frame_info.width,
            height: self.frame_info.height,
            precision: self.frame_info.bits_per_sample as u8,
            color_space: self.color_space(),
            subsampling: Subsampling::from_factors(&factors),
            components: self.components.clone(),
            restart_interval: self.restart_interval,
            jfif: self.jfif,
            adobe: self.adobe,
            mcu_width,
            mcu_height,
        })
    }
}

fn parse_jfif(data: &[u8]) -> Option<JfifHeader> {
    if data.len() < 14 || !data.starts_with(JFIF_IDENTIFIER) {
        return None;
    }
    Some(JfifHeader {
        version_major: data[5],
        version_minor: data[6],
        density_units: data[7],
        x_density: u16::from_be_bytes([data[8], data[9]]),
        y_density: u16::from_be_bytes([data[10], data[11]]),
    })
}

fn parse_adobe(data: &[u8]) -> Option<AdobeHeader> {
    if data.len() < 12 || !data.starts_with(ADOBE_IDENTIFIER) {
        return None;
    }
    Some(AdobeHeader {
        version: u16::from_be_bytes([data[5], data[6]]),
        flags0: u16::from_be_bytes([data[7], data[8]]),
        flags1: u16::from_be_bytes([data[9], data[10]]),
        transform: data[11],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn sof(marker: u8, width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut payload = vec![8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components.len() as u8);
        for &(id, sampling, tq) in components {
            payload.extend_from_slice(&[id, sampling, tq]);
        }
        segment(marker, &payload)
    }

    fn stream(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    fn sos(components: &[(u8, u8)]) -> Vec<u8> {
        let mut payload = vec![components.len() as u8];
        for &(id, tables) in components {
            payload.extend_from_slice(&[id, tables]);
        }
        payload.extend_from_slice(&[0, 63, 0]);
        segment(0xDA, &payload)
    }

    #[test]
    fn reads_frame_and_derives_color_space() {
        let mut jfif = JFIF_IDENTIFIER.to_vec();
        jfif.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        let data = stream(&[
            segment(0xE0, &jfif),
            segment(0xFE, b"hello"),
            sof(0xC0, 33, 17, &[(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 1)]),
            sos(&[(1, 0x00), (2, 0x11), (3, 0x11)]),
        ]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        let header = reader.header().unwrap();
        assert_eq!((header.width, header.height), (33, 17));
        assert_eq!(header.color_space, ColorSpace::YCbCr);
        assert_eq!(header.subsampling, Some(Subsampling::S420));
        assert_eq!((header.mcu_width, header.mcu_height), (16, 16));
        assert_eq!(header.jfif.unwrap().version_minor, 1);
        assert_eq!(reader.markers().len(), 2);
        assert_eq!(reader.markers()[1].data, b"hello");

        let scan = reader.read_next_scan().unwrap().unwrap();
        assert_eq!(scan.components.len(), 3);
        assert_eq!(scan.components[1].ac_table_dest, 1);
    }

    #[test]
    fn adobe_and_component_ids_select_color_space() {
        let mut adobe = ADOBE_IDENTIFIER.to_vec();
        adobe.extend_from_slice(&[0, 100, 0, 0, 0, 0, 2]);
        let data = stream(&[
            segment(0xEE, &adobe),
            sof(0xC0, 8, 8, &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0), (4, 0x11, 0)]),
        ]);
        let mut reader = JpegStreamReader::new(&data);
        assert!(reader.read_header().is_err());
        assert_eq!(reader.color_space(), ColorSpace::Ycck);

        let data = stream(&[sof(0xC1, 8, 8, &[(b'R', 0x11, 0), (b'G', 0x11, 0), (b'B', 0x11, 0)])]);
        let mut reader = JpegStreamReader::new(&data);
        let _ = reader.read_header();
        assert_eq!(reader.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn rejects_unsupported_processes() {
        for (marker, error) in [
            (0xC2, JpegError::ProgressiveNotSupported),
            (0xC3, JpegError::LosslessNotSupported),
            (0xC5, JpegError::HierarchicalNotSupported),
            (0xC9, JpegError::ArithmeticCodingNotSupported),
        ] {
            let data = stream(&[sof(marker, 8, 8, &[(1, 0x11, 0)])]);
            let mut reader = JpegStreamReader::new(&data);
            assert_eq!(reader.read_header(), Err(error));
        }
    }

    #[test]
    fn validates_frame_parameters() {
        let cases = [
            (sof(0xC0, 8, 0, &[(1, 0x11, 0)]), JpegError::DefineNumberOfLinesNotSupported),
            (sof(0xC0, 0, 8, &[(1, 0x11, 0)]), JpegError::InvalidParameterWidth),
            (sof(0xC0, 8, 8, &[(1, 0x11, 0), (2, 0x11, 0)]), JpegError::InvalidParameterComponentCount),
            (sof(0xC0, 8, 8, &[(1, 0x51, 0)]), JpegError::InvalidSamplingFactor),
            (sof(0xC0, 8, 8, &[(1, 0x11, 4)]), JpegError::InvalidQuantizationTable),
            (
                sof(0xC0, 8, 8, &[(1, 0x11, 0), (1, 0x11, 0), (3, 0x11, 0)]),
                JpegError::DuplicateComponentIdInSofSegment,
            ),
        ];
        for (frame, error) in cases {
            let data = stream(&[frame]);
            let mut reader = JpegStreamReader::new(&data);
            assert_eq!(reader.read_header(), Err(error));
        }

        let mut twelve_bit = sof(0xC1, 8, 8, &[(1, 0x11, 0)]);
        twelve_bit[4] = 12;
        let data = stream(&[twelve_bit]);
        assert_eq!(
            JpegStreamReader::new(&data).read_header(),
            Err(JpegError::UnsupportedPrecision)
        );
    }

    #[test]
    fn validates_scan_header() {
        let frame = sof(0xC0, 8, 8, &[(1, 0x11, 0)]);
        let data = stream(&[frame.clone(), sos(&[(9, 0x00)])]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        assert_eq!(reader.read_next_scan(), Err(JpegError::UnknownComponentId));

        let data = stream(&[sos(&[(1, 0x00)])]);
        assert_eq!(
            JpegStreamReader::new(&data).read_header(),
            Err(JpegError::UnexpectedStartOfScanMarker)
        );

        let mut progressive_scan = sos(&[(1, 0x00)]);
        let n = progressive_scan.len();
        progressive_scan[n - 2] = 5;
        let data = stream(&[frame, progressive_scan]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        assert_eq!(reader.read_next_scan(), Err(JpegError::InvalidScanParameters));
    }

    #[test]
    fn reads_8_and_16_bit_quantization_tables() {
        let mut payload = vec![0x00];
        payload.extend((1..=64).map(|v| v as u8));
        payload.push(0x11);
        for v in 1..=64u16 {
            payload.extend_from_slice(&(v * 300).to_be_bytes());
        }
        let data = stream(&[segment(0xDB, &payload), sof(0xC0, 8, 8, &[(1, 0x11, 0)]), sos(&[(1, 0)])]);
        let mut reader = JpegStreamReader::new(&data);
        reader.read_header().unwrap();
        let table0 = reader.quantization_tables[0].unwrap();
        assert_eq!(table0.values[0], 1);
        assert_eq!(table0.values[8], 3);
        let table1 = reader.quantization_tables[1].unwrap();
        assert_eq!(table1.values[63], 64 * 300);
        assert!(table1.is_16_bit());
    }

    #[test]
    fn rejects_bad_huffman_segments() {
        let mut payload = vec![0x00];
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        payload.extend_from_slice(&lengths);
        payload.push(16);
        let data = stream(&[segment(0xC4, &payload)]);
        assert_eq!(
            JpegStreamReader::new(&data).read_header(),
            Err(JpegError::InvalidHuffmanTable)
        );

        let data = stream(&[vec![0xFF, 0xC4, 0x00, 0x40, 0x00]]);
        assert_eq!(
            JpegStreamReader::new(&data).read_header(),
            Err(JpegError::InvalidMarkerSegmentSize)
        );
    }

    #[test]
    fn structural_marker_errors() {
        assert_eq!(
            JpegStreamReader::new(&[0x00, 0xD8]).read_header(),
            Err(JpegError::StartOfImageMarkerNotFound)
        );
        assert_eq!(
            JpegStreamReader::new(&[0xFF, 0xD8, 0xFF, 0xD8]).read_header(),
            Err(JpegError::DuplicateStartOfImageMarker)
        );
        assert_eq!(
            JpegStreamReader::new(&[0xFF, 0xD8, 0x12, 0xD8]).read_header(),
            Err(JpegError::JpegMarkerStartByteNotFound)
        );
        assert_eq!(
            JpegStreamReader::new(&[0xFF, 0xD8, 0xFF, 0xFF, 0xD9]).read_header(),
            Err(JpegError::UnexpectedEndOfImageMarker)
        );
        assert_eq!(
            JpegStreamReader::new(&[0xFF, 0xD8, 0xFF, 0xF1]).read_header(),
            Err(JpegError::UnknownJpegMarkerFound)
        );
        assert_eq!(
            JpegStreamReader::new(&[0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x01]).read_header(),
            Err(JpegError::InvalidMarkerSegmentSize)
        );
    }
}
