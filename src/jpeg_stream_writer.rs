//! JPEG codestream writer.
//!
//! `JpegStreamWriter` emits markers and table/frame/scan segments into a
//! caller-provided buffer. Entropy-coded data is written through
//! [`JpegStreamWriter::remaining_slice`] and committed with
//! [`JpegStreamWriter::advance`].

use crate::constants::{ADOBE_IDENTIFIER, BITS_PER_SAMPLE, JFIF_IDENTIFIER, SEGMENT_LENGTH_SIZE, SEGMENT_MAX_DATA_SIZE};
use crate::error::JpegError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::coefficients::ComponentInfo;
use crate::jpeg1::huffman::HuffmanTable;
use crate::jpeg1::quantization::QuantizationTable;
use crate::jpeg_stream_reader::ScanComponent;

pub struct JpegStreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> JpegStreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn remaining_slice(&mut self) -> &mut [u8] {
        &mut self.destination[self.position..]
    }

    pub fn advance(&mut self, count: usize) {
        self.position = (self.position + count).min(self.destination.len());
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), JpegError> {
        if self.position >= self.destination.len() {
            return Err(JpegError::DestinationTooSmall);
        }
        self.destination[self.position] = value;
        self.position += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), JpegError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), JpegError> {
        let end = self.position + bytes.len();
        if end > self.destination.len() {
            return Err(JpegError::DestinationTooSmall);
        }
        self.destination[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    pub fn write_marker(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        self.write_byte(JPEG_MARKER_START_BYTE)?;
        self.write_byte(marker as u8)
    }

    /// Writes a marker and the length field for `data_size` payload bytes.
    fn write_segment_header(&mut self, marker: JpegMarkerCode, data_size: usize) -> Result<(), JpegError> {
        if data_size > SEGMENT_MAX_DATA_SIZE {
            return Err(JpegError::InvalidArgument);
        }
        self.write_marker(marker)?;
        self.write_u16((data_size + SEGMENT_LENGTH_SIZE) as u16)
    }

    pub fn write_start_of_image(&mut self) -> Result<(), JpegError> {
        self.write_marker(JpegMarkerCode::StartOfImage)
    }

    pub fn write_end_of_image(&mut self) -> Result<(), JpegError> {
        self.write_marker(JpegMarkerCode::EndOfImage)
    }

    /// JFIF 1.01, no thumbnail, 1:1 aspect ratio.
    pub fn write_jfif_app0(&mut self) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::ApplicationData0, 14)?;
        self.write_bytes(JFIF_IDENTIFIER)?;
        self.write_bytes(&[1, 1, 0])?;
        self.write_u16(1)?;
        self.write_u16(1)?;
        self.write_bytes(&[0, 0])
    }

    pub fn write_adobe_app14(&mut self, transform: u8) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::ApplicationData14, 12)?;
        self.write_bytes(ADOBE_IDENTIFIER)?;
        self.write_u16(100)?;
        self.write_u16(0)?;
        self.write_u16(0)?;
        self.write_byte(transform)
    }

    /// Writes an APPn or COM segment with the given payload.
    pub fn write_marker_segment(&mut self, marker: JpegMarkerCode, data: &[u8]) -> Result<(), JpegError> {
        if marker != JpegMarkerCode::Comment && marker.application_index().is_none() {
            return Err(JpegError::InvalidArgument);
        }
        self.write_segment_header(marker, data.len())?;
        self.write_bytes(data)
    }

    pub fn write_dqt(&mut self, table_id: u8, table: &QuantizationTable) -> Result<(), JpegError> {
        let wide = table.is_16_bit();
        let entry_size = if wide { 2 } else { 1 };
        self.write_segment_header(JpegMarkerCode::DefineQuantizationTable, 1 + 64 * entry_size)?;
        self.write_byte(((wide as u8) << 4) | (table_id & 0x0F))?;
        for value in table.to_zigzag() {
            if wide {
                self.write_u16(value)?;
            } else {
                self.write_byte(value as u8)?;
            }
        }
        Ok(())
    }

    pub fn write_dht(&mut self, table_class: u8, table_id: u8, table: &HuffmanTable) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::DefineHuffmanTable, 1 + 16 + table.values.len())?;
        self.write_byte(((table_class & 1) << 4) | (table_id & 0x0F))?;
        self.write_bytes(&table.lengths)?;
        self.write_bytes(&table.values)
    }

    /// Writes SOF0, or SOF1 when `extended` (16-bit quantization tables are
    /// not allowed in baseline frames).
    pub fn write_start_of_frame_segment(
        &mut self,
        extended: bool,
        width: u32,
        height: u32,
        components: &[ComponentInfo],
    ) -> Result<(), JpegError> {
        let width = u16::try_from(width).map_err(|_| JpegError::InvalidArgumentWidth)?;
        let height = u16::try_from(height).map_err(|_| JpegError::InvalidArgumentHeight)?;
        let marker = if extended {
            JpegMarkerCode::StartOfFrameExtendedSequential
        } else {
            JpegMarkerCode::StartOfFrameBaseline
        };
        self.write_segment_header(marker, 6 + components.len() * 3)?;
        self.write_byte(BITS_PER_SAMPLE)?;
        self.write_u16(height)?;
        self.write_u16(width)?;
        self.write_byte(components.len() as u8)?;
        for component in components {
            self.write_byte(component.id)?;
            self.write_byte((component.h_samp_factor << 4) | component.v_samp_factor)?;
            self.write_byte(component.quant_table_index)?;
        }
        Ok(())
    }

    pub fn write_dri(&mut self, restart_interval: u16) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::DefineRestartInterval, 2)?;
        self.write_u16(restart_interval)
    }

    /// Writes a sequential SOS header (Ss=0, Se=63, Ah=Al=0).
    pub fn write_sos_segment(&mut self, components: &[ComponentInfo], selectors: &[ScanComponent]) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::StartOfScan, 1 + selectors.len() * 2 + 3)?;
        self.write_byte(selectors.len() as u8)?;
        for selector in selectors {
            let component = components
                .get(selector.component_index)
                .ok_or(JpegError::UnknownComponentId)?;
            self.write_byte(component.id)?;
            self.write_byte((selector.dc_table_dest << 4) | selector.ac_table_dest)?;
        }
        self.write_bytes(&[0, 63, 0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg_stream_reader::JpegStreamReader;

    #[test]
    fn jfif_and_adobe_segments_are_readable() {
        let mut buffer = vec![0u8; 64];
        let mut writer = JpegStreamWriter::new(&mut buffer);
        writer.write_start_of_image().unwrap();
        writer.write_jfif_app0().unwrap();
        writer.write_adobe_app14(2).unwrap();
        writer.write_marker_segment(JpegMarkerCode::Comment, b"hi").unwrap();
        writer.write_end_of_image().unwrap();
        let length = writer.len();
        assert_eq!(&buffer[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(&buffer[4..6], &[0x00, 0x10]);

        let mut reader = JpegStreamReader::new(&buffer[..length]);
        assert_eq!(reader.read_header(), Err(JpegError::UnexpectedEndOfImageMarker));
        assert_eq!(reader.jfif().unwrap().version_major, 1);
        assert_eq!(reader.adobe().unwrap().transform, 2);
        assert_eq!(reader.markers()[2].data, b"hi");
    }

    #[test]
    fn sixteen_bit_tables_use_precision_one() {
        let mut table = QuantizationTable { values: [1; 64] };
        table.values[0] = 300;
        let mut buffer = vec![0u8; 256];
        let mut writer = JpegStreamWriter::new(&mut buffer);
        writer.write_dqt(1, &table).unwrap();
        assert_eq!(writer.len(), 4 + 1 + 128);
        assert_eq!(buffer[4], 0x11);
        assert_eq!(&buffer[5..7], &[0x01, 0x2C]);
    }

    #[test]
    fn overflow_is_reported() {
        let mut buffer = vec![0u8; 3];
        let mut writer = JpegStreamWriter::new(&mut buffer);
        writer.write_start_of_image().unwrap();
        assert_eq!(writer.write_start_of_image(), Err(JpegError::DestinationTooSmall));
        assert_eq!(
            writer.write_marker_segment(JpegMarkerCode::StartOfScan, &[]),
            Err(JpegError::InvalidArgument)
        );
    }
}
