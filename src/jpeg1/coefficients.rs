//! Quantized DCT coefficients of a whole frame, shared by the decoder, the
//! encoder and the lossless transforms.

use crate::constants::{MAXIMUM_BLOCKS_IN_MCU, MAXIMUM_SAMPLING_FACTOR, TABLE_SLOT_COUNT};
use crate::error::JpegError;
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE};
use crate::jpeg1::quantization::QuantizationTable;
use crate::jpeg1::sampling::Subsampling;
use crate::pixel_format::ColorSpace;

/// 64 quantized coefficients in natural (row-major) order.
pub type Block = [i16; BLOCK_DIM];

/// Frame-level description of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub quant_table_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCoefficients {
    pub info: ComponentInfo,
    /// Allocated grid in blocks, covering whole MCUs.
    pub blocks_wide: usize,
    pub blocks_high: usize,
    /// Blocks overlapping the visible component area.
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    pub blocks: Vec<Block>,
}

impl ComponentCoefficients {
    #[inline]
    pub fn block(&self, x: usize, y: usize) -> &Block {
        &self.blocks[y * self.blocks_wide + x]
    }

    #[inline]
    pub fn block_mut(&mut self, x: usize, y: usize) -> &mut Block {
        &mut self.blocks[y * self.blocks_wide + x]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub components: Vec<ComponentCoefficients>,
    pub quantization_tables: [Option<QuantizationTable>; TABLE_SLOT_COUNT],
}

impl CoefficientImage {
    /// Allocates zeroed coefficients for the given frame layout.
    pub fn new(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        components: &[ComponentInfo],
        quantization_tables: [Option<QuantizationTable>; TABLE_SLOT_COUNT],
    ) -> Result<Self, JpegError> {
        if width == 0 {
            return Err(JpegError::InvalidParameterWidth);
        }
        if height == 0 {
            return Err(JpegError::InvalidParameterHeight);
        }
        if components.is_empty() || components.len() > crate::constants::MAXIMUM_COMPONENT_COUNT {
            return Err(JpegError::InvalidParameterComponentCount);
        }
        for info in components {
            if !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&info.h_samp_factor)
                || !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&info.v_samp_factor)
            {
                return Err(JpegError::InvalidSamplingFactor);
            }
            if info.quant_table_index as usize >= TABLE_SLOT_COUNT {
                return Err(JpegError::InvalidQuantizationTable);
            }
        }

        let max_h = components.iter().map(|c| c.h_samp_factor).max().unwrap_or(1) as usize;
        let max_v = components.iter().map(|c| c.v_samp_factor).max().unwrap_or(1) as usize;
        let mcus_per_row = (width as usize).div_ceil(max_h * BLOCK_SIZE);
        let mcu_rows = (height as usize).div_ceil(max_v * BLOCK_SIZE);

        let components = components
            .iter()
            .map(|&info| {
                let (h, v) = (info.h_samp_factor as usize, info.v_samp_factor as usize);
                let component_width = (width as usize * h).div_ceil(max_h);
                let component_height = (height as usize * v).div_ceil(max_v);
                let blocks_wide = mcus_per_row * h;
                let blocks_high = mcu_rows * v;
                ComponentCoefficients {
                    info,
                    blocks_wide,
                    blocks_high,
                    width_in_blocks: component_width.div_ceil(BLOCK_SIZE),
                    height_in_blocks: component_height.div_ceil(BLOCK_SIZE),
                    blocks: vec![[0; BLOCK_DIM]; blocks_wide * blocks_high],
                }
            })
            .collect();

        Ok(Self {
            width,
            height,
            color_space,
            components,
            quantization_tables,
        })
    }

    pub fn component_infos(&self) -> Vec<ComponentInfo> {
        self.components.iter().map(|c| c.info).collect()
    }

    pub fn max_h_samp_factor(&self) -> usize {
        self.components.iter().map(|c| c.info.h_samp_factor).max().unwrap_or(1) as usize
    }

    pub fn max_v_samp_factor(&self) -> usize {
        self.components.iter().map(|c| c.info.v_samp_factor).max().unwrap_or(1) as usize
    }

    /// Width in pixels of an interleaved MCU (the iMCU).
    pub fn mcu_width(&self) -> usize {
        if self.components.len() == 1 {
            BLOCK_SIZE
        } else {
            self.max_h_samp_factor() * BLOCK_SIZE
        }
    }

    pub fn mcu_height(&self) -> usize {
        if self.components.len() == 1 {
            BLOCK_SIZE
        } else {
            self.max_v_samp_factor() * BLOCK_SIZE
        }
    }

    pub fn mcus_per_row(&self) -> usize {
        (self.width as usize).div_ceil(self.max_h_samp_factor() * BLOCK_SIZE)
    }

    pub fn mcu_rows(&self) -> usize {
        (self.height as usize).div_ceil(self.max_v_samp_factor() * BLOCK_SIZE)
    }

    /// Data units in one interleaved MCU.
    pub fn blocks_per_mcu(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.info.h_samp_factor as usize * c.info.v_samp_factor as usize)
            .sum()
    }

    /// Whether all components fit a single interleaved scan.
    pub fn fits_interleaved_scan(&self) -> bool {
        self.components.len() > 1 && self.blocks_per_mcu() <= MAXIMUM_BLOCKS_IN_MCU
    }

    pub fn subsampling(&self) -> Option<Subsampling> {
        let factors: Vec<(u8, u8)> = self
            .components
            .iter()
            .map(|c| (c.info.h_samp_factor, c.info.v_samp_factor))
            .collect();
        Subsampling::from_factors(&factors)
    }

    pub fn quantization_table(&self, component: usize) -> Result<&QuantizationTable, JpegError> {
        let index = self.components[component].info.quant_table_index as usize;
        self.quantization_tables[index]
            .as_ref()
            .ok_or(JpegError::MissingQuantizationTable)
    }

    /// Rejects layouts whose chroma cannot be upsampled by whole ratios.
    pub fn check_integral_sampling(&self) -> Result<(), JpegError> {
        let (max_h, max_v) = (self.max_h_samp_factor(), self.max_v_samp_factor());
        if self.components.iter().any(|c| {
            max_h % c.info.h_samp_factor as usize != 0 || max_v % c.info.v_samp_factor as usize != 0
        }) {
            return Err(JpegError::InvalidSamplingFactor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_420() -> Vec<ComponentInfo> {
        vec![
            ComponentInfo { id: 1, h_samp_factor: 2, v_samp_factor: 2, quant_table_index: 0 },
            ComponentInfo { id: 2, h_samp_factor: 1, v_samp_factor: 1, quant_table_index: 1 },
            ComponentInfo { id: 3, h_samp_factor: 1, v_samp_factor: 1, quant_table_index: 1 },
        ]
    }

    #[test]
    fn geometry_pads_to_whole_mcus() {
        let image = CoefficientImage::new(33, 17, ColorSpace::YCbCr, &layout_420(), [None; 4]).unwrap();
        assert_eq!(image.mcus_per_row(), 3);
        assert_eq!(image.mcu_rows(), 2);
        let luma = &image.components[0];
        assert_eq!((luma.blocks_wide, luma.blocks_high), (6, 4));
        assert_eq!((luma.width_in_blocks, luma.height_in_blocks), (5, 3));
        let chroma = &image.components[1];
        assert_eq!((chroma.blocks_wide, chroma.blocks_high), (3, 2));
        assert_eq!((chroma.width_in_blocks, chroma.height_in_blocks), (3, 2));
        assert_eq!(image.blocks_per_mcu(), 6);
        assert!(image.fits_interleaved_scan());
        assert_eq!(image.subsampling(), Some(Subsampling::S420));
    }

    #[test]
    fn single_component_mcu_is_one_block() {
        let info = ComponentInfo { id: 1, h_samp_factor: 2, v_samp_factor: 2, quant_table_index: 0 };
        let image = CoefficientImage::new(20, 9, ColorSpace::Gray, &[info], [None; 4]).unwrap();
        assert_eq!(image.mcu_width(), 8);
        assert_eq!(image.components[0].width_in_blocks, 3);
        assert_eq!(image.components[0].height_in_blocks, 2);
        assert!(!image.fits_interleaved_scan());
    }

    #[test]
    fn rejects_bad_layouts() {
        let info = ComponentInfo { id: 1, h_samp_factor: 5, v_samp_factor: 1, quant_table_index: 0 };
        assert_eq!(
            CoefficientImage::new(8, 8, ColorSpace::Gray, &[info], [None; 4]).unwrap_err(),
            JpegError::InvalidSamplingFactor
        );
        assert_eq!(
            CoefficientImage::new(0, 8, ColorSpace::Gray, &layout_420(), [None; 4]).unwrap_err(),
            JpegError::InvalidParameterWidth
        );
    }
}
