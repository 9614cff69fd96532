//! C Foreign Function Interface for jpegtensor-rs.
//!
//! Functions mirror the TurboJPEG calls: an opaque handle carries the last
//! error message, and every call returns 0 or the `JpegError` code.

use crate::codec::JpegCodec;
use crate::error::JpegError;
use crate::jpeg1::sampling::Subsampling;
use crate::options::{DecodeOptions, EncodeOptions, ScalingFactor};
use crate::pixel_format::PixelFormat;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uchar};
use std::ptr;

/// Opaque codec handle.
#[repr(C)]
pub struct JpegTensorHandle {
    _private: [u8; 0],
}

/// Header facts returned by `jpegtensor_decompress_header`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct JpegTensorHeader {
    pub width: u32,
    pub height: u32,
    /// `TJSAMP_*` value, or -1 when the sampling factors match no mode.
    pub subsampling: c_int,
    /// `TJCS_*` value.
    pub color_space: c_int,
    pub components: u32,
}

struct HandleState {
    codec: JpegCodec,
    last_error: CString,
}

impl HandleState {
    /// Records `result`'s error, if any, and converts it to a return code.
    fn finish(&mut self, result: Result<(), JpegError>) -> c_int {
        match result {
            Ok(()) => {
                self.last_error = CString::default();
                0
            }
            Err(error) => {
                self.last_error = CString::new(error.to_string()).unwrap_or_default();
                error as c_int
            }
        }
    }
}

unsafe fn state<'h>(handle: *mut JpegTensorHandle) -> Option<&'h mut HandleState> {
    unsafe { (handle as *mut HandleState).as_mut() }
}

/// Create a codec handle. Free it with `jpegtensor_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn jpegtensor_init() -> *mut JpegTensorHandle {
    let state = Box::new(HandleState {
        codec: JpegCodec::new(),
        last_error: CString::default(),
    });
    Box::into_raw(state) as *mut JpegTensorHandle
}

/// Free a codec handle.
///
/// # Safety
/// `handle` must come from `jpegtensor_init` and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegtensor_destroy(handle: *mut JpegTensorHandle) {
    if !handle.is_null() {
        let _ = unsafe { Box::from_raw(handle as *mut HandleState) };
    }
}

/// Message for the last failed call on `handle`, empty after a success. The
/// pointer stays valid until the next call on the same handle.
///
/// # Safety
/// `handle` must be a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegtensor_get_error_str(handle: *mut JpegTensorHandle) -> *const c_char {
    match unsafe { state(handle) } {
        Some(state) => state.last_error.as_ptr(),
        None => ptr::null(),
    }
}

/// Read the frame header of a JPEG image.
///
/// # Safety
/// `handle` must be valid, `jpeg` must point to `jpeg_size` bytes and
/// `header` to a writable `JpegTensorHeader`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegtensor_decompress_header(
    handle: *mut JpegTensorHandle,
    jpeg: *const c_uchar,
    jpeg_size: usize,
    header: *mut JpegTensorHeader,
) -> c_int {
    let Some(state) = (unsafe { state(handle) }) else {
        return JpegError::InvalidArgument as c_int;
    };
    if jpeg.is_null() || header.is_null() {
        return state.finish(Err(JpegError::InvalidArgument));
    }
    let jpeg = unsafe { std::slice::from_raw_parts(jpeg, jpeg_size) };
    let result = state.codec.decode_header(jpeg).map(|parsed| {
        let out = unsafe { &mut *header };
        out.width = parsed.width;
        out.height = parsed.height;
        out.subsampling = parsed.subsampling.map_or(-1, |s| u8::from(s) as c_int);
        out.color_space = u8::from(parsed.color_space) as c_int;
        out.components = parsed.component_count() as u32;
    });
    state.finish(result)
}

/// Decompress into a caller buffer of `destination_size` bytes with row
/// pitch `pitch` (0 means packed rows), scaled by
/// `scaling_num/scaling_denom`.
///
/// # Safety
/// `handle` must be valid, `jpeg` must point to `jpeg_size` bytes and
/// `destination` to `destination_size` writable bytes.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref, clippy::too_many_arguments)]
pub unsafe extern "C" fn jpegtensor_decompress(
    handle: *mut JpegTensorHandle,
    jpeg: *const c_uchar,
    jpeg_size: usize,
    destination: *mut c_uchar,
    destination_size: usize,
    pitch: usize,
    pixel_format: c_int,
    scaling_num: u32,
    scaling_denom: u32,
    flags: u32,
) -> c_int {
    let Some(state) = (unsafe { state(handle) }) else {
        return JpegError::InvalidArgument as c_int;
    };
    if jpeg.is_null() || destination.is_null() {
        return state.finish(Err(JpegError::InvalidArgument));
    }
    let jpeg = unsafe { std::slice::from_raw_parts(jpeg, jpeg_size) };
    let destination = unsafe { std::slice::from_raw_parts_mut(destination, destination_size) };
    let result = pixel_format_from_c(pixel_format).and_then(|pixel_format| {
        let options = DecodeOptions::from_flags(pixel_format, flags)
            .with_scaling(ScalingFactor::new(scaling_num, scaling_denom.max(1)));
        state.codec.decode_into(jpeg, &options, destination, pitch).map(|_| ())
    });
    state.finish(result)
}

/// Compress packed pixels. On success `*jpeg` receives a buffer owned by the
/// library; release it with `jpegtensor_free`.
///
/// # Safety
/// `handle` must be valid, `source` must hold `pitch * height` bytes (or
/// packed rows when `pitch` is 0), and `jpeg`/`jpeg_size` must be writable.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref, clippy::too_many_arguments)]
pub unsafe extern "C" fn jpegtensor_compress(
    handle: *mut JpegTensorHandle,
    source: *const c_uchar,
    width: u32,
    pitch: usize,
    height: u32,
    pixel_format: c_int,
    jpeg: *mut *mut c_uchar,
    jpeg_size: *mut usize,
    subsampling: c_int,
    quality: c_int,
    flags: u32,
) -> c_int {
    let Some(state) = (unsafe { state(handle) }) else {
        return JpegError::InvalidArgument as c_int;
    };
    if source.is_null() || jpeg.is_null() || jpeg_size.is_null() {
        return state.finish(Err(JpegError::InvalidArgument));
    }

    let result = (|| {
        let pixel_format = pixel_format_from_c(pixel_format)?;
        let subsampling = u8::try_from(subsampling)
            .map_err(|_| JpegError::InvalidArgumentSubsampling)
            .and_then(Subsampling::from_code)?;
        let quality = u8::try_from(quality).map_err(|_| JpegError::InvalidArgumentQuality)?;
        let row_size = width as usize * pixel_format.pixel_size();
        let source_size = if pitch == 0 { row_size } else { pitch } * height as usize;
        let source = unsafe { std::slice::from_raw_parts(source, source_size) };
        let options = EncodeOptions::from_flags(pixel_format, subsampling, quality, flags);
        let encoded = state.codec.encode(source, width, height, pitch, &options)?;
        let length = encoded.len();
        let buffer = Box::into_raw(encoded.into_boxed_slice()) as *mut c_uchar;
        unsafe {
            *jpeg = buffer;
            *jpeg_size = length;
        }
        Ok(())
    })();
    state.finish(result)
}

/// Release a buffer returned by `jpegtensor_compress`.
///
/// # Safety
/// `buffer` and `size` must be exactly what `jpegtensor_compress` returned.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegtensor_free(buffer: *mut c_uchar, size: usize) {
    if !buffer.is_null() {
        let _ = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buffer, size)) };
    }
}

/// Worst-case JPEG size for a `width` x `height` image, 0 for an invalid
/// subsampling code.
#[unsafe(no_mangle)]
pub extern "C" fn jpegtensor_buf_size(width: u32, height: u32, subsampling: c_int) -> usize {
    u8::try_from(subsampling)
        .ok()
        .and_then(|code| Subsampling::from_code(code).ok())
        .map_or(0, |subsampling| JpegCodec::new().buffer_size(width, height, subsampling))
}

fn pixel_format_from_c(code: c_int) -> Result<PixelFormat, JpegError> {
    u8::try_from(code)
        .map_err(|_| JpegError::InvalidArgumentPixelFormat)
        .and_then(PixelFormat::from_code)
}
