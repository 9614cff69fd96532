//! Python bindings for jpegtensor-rs using PyO3.
//!
//! The module mirrors PyTurboJPEG: a `TurboJPEG` class with decode/encode/
//! transform methods and the `TJPF_*`, `TJSAMP_*`, `TJXOP_*` constants.
//! Decoded images can also come back as `Tensor` objects that hand their
//! bytes to NumPy or PyTorch without a compile-time dependency on either.

use jpegtensor_rs::options::flags;
use jpegtensor_rs::{
    CropRegion, DecodeOptions, EncodeOptions, ImageTensor, JpegCodec, JpegError, PixelFormat, ScalingFactor,
    Subsampling, TensorLayout, Transform, TransformOperation, TransformOptions,
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{IntoPyDict, PyByteArray, PyBytes, PyList, PyTuple};

fn to_py_err(error: JpegError) -> PyErr {
    PyErr::new::<PyValueError, _>(format!("{} (code {})", error, error as i32))
}

fn pixel_format(code: u8) -> PyResult<PixelFormat> {
    PixelFormat::from_code(code).map_err(to_py_err)
}

fn scaling(factor: Option<(u32, u32)>) -> PyResult<ScalingFactor> {
    let (num, denom) = factor.unwrap_or((1, 1));
    ScalingFactor::new(num, denom.max(1)).validate().map_err(to_py_err)
}

fn layout(name: &str) -> PyResult<TensorLayout> {
    match name {
        "hwc" | "HWC" => Ok(TensorLayout::Hwc),
        "chw" | "CHW" => Ok(TensorLayout::Chw),
        other => Err(PyErr::new::<PyValueError, _>(format!("Unsupported layout: {}", other))),
    }
}

/// Header facts of a JPEG image.
#[pyclass]
#[derive(Clone)]
struct Header {
    #[pyo3(get)]
    width: u32,
    #[pyo3(get)]
    height: u32,
    /// TJSAMP_* value, -1 for unusual sampling factors.
    #[pyo3(get)]
    subsampling: i32,
    /// TJCS_* value.
    #[pyo3(get)]
    colorspace: i32,
    #[pyo3(get)]
    components: usize,
}

#[pymethods]
impl Header {
    fn __repr__(&self) -> String {
        format!(
            "Header(width={}, height={}, subsampling={}, colorspace={}, components={})",
            self.width, self.height, self.subsampling, self.colorspace, self.components
        )
    }
}

/// Decoded u8 image tensor.
#[pyclass]
struct Tensor {
    inner: ImageTensor,
}

#[pymethods]
impl Tensor {
    #[getter]
    fn shape<'py>(&self, py: Python<'py>) -> &'py PyTuple {
        PyTuple::new(py, self.inner.shape())
    }

    #[getter]
    fn layout(&self) -> &'static str {
        match self.inner.layout() {
            TensorLayout::Hwc => "hwc",
            TensorLayout::Chw => "chw",
        }
    }

    fn bytes<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, self.inner.as_slice())
    }

    /// Tensor in `.npy` format.
    fn npy<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, &self.inner.to_npy())
    }

    /// Copy as a `numpy.ndarray` of dtype uint8.
    fn numpy<'py>(&self, py: Python<'py>) -> PyResult<&'py PyAny> {
        let numpy = py.import("numpy")?;
        let flat = numpy.call_method1("frombuffer", (self.bytes(py), "uint8"))?;
        flat.call_method1("reshape", (PyTuple::new(py, self.inner.shape()),))?
            .call_method0("copy")
    }

    /// Copy as a `torch.Tensor` of dtype uint8.
    fn torch<'py>(&self, py: Python<'py>) -> PyResult<&'py PyAny> {
        let torch = py.import("torch")?;
        let buffer = PyByteArray::new(py, self.inner.as_slice());
        let kwargs = [("dtype", torch.getattr("uint8")?)].into_py_dict(py);
        torch
            .call_method("frombuffer", (buffer,), Some(kwargs))?
            .call_method1("reshape", (PyTuple::new(py, self.inner.shape()),))
    }

    fn __repr__(&self) -> String {
        format!("Tensor(shape={:?}, layout='{}')", self.inner.shape(), self.layout())
    }
}

/// TurboJPEG-style codec.
#[pyclass]
struct TurboJPEG {
    codec: JpegCodec,
}

#[pymethods]
impl TurboJPEG {
    #[new]
    fn new() -> Self {
        Self { codec: JpegCodec::new() }
    }

    fn decode_header(&self, jpeg: &[u8]) -> PyResult<Header> {
        let header = self.codec.decode_header(jpeg).map_err(to_py_err)?;
        Ok(Header {
            width: header.width,
            height: header.height,
            subsampling: header.subsampling.map_or(-1, |s| u8::from(s) as i32),
            colorspace: u8::from(header.color_space) as i32,
            components: header.component_count(),
        })
    }

    /// Decode to packed pixels. Returns `(bytes, width, height)`.
    #[pyo3(signature = (jpeg, pixel_format = 0, scaling_factor = None, flags = 0))]
    fn decode<'py>(
        &self,
        py: Python<'py>,
        jpeg: &[u8],
        pixel_format: u8,
        scaling_factor: Option<(u32, u32)>,
        flags: u32,
    ) -> PyResult<(&'py PyBytes, u32, u32)> {
        let options = DecodeOptions::from_flags(self::pixel_format(pixel_format)?, flags).with_scaling(scaling(scaling_factor)?);
        let image = self.codec.decode(jpeg, &options).map_err(to_py_err)?;
        Ok((PyBytes::new(py, &image.data), image.width, image.height))
    }

    /// Decode to a `Tensor` in "hwc" or "chw" layout.
    #[pyo3(signature = (jpeg, pixel_format = 0, scaling_factor = None, layout = "chw", flags = 0))]
    fn decode_tensor(
        &self,
        jpeg: &[u8],
        pixel_format: u8,
        scaling_factor: Option<(u32, u32)>,
        layout: &str,
        flags: u32,
    ) -> PyResult<Tensor> {
        let options = DecodeOptions::from_flags(self::pixel_format(pixel_format)?, flags).with_scaling(scaling(scaling_factor)?);
        let inner = self
            .codec
            .decode_tensor(jpeg, &options, self::layout(layout)?)
            .map_err(to_py_err)?;
        Ok(Tensor { inner })
    }

    /// Decode to planar YUV. Returns `(planes, subsampling)` with one
    /// `(bytes, width, height)` entry per plane.
    #[pyo3(signature = (jpeg, scaling_factor = None, flags = 0))]
    fn decode_to_yuv<'py>(
        &self,
        py: Python<'py>,
        jpeg: &[u8],
        scaling_factor: Option<(u32, u32)>,
        flags: u32,
    ) -> PyResult<(&'py PyList, u8)> {
        let options = DecodeOptions::from_flags(PixelFormat::Rgb, flags).with_scaling(scaling(scaling_factor)?);
        let yuv = self.codec.decode_to_yuv(jpeg, &options).map_err(to_py_err)?;
        let planes = PyList::empty(py);
        for plane in &yuv.planes {
            planes.append((PyBytes::new(py, &plane.data), plane.width, plane.height))?;
        }
        Ok((planes, u8::from(yuv.subsampling)))
    }

    #[pyo3(signature = (pixels, width, height, quality = 85, pixel_format = 0, jpeg_subsample = 1, flags = 0))]
    #[allow(clippy::too_many_arguments)]
    fn encode<'py>(
        &self,
        py: Python<'py>,
        pixels: &[u8],
        width: u32,
        height: u32,
        quality: u8,
        pixel_format: u8,
        jpeg_subsample: u8,
        flags: u32,
    ) -> PyResult<&'py PyBytes> {
        let subsampling = Subsampling::from_code(jpeg_subsample).map_err(to_py_err)?;
        let options = EncodeOptions::from_flags(self::pixel_format(pixel_format)?, subsampling, quality, flags);
        let jpeg = self
            .codec
            .encode(pixels, width, height, 0, &options)
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &jpeg))
    }

    /// Lossless transform with a TJXOP_* operation and TJXOPT_* options.
    #[pyo3(signature = (jpeg, op = 0, options = 0, crop = None))]
    fn transform<'py>(
        &self,
        py: Python<'py>,
        jpeg: &[u8],
        op: u8,
        options: u32,
        crop: Option<(u32, u32, u32, u32)>,
    ) -> PyResult<&'py PyBytes> {
        let operation = TransformOperation::from_code(op).map_err(to_py_err)?;
        let mut transform = Transform::new(operation).with_options(TransformOptions::from_bits(options));
        if let Some((x, y, w, h)) = crop {
            transform = transform.with_crop(CropRegion::new(x, y, w, h));
        }
        let output = self.codec.transform(jpeg, &transform).map_err(to_py_err)?;
        Ok(PyBytes::new(py, &output))
    }

    #[pyo3(signature = (jpeg, x, y, w, h, preserve = false))]
    #[allow(clippy::too_many_arguments)]
    fn crop<'py>(
        &self,
        py: Python<'py>,
        jpeg: &[u8],
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        preserve: bool,
    ) -> PyResult<&'py PyBytes> {
        let output = self
            .codec
            .crop(jpeg, CropRegion::new(x, y, w, h), !preserve)
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &output))
    }

    #[pyo3(signature = (jpeg, scaling_factor, quality))]
    fn scale_with_quality<'py>(
        &self,
        py: Python<'py>,
        jpeg: &[u8],
        scaling_factor: (u32, u32),
        quality: u8,
    ) -> PyResult<&'py PyBytes> {
        let output = self
            .codec
            .scale_with_quality(jpeg, scaling(Some(scaling_factor))?, quality)
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &output))
    }

    #[getter]
    fn scaling_factors(&self) -> Vec<(u32, u32)> {
        self.codec
            .scaling_factors()
            .iter()
            .map(|factor| (factor.num, factor.denom))
            .collect()
    }
}

fn add_constants(m: &PyModule) -> PyResult<()> {
    let pixel_formats = [
        "TJPF_RGB", "TJPF_BGR", "TJPF_RGBX", "TJPF_BGRX", "TJPF_XBGR", "TJPF_XRGB", "TJPF_GRAY", "TJPF_RGBA",
        "TJPF_BGRA", "TJPF_ABGR", "TJPF_ARGB", "TJPF_CMYK",
    ];
    for (code, name) in pixel_formats.iter().enumerate() {
        m.add(name, code)?;
    }
    for (code, name) in ["TJCS_RGB", "TJCS_YCbCr", "TJCS_GRAY", "TJCS_CMYK", "TJCS_YCCK"].iter().enumerate() {
        m.add(name, code)?;
    }
    let subsamplings = [
        "TJSAMP_444", "TJSAMP_422", "TJSAMP_420", "TJSAMP_GRAY", "TJSAMP_440", "TJSAMP_411", "TJSAMP_441",
    ];
    for (code, name) in subsamplings.iter().enumerate() {
        m.add(name, code)?;
    }
    let operations = [
        "TJXOP_NONE", "TJXOP_HFLIP", "TJXOP_VFLIP", "TJXOP_TRANSPOSE", "TJXOP_TRANSVERSE", "TJXOP_ROT90",
        "TJXOP_ROT180", "TJXOP_ROT270",
    ];
    for (code, name) in operations.iter().enumerate() {
        m.add(name, code)?;
    }
    m.add("TJXOPT_PERFECT", TransformOptions::PERFECT)?;
    m.add("TJXOPT_TRIM", TransformOptions::TRIM)?;
    m.add("TJXOPT_CROP", TransformOptions::CROP)?;
    m.add("TJXOPT_GRAY", TransformOptions::GRAY)?;
    m.add("TJXOPT_NOOUTPUT", TransformOptions::NOOUTPUT)?;
    m.add("TJXOPT_PROGRESSIVE", TransformOptions::PROGRESSIVE)?;
    m.add("TJXOPT_COPYNONE", TransformOptions::COPYNONE)?;
    m.add("TJFLAG_BOTTOMUP", flags::BOTTOMUP)?;
    m.add("TJFLAG_FASTUPSAMPLE", flags::FASTUPSAMPLE)?;
    m.add("TJFLAG_FASTDCT", flags::FASTDCT)?;
    m.add("TJFLAG_ACCURATEDCT", flags::ACCURATEDCT)?;
    m.add("TJFLAG_STOPONWARNING", flags::STOPONWARNING)?;
    m.add("TJFLAG_PROGRESSIVE", flags::PROGRESSIVE)?;
    m.add("TJFLAG_LIMITSCANS", flags::LIMITSCANS)?;
    Ok(())
}

/// jpegtensor Python module.
#[pymodule]
fn jpegtensor(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<Header>()?;
    m.add_class::<Tensor>()?;
    m.add_class::<TurboJPEG>()?;
    add_constants(m)?;
    Ok(())
}
