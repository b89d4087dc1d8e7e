//! Python `_avif` extension module
//!
//! Positional constructors and tuple results follow the contract the Python
//! image plugin expects:
//!
//! ```python
//! from _avif import AvifEncoder, AvifDecoder
//!
//! enc = AvifEncoder(w, h, "4:2:0", -1, -1, 75, 6, 0, "auto", "full",
//!                   0, 0, False, True, b"", b"", 0, b"", None)
//! enc.add(rgb_bytes, 0, w, h, "RGB", True)
//! data = enc.finish()
//!
//! dec = AvifDecoder(data, "auto", "auto", 0)
//! width, height, n_frames, mode, icc, exif, orientation, xmp = dec.get_info()
//! pixels, timescale, pts, duration = dec.get_frame(0)
//! ```

use crate::{
    ChromaUpsampling, Decoder, DecoderConfig, Encoder, EncoderConfig, Error, ErrorKind,
    PixelLayout, Subsampling, YuvRange,
};
use pyo3::exceptions::{PyMemoryError, PyRuntimeError, PySyntaxError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyTuple};
use std::sync::{Arc, Mutex, MutexGuard};

fn to_py_err(err: whereat::At<Error>) -> PyErr {
    let err = err.into_inner();
    let message = err.to_string();
    if let Error::DimensionMismatch { .. } = err {
        return PyValueError::new_err(message);
    }
    match err.kind() {
        ErrorKind::InvalidArgument => PyValueError::new_err(message),
        ErrorKind::MalformedInput => PySyntaxError::new_err(message),
        ErrorKind::ResourceExhausted => PyMemoryError::new_err(message),
        ErrorKind::Runtime => PyRuntimeError::new_err(message),
    }
}

fn value_error(err: Error) -> PyErr {
    PyErr::new::<PyValueError, _>(err.to_string())
}

fn lock<T>(session: &Mutex<T>) -> PyResult<MutexGuard<'_, T>> {
    session
        .lock()
        .map_err(|_| PyRuntimeError::new_err("session is unusable after a panic"))
}

fn invalid_advanced() -> PyErr {
    PyValueError::new_err("Invalid advanced codec options")
}

/// `((key, value), ...)` with bytes keys and values, or `None`
fn advanced_options(advanced: &Bound<'_, PyAny>) -> PyResult<Vec<(Vec<u8>, Vec<u8>)>> {
    if advanced.is_none() {
        return Ok(Vec::new());
    }
    let options = advanced
        .downcast::<PyTuple>()
        .map_err(|_| invalid_advanced())?;
    let mut pairs = Vec::with_capacity(options.len());
    for item in options.iter() {
        let pair = item.downcast::<PyTuple>().map_err(|_| invalid_advanced())?;
        if pair.len() != 2 {
            return Err(invalid_advanced());
        }
        let key = pair.get_item(0)?;
        let value = pair.get_item(1)?;
        let key = key.downcast::<PyBytes>().map_err(|_| invalid_advanced())?;
        let value = value.downcast::<PyBytes>().map_err(|_| invalid_advanced())?;
        pairs.push((key.as_bytes().to_vec(), value.as_bytes().to_vec()));
    }
    Ok(pairs)
}

/// Multi-frame AVIF encoder
#[pyclass(name = "AvifEncoder", module = "_avif")]
struct PyAvifEncoder {
    inner: Mutex<Encoder>,
}

#[pymethods]
impl PyAvifEncoder {
    #[new]
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (
        width, height, subsampling, qmin, qmax, quality, speed, max_threads, codec, range,
        tile_rows_log2, tile_cols_log2, alpha_premultiplied, autotiling, icc, exif,
        exif_orientation, xmp, advanced
    ))]
    fn new(
        width: u32,
        height: u32,
        subsampling: &str,
        qmin: i32,
        qmax: i32,
        quality: i32,
        speed: i32,
        max_threads: u32,
        codec: &str,
        range: &str,
        tile_rows_log2: i32,
        tile_cols_log2: i32,
        alpha_premultiplied: bool,
        autotiling: bool,
        icc: &[u8],
        exif: &[u8],
        exif_orientation: i32,
        xmp: &[u8],
        advanced: &Bound<'_, PyAny>,
    ) -> PyResult<Self> {
        let range: YuvRange = range.parse().map_err(value_error)?;
        let subsampling: Subsampling = subsampling.parse().map_err(value_error)?;
        let mut config = EncoderConfig::new()
            .subsampling(subsampling)
            .range(range)
            .quality(quality)
            .speed(speed)
            .max_threads(max_threads)
            .codec(codec)
            .tile_rows_log2(tile_rows_log2)
            .tile_cols_log2(tile_cols_log2)
            .autotiling(autotiling)
            .alpha_premultiplied(alpha_premultiplied)
            .icc(icc)
            .exif(exif)
            .xmp(xmp)
            .exif_orientation(u8::try_from(exif_orientation).unwrap_or(u8::MAX));
        if qmin != -1 && qmax != -1 {
            config = config.quantizers(qmin, qmax);
        }
        for (key, value) in advanced_options(advanced)? {
            config = config.advanced_option(key, value);
        }
        let encoder = Encoder::new(width, height, &config).map_err(to_py_err)?;
        Ok(Self {
            inner: Mutex::new(encoder),
        })
    }

    /// Append one frame of RGB or RGBA bytes
    #[allow(clippy::too_many_arguments)]
    fn add(
        &self,
        py: Python<'_>,
        data: &[u8],
        duration: u64,
        width: u32,
        height: u32,
        mode: &str,
        is_single_frame: bool,
    ) -> PyResult<()> {
        let layout = PixelLayout::from_mode(mode);
        py.allow_threads(|| {
            lock(&self.inner)?
                .add(data, duration, width, height, layout, is_single_frame)
                .map_err(to_py_err)
        })
    }

    /// Finalize and return the encoded file
    fn finish<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyBytes>> {
        let bytes = py.allow_threads(|| lock(&self.inner)?.finish().map_err(to_py_err))?;
        Ok(PyBytes::new(py, &bytes))
    }
}

type InfoTuple<'py> = (
    u32,
    u32,
    u32,
    &'static str,
    Option<Bound<'py, PyBytes>>,
    Option<Bound<'py, PyBytes>>,
    u8,
    Option<Bound<'py, PyBytes>>,
);

/// AVIF decoder bound to one file's bytes
#[pyclass(name = "AvifDecoder", module = "_avif")]
struct PyAvifDecoder {
    inner: Mutex<Decoder>,
}

#[pymethods]
impl PyAvifDecoder {
    #[new]
    fn new(
        py: Python<'_>,
        data: &[u8],
        codec: &str,
        upsampling: &str,
        max_threads: u32,
    ) -> PyResult<Self> {
        let upsampling: ChromaUpsampling = upsampling.parse().map_err(value_error)?;
        let config = DecoderConfig::new()
            .codec(codec)
            .upsampling(upsampling)
            .threads(max_threads);
        let data: Arc<[u8]> = Arc::from(data);
        let decoder = py.allow_threads(|| Decoder::new(data, &config).map_err(to_py_err))?;
        Ok(Self {
            inner: Mutex::new(decoder),
        })
    }

    /// `(width, height, frames, mode, icc, exif, orientation, xmp)`
    fn get_info<'py>(&self, py: Python<'py>) -> PyResult<InfoTuple<'py>> {
        let decoder = lock(&self.inner)?;
        let info = decoder.info();
        let bytes = |data: &Option<Vec<u8>>| data.as_deref().map(|d| PyBytes::new(py, d));
        Ok((
            info.width,
            info.height,
            info.frame_count,
            info.mode(),
            bytes(&info.icc),
            bytes(&info.exif),
            info.orientation.exif(),
            bytes(&info.xmp),
        ))
    }

    /// `(pixels, timescale, pts, duration)` for frame `index`
    fn get_frame<'py>(
        &self,
        py: Python<'py>,
        index: u32,
    ) -> PyResult<(Bound<'py, PyBytes>, u64, u64, u64)> {
        let frame = py.allow_threads(|| lock(&self.inner)?.frame(index).map_err(to_py_err))?;
        Ok((
            PyBytes::new(py, &frame.pixels),
            frame.timescale,
            frame.pts,
            frame.duration,
        ))
    }
}

#[pyfunction]
#[pyo3(name = "AvifCodecVersions")]
fn avif_codec_versions() -> String {
    crate::codec_versions()
}

#[pyfunction]
fn decoder_codec_available(codec: &str) -> bool {
    crate::decoder_codec_available(codec)
}

#[pyfunction]
fn encoder_codec_available(codec: &str) -> bool {
    crate::encoder_codec_available(codec)
}

#[pymodule]
fn _avif(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyAvifEncoder>()?;
    m.add_class::<PyAvifDecoder>()?;
    m.add_function(wrap_pyfunction!(avif_codec_versions, m)?)?;
    m.add_function(wrap_pyfunction!(decoder_codec_available, m)?)?;
    m.add_function(wrap_pyfunction!(encoder_codec_available, m)?)?;
    m.add("libavif_version", crate::libavif_version())?;
    m.add("VERSION", crate::version_tuple())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyo3::types::PyDict;

    fn with_module<F>(f: F)
    where
        F: for<'py> FnOnce(Python<'py>, &Bound<'py, PyDict>),
    {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let module = PyModule::new(py, "_avif").unwrap();
            _avif(&module).unwrap();
            let globals = PyDict::new(py);
            globals.set_item("_avif", module).unwrap();
            f(py, &globals);
        });
    }

    #[test]
    fn encode_then_decode_through_python() {
        with_module(|py, globals| {
            py.run(
                c"
enc = _avif.AvifEncoder(4, 4, '4:2:0', -1, -1, 75, 10, 0, 'auto', 'full',
                        0, 0, False, True, b'', b'', 0, b'', None)
enc.add(b'Z' * 48, 0, 4, 4, 'RGB', True)
data = enc.finish()
assert isinstance(data, bytes) and len(data) > 0

dec = _avif.AvifDecoder(data, 'auto', 'auto', 0)
info = dec.get_info()
assert len(info) == 8, info
width, height, frames, mode, icc, exif, orientation, xmp = info
assert (width, height, frames, mode) == (4, 4, 1, 'RGB'), info
assert icc is None and exif is None and xmp is None
assert orientation == 1

frame = dec.get_frame(0)
assert len(frame) == 4
pixels, timescale, pts, duration = frame
assert len(pixels) == 48
assert pts == 0
",
                Some(globals),
                None,
            )
            .unwrap();
        });
    }

    #[test]
    fn advanced_options_accept_none_or_pairs() {
        with_module(|py, globals| {
            py.run(
                c"
args = (8, 8, '4:4:4', -1, -1, 90, 10, 0, 'auto', 'limited', 0, 0, False, False,
        b'', b'', 0, b'')
_avif.AvifEncoder(*args, None)
_avif.AvifEncoder(*args, ())
_avif.AvifEncoder(*args, ((b'tune', b'ssim'),))
",
                Some(globals),
                None,
            )
            .unwrap();

            for advanced in [
                c"[(b'tune', b'ssim')]",
                c"((b'tune',),)",
                c"(('tune', 'ssim'),)",
                c"(b'tune',)",
            ] {
                globals.set_item("advanced", py.eval(advanced, None, None).unwrap()).unwrap();
                let err = py
                    .run(
                        c"_avif.AvifEncoder(8, 8, '4:2:0', -1, -1, 75, 6, 0, 'auto', 'full', 0, 0, False, True, b'', b'', 0, b'', advanced)",
                        Some(globals),
                        None,
                    )
                    .unwrap_err();
                assert!(err.is_instance_of::<PyValueError>(py), "{err}");
                assert_eq!(
                    err.value(py).to_string(),
                    "Invalid advanced codec options"
                );
            }
        });
    }

    #[test]
    fn junk_orientation_still_encodes() {
        with_module(|py, globals| {
            py.run(
                c"
for code in (9, -1, 300):
    enc = _avif.AvifEncoder(4, 4, '4:2:0', -1, -1, 75, 10, 0, 'auto', 'full',
                            0, 0, False, True, b'', b'', code, b'', None)
    enc.add(bytes(48), 0, 4, 4, 'RGB', True)
    dec = _avif.AvifDecoder(enc.finish(), 'auto', 'auto', 0)
    assert dec.get_info()[6] == 1
",
                Some(globals),
                None,
            )
            .unwrap();
        });
    }

    #[test]
    fn errors_map_to_python_exceptions() {
        with_module(|py, globals| {
            let err = py
                .run(
                    c"_avif.AvifDecoder(b'not an avif file at all', 'auto', 'auto', 0)",
                    Some(globals),
                    None,
                )
                .unwrap_err();
            assert!(err.is_instance_of::<PySyntaxError>(py), "{err}");

            let err = py
                .run(
                    c"
enc = _avif.AvifEncoder(4, 4, '4:2:0', -1, -1, 75, 10, 0, 'auto', 'full',
                        0, 0, False, True, b'', b'', 0, b'', None)
enc.add(bytes(24), 0, 4, 2, 'RGB', False)
",
                    Some(globals),
                    None,
                )
                .unwrap_err();
            assert!(err.is_instance_of::<PyValueError>(py), "{err}");
            assert_eq!(
                err.value(py).to_string(),
                "Image sequence dimensions mismatch, 4x4 != 4x2"
            );

            let err = py
                .run(
                    c"_avif.AvifEncoder(0, 4, '4:2:0', -1, -1, 75, 6, 0, 'auto', 'full', 0, 0, False, True, b'', b'', 0, b'', None)",
                    Some(globals),
                    None,
                )
                .unwrap_err();
            assert!(err.is_instance_of::<PyValueError>(py), "{err}");

            let err = py
                .run(
                    c"_avif.AvifDecoder(b'', 'auto', 'sharp', 0)",
                    Some(globals),
                    None,
                )
                .unwrap_err();
            assert!(err.is_instance_of::<PyValueError>(py), "{err}");
        });
    }
}
