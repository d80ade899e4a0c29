//! Reading and writing the ORIG / QNT model files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{CnnError, Result};
use crate::network::{ConvNet, NetworkConfig};

/// Signature of a full-precision model file.
pub const ORIG_MAGIC: [u8; 4] = *b"ORIG";

/// Signature of a quantized model file (`"QNT"` padded to four bytes).
pub const QNT_MAGIC: [u8; 4] = [b'Q', b'N', b'T', 0];

/// The only version this crate reads or writes.
pub const FORMAT_VERSION: i32 = 1;

/// Signature, version and kernel count.
pub const HEADER_LEN: usize = 12;

/// Scale between a weight and its QNT byte.
const QNT_SCALE: f64 = 255.0;

/// Weight encoding of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    /// Every weight as an 8-byte IEEE-754 double.
    Original,
    /// Every weight as one signed byte, `round(w * 255)` saturated to `i8`.
    Quantized,
}

impl ModelFormat {
    /// File signature.
    #[must_use]
    pub const fn magic(self) -> [u8; 4] {
        match self {
            Self::Original => ORIG_MAGIC,
            Self::Quantized => QNT_MAGIC,
        }
    }

    /// Parse a file signature.
    #[must_use]
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        match magic {
            ORIG_MAGIC => Some(Self::Original),
            QNT_MAGIC => Some(Self::Quantized),
            _ => None,
        }
    }

    /// Bytes used per weight.
    #[must_use]
    pub const fn bytes_per_weight(self) -> usize {
        match self {
            Self::Original => 8,
            Self::Quantized => 1,
        }
    }

    /// Short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Original => "ORIG",
            Self::Quantized => "QNT",
        }
    }

    fn encode(self, weight: f64, out: &mut Vec<u8>) {
        match self {
            Self::Original => out.extend_from_slice(&weight.to_be_bytes()),
            Self::Quantized => {
                let q = (weight * QNT_SCALE).round().clamp(-128.0, 127.0) as i8;
                out.extend_from_slice(&q.to_be_bytes());
            }
        }
    }

    fn decode(self, chunk: &[u8]) -> f64 {
        match self {
            Self::Original => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_be_bytes(raw)
            }
            Self::Quantized => f64::from(i8::from_be_bytes([chunk[0]])) / QNT_SCALE,
        }
    }
}

/// Decoded fixed header of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    /// Weight encoding.
    pub format: ModelFormat,
    /// Format version.
    pub version: i32,
    /// Number of convolution kernels.
    pub kernel_count: usize,
    /// Weights stored after the header (kernels and dense matrix together).
    pub weight_count: usize,
}

/// Encodes a network's kernels and dense weights.
///
/// Biases and shapes are not stored; [`from_bytes`] rebuilds them from a
/// [`NetworkConfig`].
///
/// # Errors
///
/// Returns an error if the kernel count doesn't fit in an `i32`.
pub fn to_bytes(net: &ConvNet, format: ModelFormat) -> Result<Vec<u8>> {
    let kernel_count = i32::try_from(net.kernels().len())
        .map_err(|_| CnnError::format("kernel count exceeds i32"))?;
    let weights = net.architecture().weight_count();

    let mut out = Vec::with_capacity(HEADER_LEN + weights * format.bytes_per_weight());
    out.extend_from_slice(&format.magic());
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&kernel_count.to_be_bytes());
    for kernel in net.kernels() {
        for &w in kernel.as_slice() {
            format.encode(w, &mut out);
        }
    }
    for &w in net.dense().weights().as_slice() {
        format.encode(w, &mut out);
    }
    Ok(out)
}

/// Writes a model to any sink.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_model<W: Write>(writer: &mut W, net: &ConvNet, format: ModelFormat) -> Result<()> {
    writer.write_all(&to_bytes(net, format)?)?;
    Ok(())
}

/// Saves a model to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file can't be created or written.
pub fn save_model(path: impl AsRef<Path>, net: &ConvNet, format: ModelFormat) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_model(&mut writer, net, format)?;
    writer.flush()?;
    info!(path = %path.display(), format = format.name(), "Saved model");
    Ok(())
}

/// Decodes the fixed header and counts the stored weights.
///
/// # Errors
///
/// Returns [`CnnError::FormatError`] for a short buffer, an unknown
/// signature, a negative kernel count or a ragged payload, and
/// [`CnnError::UnsupportedVersion`] for any version other than 1.
pub fn read_header(bytes: &[u8]) -> Result<ModelHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(CnnError::format(format!(
            "file too short for header: {} bytes",
            bytes.len()
        )));
    }
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let format = ModelFormat::from_magic(magic).ok_or_else(|| {
        CnnError::format(format!(
            "unknown signature {:?}",
            String::from_utf8_lossy(&magic)
        ))
    })?;
    let version = i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(CnnError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let kernel_count = i32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let kernel_count = usize::try_from(kernel_count)
        .map_err(|_| CnnError::format(format!("negative kernel count {kernel_count}")))?;

    let payload = bytes.len() - HEADER_LEN;
    if payload % format.bytes_per_weight() != 0 {
        return Err(CnnError::format(format!(
            "payload of {payload} bytes is not a whole number of {} weights",
            format.name()
        )));
    }
    Ok(ModelHeader {
        format,
        version,
        kernel_count,
        weight_count: payload / format.bytes_per_weight(),
    })
}

/// Rebuilds a network from `config` and fills it with stored weights.
///
/// # Errors
///
/// Everything [`read_header`] rejects, plus a kernel count that differs
/// from `config.num_kernels` and a payload that is truncated or has
/// trailing bytes for the configured shapes.
pub fn from_bytes(bytes: &[u8], config: &NetworkConfig) -> Result<ConvNet> {
    let header = read_header(bytes)?;
    if header.kernel_count != config.num_kernels {
        return Err(CnnError::format(format!(
            "file has {} kernels, configuration expects {}",
            header.kernel_count, config.num_kernels
        )));
    }
    let mut net = ConvNet::new(config.clone())?;
    let kernel_weights = config.num_kernels * config.kernel_size * config.kernel_size;
    let expected = net.architecture().weight_count();
    if header.weight_count < expected {
        return Err(CnnError::format(format!(
            "truncated model: {} weights stored, {expected} expected",
            header.weight_count
        )));
    }
    if header.weight_count > expected {
        return Err(CnnError::format(format!(
            "{} trailing weights after model data",
            header.weight_count - expected
        )));
    }

    let weights: Vec<f64> = bytes[HEADER_LEN..]
        .chunks_exact(header.format.bytes_per_weight())
        .map(|chunk| header.format.decode(chunk))
        .collect();
    let (kernels, dense) = weights.split_at(kernel_weights);
    net.load_parameters(kernels, dense)?;
    debug!(
        format = header.format.name(),
        weights = expected,
        "Decoded model weights"
    );
    Ok(net)
}

/// Reads a model from any source.
///
/// # Errors
///
/// Returns an error if reading or decoding fails.
pub fn read_model<R: Read>(reader: &mut R, config: &NetworkConfig) -> Result<ConvNet> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    from_bytes(&bytes, config)
}

/// Loads a model saved by [`save_model`].
///
/// # Errors
///
/// Returns an error if the file can't be read or decoded.
pub fn load_model(path: impl AsRef<Path>, config: &NetworkConfig) -> Result<ConvNet> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let net = read_model(&mut reader, config)?;
    info!(path = %path.display(), "Loaded model");
    Ok(net)
}

/// Reads just the header of a model file.
///
/// # Errors
///
/// Returns an error if the file can't be read or its header is invalid.
pub fn inspect_model(path: impl AsRef<Path>) -> Result<ModelHeader> {
    read_header(&std::fs::read(path)?)
}
