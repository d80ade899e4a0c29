//! Model Serialization Module
//!
//! Two binary encodings share one layout; every integer and double is
//! big-endian:
//!
//! ```text
//! [4-byte signature: "ORIG" or "QNT\0"]
//! [4-byte i32 version = 1]
//! [4-byte i32 kernel count]
//! [kernel weights, kernel by kernel, row-major]
//! [dense weights, row-major]
//! ```
//!
//! `ORIG` stores each weight as an `f64`; `QNT` stores `round(w * 255)`
//! saturated to an `i8`, which decodes back to `b / 255`. No shapes and no
//! biases are stored: loading needs the [`NetworkConfig`] the model was
//! built with.
//!
//! The `QNT` layout is not byte-compatible with files that write a bare
//! 3-byte `"QNT"` signature or wrap (rather than saturate) out-of-range
//! bytes. Such a file's header shifts by one byte and is rejected with
//! [`CnnError::UnsupportedVersion`], and wrapped weights would decode with
//! the wrong sign.
//!
//! Example:
//! ```rust
//! use cnnkit::network::{ConvNet, NetworkConfig};
//! use cnnkit::serialization::{from_bytes, to_bytes, ModelFormat};
//!
//! let config = NetworkConfig::new(8, 8, 3, 2, 2).with_seed(1);
//! let net = ConvNet::new(config.clone()).expect("valid config");
//!
//! let bytes = to_bytes(&net, ModelFormat::Original).expect("encodable");
//! let loaded = from_bytes(&bytes, &config).expect("same configuration");
//! assert_eq!(loaded.kernels(), net.kernels());
//! ```
//!
//! [`NetworkConfig`]: crate::network::NetworkConfig
//! [`CnnError::UnsupportedVersion`]: crate::error::CnnError::UnsupportedVersion

mod model_file;

pub use model_file::{
    from_bytes, inspect_model, load_model, read_header, read_model, save_model, to_bytes,
    write_model, ModelFormat, ModelHeader, FORMAT_VERSION, HEADER_LEN, ORIG_MAGIC, QNT_MAGIC,
};
