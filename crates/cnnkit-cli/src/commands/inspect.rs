//! Inspect command: header summary of an ORIG/QNT model file.

use crate::error::{require_file, Result};
use cnnkit::serialization::{inspect_model, load_model, ModelHeader};
use cnnkit::NetworkConfig;
use serde::Serialize;
use std::path::Path;

/// Model inspection result for JSON output
#[derive(Serialize)]
struct InspectResult {
    file: String,
    format: &'static str,
    version: i32,
    kernel_count: usize,
    weight_count: usize,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<bool>,
}

impl InspectResult {
    fn new(path: &Path, header: &ModelHeader, size_bytes: u64) -> Self {
        Self {
            file: path.display().to_string(),
            format: header.format.name(),
            version: header.version,
            kernel_count: header.kernel_count,
            weight_count: header.weight_count,
            size_bytes,
            decoded: None,
        }
    }
}

pub(crate) fn run(file: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    require_file(file)?;
    let header = inspect_model(file)?;
    let mut result = InspectResult::new(file, &header, std::fs::metadata(file)?.len());

    if let Some(config_path) = config {
        require_file(config_path)?;
        let config = NetworkConfig::from_json_file(config_path)?;
        load_model(file, &config)?;
        result.decoded = Some(true);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("File:     {}", result.file);
        println!("Format:   {} (version {})", result.format, result.version);
        println!("Kernels:  {}", result.kernel_count);
        println!("Weights:  {}", result.weight_count);
        println!("Size:     {} bytes", result.size_bytes);
        if result.decoded.is_some() {
            println!("Decoded:  weights match the configuration");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use cnnkit::serialization::{save_model, ModelFormat};
    use cnnkit::ConvNet;

    #[test]
    fn test_inspect_saved_model() {
        let dir = tempfile::tempdir().expect("temp dir");
        let model = dir.path().join("model.bin");
        let config_path = dir.path().join("net.json");
        let config = NetworkConfig::new(8, 8, 3, 2, 2).with_seed(1);
        std::fs::write(&config_path, config.to_json_pretty().expect("json")).expect("write");
        let net = ConvNet::new(config).expect("valid config");
        save_model(&model, &net, ModelFormat::Quantized).expect("write");

        run(&model, None, true).expect("valid header");
        run(&model, Some(&config_path), false).expect("matching config");
    }

    #[test]
    fn test_inspect_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = run(&dir.path().join("none.bin"), None, false).expect_err("missing");
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a model at all").expect("write");
        assert!(matches!(run(&path, None, false), Err(CliError::Model(_))));
    }
}
