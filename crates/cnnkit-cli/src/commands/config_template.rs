//! Config-template command: emit the default [`NetworkConfig`] as JSON.

use crate::error::Result;
use cnnkit::NetworkConfig;
use std::path::Path;

pub(crate) fn run(output: Option<&Path>) -> Result<()> {
    let json = NetworkConfig::default().to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")?;
            tracing::info!(path = %path.display(), "Wrote configuration template");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_loads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("net.json");
        run(Some(&path)).expect("writable");
        let config = NetworkConfig::from_json_file(&path).expect("valid template");
        assert_eq!(config, NetworkConfig::default());
    }
}
