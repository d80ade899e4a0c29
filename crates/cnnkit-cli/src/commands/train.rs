//! Train command: fit a network on synthetic bar images.

use crate::error::{require_file, CliError, Result};
use clap::{Args, ValueEnum};
use cnnkit::data::synthetic;
use cnnkit::distillation::{DEFAULT_ALPHA, DEFAULT_TEMPERATURE};
use cnnkit::metrics::ClassificationReport;
use cnnkit::network::{CompressionConfig, Trainer, TrainerConfig};
use cnnkit::serialization::{save_model, ModelFormat};
use cnnkit::{ConvNet, NetworkConfig};
use std::path::PathBuf;
use tracing::info;

/// On-disk weight encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    /// 8-byte doubles
    Orig,
    /// 1-byte saturating codes
    Qnt,
}

impl From<FormatArg> for ModelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Orig => ModelFormat::Original,
            FormatArg::Qnt => ModelFormat::Quantized,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct TrainArgs {
    /// Network configuration (JSON); defaults to a 2-kernel net on 8x8 images
    #[arg(short, long, value_name = "CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Image side length when no configuration file is given
    #[arg(long, default_value = "8")]
    pub(crate) size: usize,

    /// Synthetic training samples per class
    #[arg(long, default_value = "16")]
    pub(crate) samples_per_class: usize,

    /// Maximum number of epochs
    #[arg(short, long, default_value = "50")]
    pub(crate) epochs: usize,

    /// Samples per logging batch
    #[arg(long, default_value = "30")]
    pub(crate) batch_size: usize,

    /// Epochs without validation improvement before stopping (0 disables)
    #[arg(long, default_value = "0")]
    pub(crate) patience: usize,

    /// Seed for data, initialization and shuffling
    #[arg(long, default_value = "42")]
    pub(crate) seed: u64,

    /// Enable magnitude pruning at this sparsity
    #[arg(long, value_name = "SPARSITY")]
    pub(crate) prune: Option<f64>,

    /// Quantize weights to 8-bit levels after training
    #[arg(long)]
    pub(crate) quantize: bool,

    /// Train a teacher with this many kernels first and distil from it
    #[arg(long, value_name = "N")]
    pub(crate) teacher_kernels: Option<usize>,

    /// Save the trained model here
    #[arg(short, long, value_name = "FILE")]
    pub(crate) output: Option<PathBuf>,

    /// Encoding of the saved model
    #[arg(long, value_enum, default_value = "orig")]
    pub(crate) format: FormatArg,
}

fn resolve_config(args: &TrainArgs) -> Result<NetworkConfig> {
    let mut config = match &args.config {
        Some(path) => {
            require_file(path)?;
            NetworkConfig::from_json_file(path)?
        }
        None => NetworkConfig::new(args.size, args.size, 3, 2, 2),
    };
    if config.seed.is_none() {
        config.seed = Some(args.seed);
    }

    let mut compression = config.compression;
    if let Some(sparsity) = args.prune {
        compression = compression.with_pruning(sparsity);
    }
    if args.quantize {
        compression = compression.with_quantization();
    }
    if args.teacher_kernels.is_some() && !compression.enable_distillation {
        compression = compression.with_distillation(DEFAULT_TEMPERATURE, DEFAULT_ALPHA);
    }
    config.compression = compression;

    if config.input_width != config.input_height {
        return Err(CliError::InvalidConfig(format!(
            "synthetic bars need square images, got {}x{}",
            config.input_width, config.input_height
        )));
    }
    if config.fc_output_size != 2 {
        return Err(CliError::InvalidConfig(format!(
            "synthetic bars have 2 classes, configuration has {}",
            config.fc_output_size
        )));
    }
    config.architecture()?;
    if config.input_width < 3 {
        return Err(CliError::InvalidConfig(
            "synthetic bars need images of at least 3x3".to_string(),
        ));
    }
    Ok(config)
}

pub(crate) fn run(args: &TrainArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let train = synthetic::bars(args.samples_per_class, config.input_width, args.seed);
    let validation = synthetic::bars(
        args.samples_per_class.div_ceil(4).max(1),
        config.input_width,
        args.seed.wrapping_add(1),
    );
    let trainer = Trainer::new(
        TrainerConfig::default()
            .with_epochs(args.epochs)
            .with_batch_size(args.batch_size)
            .with_patience(args.patience)
            .with_seed(args.seed),
    );

    let teacher = match args.teacher_kernels {
        Some(num_kernels) => {
            let mut teacher_config = config.clone();
            teacher_config.num_kernels = num_kernels;
            teacher_config.compression = CompressionConfig::default();
            let mut teacher = ConvNet::new(teacher_config)?;
            let history = trainer.fit(&mut teacher, &train, &validation, None)?;
            info!(
                num_kernels,
                best_accuracy = history.best_accuracy,
                "Teacher trained"
            );
            Some(teacher)
        }
        None => None,
    };

    let mut net = ConvNet::new(config)?;
    println!("{}", net.architecture());
    let history = trainer.fit(&mut net, &train, &validation, teacher.as_ref())?;
    if let (Some(first), Some(last)) = (history.initial_loss(), history.final_loss()) {
        println!(
            "Trained {} epochs: loss {first:.4} -> {last:.4}, best accuracy {:.2}%{}",
            history.epochs.len(),
            history.best_accuracy * 100.0,
            if history.stopped_early {
                " (stopped early)"
            } else {
                ""
            }
        );
    }

    let quantized = net.quantize_model();
    if !quantized.is_noop() {
        println!("Quantized {} weights", quantized.weights_quantized());
    }
    println!("{}", ClassificationReport::compute(&net, &validation)?);

    if let Some(path) = &args.output {
        let format = ModelFormat::from(args.format);
        save_model(path, &net, format)?;
        println!("Saved {} model to {}", format.name(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnnkit::serialization::{inspect_model, load_model};

    fn args() -> TrainArgs {
        TrainArgs {
            config: None,
            size: 8,
            samples_per_class: 4,
            epochs: 2,
            batch_size: 4,
            patience: 0,
            seed: 7,
            prune: None,
            quantize: false,
            teacher_kernels: None,
            output: None,
            format: FormatArg::Orig,
        }
    }

    #[test]
    fn test_flags_enable_compression() {
        let config = resolve_config(&TrainArgs {
            prune: Some(0.3),
            quantize: true,
            teacher_kernels: Some(4),
            ..args()
        })
        .expect("valid");
        assert!(config.compression.enable_pruning);
        assert_eq!(config.compression.pruning_sparsity, 0.3);
        assert!(config.compression.enable_quantization);
        assert!(config.compression.enable_distillation);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_rejects_non_bars_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("net.json");
        let config = NetworkConfig::new(8, 8, 3, 2, 10);
        std::fs::write(&path, config.to_json_pretty().expect("json")).expect("write");
        let err = resolve_config(&TrainArgs {
            config: Some(path),
            ..args()
        })
        .expect_err("ten classes");
        assert!(matches!(err, CliError::InvalidConfig(_)));
    }

    #[test]
    fn test_train_and_save_quantized() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = dir.path().join("student.bin");
        run(&TrainArgs {
            quantize: true,
            teacher_kernels: Some(3),
            output: Some(output.clone()),
            format: FormatArg::Qnt,
            ..args()
        })
        .expect("training succeeds");

        let header = inspect_model(&output).expect("valid header");
        assert_eq!(header.format, ModelFormat::Quantized);
        assert_eq!(header.kernel_count, 2);
        let config = resolve_config(&args()).expect("valid");
        load_model(&output, &config).expect("decodes against the same shape");
    }
}
