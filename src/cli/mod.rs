// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap, loads the JSON config and
// hands it to a Layer 2 use case. Results are printed here and
// nowhere else.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs};

use crate::application::config::{KgcConfig, MawpsConfig};
use crate::infra::config_loader::load_json_config;

#[derive(Parser, Debug)]
#[command(
    name = "gnn-nlp",
    version = "0.1.0",
    about = "Graph-to-tree math word problem solving and knowledge-graph completion."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::MawpsTrain(args) => run_mawps_train(args),
            Commands::KgcTrain(args)   => run_kgc_train(args),
            Commands::KgcInfer(args)   => run_kgc_infer(args),
        }
    }
}

fn run_mawps_train(args: ConfigArgs) -> Result<()> {
    use crate::application::mawps_train_use_case::MawpsTrainUseCase;

    let config: MawpsConfig = load_json_config(&args.json_config)?;
    let out_dir = config.checkpoint_args.out_dir.clone();
    let best = MawpsTrainUseCase::new(config).execute()?;

    println!(
        "\nBest model: epoch {} | val_acc={:.4} | test_acc={:.4}",
        best.epoch, best.val, best.test.unwrap_or(f64::NAN),
    );
    println!("Saved to '{out_dir}'");
    Ok(())
}

fn run_kgc_train(args: ConfigArgs) -> Result<()> {
    use crate::application::kgc_train_use_case::KgcTrainUseCase;

    let config: KgcConfig = load_json_config(&args.json_config)?;
    let stem = config.checkpoint_stem();
    let best = KgcTrainUseCase::new(config).execute()?;

    println!(
        "\nBest model: epoch {} | dev_mrr={:.4} | test_mrr={:.4}",
        best.epoch, best.val, best.test.unwrap_or(f64::NAN),
    );
    println!("Saved as '{stem}'");
    Ok(())
}

fn run_kgc_infer(args: ConfigArgs) -> Result<()> {
    use crate::application::kgc_infer_use_case::KgcInferUseCase;

    let config: KgcConfig = load_json_config(&args.json_config)?;
    let report = KgcInferUseCase::new(config).execute()?;

    for prediction in &report.predictions {
        println!("{prediction}");
    }
    if let Some(test) = report.test {
        println!("\nTest split ({} queries):", test.left.count);
        for line in test.lines() {
            println!("  {line}");
        }
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_short_and_long_config_flags() {
        let cli = Cli::try_parse_from(["gnn-nlp", "kgc-train", "-j", "cfg.json"]).unwrap();
        assert!(matches!(cli.command, Commands::KgcTrain(ref a) if a.json_config.ends_with("cfg.json")));

        let cli = Cli::try_parse_from(["gnn-nlp", "mawps-train", "--json-config", "m.json"]).unwrap();
        assert!(matches!(cli.command, Commands::MawpsTrain(_)));
    }

    #[test]
    fn test_config_flag_is_required() {
        assert!(Cli::try_parse_from(["gnn-nlp", "kgc-infer"]).is_err());
    }
}
