// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands, each driven by one nested JSON config:
//
//   gnn-nlp mawps-train -j config/mawps.json
//   gnn-nlp kgc-train   -j config/kinship.json
//   gnn-nlp kgc-infer   -j config/kinship.json
//
// Every hyperparameter lives in the JSON file, so the command
// line only says which file to read.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the graph-to-tree math word problem solver
    MawpsTrain(ConfigArgs),

    /// Train a knowledge-graph completion model
    KgcTrain(ConfigArgs),

    /// Predict tails for ad hoc queries with a trained KG completion model
    KgcInfer(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the nested JSON run configuration
    #[arg(short = 'j', long = "json-config")]
    pub json_config: PathBuf,
}
