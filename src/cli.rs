use clap::{Args, Parser, Subcommand};

use crate::matrix::DEFAULT_TOLERANCE;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ProgramArgs {
    #[command(subcommand)]
    pub subcommand: ProgramSubcommand,
    #[arg(
        short,
        long,
        default_value = "false",
        conflicts_with = "quiet",
        global = true
    )]
    pub verbose: bool,
    #[arg(
        short,
        long,
        default_value = "false",
        conflicts_with = "verbose",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short = 'd',
        long,
        default_value = "output",
        global = true,
        help = "Output directory"
    )]
    pub output_directory: String,
}

#[derive(Subcommand, Debug)]
pub enum ProgramSubcommand {
    #[clap(
        name = "upgma",
        about = "Cluster a distance matrix into a rooted ultrametric tree (UPGMA)"
    )]
    Upgma(UpgmaArgs),
    #[clap(
        name = "additive",
        about = "Reconstruct the unrooted weighted tree realizing an additive distance matrix"
    )]
    Additive(AdditiveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UpgmaArgs {
    #[arg(short, long, help = "Input distance matrix file path", required = true)]
    pub input: String,
    #[arg(
        short,
        long,
        help = "Output prefix for result files",
        default_value = "output"
    )]
    pub output_prefix: String,
    #[arg(
        short,
        long,
        help = "Float tolerance for matrix validation",
        default_value_t = DEFAULT_TOLERANCE
    )]
    pub tolerance: f64,
}

#[derive(Args, Debug, Clone)]
pub struct AdditiveArgs {
    #[arg(short, long, help = "Input distance matrix file path", required = true)]
    pub input: String,
    #[arg(
        short,
        long,
        help = "Output prefix for result files",
        default_value = "output"
    )]
    pub output_prefix: String,
    #[arg(
        short,
        long,
        help = "Float tolerance for matrix validation and attachment search",
        default_value_t = DEFAULT_TOLERANCE
    )]
    pub tolerance: f64,
}

impl Default for UpgmaArgs {
    fn default() -> Self {
        Self {
            input: String::new(),
            output_prefix: String::from("output"),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Default for AdditiveArgs {
    fn default() -> Self {
        Self {
            input: String::new(),
            output_prefix: String::from("output"),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
