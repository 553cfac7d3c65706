//! Distance-based phylogeny reconstruction.
//!
//! Two classical algorithms over a validated pairwise distance matrix:
//! UPGMA (rooted, ultrametric output) and Additive Phylogeny (exact
//! unrooted reconstruction of an additive matrix).

use std::{env, time::Instant};

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use ndarray::Array2;

use crate::cli::ProgramArgs;
use crate::matrix::DistanceMatrix;
use crate::phylo::{RootedTree, UnrootedTree};

pub mod algorithms;
pub mod cli;
pub mod error;
pub mod matrix;
pub mod phylo;
pub mod reconstruct;

pub fn set_log_level(matches: &ProgramArgs, is_last: bool, program_name: &str, version: &str) {
    let mut log_level = LevelFilter::Info;
    let mut specified = false;
    if matches.verbose {
        specified = true;
        log_level = LevelFilter::Debug;
    }
    if matches.quiet {
        specified = true;
        log_level = LevelFilter::Error;
    }
    if specified || is_last {
        let mut builder = Builder::new();
        builder.filter_level(log_level);
        if env::var("RUST_LOG").is_ok() {
            builder.parse_filters(&env::var("RUST_LOG").unwrap());
        }
        if builder.try_init().is_err() {
            panic!("Failed to set log level - has it been specified multiple times?")
        }
    }
    if is_last {
        info!("{} version {}", program_name, version);
    }
}

/// Bindings-friendly entry point: UPGMA over an in-memory matrix.
pub fn run_upgma_from_memory(dist: Array2<f64>) -> Result<RootedTree> {
    let t0 = Instant::now();
    let matrix = DistanceMatrix::new(dist).context("validating distance matrix")?;
    let root = algorithms::upgma(&matrix).context("running UPGMA")?;
    info!("Finished UPGMA in {:?}", t0.elapsed());
    Ok(root)
}

/// Bindings-friendly entry point: additive phylogeny over an in-memory matrix.
pub fn run_additive_from_memory(dist: Array2<f64>) -> Result<UnrootedTree> {
    let t0 = Instant::now();
    let matrix = DistanceMatrix::new(dist).context("validating distance matrix")?;
    let tree = algorithms::additive_phylogeny(&matrix).context("running additive phylogeny")?;
    info!("Finished additive phylogeny in {:?}", t0.elapsed());
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn memory_entry_points() {
        let d = arr2(&[
            [0.0, 13.0, 21.0, 22.0],
            [13.0, 0.0, 12.0, 13.0],
            [21.0, 12.0, 0.0, 13.0],
            [22.0, 13.0, 13.0, 0.0],
        ]);
        let tree = run_additive_from_memory(d.clone()).unwrap();
        assert_eq!(tree.leaves(), vec![0, 1, 2, 3]);

        let root = run_upgma_from_memory(d).unwrap();
        assert_eq!(root.leaf_count(), 4);
    }
}
