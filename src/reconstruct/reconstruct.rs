use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::algorithms::{additive_phylogeny, upgma};
use crate::cli::{AdditiveArgs, UpgmaArgs};
use crate::reconstruct::io::{load_distance_matrix, write_edge_list, ParseMeta};

/* ───────────── runners ───────────── */

pub struct UpgmaRunner {
    out_dir: String,
    args: UpgmaArgs,
}

impl UpgmaRunner {
    pub fn new(out_dir: String, args: UpgmaArgs) -> Self {
        UpgmaRunner { out_dir, args }
    }

    pub fn run(&self) -> Result<()> {
        let t0 = Instant::now();

        let (matrix, labels, parse_meta) =
            load_distance_matrix(&self.args.input, self.args.tolerance)
                .context("loading distance matrix")?;
        let n = matrix.len();
        info!("Loaded distance matrix: {}x{} ({} taxa)", n, n, labels.len());

        let t_rec = Instant::now();
        let root = upgma(&matrix).context("running UPGMA")?;
        let reconstruct_sec = t_rec.elapsed().as_secs_f64();
        let depths = root.leaf_depths();
        let root_age = depths.first().map(|&(_, d)| d).unwrap_or(0.0);
        info!(
            "UPGMA: {} nodes, root age {:.6}, computed in {:.3}s",
            root.node_count(),
            root_age,
            reconstruct_sec
        );

        let t_out = Instant::now();
        let out_dir = ensure_out_dir(&self.out_dir)?;
        let tree_path = out_dir.join(format!("{}_upgma.txt", self.args.output_prefix));
        write_edge_list(&tree_path, &root.edges()).context("writing tree edge list")?;
        let output_sec = t_out.elapsed().as_secs_f64();

        let log = RunLog {
            input: self.args.input.clone(),
            out_dir: self.out_dir.clone(),
            method: "upgma".to_string(),
            matrix: MatrixMeta::new(n, &parse_meta),
            tree: TreeMeta {
                nodes: root.node_count(),
                edges: root.node_count() - 1,
                leaves: root.leaf_count(),
                root_age: Some(root_age),
                max_round_trip_error: None,
            },
            timings: RunTimings {
                load_sec: parse_meta.load_sec,
                reconstruct_sec,
                output_sec,
                total_sec: t0.elapsed().as_secs_f64(),
            },
        };
        write_run_log(&out_dir, &log)?;

        info!("Outputs:");
        info!("  {}", tree_path.display());
        info!("Done in {:.3}s total.", t0.elapsed().as_secs_f64());
        Ok(())
    }
}

pub struct AdditiveRunner {
    out_dir: String,
    args: AdditiveArgs,
}

impl AdditiveRunner {
    pub fn new(out_dir: String, args: AdditiveArgs) -> Self {
        AdditiveRunner { out_dir, args }
    }

    pub fn run(&self) -> Result<()> {
        let t0 = Instant::now();

        let (matrix, labels, parse_meta) =
            load_distance_matrix(&self.args.input, self.args.tolerance)
                .context("loading distance matrix")?;
        let n = matrix.len();
        info!("Loaded distance matrix: {}x{} ({} taxa)", n, n, labels.len());

        let t_rec = Instant::now();
        let tree = additive_phylogeny(&matrix).context("running additive phylogeny")?;
        let reconstruct_sec = t_rec.elapsed().as_secs_f64();
        info!(
            "Additive phylogeny: {} nodes, {} edges, computed in {:.3}s",
            tree.node_count(),
            tree.edge_count(),
            reconstruct_sec
        );

        // round-trip check: how well tree distances reproduce the input
        let rebuilt = tree
            .distance_matrix()
            .context("rebuilding distances from the tree")?;
        let mut max_err = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                max_err = max_err.max((rebuilt.get(i, j) - matrix.get(i, j)).abs());
            }
        }
        info!("Max round-trip distance error: {:.3e}", max_err);

        let t_out = Instant::now();
        let out_dir = ensure_out_dir(&self.out_dir)?;
        let tree_path = out_dir.join(format!("{}_additive.txt", self.args.output_prefix));
        write_edge_list(&tree_path, &tree.edges()).context("writing tree edge list")?;
        let output_sec = t_out.elapsed().as_secs_f64();

        let log = RunLog {
            input: self.args.input.clone(),
            out_dir: self.out_dir.clone(),
            method: "additive".to_string(),
            matrix: MatrixMeta::new(n, &parse_meta),
            tree: TreeMeta {
                nodes: tree.node_count(),
                edges: tree.edge_count(),
                leaves: tree.leaves().len(),
                root_age: None,
                max_round_trip_error: Some(max_err),
            },
            timings: RunTimings {
                load_sec: parse_meta.load_sec,
                reconstruct_sec,
                output_sec,
                total_sec: t0.elapsed().as_secs_f64(),
            },
        };
        write_run_log(&out_dir, &log)?;

        info!("Outputs:");
        info!("  {}", tree_path.display());
        info!("Done in {:.3}s total.", t0.elapsed().as_secs_f64());
        Ok(())
    }
}

/* ───────────── run log ───────────── */

#[derive(Serialize)]
struct MatrixMeta {
    n: usize,
    npairs: usize,
    delimiter: String,
    has_header: bool,
    has_index: bool,
}

impl MatrixMeta {
    fn new(n: usize, parse: &ParseMeta) -> Self {
        MatrixMeta {
            n,
            npairs: n * n.saturating_sub(1) / 2,
            delimiter: parse.delimiter.to_string(),
            has_header: parse.has_header,
            has_index: parse.has_index,
        }
    }
}

#[derive(Serialize)]
struct TreeMeta {
    nodes: usize,
    edges: usize,
    leaves: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_round_trip_error: Option<f64>,
}

#[derive(Serialize)]
struct RunTimings {
    load_sec: f64,
    reconstruct_sec: f64,
    output_sec: f64,
    total_sec: f64,
}

#[derive(Serialize)]
struct RunLog {
    input: String,
    out_dir: String,
    method: String,
    matrix: MatrixMeta,
    tree: TreeMeta,
    timings: RunTimings,
}

fn ensure_out_dir(out_dir: &str) -> Result<std::path::PathBuf> {
    let p = Path::new(out_dir).to_path_buf();
    fs::create_dir_all(&p).with_context(|| format!("creating {}", out_dir))?;
    Ok(p)
}

fn write_run_log(out_dir: &Path, log: &RunLog) -> Result<()> {
    let run_log_path = out_dir.join("run_log.json");
    fs::write(&run_log_path, serde_json::to_string_pretty(log)?)?;
    info!("Run log written: {}", run_log_path.display());
    Ok(())
}
