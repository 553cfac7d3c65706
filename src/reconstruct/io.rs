use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use ndarray::Array2;
use serde::Serialize;

use crate::matrix::DistanceMatrix;
use crate::phylo::UnrootedTree;

/* ───────────── distance matrix loading ───────────── */

#[derive(Serialize, Clone, Debug)]
pub struct ParseMeta {
    pub delimiter: char,
    pub has_header: bool,
    pub has_index: bool,
    pub load_sec: f64,
}

/// Parse CSV/TSV/; / | / space; header/index row optional.
/// Returns the validated matrix, labels[0..n], and parse meta including
/// load time. Validation failures (asymmetry, negative entries, non-zero
/// diagonal) are errors here, never silently repaired.
pub fn load_distance_matrix(
    path: &str,
    tolerance: f64,
) -> Result<(DistanceMatrix, Vec<String>, ParseMeta)> {
    let t_load = Instant::now();
    let text = fs::read_to_string(path).with_context(|| format!("reading '{}'", path))?;

    let first_line = text
        .lines()
        .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .ok_or_else(|| anyhow!("no data lines found"))?
        .to_string();
    let delim = detect_delim(&first_line);
    info!("Detected delimiter: {:?}", delim);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delim as u8)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let row: Vec<String> = rec.iter().map(|s| s.trim().to_string()).collect();
        if !row.is_empty() && row.iter().any(|t| !t.is_empty()) {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        return Err(anyhow!("empty table"));
    }

    let (has_header, has_index) = sniff_header_index(&rows);
    info!("Header: {}, Index column: {}", has_header, has_index);

    let (labels, start_row, start_col) = if has_header && has_index {
        let header = &rows[0];
        let labels = header[1..].iter().map(|s| s.to_string()).collect();
        (labels, 1usize, 1usize)
    } else if has_header && !has_index {
        let header = &rows[0];
        let labels = header.iter().map(|s| s.to_string()).collect();
        (labels, 1usize, 0usize)
    } else if !has_header && has_index {
        let labels = rows.iter().map(|r| r[0].to_string()).collect::<Vec<_>>();
        (labels, 0usize, 1usize)
    } else {
        let n = rows.len();
        let labels = (1..=n).map(|i| format!("t{}", i)).collect::<Vec<_>>();
        (labels, 0usize, 0usize)
    };

    let n = rows.len() - start_row;
    let first_data = rows
        .get(start_row)
        .ok_or_else(|| anyhow!("no data rows below the header"))?;
    let m = first_data.len() - start_col;
    if n != m {
        return Err(anyhow!(
            "parsed table is not square: rows={}, cols={}",
            n,
            m
        ));
    }

    let mut mat = Array2::<f64>::zeros((n, n));
    for (ri, row) in rows[start_row..].iter().enumerate() {
        if row.len() < start_col + n {
            return Err(anyhow!(
                "row {} has {} columns, expected {}",
                ri + start_row + 1,
                row.len(),
                start_col + n
            ));
        }
        for (ci, tok) in row[start_col..start_col + n].iter().enumerate() {
            let val: f64 = tok.parse().with_context(|| {
                format!(
                    "parsing number at row {}, col {}",
                    ri + start_row + 1,
                    ci + start_col + 1
                )
            })?;
            mat[[ri, ci]] = val;
        }
    }

    let labels = if labels.len() == n {
        labels
    } else {
        warn!(
            "Label count ({}) != n ({}). Synthesizing t1..tn labels.",
            labels.len(),
            n
        );
        (1..=n).map(|i| format!("t{}", i)).collect()
    };

    let matrix = DistanceMatrix::with_tolerance(mat, tolerance)
        .with_context(|| format!("validating distance matrix from '{}'", path))?;

    let meta = ParseMeta {
        delimiter: delim,
        has_header,
        has_index,
        load_sec: t_load.elapsed().as_secs_f64(),
    };

    Ok((matrix, labels, meta))
}

/// Write a matrix as a labelled TSV table (header row plus index column),
/// which `load_distance_matrix` reads back.
pub fn write_distance_matrix<P: AsRef<Path>>(
    path: P,
    matrix: &DistanceMatrix,
    labels: &[String],
) -> Result<()> {
    let n = matrix.len();
    if labels.len() != n {
        return Err(anyhow!(
            "{} labels for a {}x{} matrix",
            labels.len(),
            n,
            n
        ));
    }
    let mut out = String::new();
    for label in labels {
        out.push('\t');
        out.push_str(label);
    }
    out.push('\n');
    for i in 0..n {
        out.push_str(&labels[i]);
        for j in 0..n {
            out.push('\t');
            out.push_str(&format_weight(matrix.get(i, j)));
        }
        out.push('\n');
    }
    fs::write(path.as_ref(), out)
        .with_context(|| format!("writing '{}'", path.as_ref().display()))?;
    Ok(())
}

/* ───────────── tree edge lists ───────────── */

/// Parse an edge-list file, one `<nodeA>-<nodeB>:<weight>` edge per line.
/// Blank lines and `#` comments are skipped.
pub fn load_edge_list(path: &str) -> Result<UnrootedTree> {
    let text = fs::read_to_string(path).with_context(|| format!("reading '{}'", path))?;
    let mut edges = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        edges.push(
            parse_edge(line).with_context(|| format!("parsing edge at line {}", lineno + 1))?,
        );
    }
    if edges.is_empty() {
        return Err(anyhow!("no edges found in '{}'", path));
    }
    let tree = UnrootedTree::from_edges(edges).context("building tree from edge list")?;
    Ok(tree)
}

fn parse_edge(line: &str) -> Result<(usize, usize, f64)> {
    let (pair, weight) = line
        .split_once(':')
        .ok_or_else(|| anyhow!("missing ':' in '{}'", line))?;
    let (a, b) = pair
        .split_once('-')
        .ok_or_else(|| anyhow!("missing '-' in '{}'", pair))?;
    let a: usize = a.trim().parse().with_context(|| format!("node id '{}'", a))?;
    let b: usize = b.trim().parse().with_context(|| format!("node id '{}'", b))?;
    let w: f64 = weight
        .trim()
        .parse()
        .with_context(|| format!("weight '{}'", weight))?;
    Ok((a, b, w))
}

/// Write `(a, b, weight)` triples in the same `<a>-<b>:<w>` format.
pub fn write_edge_list<P: AsRef<Path>>(path: P, edges: &[(usize, usize, f64)]) -> Result<()> {
    let mut out = String::new();
    for &(a, b, w) in edges {
        out.push_str(&format!("{}-{}:{}\n", a, b, format_weight(w)));
    }
    fs::write(path.as_ref(), out)
        .with_context(|| format!("writing '{}'", path.as_ref().display()))?;
    Ok(())
}

fn format_weight(w: f64) -> String {
    // trim trailing zeros but keep at least one decimal place
    let s = format!("{:.6}", w);
    let s = s.trim_end_matches('0');
    if s.ends_with('.') {
        format!("{}0", s)
    } else {
        s.to_string()
    }
}

/* ───────────── sniffing helpers ───────────── */

/// Pick the delimiter with the most hits among common choices.
fn detect_delim(line: &str) -> char {
    let cands = [',', '\t', ';', '|', ' '];
    let mut best = (0usize, ',');
    for &c in &cands {
        let count = line.matches(c).count();
        if count > best.0 {
            best = (count, c);
        }
    }
    best.1
}

fn sniff_header_index(rows: &[Vec<String>]) -> (bool, bool) {
    let is_num = |s: &str| s.parse::<f64>().is_ok();

    if rows.is_empty() {
        return (false, false);
    }

    // Index column: non-numeric first cell on at least one data row (i > 0),
    // and at least two non-numeric first cells across the first ~10 rows.
    let sample_n = rows.len().min(10);
    let mut nonnum_first_col_total = 0usize;
    let mut nonnum_first_col_after_first = 0usize;
    for (i, r) in rows.iter().take(sample_n).enumerate() {
        if r.is_empty() {
            continue;
        }
        if !is_num(&r[0]) {
            nonnum_first_col_total += 1;
            if i > 0 {
                nonnum_first_col_after_first += 1;
            }
        }
    }
    let has_index = nonnum_first_col_after_first >= 1 && nonnum_first_col_total >= 2;

    let skip = if has_index { 1 } else { 0 };

    let first = &rows[0];
    let first_after = if first.len() > skip {
        &first[skip..]
    } else {
        &[][..]
    };
    let nonnum_in_first_after = first_after.iter().any(|s| !is_num(s));
    let first_num_count = first_after.iter().filter(|s| is_num(s)).count();

    let second_after = rows
        .get(1)
        .map(|r| if r.len() > skip { &r[skip..] } else { &[][..] });
    let second_num_count = second_after
        .map(|r| r.iter().filter(|s| is_num(s)).count())
        .unwrap_or(first_num_count);

    // Header if the first (non-index) row has non-numeric tokens, or fewer
    // numeric tokens than the second row.
    let has_header = nonnum_in_first_after || first_num_count < second_num_count;

    (has_header, has_index)
}

/* ───────────── tests ───────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use crate::matrix::DEFAULT_TOLERANCE;

    fn with_temp(content: &str, f: impl FnOnce(&str)) {
        let mut tf = NamedTempFile::new().expect("tmp");
        tf.write_all(content.as_bytes()).expect("write");
        f(tf.path().to_str().expect("utf-8 path"));
    }

    #[test]
    fn csv_header_and_index() {
        let content = "\n,A,B,C\nA,0,1,2\nB,1,0,3\nC,2,3,0\n";
        with_temp(content, |p| {
            let (mat, labels, meta) = load_distance_matrix(p, DEFAULT_TOLERANCE).unwrap();
            assert_eq!(labels, vec!["A", "B", "C"]);
            assert!(meta.has_header);
            assert!(meta.has_index);
            assert_eq!(mat.len(), 3);
            assert_eq!(mat.get(1, 2), 3.0);
        });
    }

    #[test]
    fn space_delimited_no_header_no_index() {
        let content = "0 1 2\n1 0 3\n2 3 0\n";
        with_temp(content, |p| {
            let (mat, labels, meta) = load_distance_matrix(p, DEFAULT_TOLERANCE).unwrap();
            assert_eq!(labels, vec!["t1", "t2", "t3"]); // synthesized
            assert!(!meta.has_header);
            assert!(!meta.has_index);
            assert_eq!(mat.get(0, 2), 2.0);
        });
    }

    #[test]
    fn tsv_index_no_header() {
        let content = "A\t0\t1\t2\nB\t1\t0\t3\nC\t2\t3\t0\n";
        with_temp(content, |p| {
            let (_, labels, meta) = load_distance_matrix(p, DEFAULT_TOLERANCE).unwrap();
            assert_eq!(labels, vec!["A", "B", "C"]);
            assert!(!meta.has_header);
            assert!(meta.has_index);
        });
    }

    #[test]
    fn asymmetric_input_is_rejected() {
        let content = "0,1.0,2.0\n1.5,0,3.0\n2.0,3.0,0\n";
        with_temp(content, |p| {
            let err = load_distance_matrix(p, DEFAULT_TOLERANCE).unwrap_err();
            assert!(format!("{err:#}").contains("asymmetric"), "{err:#}");
        });
    }

    #[test]
    fn header_only_file_is_rejected() {
        with_temp("A,B,C\n", |p| {
            let err = load_distance_matrix(p, DEFAULT_TOLERANCE).unwrap_err();
            assert!(format!("{err:#}").contains("no data rows"), "{err:#}");
        });
    }

    #[test]
    fn non_square_rejected() {
        let content = "A,B\n0,1\n1,0\n2,3\n";
        with_temp(content, |p| {
            assert!(load_distance_matrix(p, DEFAULT_TOLERANCE).is_err());
        });
    }

    #[test]
    fn matrix_write_read_round_trip() {
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.0, 1.5, 2.0],
            vec![1.5, 0.0, 3.0],
            vec![2.0, 3.0, 0.0],
        ])
        .unwrap();
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let tf = NamedTempFile::new().expect("tmp");
        write_distance_matrix(tf.path(), &matrix, &labels).unwrap();
        let (back, back_labels, _) =
            load_distance_matrix(tf.path().to_str().unwrap(), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(back_labels, labels);
        assert_eq!(back.get(0, 1), 1.5);
        assert_eq!(back.get(1, 2), 3.0);
    }

    #[test]
    fn edge_list_round_trip() {
        let content = "# caterpillar\n0-4:11.0\n1-4:2.0\n4-5:4.0\n2-5:6.0\n3-5:7.0\n";
        with_temp(content, |p| {
            let tree = load_edge_list(p).unwrap();
            assert_eq!(tree.leaves(), vec![0, 1, 2, 3]);
            assert_eq!(tree.distance(0, 3).unwrap(), 22.0);

            let tf = NamedTempFile::new().expect("tmp");
            write_edge_list(tf.path(), &tree.edges()).unwrap();
            let back = load_edge_list(tf.path().to_str().unwrap()).unwrap();
            assert_eq!(back.edges(), tree.edges());
        });
    }

    #[test]
    fn malformed_edge_line_is_rejected() {
        with_temp("0-1\n", |p| {
            assert!(load_edge_list(p).is_err());
        });
        with_temp("0:1.0\n", |p| {
            assert!(load_edge_list(p).is_err());
        });
    }
}
