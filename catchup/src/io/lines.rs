//! Line counting and suffix extraction for job files.
//!
//! Counting follows `BufRead::lines` semantics: a trailing line without a
//! final newline still counts as a line. A missing file counts as zero
//! lines, which makes an absent output file "no progress yet" and an absent
//! input file an already-complete job.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result};

/// Count the lines of `path`, treating a missing file as empty.
pub fn count_lines(path: &Path) -> Result<u64> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(err).with_context(|| format!("open {}", path.display()));
        }
    };
    let mut reader = BufReader::new(file);
    let mut count = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        count += 1;
    }
    Ok(count)
}

/// Return the last `n` lines of `path` as a newline-terminated batch.
///
/// The batch always ends with a newline so the subprocess sees complete
/// records even when the file's final line lacks one.
pub fn tail_lines(path: &Path, n: u64) -> Result<String> {
    if n == 0 {
        return Ok(String::new());
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("read {}", path.display()))?;
    let skip = lines.len().saturating_sub(n as usize);
    let mut batch = String::new();
    for line in &lines[skip..] {
        batch.push_str(line);
        batch.push('\n');
    }
    Ok(batch)
}
