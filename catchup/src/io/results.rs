//! Append-only result files for a job.
//!
//! The output file doubles as the progress marker: every complete line in it
//! is one processed record. Both files are prepared once at startup; each
//! attempt then takes its own append handle, so a crashed attempt leaves
//! whatever lines it managed to flush and the next measurement simply reads
//! the file again.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::lines::count_lines;
use super::paths::JobPaths;

/// Handle to a job's output and error files.
#[derive(Debug, Clone)]
pub struct ResultFiles {
    output_path: PathBuf,
    error_path: PathBuf,
}

impl ResultFiles {
    /// Create the results directory and touch both files.
    ///
    /// Touching keeps append semantics honest: the files exist before the
    /// first attempt and are never truncated afterwards.
    pub fn prepare(paths: &JobPaths) -> Result<Self> {
        fs::create_dir_all(&paths.results_dir)
            .with_context(|| format!("create results dir {}", paths.results_dir.display()))?;
        touch_append(&paths.output_path)?;
        touch_append(&paths.error_path)?;
        Ok(Self {
            output_path: paths.output_path.clone(),
            error_path: paths.error_path.clone(),
        })
    }

    /// Append handle for result lines, scoped to one attempt.
    pub fn output_appender(&self) -> Result<File> {
        open_append(&self.output_path)
    }

    /// Append handle for diagnostic text, scoped to one attempt.
    pub fn error_appender(&self) -> Result<File> {
        open_append(&self.error_path)
    }

    /// Current line count of the output file (the progress marker).
    pub fn output_lines(&self) -> Result<u64> {
        count_lines(&self.output_path)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn error_path(&self) -> &Path {
        &self.error_path
    }
}

fn touch_append(path: &Path) -> Result<()> {
    open_append(path)?;
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open append {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn job_paths(root: &Path) -> JobPaths {
        JobPaths::new(&root.join("datasets"), &root.join("results"), "job").expect("paths")
    }

    #[test]
    fn prepare_creates_empty_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = job_paths(temp.path());

        let files = ResultFiles::prepare(&paths).expect("prepare");

        assert!(files.output_path().is_file());
        assert!(files.error_path().is_file());
        assert_eq!(files.output_lines().expect("count"), 0);
    }

    #[test]
    fn prepare_preserves_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = job_paths(temp.path());
        fs::create_dir_all(&paths.results_dir).expect("mkdir");
        fs::write(&paths.output_path, "old\n").expect("write");

        let files = ResultFiles::prepare(&paths).expect("prepare");
        assert_eq!(files.output_lines().expect("count"), 1);

        let mut out = files.output_appender().expect("appender");
        out.write_all(b"new\n").expect("append");
        drop(out);

        assert_eq!(files.output_lines().expect("count"), 2);
        let contents = fs::read_to_string(files.output_path()).expect("read");
        assert_eq!(contents, "old\nnew\n");
    }
}
