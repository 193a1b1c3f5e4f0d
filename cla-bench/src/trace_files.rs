use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cla_core::{TracePoint, TraceSink};

pub const SIMPLEX_LOG: &str = "simplex_debug.log";
pub const CLA_LOG: &str = "cla_debug.log";

/// Trace sink writing simplex records and critical-line records to two
/// separate log files in one directory.
pub struct FileTrace {
    simplex: BufWriter<File>,
    cla: BufWriter<File>,
    error: Option<io::Error>,
}

impl FileTrace {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trace directory {}", dir.display()))?;
        let open = |name: &str| -> Result<BufWriter<File>> {
            let path = dir.join(name);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self {
            simplex: open(SIMPLEX_LOG)?,
            cla: open(CLA_LOG)?,
            error: None,
        })
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e).context("Failed to write trace");
        }
        self.simplex.flush()?;
        self.cla.flush()?;
        Ok(())
    }
}

impl TraceSink for FileTrace {
    fn line(&mut self, point: TracePoint, text: &str) {
        if self.error.is_some() {
            return;
        }
        let out = if point.is_simplex() { &mut self.simplex } else { &mut self.cla };
        if let Err(e) = writeln!(out, "{}", text) {
            self.error = Some(e);
        }
    }
}
