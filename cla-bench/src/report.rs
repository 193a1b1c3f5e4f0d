//! Corner portfolio sinks: a fixed-width console table and a CSV export.

use std::io::{self, Write};

use anyhow::Result;
use cla_core::{CornerPortfolio, CornerSink, ProblemData};

const HEADER: &str =
    "CP Num  E        SD       LambdaE                a0                a1                a2  weights";

/// One fixed-width line per corner; kinks print `-` for the coefficients.
pub struct ConsoleTable<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> ConsoleTable<W> {
    pub fn new(mut out: W) -> Self {
        let error = writeln!(out, "{}", HEADER).err();
        Self { out, error }
    }

    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

pub fn format_corner(corner: &CornerPortfolio) -> String {
    let mut line = format!(
        "{:03}     {:.5}  {:.5}  {:.5}  ",
        corner.iteration,
        corner.expected_return,
        corner.standard_deviation(),
        corner.lambda_e
    );
    match corner.segment {
        Some(s) => {
            for a in [s.a0, s.a1, s.a2] {
                line.push_str(&format!("{:16.8}  ", a));
            }
        }
        None => {
            for _ in 0..3 {
                line.push_str(&format!("{:>16}  ", "-"));
            }
        }
    }
    for w in &corner.weights {
        line.push_str(&format!("{:.3}  ", w));
    }
    line
}

impl<W: Write> CornerSink for ConsoleTable<W> {
    fn corner(&mut self, _problem: &ProblemData, corner: &CornerPortfolio) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", format_corner(corner)) {
            self.error = Some(e);
        }
    }
}

/// One CSV record per corner. Columns: `iteration, e, sd, variance,
/// lambda_e, a0, a1, a2, w0 .. w{k-1}`; the coefficients are empty at a kink.
pub struct CsvExport<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
    error: Option<csv::Error>,
}

impl<W: Write> CsvExport<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            header_written: false,
            error: None,
        }
    }

    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.writer.flush()?;
        Ok(self.writer.into_inner().map_err(|e| e.into_error())?)
    }

    fn write(&mut self, corner: &CornerPortfolio) -> csv::Result<()> {
        if !self.header_written {
            let mut header: Vec<String> = ["iteration", "e", "sd", "variance", "lambda_e", "a0", "a1", "a2"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            header.extend((0..corner.weights.len()).map(|j| format!("w{}", j)));
            self.writer.write_record(&header)?;
            self.header_written = true;
        }

        let mut record = vec![
            corner.iteration.to_string(),
            corner.expected_return.to_string(),
            corner.standard_deviation().to_string(),
            corner.variance.to_string(),
            corner.lambda_e.to_string(),
        ];
        match corner.segment {
            Some(s) => record.extend([s.a0, s.a1, s.a2].iter().map(|a| a.to_string())),
            None => record.extend(std::iter::repeat(String::new()).take(3)),
        }
        record.extend(corner.weights.iter().map(|w| w.to_string()));
        self.writer.write_record(&record)
    }
}

impl<W: Write> CornerSink for CsvExport<W> {
    fn corner(&mut self, _problem: &ProblemData, corner: &CornerPortfolio) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write(corner) {
            self.error = Some(e);
        }
    }
}
