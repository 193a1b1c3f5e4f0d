//! Command-line driver: traces the frontier of a fixture or a JSON problem
//! file and prints one line per corner portfolio.

mod fixtures;
mod problem_file;
mod report;
mod trace_files;

use std::fs::File;
use std::io::{self, BufWriter, StdoutLock};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cla_core::{CornerPortfolio, CornerSink, Optimizer, ProblemData, SolverSettings};

use fixtures::FixtureChoice;
use report::{ConsoleTable, CsvExport};
use trace_files::FileTrace;

#[derive(Parser)]
#[command(name = "cla-bench")]
#[command(about = "Trace the mean-variance efficient frontier with the critical line algorithm")]
#[command(version)]
struct Cli {
    /// Built-in problem to solve
    #[arg(long, value_enum, default_value = "markowitz-todd")]
    fixture: FixtureChoice,

    /// JSON problem file (overrides --fixture)
    #[arg(long)]
    problem: Option<PathBuf>,

    /// Number of securities for the random fixture
    #[arg(long, default_value = "20")]
    securities: usize,

    /// Random seed for the random fixture
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Stop after this many corner portfolios
    #[arg(long)]
    max_corners: Option<usize>,

    /// Stop once lambdaE falls below this value
    #[arg(long)]
    end_lambda: Option<f64>,

    /// Continue past a degenerate feasibility phase
    #[arg(long)]
    allow_degenerate: bool,

    /// Time limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Also write the corners to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write simplex and critical line traces into this directory
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> SolverSettings {
        let mut settings = SolverSettings {
            verbose: self.verbose,
            ..Default::default()
        }
        .with_allow_degenerate(self.allow_degenerate);
        if let Some(max) = self.max_corners {
            settings = settings.with_max_corner_portfolios(max);
        }
        if let Some(lambda) = self.end_lambda {
            settings = settings.with_end_lambda_e(lambda);
        }
        if let Some(seconds) = self.time_limit {
            settings = settings.with_time_limit(seconds);
        }
        settings
    }

    fn load(&self) -> Result<ProblemData> {
        match &self.problem {
            Some(path) => problem_file::load_problem(path),
            None => fixtures::load_fixture(self.fixture, self.securities, self.seed),
        }
    }
}

/// Console table plus an optional CSV copy.
struct Reporter {
    table: ConsoleTable<StdoutLock<'static>>,
    csv: Option<CsvExport<BufWriter<File>>>,
}

impl CornerSink for Reporter {
    fn corner(&mut self, problem: &ProblemData, corner: &CornerPortfolio) {
        self.table.corner(problem, corner);
        if let Some(csv) = self.csv.as_mut() {
            csv.corner(problem, corner);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let problem = cli.load()?;
    let settings = cli.settings();

    let csv = match &cli.csv {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Some(CsvExport::new(BufWriter::new(file)))
        }
        None => None,
    };
    let mut trace = match &cli.trace_dir {
        Some(dir) => Some(FileTrace::create(dir)?),
        None => None,
    };

    println!(
        "Securities: {}  Constraints: {}  Slacks: {}\n",
        problem.num_securities(),
        problem.num_constraints(),
        problem.num_slack_vars()
    );

    let mut reporter = Reporter {
        table: ConsoleTable::new(io::stdout().lock()),
        csv,
    };
    let mut optimizer = Optimizer::new(&problem, &settings);
    if let Some(t) = trace.as_mut() {
        optimizer = optimizer.with_trace(t);
    }
    let outcome = optimizer.run(&mut reporter)?;

    reporter.table.finish()?;
    if let Some(csv) = reporter.csv {
        csv.finish().context("Failed to write CSV")?;
    }
    if let Some(t) = trace {
        t.finish()?;
    }

    println!();
    println!("Status:           {}", outcome.status);
    if let Some(reason) = outcome.stop_reason {
        println!("Stopped on:       {}", reason);
    }
    println!(
        "Simplex steps:    {} feasibility, {} optimize",
        outcome.info.feasibility_iters, outcome.info.optimize_iters
    );
    println!("Corners:          {}", outcome.info.corner_portfolios);
    println!("Solve time:       {} ms", outcome.info.solve_time_ms);
    Ok(())
}
