use std::path::PathBuf;

use clap::Parser;
use pdrta::prelude::*;
use tracing::{debug, info, trace};
use tracing_subscriber::{filter, prelude::*, EnvFilter};

/// Learns a probabilistic deterministic real-time automaton from a file of timed words.
#[derive(Parser, Debug)]
#[command(name = "rtiplus", version, about)]
struct Cli {
    /// File in RTI+ format: a header `count alphabet_size`, then one word per line as
    /// `length symbol delay symbol delay ...`.
    input: PathBuf,

    /// Significance level of the statistical tests.
    #[arg(short, long, default_value_t = 0.05)]
    significance: f64,

    /// Distribution check: -1 disabled, 0/1 gaps, 2/3 MAD, 4/5 outliers; odd values also cut
    /// inner gaps.
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    distribution_check: i32,

    /// Tester: 0 likelihood ratio, 1 recursive likelihood ratio, 2 naive likelihood ratio,
    /// 3 Fisher's method.
    #[arg(short, long, default_value_t = 0)]
    tester: i32,

    /// Minimum number of tails a comparison needs.
    #[arg(short, long, default_value_t = 10)]
    min_data: usize,

    /// Histogram bins, either a count or inner borders written as `-b1-b2-...-`.
    #[arg(short = 'b', long, default_value = "4", allow_hyphen_values = true)]
    histogram: String,

    /// Whether to apply the distribution check to the whole prefix tree before learning.
    /// Defaults to whether the distribution check type is at least 1.
    #[arg(short, long)]
    expand: Option<bool>,

    /// Check the automaton for consistency after every iteration.
    #[arg(long)]
    check_each_step: bool,

    /// Where the learned automaton is written in DOT format.
    #[arg(short, long, default_value = "result.dot")]
    output: PathBuf,

    /// Additionally render the learned automaton with graphviz into this file, the format
    /// follows the extension (e.g. `result.png`).
    #[arg(short, long)]
    render: Option<PathBuf>,

    /// Log level, overridden by `RUST_LOG`.
    #[arg(short, long, default_value = "info", value_parser = ["info", "debug", "trace"])]
    verbosity: String,
}

fn setup_logging(verbosity: &str) {
    let level = match verbosity {
        "trace" => filter::LevelFilter::TRACE,
        "debug" => filter::LevelFilter::DEBUG,
        _ => filter::LevelFilter::INFO,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(filter))
        .init();

    trace!("setup {level} logging");
}

impl Cli {
    fn config(&self) -> Result<LearnerConfig, ConfigError> {
        let check = DistributionCheck::try_from(self.distribution_check)?;
        let mut config = LearnerConfig::default()
            .with_significance(self.significance)
            .with_distribution_check(check)
            .with_tester(TesterKind::try_from(self.tester)?)
            .with_min_data(self.min_data)
            .with_histogram(self.histogram.parse()?)
            .with_consistency_checks(self.check_each_step);
        if let Some(expand) = self.expand {
            config = config.with_expand(expand);
        }
        Ok(config)
    }
}

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity);

    let learner = RtiPlus::new(cli.config()?)?;
    debug!("reading timed words from {}", cli.input.display());
    let sample: TimedSample = std::fs::read_to_string(&cli.input)?.parse()?;

    let pdrta = learner.learn(sample)?;
    debug!("learned automaton\n{pdrta:?}");

    std::fs::write(&cli.output, pdrta.dot_representation())?;
    info!("wrote automaton to {}", cli.output.display());
    if let Some(image) = &cli.render {
        pdrta.render_to_file(image)?;
        info!("rendered automaton to {}", image.display());
    }
    Ok(())
}
