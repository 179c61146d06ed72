use clap::{Parser, Subcommand};
use colored::*;
use rayon::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use convergence_lab::{
    DiskMembership, FunctionSequenceAnalyzer, PointStatus, RadiusEstimate, RadiusEstimator, RatioWorkedExample,
    SequenceAnalysis, SequenceAnalyzer, SequenceConfig, UniformityAnalysis, UniformityConfig, UniformityJudgement,
};

// =============================================================================
// COMMAND LINE
// =============================================================================
#[derive(Parser)]
#[command(
    name = "convergence-lab",
    version,
    about = "Sample formulas and test sequences, function sequences and power series for convergence"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Test a_n against the epsilon-tube around a claimed limit
    Sequence {
        /// Formula in n, e.g. "(1 + 1/n)^n"
        formula: String,

        /// Claimed limit L
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        limit: f64,

        /// Tube half-width
        #[arg(long, default_value_t = 0.1)]
        epsilon: f64,

        /// Threshold index N; only n > N is tested
        #[arg(short = 'N', long, default_value_t = 10)]
        threshold: u32,

        /// First sampled index
        #[arg(long, default_value_t = 1)]
        first: u32,

        /// Last sampled index
        #[arg(long, default_value_t = 50)]
        last: u32,

        /// Drop sampled values with a larger magnitude
        #[arg(long, default_value_t = convergence_lab::config::GENERIC_MAGNITUDE_GUARD)]
        guard: f64,
    },

    /// Compare f_n(x) with its pointwise limit f(x) on a sampled domain
    Functions {
        /// Formula in x and n, e.g. "x^n"
        sequence: String,

        /// Formula in x, e.g. "0"
        limit: String,

        /// Sequence index n
        #[arg(short = 'n', long, default_value_t = 1)]
        index: u32,

        /// max_diff below this counts as evidence of uniform convergence
        #[arg(long, default_value_t = 0.1)]
        threshold: f64,

        /// Domain start
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        from: f64,

        /// Domain end
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        to: f64,

        /// Number of sub-intervals (samples = intervals + 1)
        #[arg(long, default_value_t = 50)]
        intervals: usize,

        /// Drop sampled values with a larger magnitude
        #[arg(long, default_value_t = convergence_lab::config::FUNCTION_MAGNITUDE_GUARD)]
        guard: f64,
    },

    /// Estimate the radius of convergence of sum a_n z^n for each formula
    Radius {
        /// Coefficient formulas in n, e.g. "1/n!" "2^n"
        #[arg(required = true)]
        formulas: Vec<String>,

        /// Test point z as "re,im"
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Option<(f64, f64)>,
    },

    /// Run the built-in presets
    Demo,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (re, im) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"re,im\", got {s:?}"))?;
    let re = re.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let im = im.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((re, im))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("convergence_lab={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// UTILITY FUNCTIONS
// =============================================================================
fn format_val(val: f64) -> String {
    if val == f64::INFINITY {
        return "oo".to_string();
    }
    if val == f64::NEG_INFINITY {
        return "-oo".to_string();
    }
    if val.is_nan() {
        return "NaN".to_string();
    }
    if val != 0.0 && (val.abs() >= 1e9 || val.abs() < 1e-6) {
        return format!("{:.4e}", val);
    }

    // Round to 6 decimal places and format nicely
    let s = format!("{:.6}", val);
    // Trim trailing zeros
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn format_opt(val: Option<f64>) -> String {
    val.map(format_val).unwrap_or_else(|| "-".to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// SEQUENCE REPORT
// =============================================================================
fn print_sequence(formula: &str, config: &SequenceConfig, analysis: &SequenceAnalysis) {
    println!("{}{}", "Input: ".cyan().bold(), formula.cyan());
    if let Some(fault) = analysis.error {
        println!("{}", fault.to_string().red());
        println!("{}", "-".repeat(40));
        return;
    }
    if analysis.data.is_empty() {
        println!("{}", "No formula".dimmed());
        println!("{}", "-".repeat(40));
        return;
    }

    println!(
        "{}L = {}, eps = {}, N = {}",
        "Tube:   ".green(),
        format_val(analysis.limit),
        format_val(analysis.epsilon),
        analysis.threshold
    );

    let row: Vec<String> = analysis
        .data
        .iter()
        .map(|p| {
            let cell = format!("{}", p.input);
            match p.status {
                PointStatus::Neutral => cell.dimmed().to_string(),
                PointStatus::Success => cell.green().to_string(),
                PointStatus::Danger => cell.red().bold().to_string(),
                PointStatus::Invalid => cell.yellow().to_string(),
            }
        })
        .collect();
    println!(
        "{}n = {}..{}: {}",
        "Terms:  ".green(),
        config.first_index,
        config.last_index,
        row.join(" ")
    );

    if let Some(check) = analysis.check_point() {
        let cmp = if check.within_epsilon { "<" } else { ">=" };
        let line = format!(
            "|a_{} - L| = |{} - {}| = {} {} {}",
            check.index,
            format_val(check.value),
            format_val(analysis.limit),
            format_val(check.distance),
            cmp,
            format_val(analysis.epsilon)
        );
        let line = if check.within_epsilon { line.green() } else { line.red() };
        println!("{}{}", "Check:  ".green(), line);
    }

    if analysis.is_convergent() {
        println!("{}{}", "Result: ".green(), "every sampled term past N is inside the tube".green().bold());
    } else if let Some(v) = analysis.first_violation() {
        println!(
            "{}{}",
            "Result: ".green(),
            format!("a_{} = {} leaves the tube", v.input, format_opt(v.output)).red().bold()
        );
    }
    println!("{}", "-".repeat(40));
}

// =============================================================================
// FUNCTION-SEQUENCE REPORT
// =============================================================================
fn print_uniformity(sequence: &str, limit: &str, config: &UniformityConfig, analysis: &UniformityAnalysis) {
    println!(
        "{}{}{}{}",
        "Input: ".cyan().bold(),
        format!("f_n(x) = {}", sequence).cyan(),
        "  vs  ".dimmed(),
        format!("f(x) = {}", limit).cyan()
    );
    println!(
        "{}n = {}, x in [{}, {}]",
        "Index:  ".green(),
        analysis.index,
        format_val(config.domain_start),
        format_val(config.domain_end)
    );

    for (label, fault) in [("f_n", analysis.sequence_error), ("f", analysis.limit_error)] {
        if let Some(fault) = fault {
            println!("{}{}", format!("{label}: ").red(), fault.to_string().red());
        }
    }

    match (analysis.distance, analysis.judgement) {
        (Some(distance), Some(judgement)) => {
            println!(
                "{}{} over {} points",
                "Sup:    ".green(),
                format_val(distance.max_diff),
                distance.compared_points
            );
            let verdict = match judgement {
                UniformityJudgement::UniformEvidence => {
                    format!("max_diff < {}: looks uniform at this n", format_val(analysis.threshold)).green()
                }
                UniformityJudgement::PointwiseOnly => {
                    format!("max_diff >= {}: only pointwise at this n", format_val(analysis.threshold)).yellow()
                }
                UniformityJudgement::Inconclusive => "no comparable points".dimmed(),
            };
            println!("{}{}", "Result: ".green(), verdict);
        }
        _ => println!("{}", "Analysis suppressed".dimmed()),
    }
    println!("{}", "-".repeat(40));
}

// =============================================================================
// SERIES REPORT
// =============================================================================
#[derive(Serialize)]
struct RadiusReport {
    formula: String,
    radius: RadiusEstimate,
    worked_example: Option<RatioWorkedExample>,
    point: Option<(f64, f64)>,
    membership: Option<DiskMembership>,
}

fn radius_report(estimator: &mut RadiusEstimator, formula: &str, point: Option<(f64, f64)>) -> RadiusReport {
    let radius = estimator.estimate(formula);
    RadiusReport {
        formula: formula.to_string(),
        radius,
        worked_example: estimator.worked_example(formula),
        point,
        membership: point.map(|z| DiskMembership::classify(z, radius)),
    }
}

fn print_radius(report: &RadiusReport) {
    println!("{}{}", "Input: ".cyan().bold(), format!("a_n = {}", report.formula).cyan());

    let radius = match report.radius {
        RadiusEstimate::Finite(r) if r == 0.0 => "0 (converges only at z = 0)".yellow(),
        RadiusEstimate::Finite(r) => format_val(r).green(),
        RadiusEstimate::Unbounded => "oo (converges for every z)".green(),
        RadiusEstimate::Indeterminate => "undetermined".red(),
    };
    println!("{}{}", "Radius: ".green(), radius);

    if let Some(ex) = report.worked_example.filter(|_| !report.radius.is_indeterminate()) {
        println!(
            "{}|a_{} / a_{}| = |{} / {}| = {}",
            "Ratio:  ".dimmed(),
            ex.index,
            ex.index + 1,
            format_val(ex.a_n),
            format_val(ex.a_next),
            format_val(ex.ratio)
        );
    }

    if let (Some((re, im)), Some(membership)) = (report.point, report.membership) {
        let z = format!("z = {} + {}i", format_val(re), format_val(im));
        let status = match membership {
            DiskMembership::Converges => "converges".green(),
            DiskMembership::Diverges => "diverges".red(),
            DiskMembership::Boundary => "on the boundary, test inconclusive".yellow(),
            DiskMembership::Unknown => "unknown".dimmed(),
        };
        println!("{}{}: {}", "Point:  ".green(), z, status);
    }
    println!("{}", "-".repeat(40));
}

fn estimate_all(formulas: &[String], point: Option<(f64, f64)>) -> Vec<RadiusReport> {
    // One estimator (and compile cache) per worker; formulas are independent
    formulas
        .par_iter()
        .map_init(RadiusEstimator::default, |estimator, formula| {
            radius_report(estimator, formula, point)
        })
        .collect()
}

// =============================================================================
// DEMO
// =============================================================================
fn run_demo() {
    println!("{}", "=== CONVERGENCE LAB ===\n".magenta().bold());

    let sequences = [
        ("(1 + 1/n)^n", 2.718, 0.1, 10),
        ("(1 + 1/n)^n", 2.718, 0.1, 20),
        ("1/n", 0.0, 0.2, 5),
        ("1/n", 0.0, 0.1, 2),
        ("(-1)^n", 1.0, 0.5, 10),
        ("sin(n)/n", 0.0, 0.05, 20),
        ("n^^2", 0.0, 0.1, 2),
    ];

    println!("{}", "--- Sequences ---".white().bold());
    let start = std::time::Instant::now();
    let mut analyzer = SequenceAnalyzer::new(SequenceConfig::default());
    for (formula, limit, epsilon, threshold) in sequences {
        let analysis = analyzer.analyze(formula, limit, epsilon, threshold);
        print_sequence(formula, analyzer.config(), &analysis);
    }
    let seq_time = start.elapsed();

    let functions = [("x^n", "0", 5), ("x^n", "0", 50), ("x/n", "0", 5), ("x/n", "0", 50), ("x ^^ n", "0", 1)];

    println!("\n{}", "--- Function Sequences ---".white().bold());
    let start = std::time::Instant::now();
    let mut analyzer = FunctionSequenceAnalyzer::new(UniformityConfig::default());
    for (sequence, limit, index) in functions {
        let analysis = analyzer.analyze(sequence, limit, index);
        print_uniformity(sequence, limit, analyzer.config(), &analysis);
    }
    let fn_time = start.elapsed();

    let series: Vec<String> = ["1", "1/n", "1/n!", "n!", "2^n", "1/2^n", "n^2/3^n", "invalid^n", ""]
        .iter()
        .map(|s| s.to_string())
        .collect();

    println!("\n{}", "--- Power Series ---".white().bold());
    let start = std::time::Instant::now();
    for report in estimate_all(&series, Some((0.5, 0.5))) {
        print_radius(&report);
    }
    let series_time = start.elapsed();

    // Print timing summary
    println!("\n{}", "=== PERFORMANCE SUMMARY ===".magenta().bold());
    println!("Sequences ({}):        {:?}", sequences.len(), seq_time);
    println!("Function sequences ({}): {:?}", functions.len(), fn_time);
    println!("Power series ({}):     {:?}", series.len(), series_time);
    println!("Total:                 {:?}", seq_time + fn_time + series_time);
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Sequence {
            formula,
            limit,
            epsilon,
            threshold,
            first,
            last,
            guard,
        } => {
            let config = SequenceConfig::default()
                .with_range(first, last)
                .with_magnitude_guard(guard);
            let mut analyzer = SequenceAnalyzer::new(config);
            let analysis = analyzer.analyze(&formula, limit, epsilon, threshold);
            if cli.json {
                print_json(&analysis)?;
            } else {
                print_sequence(&formula, analyzer.config(), &analysis);
            }
        }
        Commands::Functions {
            sequence,
            limit,
            index,
            threshold,
            from,
            to,
            intervals,
            guard,
        } => {
            let config = UniformityConfig::default()
                .with_domain(from, to)
                .with_intervals(intervals)
                .with_uniform_threshold(threshold)
                .with_magnitude_guard(guard);
            let mut analyzer = FunctionSequenceAnalyzer::new(config);
            let analysis = analyzer.analyze(&sequence, &limit, index);
            if cli.json {
                print_json(&analysis)?;
            } else {
                print_uniformity(&sequence, &limit, analyzer.config(), &analysis);
            }
        }
        Commands::Radius { formulas, point } => {
            let reports = estimate_all(&formulas, point);
            if cli.json {
                print_json(&reports)?;
            } else {
                for report in &reports {
                    print_radius(report);
                }
            }
        }
        Commands::Demo => run_demo(),
    }

    Ok(())
}
