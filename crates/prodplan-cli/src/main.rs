mod io;
mod prompt;

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use prodplan_model::{
    extract, parse_row, parse_value, render_report, AllocationReport, Comparison, ModelBuilder, NewProduct,
    ProductChange, Scenario, DEFAULT_TIME_BUDGET,
};
use prodplan_solver::Solver;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "prodplan")]
#[command(about = "Allocate limited production time across products and markets", long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug); RUST_LOG also applies
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the scenario in a directory and write its output table
    Solve {
        /// Directory holding time.json, demands.json and profits.json
        dir: PathBuf,
        /// Name of the problem, used for the output file
        #[arg(long, default_value = "InitialProblem")]
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Solve a scenario, then solve it again after changing or adding a product
    Analyze {
        /// Directory holding time.json, demands.json and profits.json
        dir: PathBuf,
        #[command(flatten)]
        edits: EditArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Check the tables in a directory for errors
    Check {
        /// Directory holding time.json, demands.json and profits.json
        dir: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Production time available, in minutes
    #[arg(long, default_value_t = DEFAULT_TIME_BUDGET)]
    capacity: f64,
    /// Branch-and-bound node limit
    #[arg(long, default_value_t = 10_000)]
    max_nodes: usize,
    /// Simplex pivot limit per relaxation
    #[arg(long, default_value_t = 10_000)]
    max_iterations: usize,
    /// Relative optimality gap accepted by branch-and-bound
    #[arg(long, default_value_t = 1e-4)]
    gap: f64,
    /// Where <name>_output.json files are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Text report file
    #[arg(long, default_value = "report.txt")]
    report: PathBuf,
    /// Output format (json, pretty)
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

/// Edits given on the command line; without any the edits are asked for
#[derive(Args)]
struct EditArgs {
    /// Rename a product, as OLD=NEW
    #[arg(long)]
    change: Option<String>,
    /// Replacement demand per market, space separated
    #[arg(long, requires = "change", allow_hyphen_values = true)]
    change_demand: Option<String>,
    /// Replacement profit per market, space separated
    #[arg(long, requires = "change", allow_hyphen_values = true)]
    change_profit: Option<String>,
    /// Replacement minutes per unit
    #[arg(long, requires = "change")]
    change_time: Option<String>,
    /// Add a product with this name
    #[arg(long)]
    add: Option<String>,
    /// Demand per market of the added product
    #[arg(long, requires = "add", allow_hyphen_values = true)]
    add_demand: Option<String>,
    /// Profit per market of the added product
    #[arg(long, requires = "add", allow_hyphen_values = true)]
    add_profit: Option<String>,
    /// Minutes per unit of the added product
    #[arg(long, requires = "add")]
    add_time: Option<String>,
}

impl EditArgs {
    fn is_empty(&self) -> bool {
        self.change.is_none() && self.add.is_none()
    }

    fn product_change(&self) -> Result<Option<ProductChange>, String> {
        let Some(pair) = &self.change else {
            return Ok(None);
        };
        let (old, new) = pair
            .split_once('=')
            .ok_or_else(|| format!("--change expects OLD=NEW, got {}", pair))?;

        let mut change = ProductChange::new(old.trim(), new.trim());
        change.demand = parse_flag(&self.change_demand, parse_row)?;
        change.profit = parse_flag(&self.change_profit, parse_row)?;
        change.time = parse_flag(&self.change_time, parse_value)?;
        Ok(Some(change))
    }

    fn new_product(&self) -> Result<Option<NewProduct>, String> {
        let Some(name) = &self.add else {
            return Ok(None);
        };

        let mut product = NewProduct::new(name.trim());
        product.demand = parse_flag(&self.add_demand, parse_row)?;
        product.profit = parse_flag(&self.add_profit, parse_row)?;
        product.time = parse_flag(&self.add_time, parse_value)?;
        Ok(Some(product))
    }
}

fn parse_flag<T, E: std::fmt::Display>(
    value: &Option<String>,
    parse: impl Fn(&str) -> Result<Option<T>, E>,
) -> Result<Option<T>, String> {
    match value {
        Some(text) => parse(text).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::from_default_env();
    if verbose > 0 || std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.init();
}

fn load_scenario(dir: &Path) -> Scenario {
    let tables = match io::load_tables(dir) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match Scenario::from_tables(&tables) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid tables in {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }
}

/// Build, solve and report one named problem. Returns the allocation when
/// the solve was optimal.
fn run_problem(name: &str, scenario: &Scenario, run: &RunArgs, append_report: bool) -> Option<AllocationReport> {
    let model = match ModelBuilder::new(name).build(scenario) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Model error: {}", e);
            std::process::exit(1);
        }
    };

    let solver = Solver::new()
        .with_max_nodes(run.max_nodes)
        .with_max_iterations(run.max_iterations)
        .with_gap_tolerance(run.gap);
    let solution = model.solve(&solver);
    info!("{} solved in {} nodes", name, solution.nodes);

    let allocation = match extract(&model, &solution, scenario) {
        Ok(a) => Some(a),
        Err(e) => {
            info!("{}: {}", name, e);
            None
        }
    };

    let text = render_report(name, scenario, &solution, allocation.as_ref());
    if let Err(e) = io::write_report(&run.report, &text, append_report) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    println!("Problem: {}", name);
    println!("Status: {}", solution.status);
    let Some(allocation) = allocation else {
        println!();
        return None;
    };

    if run.format == "json" {
        match serde_json::to_string_pretty(&allocation) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serialising report: {}", e),
        }
    } else {
        println!("Profit: {}", allocation.objective_value);
        println!("Time used: {} of {} minutes", allocation.time_used, scenario.capacity());
        println!("Satisfied products: [{}]", allocation.satisfied.join(", "));
        println!("Unsatisfied products: [{}]", allocation.unsatisfied.join(", "));
        println!();
        print!("{}", allocation.to_table().to_text());
    }

    match io::write_output(&run.output_dir, name, &allocation.to_table()) {
        Ok(path) if run.format == "json" => info!("output written to {}", path.display()),
        Ok(path) => println!("Output written to {}", path.display()),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
    println!();
    Some(allocation)
}

fn with_capacity(scenario: Scenario, capacity: f64) -> Scenario {
    match scenario.with_capacity(capacity) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn ask_edits(scenario: &Scenario) -> std::io::Result<(Option<ProductChange>, Option<NewProduct>)> {
    let stdin = std::io::stdin();
    let mut prompter = prompt::Prompter::new(stdin.lock(), std::io::stdout());
    let change = prompter.change(scenario)?;
    let product = prompter.introduction()?;
    Ok((change, product))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Solve { dir, name, run } => {
            let scenario = with_capacity(load_scenario(&dir), run.capacity);
            if run_problem(&name, &scenario, &run, false).is_none() {
                std::process::exit(1);
            }
        }
        Commands::Analyze { dir, edits, run } => {
            let scenario = with_capacity(load_scenario(&dir), run.capacity);

            let requested = if edits.is_empty() {
                ask_edits(&scenario).map_err(|e| e.to_string())
            } else {
                edits
                    .product_change()
                    .and_then(|change| Ok((change, edits.new_product()?)))
            };
            let (change, product) = match requested {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Input error: {}", e);
                    std::process::exit(1);
                }
            };

            let initial = run_problem("InitialProblem", &scenario, &run, false);
            if change.is_none() && product.is_none() {
                if initial.is_none() {
                    std::process::exit(1);
                }
                return;
            }

            let mut changed = scenario.clone();
            if let Some(change) = &change {
                changed = match changed.change_product(change) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("Change error: {}", e);
                        std::process::exit(1);
                    }
                };
            }
            if let Some(product) = &product {
                changed = match changed.introduce_product(product) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("Add error: {}", e);
                        std::process::exit(1);
                    }
                };
            }

            let after = run_problem("ChangedProblem", &changed, &run, true);
            match (initial, after) {
                (Some(initial), Some(after)) => {
                    println!("Comparison:");
                    print!("{}", Comparison::between(&initial, &after));
                }
                _ => std::process::exit(1),
            }
        }
        Commands::Check { dir } => {
            let tables = match io::load_tables(&dir) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("✗ {}", e);
                    std::process::exit(1);
                }
            };

            match Scenario::from_tables(&tables) {
                Ok(scenario) => {
                    let demand: f64 = (0..scenario.products().len()).map(|p| scenario.total_demand(p)).sum();
                    println!("✓ {} is valid", dir.display());
                    println!("  {} products", scenario.products().len());
                    println!("  {} markets", scenario.markets().len());
                    println!("  {} units demanded", demand);
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", dir.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
