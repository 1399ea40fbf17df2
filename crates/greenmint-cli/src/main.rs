//! GreenMint CLI
//!
//! Command-line interface for the reward ledger math and the tokenomics
//! simulator.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use greenmint_economics::config::LoggingConfig;
use greenmint_economics::simulation::coverage_metrics;
use greenmint_economics::{
    compute_pending, max_activity_for_coverage, mintable_units, split_mint, split_transfer,
    AchievementEngine, BatchEntry, Category, DistributionConfig, EngineConfig, NamedScenario,
    Scenario, ScenarioReport, SYMBOL,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "greenmint")]
#[command(author = "GreenMint")]
#[command(version)]
#[command(about = "GreenMint - clean-energy activity rewards and tokenomics simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "~/.greenmint/greenmint.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct ScenarioSource {
    /// Named preset: ideal, conservative, stress
    #[arg(short, long, default_value = "ideal")]
    preset: String,

    /// Scenario TOML file; overrides the preset, missing fields come from ideal
    #[arg(short, long)]
    scenario: Option<PathBuf>,
}

impl ScenarioSource {
    fn load(&self) -> anyhow::Result<Scenario> {
        match &self.scenario {
            Some(path) => {
                let path = expand_path(path);
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading scenario {:?}", path))?;
                Ok(toml::from_str(&content)?)
            }
            None => Ok(Scenario::preset(&self.preset)?),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Project price, pool and supply month by month
    Simulate {
        #[command(flatten)]
        source: ScenarioSource,

        /// Projection horizon (defaults to the config value)
        #[arg(short, long)]
        months: Option<u32>,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate many scenarios concurrently
    Batch {
        /// Batch files with [[scenarios]] entries
        files: Vec<PathBuf>,

        /// Presets to include alongside the files
        #[arg(long, value_delimiter = ',')]
        presets: Vec<String>,

        /// Projection horizon (defaults to the config value)
        #[arg(short, long)]
        months: Option<u32>,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Steady-state LP coverage ratio
    Coverage {
        #[command(flatten)]
        source: ScenarioSource,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Largest per-user monthly activity that keeps a target coverage
    MaxActivity {
        #[command(flatten)]
        source: ScenarioSource,

        /// Target coverage ratio
        #[arg(short, long, default_value = "0.7")]
        target: f64,
    },

    /// Pending activity for a lifetime reading
    Pending {
        #[arg(short, long)]
        lifetime: f64,

        #[arg(short, long, default_value = "0")]
        baseline: f64,

        /// Tokens the user has minted so far
        #[arg(short, long, default_value = "0")]
        minted: u128,
    },

    /// Split a gross mint
    Split {
        /// Gross tokens
        gross: u128,

        /// Split preset (defaults to the configured mint split)
        #[arg(short, long)]
        preset: Option<String>,
    },

    /// Split a peer-to-peer transfer
    Transfer {
        /// Amount sent
        amount: u128,
    },

    /// Achievements earned at the given lifetime values
    Achievements {
        #[arg(long, default_value = "0")]
        solar: f64,

        #[arg(long, default_value = "0")]
        battery: f64,

        #[arg(long, default_value = "0")]
        ev_miles: f64,

        #[arg(long, default_value = "0")]
        charging: f64,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Ignore the config file and print defaults
        #[arg(long)]
        defaults: bool,
    },

    /// Version information
    Version,
}

/// Batch file layout
#[derive(Deserialize)]
struct BatchFile {
    #[serde(default)]
    scenarios: Vec<NamedScenario>,
}

#[derive(Serialize)]
struct BatchRow<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ScenarioReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn expand_path(path: &PathBuf) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.clone()
}

fn read_config(path: &PathBuf) -> anyhow::Result<EngineConfig> {
    let path = expand_path(path);
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    EngineConfig::load(&path).with_context(|| format!("loading config {:?}", path))
}

fn print_report(name: &str, report: &ScenarioReport) {
    println!("Scenario: {}", name);
    println!(
        "Coverage: {:.3} ({})",
        report.coverage.coverage_ratio, report.coverage.sustainability
    );
    if let Some(warning) = &report.divergence {
        println!(
            "WARNING: price on floor for {} months from month {}",
            warning.consecutive_months, warning.first_month
        );
    }
    println!("Sustainability: {}", report.sustainability);
    println!("");
    println!(
        "{:>5} {:>8} {:>12} {:>14} {:>16} {:>16}",
        "month", "users", "price", "pool usd", "circulating", "burned"
    );
    for s in &report.snapshots {
        println!(
            "{:>5} {:>8} {:>12.6} {:>14.2} {:>16.0} {:>16.0}",
            s.month, s.active_users, s.price, s.pool_usd_reserve, s.circulating_supply, s.total_burned
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = read_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging);
    for warning in config.warnings() {
        tracing::warn!(%warning, "simulations will not match live minting");
    }

    match cli.command {
        Commands::Simulate { source, months, json } => {
            let scenario = source.load()?;
            let months = months.unwrap_or(config.simulation.horizon_months);
            tracing::debug!(months, "projecting scenario");

            let report = config.simulator().evaluate(&scenario, months)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let name = source
                    .scenario
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or(source.preset);
                print_report(&name, &report);
            }
        }

        Commands::Batch { files, presets, months, json } => {
            let months = months.unwrap_or(config.simulation.horizon_months);

            let mut scenarios = Vec::new();
            for name in &presets {
                scenarios.push(NamedScenario {
                    name: name.clone(),
                    scenario: Scenario::preset(name)?,
                });
            }
            for file in &files {
                let path = expand_path(file);
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading batch {:?}", path))?;
                let batch: BatchFile = toml::from_str(&content)?;
                scenarios.extend(batch.scenarios);
            }
            if scenarios.is_empty() {
                anyhow::bail!("no scenarios given");
            }
            tracing::info!(count = scenarios.len(), months, "evaluating batch");

            let simulator = config.simulator();
            let tasks: Vec<_> = scenarios
                .into_iter()
                .map(|named| {
                    let simulator = simulator.clone();
                    tokio::task::spawn_blocking(move || BatchEntry {
                        result: simulator.evaluate(&named.scenario, months),
                        name: named.name,
                    })
                })
                .collect();

            let mut entries = Vec::with_capacity(tasks.len());
            for task in tasks {
                entries.push(task.await?);
            }

            if json {
                let rows: Vec<BatchRow> = entries
                    .iter()
                    .map(|entry| BatchRow {
                        name: &entry.name,
                        report: entry.result.as_ref().ok(),
                        error: entry.result.as_ref().err().map(|e| e.to_string()),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!(
                    "{:<24} {:>10} {:>10} {:>12}",
                    "scenario", "coverage", "class", "final price"
                );
                for entry in &entries {
                    match &entry.result {
                        Ok(report) => println!(
                            "{:<24} {:>10.3} {:>10} {:>12.6}",
                            entry.name,
                            report.coverage.coverage_ratio,
                            report.sustainability.to_string(),
                            report.final_snapshot().map(|s| s.price).unwrap_or(0.0)
                        ),
                        Err(e) => println!("{:<24} error [{}]: {}", entry.name, e.code(), e),
                    }
                }
            }
        }

        Commands::Coverage { source, json } => {
            let scenario = source.load()?;
            scenario.validate()?;
            let metrics = coverage_metrics(&scenario);

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("Liquidity injection: ${:.2}/month", metrics.liquidity_injection_usd);
                println!("Tokens to users:     {:.0} {}/month", metrics.tokens_to_users, SYMBOL);
                println!("Sell pressure:       ${:.2}/month", metrics.sell_pressure_usd);
                println!("Coverage ratio:      {:.3}", metrics.coverage_ratio);
                println!("Sustainability:      {}", metrics.sustainability);
            }
        }

        Commands::MaxActivity { source, target } => {
            let scenario = source.load()?;
            let activity = max_activity_for_coverage(target, &scenario)?;
            println!(
                "Max activity for coverage {:.2}: {:.2} units/user/month",
                target, activity
            );
        }

        Commands::Pending { lifetime, baseline, minted } => {
            let pending = compute_pending(lifetime, baseline, minted);
            println!("Pending: {}", pending);
            println!("Mintable units: {}", mintable_units(pending));
        }

        Commands::Split { gross, preset } => {
            let split_config = match preset {
                Some(name) => DistributionConfig::preset(&name)?,
                None => config.mint_split()?,
            };
            let split = split_mint(gross, &split_config);
            println!("Gross:     {} {}", split.gross, SYMBOL);
            println!("User:      {}", split.user);
            println!("Burn:      {} (remainder {})", split.burn, split.remainder(&split_config));
            println!("Liquidity: {}", split.liquidity);
            println!("Treasury:  {}", split.treasury);
        }

        Commands::Transfer { amount } => {
            let split = split_transfer(amount, &config.transfer);
            println!("Amount:    {} {}", split.amount, SYMBOL);
            println!("Recipient: {}", split.recipient);
            println!("Burn:      {}", split.burn);
            println!("Liquidity: {}", split.liquidity);
            println!("Treasury:  {}", split.treasury);
        }

        Commands::Achievements { solar, battery, ev_miles, charging, json } => {
            let engine = AchievementEngine::new(config.registry()?);
            let high_water = BTreeMap::from([
                (Category::Solar, solar),
                (Category::Battery, battery),
                (Category::EvMiles, ev_miles),
                (Category::Charging, charging),
            ]);
            let earned = engine.evaluate(true, &high_water);

            if json {
                println!("{}", serde_json::to_string_pretty(&earned)?);
            } else {
                for category in Category::ALL {
                    let tiers = &earned.tiers[&category];
                    let table = engine.registry().table(category);
                    print!("{:<10} {}/{}", category.name(), tiers.len(), table.len());
                    if let Some((next, remaining)) = table.next_tier(high_water[&category]) {
                        print!("  next: {} in {:.1} {}", next.name, remaining, category.unit());
                    }
                    println!();
                }
                for combo in &earned.combos {
                    println!("Combo: {}", combo);
                }
                println!("Total earned: {}", earned.total_earned);
            }
        }

        Commands::Config { defaults } => {
            let shown = if defaults { EngineConfig::default() } else { config };
            print!("{}", shown.to_toml()?);
        }

        Commands::Version => {
            println!("GreenMint v{}", env!("CARGO_PKG_VERSION"));
            println!("Rust: {}", rustc_version_runtime::version());
            println!("");
            println!("Token: {} ({})", greenmint_economics::NAME, SYMBOL);
            println!("Categories: Solar, Battery, EV Miles, Charging");
        }
    }

    Ok(())
}
