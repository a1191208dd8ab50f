use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};

mod access;
mod aggregate;
mod cache;
mod config;
mod error;
mod filter;
mod loader;
mod logging;
mod models;
mod report;
mod session;

use models::{DateRange, FilterSelection, Identity, Role};
use session::DashboardState;

#[derive(Parser)]
#[command(name = "eta-dashboard")]
#[command(about = "Event participant attendance dashboard", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Settings file (defaults to ./dashboard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the shared data file path
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdentityArgs {
    /// Username supplied by the authentication layer
    #[arg(long)]
    user: String,
    #[arg(long, value_enum, default_value_t = Role::Standard)]
    role: Role,
}

impl IdentityArgs {
    fn identity(&self) -> Identity {
        Identity::new(self.user.clone(), self.role)
    }
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long = "region")]
    regions: Vec<String>,
    #[arg(long = "woreda")]
    woredas: Vec<String>,
    #[arg(long = "organizer")]
    organizers: Vec<String>,
    #[arg(long = "event-id")]
    event_ids: Vec<String>,
    #[arg(long = "username")]
    usernames: Vec<String>,
    /// First day of the date range (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day of the date range (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    fn selection(self) -> FilterSelection {
        let range = DateRange::new(self.from, self.to);
        FilterSelection {
            regions: self.regions.into_iter().collect::<BTreeSet<_>>(),
            woredas: self.woredas.into_iter().collect(),
            organizers: self.organizers.into_iter().collect(),
            event_ids: self.event_ids.into_iter().collect(),
            usernames: self.usernames.into_iter().collect(),
            date_range: (!range.is_open()).then_some(range),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the shared data file (admins only)
    Upload {
        #[command(flatten)]
        who: IdentityArgs,
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the headline figures
    Summary {
        #[command(flatten)]
        who: IdentityArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Write the full dashboard report
    Report {
        #[command(flatten)]
        who: IdentityArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// List the values available to each filter
    Options {
        #[command(flatten)]
        who: IdentityArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        settings.data_path = data;
    }
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Upload { who, file } => {
            let state = DashboardState::new(who.identity());
            state
                .upload(&file, &settings.data_path)
                .with_context(|| format!("upload of {} failed", file.display()))?;
            println!(
                "Stored {} as {}.",
                file.display(),
                settings.data_path.display()
            );
        }
        Commands::Summary { who, filters } => {
            let mut state = DashboardState::new(who.identity());
            state.select(filters.selection());
            let summary = state.render(&settings.data_path, today, settings.trend_window_days)?;

            let identity = state.identity();
            if !identity.is_admin() {
                println!("Viewing only your own records ({}).", identity.username);
            }
            for line in report::kpi_lines(&summary.kpis) {
                println!("{line}");
            }
        }
        Commands::Report {
            who,
            filters,
            out,
            format,
        } => {
            let mut state = DashboardState::new(who.identity());
            state.select(filters.selection());
            let summary = state.render(&settings.data_path, today, settings.trend_window_days)?;

            let rendered = match format {
                OutputFormat::Markdown => report::build_report(&summary),
                OutputFormat::Json => report::to_json(&summary)?,
            };
            let out = out.unwrap_or(settings.report_path);
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Options { who } => {
            let mut state = DashboardState::new(who.identity());
            let options = state.options(&settings.data_path)?;
            print!("{}", report::build_options(&options));
        }
    }

    Ok(())
}
