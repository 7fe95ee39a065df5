//! intify - query intelligence records from the command line.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use intify_cli::commands::{self, Selection};
use intify_cli::config::Config;
use intify_cli::input::{self, InputFormat};
use intify_core::{Record, RouteSelector};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Records file: a workbook (.xlsx, .xls, .ods) or a JSON array of
    /// objects, or of rows with --sheet
    #[arg(long, short, global = true, default_value = "records.json")]
    input: PathBuf,

    /// Treat a JSON input as positional sheet rows, header first
    #[arg(long, global = true)]
    sheet: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Accepted values for a field, e.g. District=Bijapur,Sukma (repeatable)
    #[arg(long = "filter", value_name = "FIELD=VALUES")]
    filters: Vec<String>,

    /// Inclusive lower date bound (yyyy-mm-dd or dd/mm/yyyy)
    #[arg(long)]
    start_date: Option<String>,

    /// Inclusive upper date bound
    #[arg(long)]
    end_date: Option<String>,

    /// JSON filter spec file; command line filters are merged into it
    #[arg(long)]
    filters_file: Option<PathBuf>,

    /// Drop records with an "unknown" value in any field
    #[arg(long)]
    remove_unknown: bool,
}

impl FilterArgs {
    fn selection(&self) -> Result<Selection> {
        let base = self
            .filters_file
            .as_deref()
            .map(input::load_filter_spec)
            .transpose()?;
        let spec = commands::build_spec(
            base,
            &self.filters,
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )?;
        Ok(Selection {
            spec,
            remove_unknown: self.remove_unknown,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the records matching the filters
    Filter(FilterArgs),
    /// Cluster and place the matching records
    Place(FilterArgs),
    /// Build a chronological route through the matching records
    Route {
        #[command(flatten)]
        filters: FilterArgs,
        /// Only route records whose FIELD equals --value
        #[arg(long, requires = "value")]
        field: Option<String>,
        #[arg(long, requires = "field")]
        value: Option<String>,
    },
    /// List the distinct values of a field
    Suggest {
        #[arg(long)]
        field: String,
        /// Leave out "unknown" sentinel values
        #[arg(long)]
        exclude_unknown: bool,
    },
    /// Write the matching records as a KML document
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        /// Field used to name placemarks
        #[arg(long)]
        legend: Option<String>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Show the cadre profile a record's UID points to
    Profile {
        #[arg(long)]
        uid: String,
        /// Profiles file: a workbook, or JSON profile objects or sheet rows
        #[arg(long)]
        profiles: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("intify=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if let Command::Profile { uid, profiles } = &cli.command {
        let profiles = input::load_profiles(profiles, &config.profile_sheet)?;
        let profile = commands::run_profile(&profiles, uid)?;
        return print_json(profile, cli.pretty);
    }

    let format = InputFormat::detect(&cli.input, cli.sheet);
    let report = input::load_records(&cli.input, format, &config.record_sheet, &config.ingest)?;
    run_record_command(&cli, &report.records, &config)
}

/// Run a subcommand that works on loaded records.
fn run_record_command(cli: &Cli, records: &[Record], config: &Config) -> Result<()> {
    match &cli.command {
        Command::Filter(filters) => {
            let output = commands::run_filter(records, &filters.selection()?, config);
            print_json(&output, cli.pretty)
        }
        Command::Place(filters) => {
            let output = commands::run_place(records, &filters.selection()?, config);
            print_json(&output, cli.pretty)
        }
        Command::Route {
            filters,
            field,
            value,
        } => {
            let selector = field
                .as_ref()
                .zip(value.as_ref())
                .map(|(field, value)| RouteSelector::new(field, value));
            let output = commands::run_route(records, &filters.selection()?, selector.as_ref(), config);
            print_json(&output, cli.pretty)
        }
        Command::Suggest {
            field,
            exclude_unknown,
        } => {
            let output = commands::run_suggest(records, field, *exclude_unknown, config);
            print_json(&output, cli.pretty)
        }
        Command::Export {
            filters,
            legend,
            out_dir,
        } => {
            let legend = legend.as_deref().unwrap_or(&config.legend);
            let output = commands::run_export(records, &filters.selection()?, legend, out_dir, config)?;
            print_json(&output, cli.pretty)
        }
        Command::Profile { uid, .. } => {
            anyhow::bail!("profile lookup for {} needs --profiles, not record input", uid)
        }
    }
}
