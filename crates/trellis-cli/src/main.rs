use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use trellis_graph::{BendPreference, EditorSettings, Session};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Route and inspect trellis diagrams", long_about = None)]
struct Args {
    /// Settings file; defaults to <config dir>/trellis/settings.json
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-route every connector in a diagram file
    Route {
        #[arg(long, value_enum, default_value_t = Strategy::Basic)]
        strategy: Strategy,

        /// Bend order for grid routing; the settings value when omitted
        #[arg(long, value_enum)]
        prefer: Option<Prefer>,

        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the routed diagram; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print counts for a diagram file
    Stats {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Write the default settings to a file
    InitSettings {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    Basic,
    Grid,
    Obstacle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Prefer {
    HorizontalFirst,
    VerticalFirst,
}

impl From<Prefer> for BendPreference {
    fn from(prefer: Prefer) -> Self {
        match prefer {
            Prefer::HorizontalFirst => BendPreference::HorizontalFirst,
            Prefer::VerticalFirst => BendPreference::VerticalFirst,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Stats {
    shapes: usize,
    connectors: usize,
    orthogonal: usize,
    groups: usize,
    version: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path)
            .with_context(|| format!("reading settings {}", path.display()))?,
        None => EditorSettings::load(),
    };

    match args.command {
        Command::Route {
            strategy,
            prefer,
            input,
            output,
        } => {
            let mut session = open(&input, settings)?;
            let routed = route(&mut session, strategy, prefer.map(Into::into));
            tracing::info!(?strategy, routed, "routing finished");
            let json = session.diagram().to_json()?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Stats { input } => {
            let session = open(&input, settings)?;
            let stats = stats(&session);
            println!("shapes:     {}", stats.shapes);
            println!("connectors: {} ({} orthogonal)", stats.connectors, stats.orthogonal);
            println!("groups:     {}", stats.groups);
            println!("version:    {}", stats.version);
        }
        Command::InitSettings { output } => {
            EditorSettings::default().save_to(&output)?;
            println!("Wrote default settings to {:?}", output);
        }
    }
    Ok(())
}

fn open(path: &Path, settings: EditorSettings) -> Result<Session> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut session = Session::new(settings);
    session
        .edit(|d| d.from_json(&json, true))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(session)
}

/// Returns how many connectors changed.
fn route(session: &mut Session, strategy: Strategy, prefer: Option<BendPreference>) -> usize {
    match strategy {
        Strategy::Basic => session.route_basic().len(),
        Strategy::Grid => {
            let prefer = prefer.unwrap_or(session.settings().routing.prefer);
            session.route_grid(prefer).len()
        }
        Strategy::Obstacle => {
            let all = session.diagram().document().connector_ids();
            session.set_connector_selection(&all);
            session.route_selected_obstacle().len()
        }
    }
}

fn stats(session: &Session) -> Stats {
    let diagram = session.diagram();
    let doc = diagram.document();
    Stats {
        shapes: doc.shape_count(),
        connectors: doc.connector_count(),
        orthogonal: doc
            .connectors()
            .filter(|c| c.kind == trellis_core::ConnectorKind::Orth)
            .count(),
        groups: diagram.groups().count(),
        version: diagram.meta().version,
    }
}
