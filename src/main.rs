use color_eyre::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use traqit::{App, Config, Profile, cli::{Cli, Commands}};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    // An explicit --config path wins over the profile's default location
    let config = match &cli.config {
        Some(path) => Config::load_from(path, profile)?,
        None => Config::load_with_profile(profile)?,
    };

    // RUST_LOG overrides the configured level; logs go to stderr so
    // command output stays clean
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    // Open the database and run pending start-up tasks
    let app = App::init(config)?;

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Field(command) => traqit::cli::handle_field(command, &app)?,
        Commands::Entry(command) => traqit::cli::handle_entry(command, &app)?,
        Commands::View(command) => traqit::cli::handle_view(command, &app)?,
        Commands::Stats { field } => traqit::cli::handle_stats(field, &app)?,
        Commands::Export { csv, out } => traqit::cli::handle_export(csv, out, &app)?,
        Commands::Import { file, mode } => traqit::cli::handle_import(&file, mode, &app)?,
        Commands::Inspect { file } => traqit::cli::handle_inspect(&file)?,
        Commands::Info => traqit::cli::handle_info(&app)?,
    }

    Ok(())
}
