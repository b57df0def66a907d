use clap::Parser;
use colorsense::cli::{self, Cli, Commands};
use colorsense::output::Printer;
use miette::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let printer = Printer::new();
    match cli.command {
        Commands::Recolor(args) => {
            let config = cli::load_config(cli.config.as_deref())?;
            cli::recolor::run(args, config, &printer)?
        }
        Commands::Session(args) => {
            let config = cli::load_config(cli.config.as_deref())?;
            cli::session::run(args, config, &printer)?
        }
        Commands::Init(args) => cli::init::run(args, &printer)?,
        Commands::Completions(args) => cli::completions::run(args)?,
    }

    Ok(())
}
