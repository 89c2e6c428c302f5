//! apimon entry point

use apimon::cli::{check, serve, Cli, Commands};
use apimon::logging;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let console = match cli.command {
        Some(Commands::Check(_)) => logging::Console::Stderr,
        _ => logging::Console::Stdout,
    };
    if let Err(e) = logging::init_with(console) {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::Check(args)) => match check::execute(&args).await {
            Ok(summary) => {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
                if args.strict && summary.fail > 0 {
                    std::process::exit(2);
                }
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Serve(args)) => run_serve(args).await,
        None => match serve::ServeArgs::from_env() {
            Ok(args) => run_serve(args).await,
            Err(e) => e.exit(),
        },
    }
}

async fn run_serve(args: serve::ServeArgs) {
    if let Err(e) = serve::execute(&args).await {
        tracing::error!("Server failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
