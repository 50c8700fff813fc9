use clap::Parser;
use passvault::cli::commands::update::UpdateArgs;
use passvault::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("PASSVAULT_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { work_factor, force } => {
            passvault::cli::commands::init::execute(&cli, work_factor, force)
        }
        Commands::Add {
            ref fullname,
            ref name,
            ref login,
            ref comment,
            ref password,
        } => passvault::cli::commands::add::execute(
            &cli,
            fullname,
            name,
            login,
            comment.as_deref(),
            password.as_deref(),
        ),
        Commands::Update {
            ref fullname,
            ref name,
            ref login,
            ref comment,
            clear_comment,
            ref password,
            prompt_password,
            ref rename_fullname,
            ref rename_name,
        } => passvault::cli::commands::update::execute(
            &cli,
            fullname,
            name,
            UpdateArgs {
                login: login.as_deref(),
                comment: comment.as_deref(),
                clear_comment,
                password: password.as_deref(),
                prompt_password,
                rename_fullname: rename_fullname.as_deref(),
                rename_name: rename_name.as_deref(),
            },
        ),
        Commands::Remove {
            ref fullname,
            ref name,
            force,
        } => passvault::cli::commands::remove::execute(&cli, fullname, name, force),
        Commands::List => passvault::cli::commands::list::execute(&cli),
        Commands::Search { ref pattern } => passvault::cli::commands::search::execute(&cli, pattern),
        Commands::Reveal {
            ref fullname,
            ref name,
            copy,
        } => passvault::cli::commands::reveal::execute(&cli, fullname, name.as_deref(), copy),
        Commands::Log { last, ref since } => {
            passvault::cli::commands::log_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Completions { shell } => passvault::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        passvault::cli::output::error(&e.to_string());
        if e.is_bad_passphrase() {
            passvault::cli::output::tip("Check PASSVAULT_PASSPHRASE or re-enter the passphrase.");
        }
        std::process::exit(1);
    }
}
