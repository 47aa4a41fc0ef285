use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyvault::cli::commands;
use keyvault::cli::{instance_dir, Cli, Commands};
use keyvault::config::Settings;

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match cli.command {
        Commands::Init { ref admin } => commands::init::execute(&cli, admin),
        Commands::User { ref action } => commands::user::execute(&cli, action),
        Commands::Group { ref action } => commands::group::execute(&cli, action),
        Commands::Folder { ref action } => commands::folder::execute(&cli, action),
        Commands::Add(ref args) => commands::add::execute(&cli, args),
        Commands::Show { id, reveal } => commands::show::execute(&cli, id, reveal),
        Commands::Copy { id } => commands::copy::execute(&cli, id),
        Commands::Edit {
            id,
            ref fields,
            ref clear,
        } => commands::edit::execute(&cli, id, fields, clear),
        Commands::Delete { id, force } => commands::delete::execute(&cli, id, force),
        Commands::List {
            folder,
            ref category,
            ref search,
            favorites,
            shared,
        } => commands::list::execute(
            &cli,
            folder,
            category.as_deref(),
            search.as_deref(),
            favorites,
            shared,
        ),
        Commands::Favorite { id } => commands::favorite::execute(&cli, id),
        Commands::Share {
            id,
            ref user,
            ref group,
            write,
            ref expires,
        } => commands::share::execute_share(
            &cli,
            id,
            user.as_deref(),
            group.as_deref(),
            write,
            expires.as_deref(),
        ),
        Commands::Unshare { id, share_id } => commands::share::execute_unshare(&cli, id, share_id),
        Commands::Shares { id } => commands::share::execute_list(&cli, id),
        Commands::Audit {
            last,
            ref since,
            ref action,
        } => commands::audit_cmd::execute(&cli, last, since.as_deref(), action.as_deref()),
        Commands::Export {
            ref format,
            ref output,
            mask,
        } => commands::export::execute(&cli, format, output.as_deref(), mask),
        Commands::Import {
            ref file,
            ref format,
        } => commands::import_cmd::execute(&cli, file, format.as_deref()),
        Commands::Completions { ref shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        keyvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `KEYVAULT_LOG` or the instance's `log_level`.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_env("KEYVAULT_LOG").unwrap_or_else(|_| {
        let level = instance_dir(cli)
            .and_then(|dir| Settings::load(&dir))
            .map(|settings| settings.log_level)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
