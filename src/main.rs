//! Review Board server entry point.

use clap::{Parser, Subcommand};
use reviewboard_lib::db::{self, local_sites, users};
use reviewboard_lib::{server, AppError, ServerSettings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reviewboard")]
#[command(version)]
#[command(about = "Code review server with a JSON web API", long_about = None)]
struct Args {
    /// Settings file (JSON). Defaults to $RB_CONFIG.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web API server (default)
    Serve,

    /// Create a user account
    CreateUser {
        username: String,

        #[arg(long)]
        email: Option<String>,

        /// Password for HTTP Basic logins
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        superuser: bool,
    },

    /// Create a local site
    CreateLocalSite {
        name: String,

        /// Let anyone read the site's content
        #[arg(long)]
        public: bool,

        /// Usernames to make site administrators
        #[arg(long = "admin")]
        admins: Vec<String>,
    },
}

async fn run(command: Commands, settings: ServerSettings) -> Result<(), AppError> {
    match command {
        Commands::Serve => server::run(settings).await,
        Commands::CreateUser {
            username,
            email,
            password,
            superuser,
        } => {
            let pool = db::initialize(&settings.database_path).await?;
            let user = users::create_user(
                &pool,
                &users::NewUser {
                    email: email.unwrap_or_default(),
                    username,
                    password,
                    is_superuser: superuser,
                },
            )
            .await?;

            log::info!("[cli] Created user {} (id {})", user.username, user.id);
            Ok(())
        }
        Commands::CreateLocalSite {
            name,
            public,
            admins,
        } => {
            let pool = db::initialize(&settings.database_path).await?;
            let site = local_sites::create_local_site(&pool, &name, public).await?;

            for username in admins {
                let user = users::get_user_by_username(&pool, &username)
                    .await?
                    .ok_or_else(|| AppError::not_found_with_id("User", &username))?;
                local_sites::add_admin(&pool, site.id, user.id).await?;
            }

            log::info!("[cli] Created local site {} (id {})", site.name, site.id);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = match ServerSettings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    if let Err(e) = run(args.command.unwrap_or(Commands::Serve), settings).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
