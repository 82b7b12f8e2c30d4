mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{spawn_navigator, HttpProfileApi, Navigator, Route, SessionController};
use shared::protocol::ProfileDraft;
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, normalize_database_url, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "perfiles", about = "Session and profile bootstrap client")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print what is persisted without contacting the service.
    Status,
    /// Decide the start destination from the persisted session.
    Resume,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    CreateProfile(DraftArgs),
    /// Show the signed-in user's profile.
    Profile,
    /// List public profiles.
    Directory,
    Logout,
}

#[derive(Args, Debug)]
struct DraftArgs {
    #[arg(long)]
    nombre_completo: String,
    #[arg(long)]
    telefono: String,
    #[arg(long)]
    documento_identidad: String,
    /// RFC 3339 timestamp; defaults to now.
    #[arg(long)]
    fecha_nacimiento: Option<String>,
    #[arg(long)]
    genero: String,
    #[arg(long, default_value = "")]
    biografia: String,
    #[arg(long)]
    ciudad: String,
    #[arg(long)]
    pais: String,
    #[arg(long, default_value = "")]
    foto_perfil: String,
}

impl DraftArgs {
    fn into_draft(self) -> ProfileDraft {
        let blank = ProfileDraft::blank();
        ProfileDraft {
            nombre_completo: self.nombre_completo,
            telefono: self.telefono,
            documento_identidad: self.documento_identidad,
            fecha_nacimiento: self.fecha_nacimiento.unwrap_or(blank.fecha_nacimiento),
            genero: self.genero,
            biografia: self.biografia,
            ciudad: self.ciudad,
            pais: self.pais,
            foto_perfil: self.foto_perfil,
        }
    }
}

struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        println!("-> {}", route.path());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(api_base_url) = cli.api_base_url {
        settings.api_base_url = api_base_url;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    let database_url = normalize_database_url(&settings.database_url);
    let store = match Storage::new(&database_url).await {
        Ok(store) => store,
        Err(error) => {
            error!(%database_url, %error, "cli: failed to open session storage");
            return Err(error);
        }
    };
    info!(%database_url, api_base_url = %settings.api_base_url, "cli: session storage ready");

    let api = HttpProfileApi::new(&settings.api_base_url, settings.request_timeout())
        .context("invalid api base url")?;
    let session = SessionController::with_config(
        Arc::new(api),
        Arc::new(store),
        settings.session_config(),
    );
    let navigator = spawn_navigator(session.subscribe(), Arc::new(ConsoleNavigator));

    let outcome = run(&session, cli.command).await;

    drop(session);
    let _ = navigator.await;
    outcome
}

async fn run(session: &SessionController, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let persisted = session.persisted().await?;
            match persisted.credentials {
                Some(credentials) => println!(
                    "signed in as user {} (profile: {})",
                    credentials.user_id,
                    persisted.profile.as_flag().unwrap_or("unknown")
                ),
                None => println!("signed out"),
            }
        }
        Command::Resume => {
            let state = session.resume().await;
            println!("{state}");
        }
        Command::Login { email, password } => {
            let state = session.login(&email, &password).await?;
            println!("{state}");
        }
        Command::Register { email, password } => {
            session.register(&email, &password).await?;
            println!("registered {email}; log in to continue");
        }
        Command::CreateProfile(args) => {
            let state = session.create_profile(args.into_draft()).await?;
            println!("{state}");
        }
        Command::Profile => {
            let profile = session.current_profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Directory => {
            let profiles = session.public_profiles().await?;
            for summary in profiles {
                println!(
                    "{:>6}  {}  {}",
                    summary
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".into()),
                    summary.nombre_completo,
                    summary.ciudad.as_deref().unwrap_or("")
                );
            }
        }
        Command::Logout => {
            let state = session.logout().await;
            println!("{state}");
        }
    }
    Ok(())
}
