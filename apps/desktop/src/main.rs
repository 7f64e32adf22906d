mod report;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    connect, settings::load_settings_from, ApiClient, CapturedImage, ClientSettings, DiaryDraft,
    FacingMode, FailurePolicy, MediaCaptureProvider, MissingCaptureProvider, Section,
    SessionController, SessionError, StillFrameCamera, UiMode,
};
use shared::domain::EntryId;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sumantra", about = "Identify flowers and keep a plant diary")]
struct Cli {
    /// Base URL of the prediction and diary API.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory holding the local identity and preferences.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// `surface` reports service failures; `placeholder` substitutes demo data.
    #[arg(long, global = true)]
    failure_policy: Option<String>,
    #[arg(long, global = true, default_value = client_core::settings::DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify the flower in an image file.
    Identify {
        image: PathBuf,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Capture a frame from the still-frame camera and identify it.
    Capture {
        #[arg(long)]
        frame: PathBuf,
        /// Use the front camera instead of the back one.
        #[arg(long)]
        front: bool,
        #[command(flatten)]
        save: SaveArgs,
    },
    #[command(subcommand)]
    Diary(DiaryCommand),
    /// Print the local user id.
    Whoami,
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Check that the service is up.
    Health,
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Save the result to the diary.
    #[arg(long)]
    save: bool,
    /// Overrides the pre-filled plant name.
    #[arg(long)]
    name: Option<String>,
    /// Appended to the pre-filled care tips.
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand, Debug)]
enum DiaryCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Show {
        entry_id: String,
    },
}

fn resolve_settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = load_settings_from(Some(&cli.config), |key| std::env::var(key).ok());
    if let Some(api_url) = &cli.api_url {
        settings.api_url = api_url.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        settings.data_dir = Some(data_dir.clone());
    }
    if let Some(raw) = &cli.failure_policy {
        settings.failure_policy = FailurePolicy::parse(raw)
            .ok_or_else(|| anyhow!("unknown failure policy '{raw}'"))?;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    let camera: Arc<dyn MediaCaptureProvider> = match &cli.command {
        Command::Capture { frame, .. } => Arc::new(StillFrameCamera::new(frame.clone())),
        _ => Arc::new(MissingCaptureProvider),
    };

    if let Command::Health = cli.command {
        let api = ApiClient::new(&settings)?;
        let health = api.health().await?;
        println!("{}: {}", api.base_url(), health.status);
        return Ok(());
    }

    let session = connect(&settings, camera)?;
    let mut events = session.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            report::log_event(&event);
        }
    });

    match run(&session, cli.command).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(hint) = err
                .downcast_ref::<SessionError>()
                .and_then(report::failure_hint)
            {
                eprintln!("{hint}");
            }
            Err(err)
        }
    }
}

async fn run(session: &SessionController, command: Command) -> Result<()> {
    match command {
        Command::Identify { image, save } => {
            let image = CapturedImage::from_path(&image).await?;
            let preview = session.select_file(image).await?;
            if let Some((width, height)) = preview.dimensions {
                println!("Loaded {width}x{height} image");
            }
            identify_and_maybe_save(session, save).await
        }
        Command::Capture { front, save, .. } => {
            session.open_camera().await?;
            if front && session.snapshot().await.facing != FacingMode::User {
                session.switch_camera().await?;
            }
            session.capture().await?;
            identify_and_maybe_save(session, save).await
        }
        Command::Diary(DiaryCommand::List) => {
            if let Some(view) = session.navigate(Section::Diary).await? {
                print!("{view}");
            }
            Ok(())
        }
        Command::Diary(DiaryCommand::Add {
            name,
            species,
            notes,
            image,
        }) => {
            let image = match image {
                Some(path) => Some(CapturedImage::from_path(&path).await?),
                None => None,
            };
            session.open_add_entry().await?;
            session
                .update_draft(DiaryDraft {
                    plant_name: name,
                    flower_species: species,
                    notes,
                    image,
                })
                .await?;
            print!("{}", session.submit_diary().await?);
            Ok(())
        }
        Command::Diary(DiaryCommand::Show { entry_id }) => {
            match session.diary_entry(&EntryId(entry_id.clone())).await? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => println!("No diary entry '{entry_id}'"),
            }
            Ok(())
        }
        Command::Whoami => {
            println!("{}", session.user_id());
            Ok(())
        }
        Command::Theme { toggle } => {
            let theme = if toggle {
                session.toggle_theme()?
            } else {
                session.theme()?
            };
            println!("{}", theme.as_str());
            Ok(())
        }
        Command::Health => Ok(()),
    }
}

async fn identify_and_maybe_save(session: &SessionController, save: SaveArgs) -> Result<()> {
    let view = match session.identify().await {
        Ok(view) => view,
        Err(err) => {
            if session.mode().await != UiMode::IdentificationFailed {
                return Err(err.into());
            }
            warn!(error = %err, "identification failed; retrying once");
            session.retry_identification().await?
        }
    };
    print!("{view}");
    if !save.save {
        return Ok(());
    }

    let mut draft = session.open_save_to_diary().await?;
    if let Some(name) = save.name {
        draft.plant_name = name;
    }
    if let Some(notes) = save.notes {
        if draft.notes.is_empty() {
            draft.notes = notes;
        } else {
            draft.notes = format!("{}\n\n{notes}", draft.notes);
        }
    }
    session.update_draft(draft).await?;
    print!("{}", session.submit_diary().await?);
    Ok(())
}
