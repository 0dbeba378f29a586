//! campband: command-line view over the album store.
//!
//! Usage: campband <command> [args]

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use campband::config::Config;
use campband::router::{Navigation, Router, HOME_PATH};
use campband::store::ALL_GENRES;
use campband::{Album, AlbumStore, HttpAlbumApi, NewAlbum, Session, SessionProvider};

const USAGE: &str = "Usage: campband <command>

Commands:
  list [genre]         all albums, optionally filtered by genre
  mine                 albums owned by the signed-in user
  genres               genre index of the catalog
  show <id>            one album from the catalog
  add <album.json>     create an album (no id field)
  update <album.json>  replace an album (id required)
  delete <id>          delete an album
  login <uid> <token>  save a session
  logout               forget the saved session
  help                 show this message";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Login { uid: String, token: String },
    Logout,
    List { genre: Option<String> },
    Mine,
    Genres,
    Show { id: String },
    Add { path: String },
    Update { path: String },
    Delete { id: String },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            bail!("{}", USAGE);
        };

        let command = match name.as_str() {
            "help" | "--help" | "-h" => Command::Help,
            "login" => Command::Login {
                uid: arg(args, 1, "login <uid> <token>")?,
                token: arg(args, 2, "login <uid> <token>")?,
            },
            "logout" => Command::Logout,
            "list" => Command::List {
                genre: args.get(1).cloned(),
            },
            "mine" => Command::Mine,
            "genres" => Command::Genres,
            "show" => Command::Show {
                id: arg(args, 1, "show <id>")?,
            },
            "add" => Command::Add {
                path: arg(args, 1, "add <album.json>")?,
            },
            "update" => Command::Update {
                path: arg(args, 1, "update <album.json>")?,
            },
            "delete" => Command::Delete {
                id: arg(args, 1, "delete <id>")?,
            },
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };

        Ok(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    init_logging(&config);

    let credentials = Arc::new(SessionProvider::with_path(config.credentials_path()?));
    if let Err(e) = credentials.load_saved() {
        tracing::warn!("Could not restore saved session: {:#}", e);
    }

    match &command {
        Command::Login { uid, token } => {
            credentials.sign_in(Session::new(uid.as_str(), token.as_str()))?;
            println!("Signed in as {}", uid);
            return Ok(());
        }
        Command::Logout => {
            credentials.sign_out()?;
            println!("Signed out");
            return Ok(());
        }
        _ => {}
    }

    let router = Router::default();
    match router.resolve(HOME_PATH, &*credentials) {
        Navigation::Proceed(_) => {}
        Navigation::Redirect { to } => {
            bail!("Not signed in (redirected to {}); run `campband login <uid> <token>`", to)
        }
        Navigation::NotFound => bail!("No home route configured"),
    }

    let api = Arc::new(HttpAlbumApi::new(&config.api)?);
    let store = AlbumStore::new(api, credentials);

    match command {
        Command::List { genre } => {
            store.fetch_albums().await?;
            let genre = genre.as_deref().unwrap_or(ALL_GENRES);
            print_albums(&store.albums_by_genre(genre));
        }
        Command::Mine => {
            store.fetch_user_albums().await?;
            print_albums(&store.user_albums());
        }
        Command::Genres => {
            store.fetch_albums().await?;
            for genre in store.genres() {
                println!("{}", genre);
            }
        }
        Command::Show { id } => {
            store.fetch_albums().await?;
            let album = store
                .get_album_by_id(&id)
                .ok_or_else(|| anyhow!("Album {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(&album)?);
        }
        Command::Add { path } => {
            let album: NewAlbum = read_json(&path)?;
            let created = store.add_album(album).await?;
            println!("Created album {}", created.id);
        }
        Command::Update { path } => {
            let album: Album = read_json(&path)?;
            let (all, mine) = tokio::join!(store.fetch_albums(), store.fetch_user_albums());
            all?;
            mine?;
            let updated = store.update_album(album).await?;
            println!("Updated album {}", updated.id);
        }
        Command::Delete { id } => {
            store.delete_album(&id).await?;
            println!("Deleted album {}", id);
        }
        Command::Help | Command::Login { .. } | Command::Logout => {}
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn arg(args: &[String], index: usize, usage: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| anyhow!("Usage: campband {}", usage))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path))
}

fn print_albums(albums: &[Album]) {
    if albums.is_empty() {
        println!("No albums");
        return;
    }
    for album in albums {
        println!(
            "{:<12} {:<32} {:<24} {} ({} tracks)",
            album.id,
            album.title,
            album.artist,
            album.genre.to_lowercase(),
            album.tracks.len()
        );
    }
}
