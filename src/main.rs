mod admin;
mod api;
mod demo;
mod forms;
mod identity;
mod location;
mod map;
mod music;
mod overlay;
mod pins;
mod profile;
mod settings;
mod terminal;

use api::ApiClient;
use clap::{Parser, Subcommand};
use identity::{Identity, Session};
use map::centering::SelectedPin;
use map::{MapExit, MapRunConfig};
use settings::Settings;
use std::io;

#[derive(Parser)]
#[command(name = "vibemap")]
#[command(author = "Vibemap Terminal Client")]
#[command(version)]
#[command(about = "Terminal map client for the vibe pin-sharing service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive pin map
    Map {
        /// Center on a pin at startup, as "id,lat,lng"
        #[arg(long, value_name = "ID,LAT,LNG")]
        select_pin: Option<String>,

        /// Treat the selection as a profile hand-off (instant centering)
        #[arg(long)]
        from_profile: bool,
    },

    /// Show a profile and its pins
    Profile {
        /// Principal to look up (defaults to the signed-in user)
        principal: Option<String>,
    },

    /// Aggregate statistics (admins only)
    Admin,

    /// Interactive map over generated sample data, no backend needed
    Demo {
        /// Seed for the generated pin set
        #[arg(long, default_value = "1117")]
        seed: u64,
    },

    /// Store a backend session token
    Login { token: String },

    /// Clear the stored session
    Logout,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Commands::Map {
            select_pin,
            from_profile,
        } => {
            let selected = match select_pin {
                Some(raw) => match SelectedPin::parse(&raw) {
                    Some(sel) => Some(sel),
                    None => {
                        eprintln!("--select-pin expects \"id,lat,lng\", got: {}", raw);
                        std::process::exit(2);
                    }
                },
                None => None,
            };
            run_map_loop(&settings, selected, from_profile, false, 0)?;
        }

        Commands::Profile { principal } => {
            if let Some(selected) = profile::run(&settings, principal)? {
                run_map_loop(&settings, Some(selected), true, false, 0)?;
            }
        }

        Commands::Admin => admin::run(&settings)?,

        Commands::Demo { seed } => {
            run_map_loop(&settings, None, false, true, seed)?;
        }

        Commands::Login { token } => login(&settings, token),

        Commands::Logout => {
            Session::clear();
            println!("Signed out.");
        }
    }

    Ok(())
}

/// Map and profile screens route into each other, mirroring the in-app
/// navigation: popup -> owner profile -> pin -> back on the map.
fn run_map_loop(
    settings: &Settings,
    mut selected: Option<SelectedPin>,
    mut from_profile: bool,
    demo: bool,
    demo_seed: u64,
) -> io::Result<()> {
    loop {
        let exit = map::run(
            settings,
            MapRunConfig {
                selected: selected.take(),
                from_profile,
                demo,
                demo_seed,
            },
        )?;
        from_profile = false;

        match exit {
            MapExit::Quit => return Ok(()),
            MapExit::OpenProfile(principal) => {
                if demo {
                    println!("Profiles need a backend; not available in demo mode.");
                    return Ok(());
                }
                match profile::run(settings, Some(principal))? {
                    Some(sel) => {
                        selected = Some(sel);
                        from_profile = true;
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Validate the token against the backend and persist the session.
fn login(settings: &Settings, token: String) {
    let api = ApiClient::new(&settings.backend.url, Some(token.clone()));
    match api.get_user_profile() {
        Ok(Some(profile)) => {
            let session = Session {
                principal: Identity::new(profile.principal),
                token,
            };
            match session.save() {
                Ok(()) => println!("Signed in as {}.", session.principal),
                Err(e) => {
                    eprintln!("could not store session: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Ok(None) => {
            eprintln!("Backend accepted the token but returned no profile.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("login failed: {}", e);
            std::process::exit(1);
        }
    }
}
