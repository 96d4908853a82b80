use std::sync::Arc;

use tokio::sync::mpsc;

use profile_directory::controller::{DirectoryView, Page, Route};
use profile_directory::model::{LoginRequest, RegisterRequest, UpdateProfileRequest};
use profile_directory::{
    init_tracing, ClientConfig, DirectoryApi, DirectoryController, DirectoryHandle, EventBatcher,
    EventBus, HttpDirectoryApi, WsTransport,
};

#[derive(Debug, Default)]
struct Options {
    base_url: Option<String>,
    email: Option<String>,
    password: Option<String>,
    display_name: Option<String>,
    bio: Option<String>,
    register: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(error) = run().await {
        eprintln!("profile-watch failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let Some(options) = parse_args()? else {
        return Ok(());
    };

    let mut config = ClientConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(base_url) = options.base_url.clone() {
        config.base_url = base_url;
    }

    let api = Arc::new(HttpDirectoryApi::new(config.clone()).map_err(|e| e.to_string())?);
    let health = api
        .health()
        .await
        .map_err(|e| format!("directory at {} is unreachable: {e}", config.base_url))?;
    if !health.is_healthy() {
        return Err(format!("directory reports status '{}'", health.status));
    }
    println!("connected to directory {} (version {})", config.base_url, health.version);

    let transport = Arc::new(WsTransport::from_config(&config).map_err(|e| e.to_string())?);
    let bus = Arc::new(EventBus::new());
    let (batch_tx, mut batches) = mpsc::unbounded_channel();
    let batcher = EventBatcher::start(bus.subscribe(), batch_tx);
    let directory = DirectoryController::start(&config, api, transport, bus);

    let outcome = watch(&directory, &options, &mut batches).await;

    directory.teardown().await;
    batcher.abort();
    outcome
}

async fn watch(
    directory: &DirectoryHandle,
    options: &Options,
    batches: &mut mpsc::UnboundedReceiver<Vec<profile_directory::BusEvent>>,
) -> Result<(), String> {
    sign_in(directory, options).await?;

    render(&directory.view(Route::Profiles));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopping");
                return Ok(());
            }
            batch = batches.recv() => match batch {
                Some(_) => render(&directory.view(Route::Profiles)),
                None => return Ok(()),
            },
        }
    }
}

async fn sign_in(directory: &DirectoryHandle, options: &Options) -> Result<(), String> {
    let (Some(email), Some(password)) = (options.email.clone(), options.password.clone()) else {
        return Ok(());
    };

    let session = if options.register {
        let display_name = options
            .display_name
            .clone()
            .ok_or_else(|| "--register requires --display-name".to_string())?;
        directory
            .register(RegisterRequest {
                email,
                password,
                display_name,
            })
            .await
    } else {
        directory.login(LoginRequest { email, password }).await
    }
    .map_err(|e| format!("sign-in failed: {e}"))?;
    println!("signed in as {} <{}>", session.profile.display_name, session.email);

    let update = UpdateProfileRequest {
        display_name: options
            .display_name
            .clone()
            .filter(|name| !options.register && *name != session.profile.display_name),
        bio: options.bio.clone(),
    };
    if !update.is_empty() {
        let profile = directory
            .update_profile(update)
            .await
            .map_err(|e| format!("profile update failed: {e}"))?;
        println!(
            "updated own profile: {} ({})",
            profile.display_name,
            profile.bio.as_deref().unwrap_or("no bio")
        );
    }
    Ok(())
}

fn render(view: &DirectoryView) {
    let who = view.signed_in_as.as_deref().unwrap_or("anonymous");
    println!();
    println!("== Profiles [{}] ({who}) ==", view.connection.label());
    if let Page::Profiles {
        loading,
        error,
        cards,
    } = &view.page
    {
        if let Some(error) = error {
            println!("  error: {error}");
        }
        if *loading {
            println!("  loading...");
        } else if cards.is_empty() {
            println!("  no profiles yet");
        }
        for card in cards {
            println!("  #{:<6} {:<24} {}", card.id.to_string(), card.display_name, card.updated);
            if let Some(bio) = &card.bio {
                println!("          {bio}");
            }
        }
    }
}

fn parse_args() -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--register" => options.register = true,
            "--base-url" => options.base_url = Some(value_for("--base-url")?),
            "--email" => options.email = Some(value_for("--email")?),
            "--password" => options.password = Some(value_for("--password")?),
            "--display-name" => options.display_name = Some(value_for("--display-name")?),
            "--bio" => options.bio = Some(value_for("--bio")?),
            other => return Err(format!("unknown argument '{other}'. Use --help for usage")),
        }
    }
    if options.email.is_some() != options.password.is_some() {
        return Err("--email and --password must be given together".to_string());
    }
    Ok(Some(options))
}

fn print_help() {
    println!(
        "profile-watch\n\n\
         Prints the live profile directory every time it changes.\n\n\
         Usage:\n  profile-watch [options]\n\n\
         Options:\n\
         \x20 --base-url <url>        Directory origin (default: PROFILE_DIRECTORY_BASE_URL or http://127.0.0.1:3000)\n\
         \x20 --email <email>         Sign in with this account\n\
         \x20 --password <password>   Password for --email\n\
         \x20 --register              Create the account instead of signing in\n\
         \x20 --display-name <name>   Display name (required with --register, otherwise updates it)\n\
         \x20 --bio <text>            Set own bio after signing in\n\
         \x20 -h, --help              Show this help"
    );
}
