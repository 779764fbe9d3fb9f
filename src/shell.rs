//! Line-oriented front end
//!
//! Reads one command per line from stdin and prints results to stdout.
//! Logging goes to stderr.
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::{
    app::{AppState, Screen},
    error::{AppError, AppResult},
    models::{poster_url, MediaFilter, MediaType, WatchStatus},
    services::{session::validate_new_password, AddRequest, MutationOutcome},
};

const HELP: &str = "\
commands:
  signin <email> <password>
  signup <email> <password> <confirm>
  signout
  type <text>          set the search box (empty clears it)
  suggest              show current suggestions
  add [n]              add suggestion n, or the search box text
  view <all|movie|tv|anime>
  list <to_watch|watched>
  ls                   show the visible set
  toggle <n>           move item n to the other list
  rm <n>               delete item n
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String, confirmation: String },
    SignOut,
    Type(String),
    Suggest,
    Add(Option<usize>),
    View(MediaFilter),
    List(WatchStatus),
    Ls,
    Toggle(usize),
    Remove(usize),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match (name, args.as_slice()) {
            ("signin", [email, password]) => Command::SignIn {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("signup", [email, password, confirmation]) => Command::SignUp {
                email: email.to_string(),
                password: password.to_string(),
                confirmation: confirmation.to_string(),
            },
            ("signout", []) => Command::SignOut,
            // Keep the raw text; the search box sees surrounding spaces too
            ("type", _) => Command::Type(rest.to_string()),
            ("suggest", []) => Command::Suggest,
            ("add", []) => Command::Add(None),
            ("add", [n]) => Command::Add(Some(index(n)?)),
            ("view", [filter]) => Command::View(filter.parse()?),
            ("list", [status]) => Command::List(status.parse()?),
            ("ls", []) => Command::Ls,
            ("toggle", [n]) => Command::Toggle(index(n)?),
            ("rm", [n]) => Command::Remove(index(n)?),
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "Unrecognized command: {}",
                    line
                )))
            }
        };
        Ok(command)
    }
}

/// Parses a 1-based index as shown in listings
fn index(arg: &str) -> AppResult<usize> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(AppError::InvalidInput(format!("Not a list position: {}", arg))),
    }
}

/// Whether `command` is usable on `screen`
fn allowed(command: &Command, screen: Screen) -> bool {
    match command {
        Command::Help | Command::Quit => true,
        Command::SignIn { .. } | Command::SignUp { .. } => {
            matches!(screen, Screen::Login | Screen::Signup)
        }
        _ => screen == Screen::Home,
    }
}

/// Runs the read-eval loop until `quit` or end of input
pub async fn run(app: &AppState) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requested = Screen::Login;
    let mut session = app.session.subscribe();

    // Nothing is usable until the stored session has been resolved
    while !session.borrow_and_update().is_resolved() {
        println!("loading...");
        if session.changed().await.is_err() {
            anyhow::bail!("session manager stopped before resolving");
        }
    }

    println!("{}", HELP);
    loop {
        let screen = Screen::resolve(requested, &app.session.current());
        print_prompt(screen, app);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if !allowed(&command, screen) {
            println!("not available on the {:?} screen", screen);
            continue;
        }

        match command {
            Command::Quit => break,
            Command::SignUp { .. } => requested = Screen::Signup,
            Command::SignIn { .. } => requested = Screen::Login,
            _ => {}
        }
        execute(app, command).await;
    }

    app.search.shutdown();
    Ok(())
}

fn print_prompt(screen: Screen, app: &AppState) {
    let filter = app.collection.filter();
    match (screen, app.session.session()) {
        (Screen::Home, Some(session)) => {
            println!("[{} | {} | {}]", session.email, filter.status, filter.media_type)
        }
        (screen, _) => println!("[{:?}]", screen),
    }
}

async fn execute(app: &AppState, command: Command) {
    match command {
        Command::SignIn { email, password } => {
            match app.session.sign_in(&email, &password).await {
                Ok(session) => println!("signed in as {}", session.email),
                Err(e) if e.is_auth() => println!("{}", e),
                Err(e) => println!("sign-in unavailable: {}", e),
            }
        }
        Command::SignUp {
            email,
            password,
            confirmation,
        } => {
            let result = match validate_new_password(&password, &confirmation) {
                Ok(()) => app.session.sign_up(&email, &password).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(session) => println!("account created for {}", session.email),
                Err(e) if e.is_auth() => println!("{}", e),
                Err(AppError::InvalidInput(message)) => println!("{}", message),
                Err(e) => println!("sign-up unavailable: {}", e),
            }
        }
        Command::SignOut => {
            app.session.sign_out().await;
            println!("signed out");
        }
        Command::Type(text) => app.search.input(text),
        Command::Suggest => {
            let suggestions = app.search.suggestions();
            if suggestions.is_empty() {
                println!("no suggestions");
            }
            for (n, candidate) in suggestions.iter().enumerate() {
                let thumb = candidate.thumbnail_url(&app.image_base).unwrap_or_default();
                println!(
                    "{:>2}. {} ({}) {}",
                    n + 1,
                    candidate.title,
                    candidate.media_type,
                    thumb
                );
            }
        }
        Command::Add(position) => {
            let request = match position {
                Some(n) => match app.search.suggestions().into_iter().nth(n) {
                    Some(candidate) => AddRequest::Candidate(candidate),
                    None => {
                        println!("no suggestion {}", n + 1);
                        return;
                    }
                },
                None => AddRequest::Text(app.search.input_text()),
            };
            report(app.mutations.add_item(request).await);
        }
        Command::View(media_type) => app.collection.set_media_type(media_type).await,
        Command::List(status) => app.collection.set_status(status).await,
        Command::Ls => {
            let items = app.collection.items();
            if items.is_empty() {
                let kinds: Vec<&str> = MediaType::ALL.iter().map(|m| m.as_str()).collect();
                println!("nothing here (filters: all, {})", kinds.join(", "));
            }
            for (n, item) in items.iter().enumerate() {
                let poster =
                    poster_url(&app.image_base, "w500", item.poster_path.as_deref()).unwrap_or_default();
                println!(
                    "{:>2}. {} [{}] {}",
                    n + 1,
                    item.title,
                    item.media_type,
                    poster
                );
            }
        }
        Command::Toggle(n) => match visible_id(app, n) {
            Some(id) => report(app.mutations.toggle_status(id).await),
            None => println!("no item {}", n + 1),
        },
        Command::Remove(n) => match visible_id(app, n) {
            Some(id) => report(app.mutations.delete_item(id).await),
            None => println!("no item {}", n + 1),
        },
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn visible_id(app: &AppState, n: usize) -> Option<Uuid> {
    app.collection.items().get(n).map(|item| item.id)
}

fn report(outcome: MutationOutcome) {
    match outcome {
        MutationOutcome::Applied => println!("ok"),
        MutationOutcome::Skipped => println!("nothing to do"),
        MutationOutcome::Failed => println!("failed, see log"),
    }
}
