//! Point d'entrée de TabShell.
//!
//! Usage :
//!   tabshell [ADRESSE] [--nested]
//!
//! Exemples :
//!   cargo run                              → un onglet sur chrome://new-tab
//!   cargo run -- rust-lang.org             → ajoute https:// automatiquement
//!   cargo run -- "rust borrow checker"     → recherche
//!   cargo run -- --nested                  → isolation à trois couches
//!
//! Les commandes sont lues sur l'entrée standard, une par ligne (`help`).

use std::env;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;

use tabshell::browser::Browser;
use tabshell::config::Config;
use tabshell::isolation::{ContentDescriptor, IsolationPreset};
use tabshell::tabs::TabId;

const HELP: &str = "\
commands:
  open [text]        open a tab (home page when empty)
  close <id>         close a tab
  go <text>          navigate the active tab
  nav <id> <text>    navigate a specific tab
  select <id>        activate a tab
  tabs               list tabs
  show               print the active tab's document
  bookmark           toggle a bookmark on the active tab
  bookmarks          list bookmarks
  history [query]    list history, newest first
  clear-history      clear history
  export [dir]       save an offline snapshot of the active tab
  quit";

fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // ── 2. Configuration + flags CLI ───────────────────────────────────
    let args: Vec<String> = env::args().skip(1).collect();
    let mut config = Config::load();
    if args.iter().any(|arg| arg == "--nested") {
        config.isolation.preset = IsolationPreset::Nested;
    }

    // ── 3. Session ─────────────────────────────────────────────────────
    let address = args.iter().find(|arg| !arg.starts_with("--"));
    let mut browser =
        Browser::with_initial(config, address.map(String::as_str)).persist_settings(true);
    print_tabs(&browser);

    // ── 4. Boucle de commandes ─────────────────────────────────────────
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match run_command(&mut browser, line.trim()) {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

fn run_command(browser: &mut Browser, line: &str) -> Result<ControlFlow<()>, Box<dyn Error>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "quit" | "exit" => return Ok(ControlFlow::Break(())),
        "help" => println!("{HELP}"),
        "open" => {
            let id = browser.open((!rest.is_empty()).then_some(rest));
            println!("opened tab {id}");
        }
        "close" => match browser.close(rest.parse()?) {
            Some(closed) => println!("closed tab {} ({})", closed.id, closed.display_name),
            None => println!("no such tab"),
        },
        "go" => {
            if !browser.navigate_active(rest) {
                println!("nothing to do");
            }
            print_active(browser);
        }
        "nav" => {
            let (id, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let id: TabId = id.parse()?;
            if !browser.navigate(id, text) {
                println!("nothing to do");
            }
        }
        "select" => {
            if !browser.select(rest.parse()?) {
                println!("no such tab");
            }
            print_active(browser);
        }
        "tabs" => print_tabs(browser),
        "show" => match browser.render_active() {
            Some(document) => println!("{document}"),
            None => println!("no active tab"),
        },
        "bookmark" => match browser.toggle_bookmark_active() {
            Some(true) => println!("bookmarked"),
            Some(false) => println!("bookmark removed"),
            None => println!("no active tab"),
        },
        "bookmarks" => {
            for entry in browser.bookmarks().entries() {
                println!("  {}  {}", entry.name, entry.destination);
            }
        }
        "history" => {
            for entry in browser.history().search(rest) {
                println!(
                    "  {}  {}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.display_name,
                    entry.destination
                );
            }
        }
        "clear-history" => {
            browser.clear_history();
            println!("history cleared");
        }
        "export" => {
            let dir = if rest.is_empty() { "." } else { rest };
            match browser.export_active() {
                Some(snapshot) => {
                    let path = snapshot.write_to(Path::new(dir))?;
                    println!("saved {}", path.display());
                }
                None => println!("no active tab"),
            }
        }
        other => println!("unknown command `{other}` (try `help`)"),
    }

    Ok(ControlFlow::Continue(()))
}

fn print_tabs(browser: &Browser) {
    for tab in browser.tabs().tabs() {
        let marker = if tab.is_active() { '*' } else { ' ' };
        println!(
            "{marker} [{}] {}  {}",
            tab.id(),
            tab.display_name(),
            tab.destination()
        );
    }
}

fn print_active(browser: &Browser) {
    let Some(tab) = browser.active() else {
        return;
    };
    let isolation = match tab.descriptor() {
        ContentDescriptor::Internal(_) => " (internal)".to_string(),
        ContentDescriptor::Isolated(content) if content.is_degraded() => {
            format!(" ({} layer, restricted)", content.layer_count())
        }
        ContentDescriptor::Isolated(content) => format!(
            " ({} layers, sandbox=\"{}\")",
            content.layer_count(),
            content.capabilities().sandbox_attribute()
        ),
    };
    println!("[{}] {}{isolation}", tab.id(), tab.display_name());
}
