//! Line-oriented transport.
//!
//! This module drives the bot from stdin without any chat platform. It's
//! designed for local use, scripting and automated checks.

use invest_core::{Action, Input, Reply, Screen, SessionId, SimilarQuery, StoryBot};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct HeadlessOptions {
    pub session: SessionId,
    pub export_dir: PathBuf,
}

impl HeadlessOptions {
    pub fn from_args(args: &[String]) -> Self {
        let mut options = Self {
            session: SessionId::from("local"),
            export_dir: PathBuf::from("."),
        };

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--session" => {
                    if let Some(id) = args.get(i + 1) {
                        options.session = SessionId::from(id.as_str());
                        i += 1;
                    }
                }
                "--export-dir" => {
                    if let Some(dir) = args.get(i + 1) {
                        options.export_dir = PathBuf::from(dir);
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        options
    }
}

/// Run the bot against stdin.
///
/// Protocol:
/// - Plain lines are submitted as stories
/// - A bare number presses the button with that number
/// - `#<callback>` presses a button by its callback string (`#back`, `#db_page_1`)
/// - `#quit`, `#help`, `#health`, `#stats`, `#history`, `#similar <text>` are local commands
pub async fn run(bot: Arc<StoryBot>, options: HeadlessOptions) -> io::Result<()> {
    println!("=== INVEST story assistant ===");
    println!("Session: {}", options.session);
    print_commands();
    println!();

    let mut buttons = Vec::new();
    let reply = bot.handle(&options.session, Input::Action(Action::Restart)).await;
    if let Some(actions) = render(&reply, &options.export_dir).await {
        buttons = actions;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = if let Some(command) = line.strip_prefix('#') {
            let (name, rest) = command
                .split_once(char::is_whitespace)
                .map_or((command, ""), |(n, r)| (n, r.trim()));
            match name {
                "quit" | "exit" => {
                    println!("Goodbye!");
                    break;
                }
                "help" => {
                    print_commands();
                    continue;
                }
                "health" => {
                    if bot.judge_health().await {
                        println!("[HEALTH] judge reachable");
                    } else {
                        println!("[HEALTH] judge unreachable");
                    }
                    continue;
                }
                "stats" => {
                    println!("[STATS]");
                    println!("{}", serde_json::to_string_pretty(&bot.stats().await)?);
                    continue;
                }
                "history" => {
                    let history = bot.sessions().history(&options.session).await;
                    println!("[HISTORY]");
                    println!("{}", serde_json::to_string_pretty(&history)?);
                    continue;
                }
                "similar" => {
                    if rest.is_empty() {
                        println!("[ERROR] Usage: #similar <story>");
                        continue;
                    }
                    let query = SimilarQuery::new(rest, bot.config().thresholds.low);
                    match bot.retrieval().find(&query).await {
                        Ok(matches) => {
                            println!("[SIMILAR]");
                            println!("{}", serde_json::to_string_pretty(&matches)?);
                        }
                        Err(e) => println!("[ERROR] Search failed: {e}"),
                    }
                    continue;
                }
                callback => match callback.parse::<Action>() {
                    Ok(action) => Input::Action(action),
                    Err(_) => {
                        println!("[ERROR] Unknown command. Type #help for help.");
                        continue;
                    }
                },
            }
        } else if let Ok(n) = line.parse::<usize>() {
            match n.checked_sub(1).and_then(|i| buttons.get(i)) {
                Some(action) => Input::Action(*action),
                None => {
                    println!("[ERROR] No button {n}");
                    continue;
                }
            }
        } else {
            Input::from(line)
        };

        println!("[PROCESSING]");
        let reply = bot.handle(&options.session, input).await;
        if let Some(actions) = render(&reply, &options.export_dir).await {
            buttons = actions;
        }
    }

    Ok(())
}

fn print_commands() {
    println!("Commands:");
    println!("  <text>           - Submit a user story");
    println!("  <number>         - Press a button");
    println!("  #<callback>      - Press a button by callback (#back, #restart, #db_page_0, ...)");
    println!("  #similar <text>  - Show corpus matches as JSON");
    println!("  #history         - Show your past analyses");
    println!("  #stats           - Show bot statistics");
    println!("  #health          - Check the judge connection");
    println!("  #quit            - Exit");
}

/// Print a reply. Returns the buttons now on screen, if they changed.
async fn render(reply: &Reply, export_dir: &Path) -> Option<Vec<Action>> {
    match reply {
        Reply::Unchanged => {
            println!("[UNCHANGED]");
            None
        }
        Reply::Document { file, screen } => {
            let path = export_dir.join(&file.file_name);
            match tokio::fs::write(&path, &file.content).await {
                Ok(()) => println!("[FILE] {} ({})", path.display(), file.format.mime_type()),
                Err(e) => println!("[ERROR] Could not write {}: {e}", path.display()),
            }
            Some(print_screen(screen))
        }
        Reply::Screen(screen) => Some(print_screen(screen)),
    }
}

fn print_screen(screen: &Screen) -> Vec<Action> {
    println!("[{}]", screen.label.to_uppercase());
    for para in screen.text.split("\n\n") {
        println!("{para}");
        println!();
    }
    for (i, item) in screen.menu.items().iter().enumerate() {
        println!("  {}. {}  (#{})", i + 1, item.label, item.action);
    }
    println!();
    screen.menu.items().iter().map(|item| item.action).collect()
}
