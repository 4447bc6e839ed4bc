use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use laliga_scout::config::Config;
use laliga_scout::service::ScoutService;
use laliga_scout::state::{PlayerFilter, ValueTier};

const USAGE: &str = "usage: laliga_scout <command> [args]

commands:
  players [--search S] [--club C] [--position P] [--nationality N] [--tier elite|high|medium|low] [--favorites]
  refresh
  favorite <player_id> [--list ID]
  comment <player_id> <text>
  lists
  list-create <name> [--description D]
  list-update <list_id> [--name N] [--description D]
  list-delete <list_id>
  list-add <list_id> <player_id>
  list-remove <list_id> <player_id>";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let config = Config::from_env();
    let service = ScoutService::from_config(&config);
    let rest = &args[1..];

    match command.as_str() {
        "players" => {
            let filter = parse_filter(rest)?;
            print_json(&service.annotated_players(&filter)?)
        }
        "refresh" => {
            let count = service.force_refresh()?;
            print_json(&json!({ "success": true, "count": count }))
        }
        "favorite" => {
            let player_id = positional(rest, 0, "player_id")?;
            let list_id = flag_value(rest, "--list");
            let favorite = service.toggle_favorite(player_id, list_id.as_deref())?;
            print_json(&json!({
                "success": true,
                "favorite": favorite,
                "list_id": list_id.as_deref().unwrap_or("default"),
            }))
        }
        "comment" => {
            let player_id = positional(rest, 0, "player_id")?;
            let text = positional(rest, 1, "text")?;
            let comments = service.add_comment(player_id, text)?;
            print_json(&json!({ "success": true, "comments": comments }))
        }
        "lists" => print_json(&json!({ "success": true, "lists": service.favorite_lists()? })),
        "list-create" => {
            let name = positional(rest, 0, "name")?;
            let description = flag_value(rest, "--description");
            let list_id = service.create_list(name, description.as_deref())?;
            print_json(&json!({ "success": true, "list_id": list_id }))
        }
        "list-update" => {
            let list_id = positional(rest, 0, "list_id")?;
            let name = flag_value(rest, "--name");
            let description = flag_value(rest, "--description");
            let list = service.update_list(list_id, name.as_deref(), description.as_deref())?;
            print_json(&json!({ "success": true, "list": list }))
        }
        "list-delete" => {
            let list_id = positional(rest, 0, "list_id")?;
            service.delete_list(list_id)?;
            print_json(&json!({ "success": true }))
        }
        "list-add" => {
            let list_id = positional(rest, 0, "list_id")?;
            let player_id = positional(rest, 1, "player_id")?;
            let players = service.add_player_to_list(list_id, player_id)?;
            print_json(&json!({ "success": true, "players": players }))
        }
        "list-remove" => {
            let list_id = positional(rest, 0, "list_id")?;
            let player_id = positional(rest, 1, "player_id")?;
            let players = service.remove_player_from_list(list_id, player_id)?;
            print_json(&json!({ "success": true, "players": players }))
        }
        other => Err(anyhow!("unknown command {other:?}\n\n{USAGE}")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{out}");
    Ok(())
}

fn parse_filter(args: &[String]) -> Result<PlayerFilter> {
    let tier = match flag_value(args, "--tier") {
        Some(raw) => Some(ValueTier::parse(&raw).ok_or_else(|| anyhow!("unknown tier {raw:?}"))?),
        None => None,
    };
    Ok(PlayerFilter {
        search: flag_value(args, "--search"),
        club: flag_value(args, "--club"),
        position: flag_value(args, "--position"),
        nationality: flag_value(args, "--nationality"),
        tier,
        favorites_only: args.iter().any(|a| a == "--favorites"),
    })
}

/// Accepts both `--flag value` and `--flag=value`. An explicit empty value
/// (`--flag=`) is returned as `Some("")`.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
        {
            return Some(next.clone());
        }
    }
    None
}

/// Nth argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &'a [String], n: usize, name: &str) -> Result<&'a str> {
    let mut skip_next = false;
    let mut seen = 0;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=') && arg != "--favorites";
            continue;
        }
        if seen == n {
            return Ok(arg.as_str());
        }
        seen += 1;
    }
    Err(anyhow!("missing argument <{name}>\n\n{USAGE}"))
}
