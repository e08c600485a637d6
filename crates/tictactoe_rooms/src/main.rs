//! tictactoe_rooms - terminal client
//!
//! Hosts, joins, lists and watches rooms in a shared realtime database.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command as CliCommand};
use tictactoe_rooms::{
    Command, Mark, Phase, Position, Room, RoomClient, RoomCode, RoomStatus, RoomsConfig,
    SessionUpdate, StartRule, SyncEvent, SyncLoop,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tictactoe_rooms=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RoomsConfig::load(&cli.config).context("Failed to load configuration")?;
    let store = config.open_store().context("Failed to open room store")?;
    let player_id = cli
        .player_id
        .clone()
        .unwrap_or_else(|| format!("p-{:08x}", rand::random::<u32>()));
    info!(player_id = %player_id, name = %cli.name, "Starting client");

    let manager = config.manager(store.clone());
    let mut client = RoomClient::new(manager, &player_id, &cli.name, config.sync_interval());

    match cli.command {
        CliCommand::Host { public } => {
            let room = client.host(public).await?;
            println!("Room {} is open. Share the code with your opponent.", room.code);
            play(client).await
        }
        CliCommand::Join { code } => {
            client.join(&code).await?;
            play(client).await
        }
        CliCommand::List { filter } => {
            let rooms = client.list_public(filter.as_deref()).await?;
            if rooms.is_empty() {
                println!("No public rooms.");
            }
            for room in rooms {
                println!("{}  {:<16} {}", room.code, room.player_x_name, room.status);
            }
            Ok(())
        }
        CliCommand::Watch { code } => {
            let code = RoomCode::parse(&code)?;
            watch(store, code, config.sync_interval()).await
        }
    }
}

/// Interactive game loop: sync updates and stdin commands, one line each.
#[instrument(skip(client))]
async fn play(mut client: RoomClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();
    render(&client);

    loop {
        tokio::select! {
            update = client.next_update() => {
                let Some(update) = update else {
                    println!("Disconnected from room.");
                    return Ok(());
                };
                if report(&update) {
                    render(&client);
                }
                if client.session().phase() == Phase::Menu {
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    submit(&mut client, Command::Leave).await;
                    return Ok(());
                };
                let Some(command) = parse_command(&line) else {
                    print_help();
                    continue;
                };
                submit(&mut client, command).await;
                render(&client);
                if client.session().phase() == Phase::Menu {
                    return Ok(());
                }
            }
        }
    }
}

async fn submit(client: &mut RoomClient, command: Command) {
    match client.submit(command).await {
        Ok(update) => {
            report(&update);
        }
        Err(e) => {
            warn!(error = %e, "Command failed");
            println!("! {}", e.message());
        }
    }
}

/// Prints what changed. Returns false when nothing worth redrawing happened.
fn report(update: &SessionUpdate) -> bool {
    match update {
        SessionUpdate::Refreshed | SessionUpdate::Ignored => false,
        SessionUpdate::OpponentJoined { name } => {
            println!("{} joined.", name);
            true
        }
        SessionUpdate::GameFinished { winner: Some(mark) } => {
            println!("{} wins!", mark);
            true
        }
        SessionUpdate::GameFinished { winner: None } => {
            println!("Draw.");
            true
        }
        SessionUpdate::Restarted { turn } => {
            println!("New round, {} to move.", turn);
            true
        }
        SessionUpdate::OpponentLeft => {
            println!("Your opponent left. Waiting for someone new.");
            true
        }
        SessionUpdate::RoomClosed => {
            println!("The room is closed.");
            false
        }
        SessionUpdate::Unavailable(reason) => {
            println!("(store unavailable: {})", reason);
            false
        }
    }
}

fn render(client: &RoomClient) {
    let session = client.session();
    let (Some(room), Some(seat)) = (session.room(), session.seat()) else {
        return;
    };
    println!();
    println!("{}", room.board.display());
    println!("{}", status_line(room, *seat.mark(), session.is_my_turn()));
}

fn status_line(room: &Room, mine: Mark, my_turn: bool) -> String {
    let score = format!(
        "{} {} - {} {}",
        room.player_x_name, room.wins_x, room.wins_o, room.player_o_name
    );
    let state = match room.status {
        RoomStatus::Waiting => format!("Room {}: waiting for an opponent", room.code),
        RoomStatus::Playing if my_turn => format!("You are {}. Your move.", mine),
        RoomStatus::Playing => format!("You are {}. Waiting for {}.", mine, room.turn),
        RoomStatus::Finished => "Round over. Type 'r' to play again.".to_string(),
    };
    format!("{}  [{}]", state, score)
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_lowercase();
    match head.as_str() {
        "q" | "quit" | "leave" => Some(Command::Leave),
        "r" | "restart" => {
            let rule = match words.next() {
                Some(word) => word.parse::<StartRule>().ok()?,
                None => StartRule::default(),
            };
            Some(Command::Restart(rule))
        }
        _ => Position::from_label_or_number(line).map(|pos| Command::Move(pos.to_index())),
    }
}

fn print_help() {
    println!("Commands: 0-8 or a cell name (e.g. 'center') to move, 'r [winner|random]' to restart, 'q' to leave.");
}

/// Prints every poll of `code` until the room is gone or Ctrl-C.
#[instrument(skip(store))]
async fn watch(store: tictactoe_rooms::RoomStore, code: RoomCode, interval: std::time::Duration) -> Result<()> {
    let mut handle = SyncLoop::spawn(store, code, interval);
    let mut last: Option<Room> = None;
    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(SyncEvent::RoomStateChanged(room)) => {
                    if last.as_ref() != Some(&room) {
                        println!();
                        println!("{}", room.board.display());
                        println!("{}  ({} to move)", room.status, room.turn);
                        last = Some(room);
                    }
                }
                Some(SyncEvent::RoomGone(code)) => {
                    println!("Room {} is gone.", code);
                    return Ok(());
                }
                Some(SyncEvent::Unavailable { reason, .. }) => {
                    println!("(store unavailable: {})", reason);
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                handle.stop();
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("4"), Some(Command::Move(4)));
        assert_eq!(parse_command("center"), Some(Command::Move(4)));
        assert_eq!(parse_command("q"), Some(Command::Leave));
        assert_eq!(parse_command("r"), Some(Command::Restart(StartRule::WinnerStarts)));
        assert_eq!(parse_command("restart random"), Some(Command::Restart(StartRule::Random)));
        assert_eq!(parse_command("r sideways"), None);
        assert_eq!(parse_command(""), None);
    }
}
