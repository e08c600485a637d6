//! Defensive parsing of schema-less remote documents into [`Room`]s.
//!
//! The remote store enforces no schema and either client (or a person with
//! a console) may have written anything. Every read path goes through
//! [`sanitize_room`]: fields that fail to parse fall back to safe defaults,
//! and a document without a creator is treated as absent.

use serde_json::{Map, Value};
use tictactoe_rules::{Board, CELL_COUNT, Mark, Square};
use tracing::{debug, instrument};

use crate::room::{Room, RoomCode, RoomStatus};

/// Parses a raw document stored under `code`.
///
/// Returns `None` when the document is missing, not an object, or has no
/// creator id.
#[instrument(skip(raw), fields(code = %code))]
pub fn sanitize_room(code: &RoomCode, raw: &Value) -> Option<Room> {
    let Some(fields) = raw.as_object() else {
        debug!(kind = value_kind(raw), "Room document is not an object");
        return None;
    };

    let player_x = string_field(fields, "playerX");
    if player_x.is_empty() {
        debug!("Room document has no creator");
        return None;
    }
    let player_o = string_field(fields, "playerO");

    let status = fields
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<RoomStatus>().ok())
        .unwrap_or(if player_o.is_empty() {
            RoomStatus::Waiting
        } else {
            RoomStatus::Playing
        });

    Some(Room {
        code: code.clone(),
        board: board_field(fields.get("board")),
        turn: mark_field(fields, "turn").unwrap_or(Mark::X),
        player_x,
        player_o,
        player_x_name: string_field(fields, "playerXName"),
        player_o_name: string_field(fields, "playerOName"),
        is_public: fields.get("isPublic").and_then(Value::as_bool).unwrap_or(false),
        winner: mark_field(fields, "winner"),
        winning_line: line_field(fields.get("winningLine")),
        status,
        wins_x: count_field(fields.get("winsX")),
        wins_o: count_field(fields.get("winsO")),
    })
}

fn string_field(fields: &Map<String, Value>, name: &str) -> String {
    fields
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn mark_field(fields: &Map<String, Value>, name: &str) -> Option<Mark> {
    fields.get(name).and_then(Value::as_str).and_then(Mark::from_symbol)
}

fn square_value(value: &Value) -> Square {
    value
        .as_str()
        .and_then(Mark::from_symbol)
        .map(Square::Occupied)
        .unwrap_or(Square::Empty)
}

/// Accepts an array, or an object keyed by index strings (the remote store
/// returns sparse arrays that way). Anything unparseable is an empty cell.
fn board_field(value: Option<&Value>) -> Board {
    let mut squares = [Square::Empty; CELL_COUNT];
    match value {
        Some(Value::Array(items)) => {
            for (slot, item) in squares.iter_mut().zip(items) {
                *slot = square_value(item);
            }
        }
        Some(Value::Object(entries)) => {
            for (key, item) in entries {
                if let Ok(index) = key.parse::<usize>()
                    && index < CELL_COUNT
                {
                    squares[index] = square_value(item);
                }
            }
        }
        _ => {}
    }
    Board::from_squares(squares)
}

fn index_value(value: &Value) -> Option<usize> {
    let index = value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))?;
    usize::try_from(index).ok().filter(|i| *i < CELL_COUNT)
}

fn line_field(value: Option<&Value>) -> Vec<usize> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(index_value).take(3).collect(),
        _ => Vec::new(),
    }
}

fn count_field(value: Option<&Value>) -> u32 {
    value
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        })
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
