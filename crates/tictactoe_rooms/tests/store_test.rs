//! Store adapter read paths, transactions and listing.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tictactoe_rooms::{
    CasOutcome, Mark, MemoryBackend, Room, RoomBackend, RoomCode, RoomError, RoomErrorKind,
    RoomPatch, RoomStatus, RoomStore, Version, Versioned,
};
use tictactoe_rules::Square;

fn code(s: &str) -> RoomCode {
    RoomCode::parse(s).unwrap()
}

fn room(code_str: &str, is_public: bool) -> Room {
    Room::new_waiting(code(code_str), "p1".into(), format!("Host {}", code_str), is_public)
}

/// Every conditional write loses.
#[derive(Debug)]
struct ContestedBackend(MemoryBackend);

#[async_trait]
impl RoomBackend for ContestedBackend {
    async fn fetch(&self, key: &str) -> Result<Versioned<Value>, RoomError> {
        self.0.fetch(key).await
    }

    async fn fetch_all(&self) -> Result<Map<String, Value>, RoomError> {
        self.0.fetch_all().await
    }

    async fn put(&self, key: &str, document: Value) -> Result<(), RoomError> {
        self.0.put(key, document).await
    }

    async fn put_if_version(
        &self,
        _key: &str,
        _document: Value,
        _expected: &Version,
    ) -> Result<CasOutcome, RoomError> {
        Ok(CasOutcome::Conflict)
    }

    async fn patch(&self, key: &str, fields: Map<String, Value>) -> Result<(), RoomError> {
        self.0.patch(key, fields).await
    }

    async fn delete(&self, key: &str) -> Result<(), RoomError> {
        self.0.delete(key).await
    }
}

#[tokio::test]
async fn test_mixed_board_is_sanitized() {
    let (store, backend) = RoomStore::in_memory();
    backend
        .insert_raw(
            "AB3D",
            json!({
                "playerX": "p1",
                "playerO": "p2",
                "board": ["X", 7, "O", null, "x", " ", true, "O"],
                "turn": "O",
                "status": "playing",
                "winsX": -2,
                "winsO": 3.0,
            }),
        )
        .unwrap();

    let room = store.get(&code("AB3D")).await.unwrap();
    let squares = room.board.squares();
    assert_eq!(squares.len(), 9);
    assert_eq!(squares[0], Square::Occupied(Mark::X));
    assert_eq!(squares[2], Square::Occupied(Mark::O));
    assert_eq!(squares[7], Square::Occupied(Mark::O));
    for index in [1, 3, 4, 5, 6, 8] {
        assert_eq!(squares[index], Square::Empty, "cell {}", index);
    }
    assert_eq!(room.turn, Mark::O);
    assert_eq!(room.player_x_name, "");
    assert_eq!(room.wins_x, 0);
    assert_eq!(room.wins_o, 3);
}

#[tokio::test]
async fn test_sparse_board_object_is_accepted() {
    let (store, backend) = RoomStore::in_memory();
    backend
        .insert_raw(
            "AB3D",
            json!({"playerX": "p1", "board": {"0": "X", "8": "O", "12": "X"}}),
        )
        .unwrap();

    let room = store.get(&code("AB3D")).await.unwrap();
    assert_eq!(room.board.get(0), Some(Square::Occupied(Mark::X)));
    assert_eq!(room.board.get(8), Some(Square::Occupied(Mark::O)));
    assert_eq!(room.board.empty_count(), 7);
    assert_eq!(room.status, RoomStatus::Waiting);
}

#[tokio::test]
async fn test_missing_creator_is_not_found() {
    let (store, backend) = RoomStore::in_memory();
    backend
        .insert_raw("AB3D", json!({"playerX": "", "status": "playing"}))
        .unwrap();

    let err = store.get(&code("AB3D")).await.unwrap_err();
    assert!(matches!(err.kind(), RoomErrorKind::RoomNotFound(_)));
    assert!(store.try_get(&code("AB3D")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_then_get() {
    let (store, _backend) = RoomStore::in_memory();
    let original = room("AB3D", true);
    store.set(&original).await.unwrap();
    assert_eq!(store.get(&code("AB3D")).await.unwrap(), original);
}

#[tokio::test]
async fn test_update_fields_leaves_other_fields() {
    let (store, backend) = RoomStore::in_memory();
    let mut original = room("AB3D", true);
    original.player_o = "p2".into();
    original.player_o_name = "Bob".into();
    original.status = RoomStatus::Playing;
    original.wins_x = 4;
    store.set(&original).await.unwrap();

    store
        .update_fields(&code("AB3D"), &RoomPatch::vacate_second_seat())
        .await
        .unwrap();

    let raw = backend.raw("AB3D").unwrap().unwrap();
    assert_eq!(raw["playerO"], "");
    assert_eq!(raw["playerOName"], "");
    assert_eq!(raw["status"], "waiting");
    assert_eq!(raw["winsX"], 4);
    assert_eq!(raw["playerX"], "p1");
}

#[tokio::test]
async fn test_transact_aborts_without_writing() {
    let (store, backend) = RoomStore::in_memory();
    store.set(&room("AB3D", false)).await.unwrap();
    let before = backend.raw("AB3D").unwrap();

    let err = store
        .transact(&code("AB3D"), |_| Err(RoomError::invalid_move("nope")))
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), RoomErrorKind::InvalidMove(_)));
    assert_eq!(backend.raw("AB3D").unwrap(), before);
}

#[tokio::test]
async fn test_transact_gives_up_after_max_attempts() {
    let memory = MemoryBackend::new();
    let store = RoomStore::new(Arc::new(ContestedBackend(memory.clone())), 3);
    store.set(&room("AB3D", false)).await.unwrap();

    let mut calls = 0;
    let err = store
        .transact(&code("AB3D"), |mut room| {
            calls += 1;
            room.is_public = true;
            Ok(room)
        })
        .await
        .unwrap_err();

    assert_eq!(calls, 3);
    assert!(err.is_transient());
    assert!(matches!(
        err.kind(),
        RoomErrorKind::TransactionConflict { attempts: 3, .. }
    ));
}

#[tokio::test]
async fn test_list_public_filters_and_sorts() {
    let (store, backend) = RoomStore::in_memory();
    store.set(&room("ZZ22", true)).await.unwrap();
    store.set(&room("AB3D", true)).await.unwrap();
    store.set(&room("KM7P", false)).await.unwrap();
    backend
        .insert_raw("QQQQ", json!({"playerX": "", "isPublic": true}))
        .unwrap();
    backend
        .insert_raw("not-a-code", json!({"playerX": "p9", "isPublic": true}))
        .unwrap();

    let rooms = store.list_public().await.unwrap();
    let codes: Vec<&str> = rooms.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["AB3D", "ZZ22"]);
    assert!(rooms.iter().all(|r| r.is_public));
}

#[tokio::test]
async fn test_unavailable_is_transient() {
    let (store, backend) = RoomStore::in_memory();
    backend.set_unavailable(true).unwrap();
    let err = store.get(&code("AB3D")).await.unwrap_err();
    assert!(matches!(err.kind(), RoomErrorKind::StoreUnavailable(_)));
    assert!(err.is_transient());
}
