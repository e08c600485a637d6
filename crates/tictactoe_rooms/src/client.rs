//! Async glue between a [`Session`], the [`RoomManager`] and a sync loop.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::RoomError;
use crate::lifecycle::RoomManager;
use crate::room::{Room, RoomCode};
use crate::session::{Command, Mutation, Session, SessionUpdate};
use crate::sync::{SyncHandle, SyncLoop};

/// One participant's connection to the room protocol.
#[derive(Debug)]
pub struct RoomClient {
    manager: RoomManager,
    session: Session,
    sync: Option<SyncHandle>,
    sync_interval: Duration,
}

impl RoomClient {
    /// Creates a client on the menu.
    #[instrument(skip(manager, player_name))]
    pub fn new(
        manager: RoomManager,
        player_id: &str,
        player_name: &str,
        sync_interval: Duration,
    ) -> Self {
        Self {
            manager,
            session: Session::new(player_id, player_name),
            sync: None,
            sync_interval,
        }
    }

    /// Local session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Opens a room under a fresh code and starts polling it.
    #[instrument(skip(self), fields(player_id = %self.session.player_id()))]
    pub async fn host(&mut self, is_public: bool) -> Result<Room, RoomError> {
        self.ensure_on_menu()?;
        let room = self
            .manager
            .create_with_fresh_code(self.session.player_id(), self.session.player_name(), is_public)
            .await?;
        self.sit_down(room.clone())?;
        Ok(room)
    }

    /// Joins the room under a user-typed code and starts polling it.
    #[instrument(skip(self), fields(player_id = %self.session.player_id()))]
    pub async fn join(&mut self, code: &str) -> Result<Room, RoomError> {
        self.ensure_on_menu()?;
        let code = RoomCode::parse(code)?;
        let room = self
            .manager
            .join(&code, self.session.player_id(), self.session.player_name())
            .await?;
        self.sit_down(room.clone())?;
        Ok(room)
    }

    /// Public rooms whose code or host name contains `filter`
    /// (case-insensitive).
    #[instrument(skip(self))]
    pub async fn list_public(&self, filter: Option<&str>) -> Result<Vec<Room>, RoomError> {
        let rooms = self.manager.list_public().await?;
        let Some(filter) = filter.map(str::to_lowercase).filter(|f| !f.is_empty()) else {
            return Ok(rooms);
        };
        Ok(rooms
            .into_iter()
            .filter(|room| {
                room.code.as_str().to_lowercase().contains(&filter)
                    || room.player_x_name.to_lowercase().contains(&filter)
            })
            .collect())
    }

    /// Validates and executes a local command.
    ///
    /// # Errors
    ///
    /// Local rejections surface as [`RoomErrorKind::InvalidMove`]; store
    /// failures are returned after the session has recorded them.
    ///
    /// [`RoomErrorKind::InvalidMove`]: crate::error::RoomErrorKind::InvalidMove
    #[instrument(skip(self))]
    pub async fn submit(&mut self, command: Command) -> Result<SessionUpdate, RoomError> {
        let mutation = self.session.request(command).map_err(|rejection| {
            debug!(%rejection, "Command rejected locally");
            RoomError::from(rejection)
        })?;

        match mutation {
            Mutation::Move { room, mover, index } => {
                let result = self.manager.make_move(&room, mover, index).await;
                self.finish(&room.code, result)
            }
            Mutation::Restart {
                code,
                rule,
                prev_winner,
            } => {
                let result = self.manager.restart(&code, rule, prev_winner).await;
                self.finish(&code, result)
            }
            Mutation::Leave { code, is_host } => {
                self.stop_sync();
                self.manager
                    .leave(&code, self.session.player_id(), is_host)
                    .await?;
                info!(code = %code, "Left room");
                Ok(SessionUpdate::RoomClosed)
            }
        }
    }

    /// Waits for the next sync event and folds it into the session.
    ///
    /// `None` when not polling any room.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let handle = self.sync.as_mut()?;
        let Some(event) = handle.recv().await else {
            debug!("Sync loop ended");
            self.sync = None;
            return None;
        };
        let update = self.session.apply(event);
        if self.session.seat().is_none() {
            self.stop_sync();
        }
        Some(update)
    }

    fn ensure_on_menu(&self) -> Result<(), RoomError> {
        match self.session.seat() {
            Some(seat) => Err(RoomError::invalid_move(format!(
                "already seated in room {}",
                seat.code()
            ))),
            None => Ok(()),
        }
    }

    fn sit_down(&mut self, room: Room) -> Result<(), RoomError> {
        let code = self.session.enter(room)?.code().clone();
        self.stop_sync();
        self.sync = Some(SyncLoop::spawn(
            self.manager.store().clone(),
            code,
            self.sync_interval,
        ));
        Ok(())
    }

    fn finish(
        &mut self,
        code: &RoomCode,
        result: Result<Room, RoomError>,
    ) -> Result<SessionUpdate, RoomError> {
        let update = self.session.complete(code, &result);
        if self.session.seat().is_none() {
            self.stop_sync();
        }
        match result {
            Ok(_) => Ok(update),
            Err(e) => {
                warn!(error = %e, "Mutation failed");
                Err(e)
            }
        }
    }

    fn stop_sync(&mut self) {
        if let Some(handle) = self.sync.take() {
            handle.stop();
        }
    }
}

impl Drop for RoomClient {
    fn drop(&mut self) {
        self.stop_sync();
    }
}
