//! PostgreSQL sessions over tokio-postgres.
//!
//! Every session is its own connection. The connection driver runs on a
//! spawned task that is aborted when the session is dropped, so releasing a
//! scoped session closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{
    Booking, BookingId, BookingPatch, BookingReceipt, CancellationReceipt, ConnectionString,
    Endpoint, Lobby, LobbyId, NewBooking, NewLobby, NewTrain, StorageError, Train, TrainId,
    TrainPatch,
};
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};

use super::{not_found, Connector, DbSession, SCHEMA};

// ============================================================================
// CONNECTOR
// ============================================================================

/// Credentials and limits applied to every connection.
///
/// URL connection strings may carry their own user and database; these values
/// fill in whatever the string leaves out.
#[derive(Debug, Clone)]
pub struct PgConnectorConfig {
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub connect_timeout: Duration,
}

impl Default for PgConnectorConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "trains".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

pub struct PgConnector {
    config: PgConnectorConfig,
}

impl PgConnector {
    pub fn new(config: PgConnectorConfig) -> Self {
        Self { config }
    }

    /// Build the driver configuration for `target`.
    pub fn pg_config(&self, target: &ConnectionString) -> Result<tokio_postgres::Config, StorageError> {
        let mut config = if target.is_url() {
            target
                .as_str()
                .parse::<tokio_postgres::Config>()
                .map_err(|e| StorageError::Backend {
                    reason: format!("invalid connection string: {}", e),
                })?
        } else {
            let endpoint = target.endpoint();
            let mut config = tokio_postgres::Config::new();
            config.host(&endpoint.host).port(endpoint.port);
            config
        };

        if config.get_user().is_none() {
            config.user(&self.config.user);
        }
        if config.get_dbname().is_none() {
            config.dbname(&self.config.dbname);
        }
        if config.get_password().is_none() && !self.config.password.is_empty() {
            config.password(&self.config.password);
        }
        config.connect_timeout(self.config.connect_timeout);
        Ok(config)
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, target: &ConnectionString) -> Result<Box<dyn DbSession>, StorageError> {
        let endpoint = target.endpoint().clone();
        let config = self.pg_config(target)?;

        let (client, connection) =
            config
                .connect(NoTls)
                .await
                .map_err(|e| StorageError::Unreachable {
                    target: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

        let driver_endpoint = endpoint.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(endpoint = %driver_endpoint, error = %e, "Database connection closed with error");
            }
        });

        Ok(Box::new(PgSession {
            client,
            driver,
            endpoint,
        }))
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
    endpoint: Endpoint,
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Sort a driver error into the storage taxonomy.
fn classify(endpoint: &Endpoint, entity: &'static str, err: tokio_postgres::Error) -> StorageError {
    if let Some(db) = err.as_db_error() {
        let code = db.code();
        if *code == SqlState::UNIQUE_VIOLATION
            || *code == SqlState::CHECK_VIOLATION
            || *code == SqlState::FOREIGN_KEY_VIOLATION
        {
            return StorageError::Conflict {
                entity,
                reason: db.message().to_string(),
            };
        }
        return StorageError::Backend {
            reason: format!("{}: {}", code.code(), db.message()),
        };
    }
    if err.is_closed() {
        return StorageError::Unreachable {
            target: endpoint.to_string(),
            reason: err.to_string(),
        };
    }
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn train_from_row(row: &Row) -> Result<Train, tokio_postgres::Error> {
    Ok(Train {
        id: row.try_get("id")?,
        route: row.try_get("route")?,
        departure_time: row.try_get("departure_time")?,
        arrival_time: row.try_get("arrival_time")?,
        available_seats: row.try_get("available_seats")?,
    })
}

fn booking_from_row(row: &Row) -> Result<Booking, tokio_postgres::Error> {
    Ok(Booking {
        id: row.try_get("id")?,
        train_id: row.try_get("train_id")?,
        user_credentials: row.try_get("user_credentials")?,
    })
}

fn lobby_from_row(row: &Row) -> Result<Lobby, tokio_postgres::Error> {
    Ok(Lobby {
        id: row.try_get("id")?,
        train_id: row.try_get("train_id")?,
        status: row.try_get("status")?,
    })
}

const TRAIN_COLUMNS: &str = "id, route, departure_time, arrival_time, available_seats";

#[async_trait]
impl DbSession for PgSession {
    async fn ensure_schema(&mut self) -> Result<(), StorageError> {
        self.client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| classify(&self.endpoint, "schema", e))
    }

    async fn list_trains(&mut self) -> Result<Vec<Train>, StorageError> {
        let fail = |e| classify(&self.endpoint, "train", e);
        let rows = self
            .client
            .query(&format!("SELECT {} FROM trains ORDER BY id", TRAIN_COLUMNS), &[])
            .await
            .map_err(fail)?;
        rows.iter().map(|row| train_from_row(row).map_err(fail)).collect()
    }

    async fn get_train(&mut self, id: TrainId) -> Result<Train, StorageError> {
        let fail = |e| classify(&self.endpoint, "train", e);
        let row = self
            .client
            .query_opt(&format!("SELECT {} FROM trains WHERE id = $1", TRAIN_COLUMNS), &[&id])
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("train", id))?;
        train_from_row(&row).map_err(fail)
    }

    async fn insert_train(&mut self, new: &NewTrain) -> Result<Train, StorageError> {
        let fail = |e| classify(&self.endpoint, "train", e);
        let row = self
            .client
            .query_one(
                &format!(
                    "INSERT INTO trains (route, departure_time, arrival_time, available_seats) \
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    TRAIN_COLUMNS
                ),
                &[
                    &new.route,
                    &new.departure_time,
                    &new.arrival_time,
                    &new.available_seats,
                ],
            )
            .await
            .map_err(fail)?;
        train_from_row(&row).map_err(fail)
    }

    async fn update_train(
        &mut self,
        id: TrainId,
        patch: &TrainPatch,
    ) -> Result<(Train, Train), StorageError> {
        let endpoint = self.endpoint.clone();
        let fail = |e| classify(&endpoint, "train", e);
        let tx = self.client.transaction().await.map_err(fail)?;

        let row = tx
            .query_opt(
                &format!("SELECT {} FROM trains WHERE id = $1 FOR UPDATE", TRAIN_COLUMNS),
                &[&id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("train", id))?;
        let before = train_from_row(&row).map_err(fail)?;

        let mut after = before.clone();
        patch.apply(&mut after);
        tx.execute(
            "UPDATE trains SET route = $2, departure_time = $3, arrival_time = $4, \
             available_seats = $5 WHERE id = $1",
            &[
                &id,
                &after.route,
                &after.departure_time,
                &after.arrival_time,
                &after.available_seats,
            ],
        )
        .await
        .map_err(fail)?;

        tx.commit().await.map_err(fail)?;
        Ok((before, after))
    }

    async fn delete_train(&mut self, id: TrainId) -> Result<Train, StorageError> {
        let fail = |e| classify(&self.endpoint, "train", e);
        let row = self
            .client
            .query_opt(
                &format!("DELETE FROM trains WHERE id = $1 RETURNING {}", TRAIN_COLUMNS),
                &[&id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("train", id))?;
        train_from_row(&row).map_err(fail)
    }

    async fn list_bookings(&mut self) -> Result<Vec<Booking>, StorageError> {
        let fail = |e| classify(&self.endpoint, "booking", e);
        let rows = self
            .client
            .query("SELECT id, train_id, user_credentials FROM bookings ORDER BY id", &[])
            .await
            .map_err(fail)?;
        rows.iter().map(|row| booking_from_row(row).map_err(fail)).collect()
    }

    async fn get_booking(&mut self, id: BookingId) -> Result<Booking, StorageError> {
        let fail = |e| classify(&self.endpoint, "booking", e);
        let row = self
            .client
            .query_opt(
                "SELECT id, train_id, user_credentials FROM bookings WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("booking", id))?;
        booking_from_row(&row).map_err(fail)
    }

    async fn book_seat(&mut self, new: &NewBooking) -> Result<BookingReceipt, StorageError> {
        let endpoint = self.endpoint.clone();
        let fail = |e| classify(&endpoint, "booking", e);
        let tx = self.client.transaction().await.map_err(fail)?;

        let seats: i32 = tx
            .query_opt(
                "SELECT available_seats FROM trains WHERE id = $1 FOR UPDATE",
                &[&new.train_id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("train", new.train_id))?
            .try_get(0)
            .map_err(fail)?;

        let existing = tx
            .query_opt(
                "SELECT id FROM bookings WHERE train_id = $1 AND user_credentials = $2",
                &[&new.train_id, &new.user_credentials],
            )
            .await
            .map_err(fail)?;
        if existing.is_some() {
            return Err(StorageError::Conflict {
                entity: "booking",
                reason: format!(
                    "{} already holds a booking on train {}",
                    new.user_credentials, new.train_id
                ),
            });
        }
        if seats <= 0 {
            return Err(StorageError::Conflict {
                entity: "booking",
                reason: format!("no seats left on train {}", new.train_id),
            });
        }

        let seats_left: i32 = tx
            .query_one(
                "UPDATE trains SET available_seats = available_seats - 1 WHERE id = $1 \
                 RETURNING available_seats",
                &[&new.train_id],
            )
            .await
            .map_err(fail)?
            .try_get(0)
            .map_err(fail)?;

        let row = tx
            .query_one(
                "INSERT INTO bookings (train_id, user_credentials) VALUES ($1, $2) \
                 RETURNING id, train_id, user_credentials",
                &[&new.train_id, &new.user_credentials],
            )
            .await
            .map_err(fail)?;
        let booking = booking_from_row(&row).map_err(fail)?;

        tx.commit().await.map_err(fail)?;
        Ok(BookingReceipt { booking, seats_left })
    }

    async fn update_booking(
        &mut self,
        id: BookingId,
        patch: &BookingPatch,
    ) -> Result<Booking, StorageError> {
        let fail = |e| classify(&self.endpoint, "booking", e);
        let row = self
            .client
            .query_opt(
                "UPDATE bookings SET user_credentials = $2 WHERE id = $1 \
                 RETURNING id, train_id, user_credentials",
                &[&id, &patch.user_credentials],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("booking", id))?;
        booking_from_row(&row).map_err(fail)
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<CancellationReceipt, StorageError> {
        let endpoint = self.endpoint.clone();
        let fail = |e| classify(&endpoint, "booking", e);
        let tx = self.client.transaction().await.map_err(fail)?;

        let row = tx
            .query_opt(
                "DELETE FROM bookings WHERE id = $1 RETURNING id, train_id, user_credentials",
                &[&id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("booking", id))?;
        let booking = booking_from_row(&row).map_err(fail)?;

        let seats_left = match tx
            .query_opt(
                "UPDATE trains SET available_seats = LEAST(available_seats + 1, 400) \
                 WHERE id = $1 RETURNING available_seats",
                &[&booking.train_id],
            )
            .await
            .map_err(fail)?
        {
            Some(row) => row.try_get(0).map_err(fail)?,
            None => 0,
        };

        tx.commit().await.map_err(fail)?;
        Ok(CancellationReceipt { booking, seats_left })
    }

    async fn list_lobbies(&mut self) -> Result<Vec<Lobby>, StorageError> {
        let fail = |e| classify(&self.endpoint, "lobby", e);
        let rows = self
            .client
            .query("SELECT id, train_id, status FROM lobbies ORDER BY id", &[])
            .await
            .map_err(fail)?;
        rows.iter().map(|row| lobby_from_row(row).map_err(fail)).collect()
    }

    async fn get_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError> {
        let fail = |e| classify(&self.endpoint, "lobby", e);
        let row = self
            .client
            .query_opt("SELECT id, train_id, status FROM lobbies WHERE id = $1", &[&id])
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("lobby", id))?;
        lobby_from_row(&row).map_err(fail)
    }

    async fn insert_lobby(&mut self, new: &NewLobby) -> Result<Lobby, StorageError> {
        let fail = |e| classify(&self.endpoint, "lobby", e);
        let row = self
            .client
            .query_one(
                "INSERT INTO lobbies (train_id) VALUES ($1) RETURNING id, train_id, status",
                &[&new.train_id],
            )
            .await
            .map_err(fail)?;
        lobby_from_row(&row).map_err(fail)
    }

    async fn delete_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError> {
        let fail = |e| classify(&self.endpoint, "lobby", e);
        let row = self
            .client
            .query_opt(
                "DELETE FROM lobbies WHERE id = $1 RETURNING id, train_id, status",
                &[&id],
            )
            .await
            .map_err(fail)?
            .ok_or_else(|| not_found("lobby", id))?;
        lobby_from_row(&row).map_err(fail)
    }
}
