//! In-process relational tables.
//!
//! Every endpoint sees the same dataset, as if replication were instant. The
//! connector remembers which endpoint each session was opened on and can mark
//! endpoints unreachable, which is what the routing tests assert against.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use switchyard_core::{
    Booking, BookingId, BookingPatch, BookingReceipt, CancellationReceipt, ConnectionString,
    Endpoint, Lobby, LobbyId, NewBooking, NewLobby, NewTrain, StorageError, Train, TrainId,
    TrainPatch, DEFAULT_LOBBY_STATUS, MAX_SEATS,
};

use super::{not_found, Connector, DbSession};

#[derive(Debug, Default)]
struct Tables {
    trains: BTreeMap<TrainId, Train>,
    bookings: BTreeMap<BookingId, Booking>,
    lobbies: BTreeMap<LobbyId, Lobby>,
    last_train_id: TrainId,
    last_booking_id: BookingId,
    last_lobby_id: LobbyId,
}

#[derive(Default)]
struct MemoryInner {
    tables: Mutex<Tables>,
    unreachable: Mutex<HashSet<Endpoint>>,
    served: Mutex<Vec<Endpoint>>,
    open: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<MemoryInner>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connections to `endpoint` fail (or succeed again).
    pub fn set_unreachable(&self, endpoint: &Endpoint, unreachable: bool) {
        if let Ok(mut set) = self.inner.unreachable.lock() {
            if unreachable {
                set.insert(endpoint.clone());
            } else {
                set.remove(endpoint);
            }
        }
    }

    /// Endpoints sessions were opened on, oldest first.
    pub fn served(&self) -> Vec<Endpoint> {
        self.inner
            .served
            .lock()
            .map(|served| served.clone())
            .unwrap_or_default()
    }

    pub fn clear_served(&self) {
        if let Ok(mut served) = self.inner.served.lock() {
            served.clear();
        }
    }

    /// Sessions opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &ConnectionString) -> Result<Box<dyn DbSession>, StorageError> {
        let endpoint = target.endpoint().clone();

        let refused = self
            .inner
            .unreachable
            .lock()
            .map(|set| set.contains(&endpoint))
            .unwrap_or(false);
        if refused {
            return Err(StorageError::Unreachable {
                target: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        if let Ok(mut served) = self.inner.served.lock() {
            served.push(endpoint.clone());
        }
        self.inner.open.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }
}

pub struct MemorySession {
    inner: Arc<MemoryInner>,
}

impl MemorySession {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.inner.tables.lock().map_err(|_| StorageError::Backend {
            reason: "in-memory tables poisoned".to_string(),
        })
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DbSession for MemorySession {
    async fn ensure_schema(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_trains(&mut self) -> Result<Vec<Train>, StorageError> {
        Ok(self.tables()?.trains.values().cloned().collect())
    }

    async fn get_train(&mut self, id: TrainId) -> Result<Train, StorageError> {
        self.tables()?
            .trains
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("train", id))
    }

    async fn insert_train(&mut self, new: &NewTrain) -> Result<Train, StorageError> {
        let mut tables = self.tables()?;
        tables.last_train_id += 1;
        let train = new.clone().into_train(tables.last_train_id);
        tables.trains.insert(train.id, train.clone());
        Ok(train)
    }

    async fn update_train(
        &mut self,
        id: TrainId,
        patch: &TrainPatch,
    ) -> Result<(Train, Train), StorageError> {
        let mut tables = self.tables()?;
        let train = tables.trains.get_mut(&id).ok_or_else(|| not_found("train", id))?;
        let before = train.clone();
        patch.apply(train);
        Ok((before, train.clone()))
    }

    async fn delete_train(&mut self, id: TrainId) -> Result<Train, StorageError> {
        let mut tables = self.tables()?;
        let train = tables.trains.remove(&id).ok_or_else(|| not_found("train", id))?;
        tables.bookings.retain(|_, booking| booking.train_id != id);
        Ok(train)
    }

    async fn list_bookings(&mut self) -> Result<Vec<Booking>, StorageError> {
        Ok(self.tables()?.bookings.values().cloned().collect())
    }

    async fn get_booking(&mut self, id: BookingId) -> Result<Booking, StorageError> {
        self.tables()?
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("booking", id))
    }

    async fn book_seat(&mut self, new: &NewBooking) -> Result<BookingReceipt, StorageError> {
        let mut tables = self.tables()?;

        let seats = tables
            .trains
            .get(&new.train_id)
            .map(|t| t.available_seats)
            .ok_or_else(|| not_found("train", new.train_id))?;

        let duplicate = tables
            .bookings
            .values()
            .any(|b| b.train_id == new.train_id && b.user_credentials == new.user_credentials);
        if duplicate {
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

        tables.last_booking_id += 1;
        let booking = Booking {
            id: tables.last_booking_id,
            train_id: new.train_id,
            user_credentials: new.user_credentials.clone(),
        };
        tables.bookings.insert(booking.id, booking.clone());

        let seats_left = seats - 1;
        if let Some(train) = tables.trains.get_mut(&new.train_id) {
            train.available_seats = seats_left;
        }
        Ok(BookingReceipt { booking, seats_left })
    }

    async fn update_booking(
        &mut self,
        id: BookingId,
        patch: &BookingPatch,
    ) -> Result<Booking, StorageError> {
        let mut tables = self.tables()?;
        let train_id = tables
            .bookings
            .get(&id)
            .map(|b| b.train_id)
            .ok_or_else(|| not_found("booking", id))?;

        let taken = tables.bookings.values().any(|b| {
            b.id != id && b.train_id == train_id && b.user_credentials == patch.user_credentials
        });
        if taken {
            return Err(StorageError::Conflict {
                entity: "booking",
                reason: format!(
                    "{} already holds a booking on train {}",
                    patch.user_credentials, train_id
                ),
            });
        }

        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| not_found("booking", id))?;
        booking.user_credentials = patch.user_credentials.clone();
        Ok(booking.clone())
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<CancellationReceipt, StorageError> {
        let mut tables = self.tables()?;
        let booking = tables.bookings.remove(&id).ok_or_else(|| not_found("booking", id))?;

        let seats_left = match tables.trains.get_mut(&booking.train_id) {
            Some(train) => {
                train.available_seats = (train.available_seats + 1).min(MAX_SEATS);
                train.available_seats
            }
            None => 0,
        };
        Ok(CancellationReceipt { booking, seats_left })
    }

    async fn list_lobbies(&mut self) -> Result<Vec<Lobby>, StorageError> {
        Ok(self.tables()?.lobbies.values().cloned().collect())
    }

    async fn get_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError> {
        self.tables()?
            .lobbies
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("lobby", id))
    }

    async fn insert_lobby(&mut self, new: &NewLobby) -> Result<Lobby, StorageError> {
        let mut tables = self.tables()?;
        if tables.lobbies.values().any(|l| l.train_id == new.train_id) {
            return Err(StorageError::Conflict {
                entity: "lobby",
                reason: format!("lobby for train {} already exists", new.train_id),
            });
        }
        tables.last_lobby_id += 1;
        let lobby = Lobby {
            id: tables.last_lobby_id,
            train_id: new.train_id,
            status: DEFAULT_LOBBY_STATUS.to_string(),
        };
        tables.lobbies.insert(lobby.id, lobby.clone());
        Ok(lobby)
    }

    async fn delete_lobby(&mut self, id: LobbyId) -> Result<Lobby, StorageError> {
        self.tables()?
            .lobbies
            .remove(&id)
            .ok_or_else(|| not_found("lobby", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_test_utils::fixtures;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    async fn session(connector: &MemoryConnector) -> Result<Box<dyn DbSession>, Box<dyn std::error::Error>> {
        connector.connect(&ConnectionString::parse("m:5432")?).await.map_err(Into::into)
    }

    #[tokio::test]
    async fn test_booking_takes_a_seat() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        let train = db.insert_train(&fixtures::new_train(2)).await?;

        let receipt = db.book_seat(&fixtures::new_booking(train.id, "ana")).await?;
        assert_eq!(receipt.seats_left, 1);
        assert_eq!(db.get_train(train.id).await?.available_seats, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_booking_rejected_when_full_or_duplicate() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        let train = db.insert_train(&fixtures::new_train(1)).await?;

        db.book_seat(&fixtures::new_booking(train.id, "ana")).await?;
        assert!(matches!(
            db.book_seat(&fixtures::new_booking(train.id, "ana")).await,
            Err(StorageError::Conflict { .. })
        ));
        assert!(matches!(
            db.book_seat(&fixtures::new_booking(train.id, "bo")).await,
            Err(StorageError::Conflict { .. })
        ));
        assert_eq!(db.get_train(train.id).await?.available_seats, 0);
        assert_eq!(db.list_bookings().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_booking_missing_train() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        assert!(matches!(
            db.book_seat(&fixtures::new_booking(77, "ana")).await,
            Err(StorageError::NotFound { entity: "train", id: 77 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_returns_seat() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        let train = db.insert_train(&fixtures::new_train(1)).await?;
        let receipt = db.book_seat(&fixtures::new_booking(train.id, "ana")).await?;

        let cancelled = db.cancel_booking(receipt.booking.id).await?;
        assert_eq!(cancelled.seats_left, 1);
        assert!(db.list_bookings().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_train_cascades_bookings() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        let train = db.insert_train(&fixtures::new_train(3)).await?;
        db.book_seat(&fixtures::new_booking(train.id, "ana")).await?;

        db.delete_train(train.id).await?;
        assert!(db.list_bookings().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_lobby_unique_per_train() -> TestResult {
        let connector = MemoryConnector::new();
        let mut db = session(&connector).await?;
        let lobby = db.insert_lobby(&NewLobby { train_id: 4 }).await?;
        assert_eq!(lobby.status, "active");
        assert!(matches!(
            db.insert_lobby(&NewLobby { train_id: 4 }).await,
            Err(StorageError::Conflict { entity: "lobby", .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_and_served_tracking() -> TestResult {
        let connector = MemoryConnector::new();
        let down = Endpoint::new("s1", 5432);
        connector.set_unreachable(&down, true);

        let target = ConnectionString::parse("s1:5432")?;
        assert!(matches!(
            connector.connect(&target).await,
            Err(StorageError::Unreachable { .. })
        ));

        connector.set_unreachable(&down, false);
        let db = connector.connect(&target).await?;
        assert_eq!(connector.served(), vec![down]);
        assert_eq!(connector.open_sessions(), 1);
        drop(db);
        assert_eq!(connector.open_sessions(), 0);
        Ok(())
    }
}
