//! Room-based fan-out of real-time events.
//!
//! Every socket connection registers with the [`RoomHub`] and gets a bounded
//! queue. Rooms are sets of connections keyed by user id or list id;
//! broadcasting pushes an event into each member's queue. A full queue drops
//! the event for that member only. Nothing is persisted or replayed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use taskgrid_shared::constants::{LIST_ROOM_PREFIX, USER_ROOM_PREFIX};
use taskgrid_shared::protocol::ServerEvent;
use taskgrid_shared::{Snapshot, Task};

pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKey {
    User(Uuid),
    List(Uuid),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::User(id) => write!(f, "{USER_ROOM_PREFIX}:{id}"),
            RoomKey::List(id) => write!(f, "{LIST_ROOM_PREFIX}:{id}"),
        }
    }
}

struct Connection {
    user_id: Uuid,
    sender: mpsc::Sender<ServerEvent>,
    rooms: HashSet<RoomKey>,
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl HubInner {
    fn detach(&mut self, conn_id: ConnectionId, room: RoomKey) {
        let now_empty = match self.rooms.get_mut(&room) {
            Some(members) => {
                members.remove(&conn_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove(&room);
            debug!(room = %room, "Removed empty room");
        }
    }
}

pub struct RoomHub {
    inner: RwLock<HubInner>,
    queue_capacity: usize,
}

impl RoomHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HubInner::default()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection for `user_id`. Returns its id and the
    /// receiving end of its event queue.
    pub async fn register(&self, user_id: Uuid) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let conn_id = Uuid::new_v4();
        self.inner.write().await.connections.insert(
            conn_id,
            Connection {
                user_id,
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        debug!(conn = %conn_id, user = %user_id, "Connection registered");
        (conn_id, rx)
    }

    /// Remove a connection from every room it joined.
    pub async fn unregister(&self, conn_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        let Some(conn) = inner.connections.remove(&conn_id) else {
            return;
        };
        for room in conn.rooms {
            inner.detach(conn_id, room);
        }
        debug!(conn = %conn_id, user = %conn.user_id, "Connection unregistered");
    }

    /// Add a connection to a room (created on first join). Returns how many
    /// rooms the connection is in afterwards, or `None` if it is unknown.
    /// Joining twice is a no-op.
    pub async fn join(&self, conn_id: ConnectionId, room: RoomKey) -> Option<usize> {
        let mut inner = self.inner.write().await;
        let conn = inner.connections.get_mut(&conn_id)?;
        conn.rooms.insert(room);
        let joined = conn.rooms.len();
        let members = inner.rooms.entry(room).or_default();
        members.insert(conn_id);

        info!(
            room = %room,
            conn = %conn_id,
            members = members.len(),
            "Connection joined room"
        );
        Some(joined)
    }

    /// Leave a room. Returns how many rooms the connection is still in.
    pub async fn leave(&self, conn_id: ConnectionId, room: RoomKey) -> usize {
        let mut inner = self.inner.write().await;
        let remaining = match inner.connections.get_mut(&conn_id) {
            Some(conn) => {
                conn.rooms.remove(&room);
                conn.rooms.len()
            }
            None => 0,
        };
        inner.detach(conn_id, room);
        debug!(room = %room, conn = %conn_id, "Connection left room");
        remaining
    }

    /// Remove every connection of `user_id` from `room`, e.g. after their
    /// share was revoked.
    pub async fn evict_user(&self, user_id: Uuid, room: RoomKey) {
        let mut inner = self.inner.write().await;
        let victims: Vec<ConnectionId> = inner
            .connections
            .iter_mut()
            .filter(|(_, c)| c.user_id == user_id)
            .filter_map(|(id, c)| c.rooms.remove(&room).then_some(*id))
            .collect();
        for conn_id in victims {
            inner.detach(conn_id, room);
        }
    }

    /// Unregister every connection of `user_id`. Their queues close, which
    /// ends the sockets. Returns how many connections were dropped.
    pub async fn disconnect_user(&self, user_id: Uuid) -> usize {
        let mut inner = self.inner.write().await;
        let conn_ids: Vec<ConnectionId> = inner
            .connections
            .iter()
            .filter(|(_, c)| c.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();
        for conn_id in &conn_ids {
            if let Some(conn) = inner.connections.remove(conn_id) {
                for room in conn.rooms {
                    inner.detach(*conn_id, room);
                }
            }
        }
        if !conn_ids.is_empty() {
            info!(user = %user_id, connections = conn_ids.len(), "Disconnected user");
        }
        conn_ids.len()
    }

    /// Drop a room and forget it in every member's membership set.
    pub async fn close_room(&self, room: RoomKey) {
        let mut inner = self.inner.write().await;
        let Some(members) = inner.rooms.remove(&room) else {
            return;
        };
        for conn_id in members {
            if let Some(conn) = inner.connections.get_mut(&conn_id) {
                conn.rooms.remove(&room);
            }
        }
        debug!(room = %room, "Closed room");
    }

    /// Queue `event` for every member of `room`. Returns how many members
    /// accepted it.
    pub async fn broadcast(&self, room: RoomKey, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(&room) else {
            debug!(room = %room, event = event.name(), "No listeners for event");
            return 0;
        };

        let mut delivered = 0;
        for conn_id in members {
            let Some(conn) = inner.connections.get(conn_id) else {
                continue;
            };
            if conn.sender.try_send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    room = %room,
                    conn = %conn_id,
                    event = event.name(),
                    "Dropping event for slow or closed connection"
                );
            }
        }
        delivered
    }

    /// Broadcast to several rooms, delivering at most once per connection.
    pub async fn broadcast_many(&self, rooms: &[RoomKey], event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let targets: HashSet<ConnectionId> = rooms
            .iter()
            .filter_map(|room| inner.rooms.get(room))
            .flat_map(|members| members.iter().copied())
            .collect();

        targets
            .iter()
            .filter_map(|conn_id| inner.connections.get(conn_id))
            .filter(|conn| conn.sender.try_send(event.clone()).is_ok())
            .count()
    }

    /// Queue an event for one connection only.
    pub async fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) -> bool {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&conn_id)
            .is_some_and(|conn| conn.sender.try_send(event).is_ok())
    }

    #[cfg(test)]
    pub async fn member_count(&self, room: RoomKey) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(&room)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

/// Rooms that should hear about a change to `task`: its list room, plus the
/// user rooms of direct task sharees who cannot see the list itself and so
/// never join its room.
pub fn task_audience(snapshot: &Snapshot, task: &Task) -> Vec<RoomKey> {
    let mut rooms = vec![RoomKey::List(task.list_id)];
    let Some(list) = snapshot.list(task.list_id) else {
        return rooms;
    };
    for share in &task.shares {
        let sees_list = list.owner_id == share.user_id || list.share_for(share.user_id).is_some();
        if !sees_list {
            rooms.push(RoomKey::User(share.user_id));
        }
    }
    rooms
}

/// Rooms that should hear a list is gone: its own room plus the user rooms
/// of direct task sharees who could not see the list.
pub fn list_audience(snapshot: &Snapshot, list_id: Uuid) -> Vec<RoomKey> {
    let mut rooms = vec![RoomKey::List(list_id)];
    for task in snapshot.tasks.iter().filter(|t| t.list_id == list_id) {
        for room in task_audience(snapshot, task) {
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
    }
    rooms
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskgrid_shared::protocol::ListDeleted;
    use taskgrid_shared::{List, Permission, Priority, Share, TaskStatus};

    fn event() -> ServerEvent {
        ServerEvent::ListDeleted(ListDeleted {
            id: Uuid::from_u128(9),
        })
    }

    #[tokio::test]
    async fn test_join_leave_removes_empty_room() {
        let hub = RoomHub::new(8);
        let room = RoomKey::List(Uuid::new_v4());
        let (conn, _rx) = hub.register(Uuid::new_v4()).await;

        assert_eq!(hub.join(conn, room).await, Some(1));
        assert_eq!(hub.member_count(room).await, 1);

        assert_eq!(hub.leave(conn, room).await, 0);
        assert_eq!(hub.member_count(room).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_unknown_connection() {
        let hub = RoomHub::new(8);
        assert_eq!(hub.join(Uuid::new_v4(), RoomKey::User(Uuid::new_v4())).await, None);
    }

    #[tokio::test]
    async fn test_room_count_ignores_repeats() {
        let hub = RoomHub::new(8);
        let user = Uuid::new_v4();
        let list = RoomKey::List(Uuid::new_v4());
        let (conn, _rx) = hub.register(user).await;

        assert_eq!(hub.join(conn, list).await, Some(1));
        assert_eq!(hub.join(conn, list).await, Some(1));
        assert_eq!(hub.join(conn, RoomKey::User(user)).await, Some(2));
        assert_eq!(hub.leave(conn, RoomKey::List(Uuid::new_v4())).await, 2);
        assert_eq!(hub.leave(conn, list).await, 1);
        assert_eq!(hub.leave(conn, list).await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_user() {
        let hub = RoomHub::new(8);
        let user = Uuid::new_v4();
        let room = RoomKey::List(Uuid::new_v4());
        let (a, mut rx_a) = hub.register(user).await;
        let (b, _rx_b) = hub.register(user).await;
        let (other, mut rx_o) = hub.register(Uuid::new_v4()).await;
        for conn in [a, b, other] {
            hub.join(conn, room).await;
        }

        assert_eq!(hub.disconnect_user(user).await, 2);
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.member_count(room).await, 1);

        assert_eq!(hub.broadcast(room, &event()).await, 1);
        assert!(rx_o.try_recv().is_ok());
        assert_eq!(
            rx_a.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
        assert_eq!(hub.join(a, room).await, None);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_members_only() {
        let hub = RoomHub::new(8);
        let room = RoomKey::List(Uuid::new_v4());
        let (a, mut rx_a) = hub.register(Uuid::new_v4()).await;
        let (b, mut rx_b) = hub.register(Uuid::new_v4()).await;
        let (_c, mut rx_c) = hub.register(Uuid::new_v4()).await;
        hub.join(a, room).await;
        hub.join(b, room).await;

        assert_eq!(hub.broadcast(room, &event()).await, 2);
        assert_eq!(rx_a.try_recv().unwrap(), event());
        assert_eq!(rx_b.try_recv().unwrap(), event());
        assert!(rx_c.try_recv().is_err());

        hub.leave(b, room).await;
        assert_eq!(hub.broadcast(room, &event()).await, 1);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops_event() {
        let hub = RoomHub::new(1);
        let room = RoomKey::User(Uuid::new_v4());
        let (conn, mut rx) = hub.register(Uuid::new_v4()).await;
        hub.join(conn, room).await;

        assert_eq!(hub.broadcast(room, &event()).await, 1);
        assert_eq!(hub.broadcast(room, &event()).await, 0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_many_dedupes() {
        let hub = RoomHub::new(8);
        let user = Uuid::new_v4();
        let list_room = RoomKey::List(Uuid::new_v4());
        let (conn, mut rx) = hub.register(user).await;
        hub.join(conn, RoomKey::User(user)).await;
        hub.join(conn, list_room).await;

        let sent = hub
            .broadcast_many(&[RoomKey::User(user), list_room], &event())
            .await;
        assert_eq!(sent, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_and_evict() {
        let hub = RoomHub::new(8);
        let user = Uuid::new_v4();
        let room = RoomKey::List(Uuid::new_v4());
        let (a, _rx_a) = hub.register(user).await;
        let (b, _rx_b) = hub.register(user).await;
        let (other, _rx_o) = hub.register(Uuid::new_v4()).await;
        for conn in [a, b, other] {
            hub.join(conn, room).await;
        }

        hub.evict_user(user, room).await;
        assert_eq!(hub.member_count(room).await, 1);

        hub.unregister(other).await;
        assert_eq!(hub.room_count().await, 0);
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_close_room() {
        let hub = RoomHub::new(8);
        let room = RoomKey::List(Uuid::new_v4());
        let (conn, mut rx) = hub.register(Uuid::new_v4()).await;
        hub.join(conn, room).await;

        hub.close_room(room).await;
        assert_eq!(hub.broadcast(room, &event()).await, 0);
        assert!(rx.try_recv().is_err());
    }

    fn share(user: Uuid) -> Share {
        Share {
            id: Uuid::new_v4(),
            user_id: user,
            permission: Permission::View,
        }
    }

    fn task_in(list_id: Uuid, shares: Vec<Share>) -> Task {
        Task {
            id: Uuid::new_v4(),
            list_id,
            name: "t".into(),
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            favorite: false,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            shares,
        }
    }

    #[test]
    fn test_list_audience_includes_task_only_sharees() {
        let (owner, viewer, carol, dave) = (
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            Uuid::from_u128(3),
            Uuid::from_u128(4),
        );
        let list = List {
            id: Uuid::from_u128(10),
            name: "l".into(),
            description: None,
            owner_id: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            shares: vec![share(viewer)],
        };
        let other_list = Uuid::from_u128(11);
        let tasks = vec![
            task_in(list.id, vec![share(carol), share(viewer)]),
            task_in(list.id, vec![share(carol)]),
            task_in(other_list, vec![share(dave)]),
        ];
        let list_id = list.id;
        let snapshot = Snapshot::new(None, vec![list], tasks);

        assert_eq!(
            task_audience(&snapshot, &snapshot.tasks[0]),
            vec![RoomKey::List(list_id), RoomKey::User(carol)]
        );
        assert_eq!(
            list_audience(&snapshot, list_id),
            vec![RoomKey::List(list_id), RoomKey::User(carol)]
        );
    }

    #[test]
    fn test_room_key_display() {
        let id = Uuid::from_u128(1);
        assert_eq!(RoomKey::User(id).to_string(), format!("user:{id}"));
        assert_eq!(RoomKey::List(id).to_string(), format!("list:{id}"));
    }
}
