//! The session registry: the authoritative connection → subject → room map.
//!
//! All membership mutations pass through this type. A single lock over both
//! maps makes re-authentication migration atomic: `targets` can never
//! observe a connection under two subjects, or under its old subject after
//! a migration completed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use taskwire_core::ids::{ConnectionId, UserId};
use taskwire_core::rooms::room_name;
use tracing::debug;

use super::connection::ClientConnection;

#[derive(Default)]
struct Inner {
    /// Every live connection, authenticated or not.
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    /// Per-subject rooms. Invariant: a connection id appears in at most one
    /// room, and no room is empty.
    rooms: HashMap<UserId, HashSet<ConnectionId>>,
}

/// Authoritative mapping from live connections to authentication state and
/// room membership.
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    room_prefix: String,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(room_prefix: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            room_prefix: room_prefix.into(),
        }
    }

    /// Record a connection with no subject. Always succeeds.
    pub fn register_unauthenticated(&self, connection: Arc<ClientConnection>) {
        let mut inner = self.inner.write();
        let _ = inner.connections.insert(connection.id.clone(), connection);
    }

    /// Associate a connection with a subject.
    ///
    /// Idempotent: already authenticated as `user` is a no-op. A different
    /// current subject migrates membership atomically. An unknown (already
    /// removed) connection id is silently ignored — a late authenticate
    /// racing a disconnect must not resurrect membership.
    pub fn authenticate(&self, conn_id: &ConnectionId, user: UserId) {
        let mut inner = self.inner.write();
        let Some(connection) = inner.connections.get(conn_id).cloned() else {
            debug!(%conn_id, "authenticate for unknown connection ignored");
            return;
        };

        let previous = connection.subject();
        if previous.as_ref() == Some(&user) {
            return;
        }
        if let Some(old) = previous {
            Self::leave_room(&mut inner, &old, conn_id);
        }
        let _ = inner
            .rooms
            .entry(user.clone())
            .or_default()
            .insert(conn_id.clone());
        connection.set_subject(Some(user.clone()));
        debug!(%conn_id, room = room_name(&self.room_prefix, &user), "connection joined room");
    }

    /// Remove a connection from the registry and from whatever room it
    /// belongs to. No-op if already absent.
    pub fn remove(&self, conn_id: &ConnectionId) {
        let mut inner = self.inner.write();
        let Some(connection) = inner.connections.remove(conn_id) else {
            return;
        };
        if let Some(user) = connection.subject() {
            Self::leave_room(&mut inner, &user, conn_id);
            debug!(%conn_id, room = room_name(&self.room_prefix, &user), "connection left room");
        }
        connection.set_subject(None);
    }

    /// Snapshot of the connections currently authenticated as `user`.
    ///
    /// Reflects every `authenticate`/`remove` that completed before the
    /// call; the lock is released before the caller sends anything.
    pub fn targets(&self, user: &UserId) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.read();
        inner
            .rooms
            .get(user)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The subject a connection is authenticated as, if any.
    pub fn subject_of(&self, conn_id: &ConnectionId) -> Option<UserId> {
        self.inner
            .read()
            .connections
            .get(conn_id)
            .and_then(|c| c.subject())
    }

    /// Number of live connections (any auth state).
    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.inner.read().rooms.len()
    }

    fn leave_room(inner: &mut Inner, user: &UserId, conn_id: &ConnectionId) {
        if let Some(room) = inner.rooms.get_mut(user) {
            let _ = room.remove(conn_id);
            if room.is_empty() {
                let _ = inner.rooms.remove(user);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry() -> SessionRegistry {
        SessionRegistry::new("user_")
    }

    fn connect(reg: &SessionRegistry, id: &str) -> Arc<ClientConnection> {
        // membership tests never send, so the receiver can drop here
        let (tx, _rx) = mpsc::channel(32);
        let conn = Arc::new(ClientConnection::new(ConnectionId::from(id), tx));
        reg.register_unauthenticated(conn.clone());
        conn
    }

    fn target_ids(reg: &SessionRegistry, user: &str) -> Vec<String> {
        let mut ids: Vec<String> = reg
            .targets(&UserId::from(user))
            .iter()
            .map(|c| c.id.as_str().to_owned())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn unauthenticated_connection_targets_nothing() {
        let reg = registry();
        let _conn = connect(&reg, "c1");
        assert_eq!(reg.connection_count(), 1);
        assert_eq!(reg.room_count(), 0);
        assert!(reg.subject_of(&ConnectionId::from("c1")).is_none());
    }

    #[test]
    fn authenticate_joins_room() {
        let reg = registry();
        let conn = connect(&reg, "c1");
        reg.authenticate(&conn.id, UserId::from("u1"));
        assert_eq!(target_ids(&reg, "u1"), vec!["c1"]);
        assert!(conn.is_authenticated());
    }

    #[test]
    fn authenticate_is_idempotent() {
        let reg = registry();
        let conn = connect(&reg, "c1");
        reg.authenticate(&conn.id, UserId::from("u1"));
        reg.authenticate(&conn.id, UserId::from("u1"));
        assert_eq!(target_ids(&reg, "u1"), vec!["c1"]);
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn reauthentication_migrates_membership() {
        let reg = registry();
        let conn = connect(&reg, "c1");
        reg.authenticate(&conn.id, UserId::from("u1"));
        reg.authenticate(&conn.id, UserId::from("u2"));
        assert!(target_ids(&reg, "u1").is_empty());
        assert_eq!(target_ids(&reg, "u2"), vec!["c1"]);
        // old room is garbage-collected, not kept empty
        assert_eq!(reg.room_count(), 1);
        assert_eq!(conn.subject().unwrap().as_str(), "u2");
    }

    #[test]
    fn multiple_connections_share_a_room() {
        let reg = registry();
        let c1 = connect(&reg, "c1");
        let c2 = connect(&reg, "c2");
        reg.authenticate(&c1.id, UserId::from("u1"));
        reg.authenticate(&c2.id, UserId::from("u1"));
        assert_eq!(target_ids(&reg, "u1"), vec!["c1", "c2"]);
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn remove_clears_membership_everywhere() {
        let reg = registry();
        let conn = connect(&reg, "c1");
        reg.authenticate(&conn.id, UserId::from("u1"));
        reg.remove(&conn.id);
        assert!(target_ids(&reg, "u1").is_empty());
        assert_eq!(reg.connection_count(), 0);
        assert_eq!(reg.room_count(), 0);
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn remove_is_a_noop_when_absent() {
        let reg = registry();
        reg.remove(&ConnectionId::from("no_such"));
        assert_eq!(reg.connection_count(), 0);
    }

    #[test]
    fn remove_keeps_other_room_members() {
        let reg = registry();
        let c1 = connect(&reg, "c1");
        let c2 = connect(&reg, "c2");
        reg.authenticate(&c1.id, UserId::from("u1"));
        reg.authenticate(&c2.id, UserId::from("u1"));
        reg.remove(&c1.id);
        assert_eq!(target_ids(&reg, "u1"), vec!["c2"]);
    }

    #[test]
    fn late_authenticate_after_remove_is_ignored() {
        let reg = registry();
        let conn = connect(&reg, "c1");
        reg.remove(&conn.id);
        reg.authenticate(&conn.id, UserId::from("u1"));
        assert!(target_ids(&reg, "u1").is_empty());
        assert_eq!(reg.room_count(), 0);
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn targets_for_unknown_subject_is_empty() {
        let reg = registry();
        assert!(reg.targets(&UserId::from("ghost")).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Authenticate(u8, u8),
            Remove(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..6, 0u8..4).prop_map(|(c, u)| Op::Authenticate(c, u)),
                (0u8..6).prop_map(Op::Remove),
            ]
        }

        proptest! {
            /// After any op sequence: every live connection is in at most
            /// one room, the room agrees with its subject, and no room is
            /// empty.
            #[test]
            fn membership_stays_consistent(ops in proptest::collection::vec(op_strategy(), 0..40)) {
                let reg = registry();
                let conns: Vec<_> = (0..6)
                    .map(|i| connect(&reg, &format!("c{i}")))
                    .collect();
                let mut removed = [false; 6];

                for op in ops {
                    match op {
                        Op::Authenticate(c, u) => {
                            let c = c as usize;
                            reg.authenticate(&conns[c].id, UserId::from(format!("u{u}")));
                        }
                        Op::Remove(c) => {
                            let c = c as usize;
                            reg.remove(&conns[c].id);
                            removed[c] = true;
                        }
                    }
                }

                for (i, conn) in conns.iter().enumerate() {
                    let appearances: usize = (0..4)
                        .filter(|u| {
                            reg.targets(&UserId::from(format!("u{u}")))
                                .iter()
                                .any(|c| c.id == conn.id)
                        })
                        .count();
                    if removed[i] {
                        prop_assert_eq!(appearances, 0);
                        prop_assert!(reg.subject_of(&conn.id).is_none());
                    } else {
                        match conn.subject() {
                            Some(user) => {
                                prop_assert_eq!(appearances, 1);
                                prop_assert!(
                                    reg.targets(&user).iter().any(|c| c.id == conn.id)
                                );
                            }
                            None => prop_assert_eq!(appearances, 0),
                        }
                    }
                }

                // no empty rooms retained
                let live_rooms = reg.room_count();
                let occupied: std::collections::HashSet<String> = conns
                    .iter()
                    .filter(|c| c.subject().is_some())
                    .map(|c| c.subject().unwrap().into_inner())
                    .collect();
                prop_assert_eq!(live_rooms, occupied.len());
            }
        }
    }
}
