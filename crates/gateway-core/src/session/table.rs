//! Session table
//!
//! Slot 0 holds the control session; media legs follow in pairs. Every slot
//! carries the [`PollDescriptor`] of its session's socket, so the table and
//! the poll set stay positionally in step. Destroying a call closes both
//! descriptors in place; the next [`SessionTable::compact`] pass drops closed
//! slots and shifts the remaining ones down.

use mio::Token;
use tracing::debug;

use faxgw_sig_core::CallId;

use super::Session;
use crate::allocator::SessionId;
use crate::error::{Error, Result};
use crate::resources::GatewayResources;

/// Table index of the control session
pub const CONTROL_INDEX: usize = 0;

/// Poll state of one table slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollDescriptor {
    token: Option<Token>,
    closed: bool,
    readable: bool,
}

impl PollDescriptor {
    fn open(token: Option<Token>) -> Self {
        Self {
            token,
            closed: false,
            readable: false,
        }
    }

    fn close(&mut self) {
        self.token = None;
        self.closed = true;
        self.readable = false;
    }

    pub fn token(&self) -> Option<Token> {
        self.token
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }
}

#[derive(Debug)]
struct Slot {
    session: Session,
    descriptor: PollDescriptor,
}

/// Bounded, ordered collection of live sessions
#[derive(Debug)]
pub struct SessionTable {
    slots: Vec<Slot>,
    capacity: usize,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupied slots, closed ones included until compaction
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots still free
    pub fn remaining(&self) -> usize {
        self.capacity - self.slots.len()
    }

    /// Append a session. The control session must go first, and only there.
    pub fn push(&mut self, session: Session) -> Result<usize> {
        self.admit(&session)?;
        Ok(self.insert(session))
    }

    /// Check that `session` would be accepted by the next push
    pub fn admit(&self, session: &Session) -> Result<()> {
        if self.slots.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                active: self.slots.len(),
                max: self.capacity,
            });
        }
        let index = self.slots.len();
        if (index == CONTROL_INDEX) != session.is_control() {
            return Err(Error::invalid_session(format!(
                "{} session cannot occupy slot {}",
                session.mode(),
                index
            )));
        }
        Ok(())
    }

    /// Append a session that passed `admit`
    pub(crate) fn insert(&mut self, mut session: Session) -> usize {
        let index = self.slots.len();
        session.set_table_index(index);
        let descriptor = PollDescriptor::open(session.token());
        self.slots.push(Slot {
            session,
            descriptor,
        });
        index
    }

    pub fn get(&self, index: usize) -> Option<&Session> {
        self.slots.get(index).map(|slot| &slot.session)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.slots.get_mut(index).map(|slot| &mut slot.session)
    }

    pub fn descriptor(&self, index: usize) -> Option<&PollDescriptor> {
        self.slots.get(index).map(|slot| &slot.descriptor)
    }

    pub fn control(&self) -> Option<&Session> {
        self.get(CONTROL_INDEX).filter(|s| s.is_control())
    }

    pub fn control_mut(&mut self) -> Option<&mut Session> {
        self.get_mut(CONTROL_INDEX).filter(|s| s.is_control())
    }

    /// Index of the live session with this id
    pub fn index_of(&self, id: SessionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.descriptor.is_closed() && slot.session.id() == id)
    }

    /// Index of a live media leg belonging to `call_id`
    pub fn find_by_call_id(&self, call_id: &CallId) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(CONTROL_INDEX + 1)
            .find(|(_, slot)| !slot.descriptor.is_closed() && slot.session.call_id() == Some(call_id))
            .map(|(index, _)| index)
    }

    /// Live sessions in table order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.slots
            .iter()
            .filter(|slot| !slot.descriptor.is_closed())
            .map(|slot| &slot.session)
    }

    /// Indices of live legs whose bridge stopped on a socket error
    pub fn failed_bridges(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.descriptor.is_closed() && slot.session.is_bridge_failed())
            .map(|(index, _)| index)
            .collect()
    }

    /// Live media legs
    pub fn media_sessions(&self) -> usize {
        self.sessions().filter(|s| !s.is_control()).count()
    }

    /// Flag the slot whose descriptor carries `token`
    pub fn mark_readable(&mut self, token: Token) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|slot| slot.descriptor.token == Some(token))
        {
            Some(slot) => {
                slot.descriptor.readable = true;
                true
            }
            None => false,
        }
    }

    /// Clear a slot's readable flag, returning its previous value
    pub fn take_readable(&mut self, index: usize) -> bool {
        self.slots
            .get_mut(index)
            .map_or(false, |slot| std::mem::take(&mut slot.descriptor.readable))
    }

    /// Stop, destroy and close both legs of the call at `index`
    pub fn destroy_call(&mut self, index: usize, res: &mut GatewayResources) -> Result<()> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| Error::invalid_session(format!("no session at slot {}", index)))?;
        if slot.session.is_control() {
            return Err(Error::invalid_session("the control session is not part of a call"));
        }
        let peer_index = slot.session.peer().and_then(|peer| self.index_of(peer));
        let legs = [Some(index), peer_index];

        // no leg is freed while its bridge can still run
        for i in legs.into_iter().flatten() {
            self.slots[i].session.stop_bridge();
        }
        for i in legs.into_iter().flatten() {
            let slot = &mut self.slots[i];
            slot.session.destroy(res);
            slot.descriptor.close();
        }

        debug!(
            session = %self.slots[index].session.id(),
            call_id = ?self.slots[index].session.call_id().map(CallId::as_str),
            "Call destroyed"
        );
        Ok(())
    }

    /// Drop closed slots past the control slot and dispatch readable ones.
    ///
    /// Live slots shift left over closed ones and have their table index
    /// updated before `dispatch` sees them. `dispatch` may close slots but
    /// must not add or remove any. Returns the number of slots removed.
    pub fn compact<F>(&mut self, mut dispatch: F) -> usize
    where
        F: FnMut(&mut Self, usize),
    {
        let mut write = CONTROL_INDEX + 1;
        let mut read = write;

        while read < self.slots.len() {
            if self.slots[read].descriptor.is_closed() {
                read += 1;
                continue;
            }
            if write != read {
                self.slots.swap(write, read);
                self.slots[write].session.set_table_index(write);
            }
            if self.slots[write].descriptor.readable {
                self.slots[write].descriptor.readable = false;
                dispatch(self, write);
            }
            write += 1;
            read += 1;
        }

        let removed = self.slots.len().saturating_sub(write);
        self.slots.truncate(write.min(self.slots.len()));
        removed
    }

    /// Destroy every call and the control session, leaving the table empty.
    /// Returns the number of calls torn down.
    pub fn destroy_all(&mut self, res: &mut GatewayResources) -> usize {
        let mut calls = 0;
        for index in (CONTROL_INDEX + 1)..self.slots.len() {
            if !self.slots[index].descriptor.is_closed() && self.destroy_call(index, res).is_ok() {
                calls += 1;
            }
        }
        for slot in &mut self.slots {
            slot.session.destroy(res);
            slot.descriptor.close();
        }
        self.slots.clear();
        calls
    }

    /// Every live slot's descriptor matches its session's socket and every
    /// session knows its own position
    pub fn is_consistent(&self) -> bool {
        self.slots.iter().enumerate().all(|(index, slot)| {
            slot.session.table_index() == index
                && (slot.descriptor.is_closed() || slot.descriptor.token == slot.session.token())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::IdAllocator;
    use crate::session::{Direction, SessionMode};

    fn leg_pair(ids: &mut IdAllocator, table: &SessionTable, call: &str) -> (Session, Session) {
        let call_id = CallId::new(call).unwrap();
        let mut a = Session::create(SessionMode::Gateway, table.len(), Direction::Inbound, ids).unwrap();
        let mut b = Session::create(SessionMode::Gateway, table.len() + 1, Direction::Outbound, ids).unwrap();
        a.call_id = Some(call_id.clone());
        b.call_id = Some(call_id);
        Session::link(&mut a, &mut b).unwrap();
        (a, b)
    }

    fn table_with_calls(calls: &[&str]) -> (SessionTable, IdAllocator) {
        let mut ids = IdAllocator::new(64);
        let mut table = SessionTable::new(16);
        let control = Session::create(SessionMode::Control, 0, Direction::Inbound, &mut ids).unwrap();
        table.push(control).unwrap();
        for call in calls {
            let (a, b) = leg_pair(&mut ids, &table, call);
            table.push(a).unwrap();
            table.push(b).unwrap();
        }
        (table, ids)
    }

    #[test]
    fn test_control_slot_rules() {
        let mut ids = IdAllocator::new(8);
        let mut table = SessionTable::new(4);
        let leg = Session::create(SessionMode::Gateway, 0, Direction::Inbound, &mut ids).unwrap();
        assert!(table.push(leg).is_err());

        let control = Session::create(SessionMode::Control, 0, Direction::Inbound, &mut ids).unwrap();
        assert_eq!(table.push(control).unwrap(), CONTROL_INDEX);
        let again = Session::create(SessionMode::Control, 1, Direction::Inbound, &mut ids).unwrap();
        assert!(table.push(again).is_err());
    }

    #[test]
    fn test_capacity() {
        let (mut table, mut ids) = table_with_calls(&[]);
        table.capacity = 3;
        let (a, b) = leg_pair(&mut ids, &table, "c1");
        table.push(a).unwrap();
        table.push(b).unwrap();
        let extra = Session::create(SessionMode::Gateway, 3, Direction::Inbound, &mut ids).unwrap();
        assert!(matches!(table.push(extra), Err(Error::CapacityExceeded { active: 3, max: 3 })));
    }

    #[test]
    fn test_admit_rejects_without_taking_the_session() {
        let (mut table, mut ids) = table_with_calls(&["c1"]);
        table.capacity = 3;
        let extra = Session::create(SessionMode::Gateway, 3, Direction::Inbound, &mut ids).unwrap();
        assert!(matches!(table.admit(&extra), Err(Error::CapacityExceeded { active: 3, max: 3 })));
        assert_eq!(table.len(), 3);

        // still ours to release
        let in_use = ids.in_use();
        ids.release(extra.id()).unwrap();
        assert_eq!(ids.in_use(), in_use - 1);

        table.capacity = 4;
        let late = Session::create(SessionMode::Gateway, 3, Direction::Inbound, &mut ids).unwrap();
        table.admit(&late).unwrap();
        assert_eq!(table.insert(late), 3);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_find_by_call_id_skips_closed() {
        let (mut table, _ids) = table_with_calls(&["a", "b"]);
        let b = CallId::new("b").unwrap();
        assert_eq!(table.find_by_call_id(&b), Some(3));

        table.slots[3].descriptor.close();
        assert_eq!(table.find_by_call_id(&b), Some(4));
        table.slots[4].descriptor.close();
        assert_eq!(table.find_by_call_id(&b), None);
    }

    #[test]
    fn test_compaction_shifts_and_reindexes() {
        let (mut table, _ids) = table_with_calls(&["a", "b", "c"]);
        // close call "a" (slots 1, 2)
        table.slots[1].descriptor.close();
        table.slots[2].descriptor.close();

        let mut seen = Vec::new();
        let removed = table.compact(|t, i| seen.push(t.get(i).unwrap().id()));
        assert_eq!(removed, 2);
        assert_eq!(table.len(), 5);
        assert!(seen.is_empty());
        assert!(table.is_consistent());

        let order: Vec<&str> = table
            .sessions()
            .skip(1)
            .map(|s| s.call_id().unwrap().as_str())
            .collect();
        assert_eq!(order, ["b", "b", "c", "c"]);
    }

    #[test]
    fn test_compaction_dispatches_readable() {
        let (mut table, _ids) = table_with_calls(&["a", "b"]);
        table.slots[2].descriptor.close();
        table.slots[4].descriptor.readable = true;

        let mut seen = Vec::new();
        table.compact(|t, i| {
            assert_eq!(t.get(i).unwrap().table_index(), i);
            seen.push(i);
        });
        assert_eq!(seen, [3]);
        assert!(!table.descriptor(3).unwrap().is_readable());
    }

    #[test]
    fn test_dispatch_may_close_later_slots() {
        let (mut table, _ids) = table_with_calls(&["a", "b"]);
        table.slots[1].descriptor.readable = true;
        let removed = table.compact(|t, _| {
            t.slots[3].descriptor.close();
            t.slots[4].descriptor.close();
        });
        assert_eq!(removed, 2);
        assert_eq!(table.len(), 3);
    }
}
