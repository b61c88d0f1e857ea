use std::collections::{HashMap, VecDeque};

use glam::{Quat, Vec3};

/// 64-bit opaque entity handle. Zero is reserved as "none".
pub type EntityId = u64;

pub const ENTITY_ID_NONE: EntityId = 0;

/// The network-visible subset of an entity's state: everything replication carries.
/// Entities without a network identity never produce one of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub animation_state: u8,
    pub state_flags: u8,
}

impl Entity {
    pub fn new(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            animation_state: 0,
            state_flags: 0,
        }
    }
}

/// Host collaborator: entity lifetime and lookup. The component set this core
/// cares about (transform, network identity, animation state) is small and fixed,
/// so entities are a flat struct rather than a generic per-(id, component-type)
/// dictionary.
pub trait EntityStore {
    fn create(&mut self, name: &str, position: Vec3) -> EntityId;
    fn destroy(&mut self, id: EntityId);
    fn get(&self, id: EntityId) -> Option<&Entity>;
    fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity>;
    fn iter(&self) -> Box<dyn Iterator<Item = &Entity> + '_>;
}

/// A minimal in-memory entity table for hosts that don't bring their own ECS.
#[derive(Debug, Default)]
pub struct SimpleEntityStore {
    entities: HashMap<EntityId, Entity>,
    names: HashMap<EntityId, String>,
    next_id: EntityId,
}

impl EntityStore for SimpleEntityStore {
    fn create(&mut self, name: &str, position: Vec3) -> EntityId {
        self.next_id += 1;
        let id = self.next_id;
        self.entities.insert(id, Entity::new(id, position));
        self.names.insert(id, name.to_string());
        id
    }

    fn destroy(&mut self, id: EntityId) {
        self.entities.remove(&id);
        self.names.remove(&id);
    }

    fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Entity> + '_> {
        Box::new(self.entities.values())
    }
}

impl SimpleEntityStore {
    pub fn name_of(&self, id: EntityId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

/// One timestamped sample of a remote entity's state, as received in an
/// `EntitySnapshot`. `wall_ms` is derived locally from the synced server-time
/// offset, not carried on the wire (see the interpolation design decision in
/// DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct EntitySnapshotSample {
    pub server_tick: u32,
    pub wall_ms: i64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub animation_state: u8,
}

pub const SNAPSHOT_RING_CAPACITY: usize = 10;

/// Bounded FIFO ring of snapshots kept per remote entity for interpolation.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRing {
    samples: VecDeque<EntitySnapshotSample>,
}

impl SnapshotRing {
    pub fn push(&mut self, sample: EntitySnapshotSample) {
        if self.samples.len() >= SNAPSHOT_RING_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshotSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&EntitySnapshotSample> {
        self.samples.back()
    }

    pub fn earliest(&self) -> Option<&EntitySnapshotSample> {
        self.samples.front()
    }

    /// Finds the bracketing pair `(sᵢ, sᵢ₊₁)` such that `sᵢ.wall_ms <= t <= sᵢ₊₁.wall_ms`.
    pub fn bracket(&self, wall_ms: i64) -> Option<(&EntitySnapshotSample, &EntitySnapshotSample)> {
        for window in self.samples.as_slices().0.windows(2) {
            if window[0].wall_ms <= wall_ms && wall_ms <= window[1].wall_ms {
                return Some((&window[0], &window[1]));
            }
        }
        // VecDeque::as_slices can split the buffer; fall back to a plain scan.
        let contiguous: Vec<&EntitySnapshotSample> = self.samples.iter().collect();
        for pair in contiguous.windows(2) {
            if pair[0].wall_ms <= wall_ms && wall_ms <= pair[1].wall_ms {
                return Some((pair[0], pair[1]));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_entity_store_creates_and_destroys() {
        let mut store = SimpleEntityStore::default();
        let id = store.create("Player:steve", Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(store.get(id).unwrap().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(store.name_of(id), Some("Player:steve"));
        store.destroy(id);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn ring_drops_oldest_beyond_capacity() {
        let mut ring = SnapshotRing::default();
        for tick in 0..(SNAPSHOT_RING_CAPACITY as u32 + 5) {
            ring.push(EntitySnapshotSample {
                server_tick: tick,
                wall_ms: tick as i64,
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                animation_state: 0,
            });
        }
        assert_eq!(ring.len(), SNAPSHOT_RING_CAPACITY);
        assert_eq!(ring.earliest().unwrap().server_tick, 5);
    }

    #[test]
    fn bracket_finds_surrounding_pair() {
        let mut ring = SnapshotRing::default();
        ring.push(EntitySnapshotSample {
            server_tick: 10,
            wall_ms: 1000,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            animation_state: 0,
        });
        ring.push(EntitySnapshotSample {
            server_tick: 20,
            wall_ms: 2000,
            position: Vec3::new(10.0, 0.0, 0.0),
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            animation_state: 0,
        });
        let (a, b) = ring.bracket(1400).expect("bracket found");
        assert_eq!(a.server_tick, 10);
        assert_eq!(b.server_tick, 20);
    }
}
