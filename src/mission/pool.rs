//! Fixed-capacity, index-addressed entity pools.

use std::fmt;
use std::marker::PhantomData;

use crate::savegame::reference::PoolIndex;

pub const UNIT_CAPACITY: usize = 102;
pub const STRUCTURE_CAPACITY: usize = 82;
pub const TEAM_CAPACITY: usize = 16;
pub const HOUSE_COUNT: usize = 6;

macro_rules! pool_ref {
    ($name:ident, $capacity:expr, $pool:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u16);

        impl PoolIndex for $name {
            const CAPACITY: usize = $capacity;
            const POOL: &'static str = $pool;

            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                $name(index as u16)
            }
        }
    };
}

pool_ref!(UnitRef, UNIT_CAPACITY, "unit");
pool_ref!(StructureRef, STRUCTURE_CAPACITY, "structure");
pool_ref!(TeamRef, TEAM_CAPACITY, "team");

const HOUSE_NAMES: [&str; HOUSE_COUNT] = [
    "Harkonnen",
    "Atreides",
    "Ordos",
    "Fremen",
    "Sardaukar",
    "Mercenary",
];

/// House identity; also the index of the house slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HouseId(pub u8);

impl HouseId {
    pub const HARKONNEN: HouseId = HouseId(0);
    pub const ATREIDES: HouseId = HouseId(1);
    pub const ORDOS: HouseId = HouseId(2);

    /// House stored in a wider on-disk field. Values that do not fit a
    /// `u8` stay out of range instead of wrapping onto a real house.
    pub fn from_raw(raw: u32) -> HouseId {
        HouseId(u8::try_from(raw).unwrap_or(u8::MAX))
    }

    pub fn is_valid(self) -> bool {
        (self.0 as usize) < HOUSE_COUNT
    }
}

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match HOUSE_NAMES.get(self.0 as usize) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "house #{}", self.0),
        }
    }
}

impl PoolIndex for HouseId {
    const CAPACITY: usize = HOUSE_COUNT;
    const POOL: &'static str = "house";

    fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        HouseId(index as u8)
    }
}

/// Slots addressed by `R`, each empty or holding one `T`.
pub struct Pool<R, T> {
    slots: Vec<Option<T>>,
    _index: PhantomData<fn() -> R>,
}

impl<R: PoolIndex, T> Pool<R, T> {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(R::CAPACITY);
        slots.resize_with(R::CAPACITY, || None);
        Pool {
            slots,
            _index: PhantomData,
        }
    }

    pub fn get(&self, r: R) -> Option<&T> {
        self.slots.get(r.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, r: R) -> Option<&mut T> {
        self.slots.get_mut(r.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, r: R) -> bool {
        self.get(r).is_some()
    }

    /// Place `value` in slot `r`, returning what was there. Indices past
    /// the capacity are rejected and handed back.
    pub fn insert(&mut self, r: R, value: T) -> Result<Option<T>, T> {
        match self.slots.get_mut(r.index()) {
            Some(slot) => Ok(slot.replace(value)),
            None => Err(value),
        }
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (R, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|value| (R::from_index(i), value)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: PoolIndex, T> Default for Pool<R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, T: Clone> Clone for Pool<R, T> {
    fn clone(&self) -> Self {
        Pool {
            slots: self.slots.clone(),
            _index: PhantomData,
        }
    }
}

impl<R, T: PartialEq> PartialEq for Pool<R, T> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<R, T: Eq> Eq for Pool<R, T> {}

impl<R, T: fmt::Debug> fmt::Debug for Pool<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, slot)| slot.as_ref().map(|value| (i, value))),
            )
            .finish()
    }
}
