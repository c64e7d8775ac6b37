//! Option series and the pool's bounded registry of active series

use std::collections::BTreeMap;

use amm_model::OptionStyle;
use serde::{Deserialize, Serialize};

use crate::{AmmError, Result};

/// Hard cap on simultaneously active series
pub const MAX_SERIES: usize = 100;

/// Identifier assigned by the series controller
pub type SeriesId = u64;

/// Immutable terms of an option series
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,

    /// Strike in price-feed units
    pub strike_price: u128,

    /// Expiration as unix seconds
    pub expiration: u64,

    pub style: OptionStyle,
}

/// One of the two complementary tokens of a series
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    /// Holder's claim on the payoff
    BToken,
    /// Writer's claim on the remaining collateral
    WToken,
}

impl Leg {
    pub fn opposite(self) -> Leg {
        match self {
            Leg::BToken => Leg::WToken,
            Leg::WToken => Leg::BToken,
        }
    }
}

/// Option tokens held by the pool for one series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Residuals {
    pub b_token: u128,
    pub w_token: u128,
}

impl Residuals {
    pub fn get(&self, leg: Leg) -> u128 {
        match leg {
            Leg::BToken => self.b_token,
            Leg::WToken => self.w_token,
        }
    }

    pub fn get_mut(&mut self, leg: Leg) -> &mut u128 {
        match leg {
            Leg::BToken => &mut self.b_token,
            Leg::WToken => &mut self.w_token,
        }
    }

    /// Matched bToken/wToken pairs that can be redeemed at par
    pub fn matched_pairs(&self) -> u128 {
        self.b_token.min(self.w_token)
    }

    pub fn is_empty(&self) -> bool {
        self.b_token == 0 && self.w_token == 0
    }
}

/// Pool-side state of an active series
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeriesState {
    pub series: Series,
    pub residuals: Residuals,
}

impl SeriesState {
    pub fn new(series: Series) -> Self {
        Self { series, residuals: Residuals::default() }
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
struct Slot {
    entry: SeriesState,
    prev: Option<u16>,
    next: Option<u16>,
}

/// Fixed-capacity arena of active series
///
/// Slots are recycled through a free list. Live slots are threaded into a
/// doubly linked list in insertion order, so removal anywhere is O(1) and
/// iteration order never changes for the survivors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesRegistry {
    slots: Vec<Option<Slot>>,
    free: Vec<u16>,
    head: Option<u16>,
    tail: Option<u16>,
    index: BTreeMap<SeriesId, u16>,
}

impl Default for SeriesRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_SERIES],
            // Popped from the back, so slot 0 is handed out first
            free: (0..MAX_SERIES as u16).rev().collect(),
            head: None,
            tail: None,
            index: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: SeriesId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: SeriesId) -> Option<&SeriesState> {
        let slot = *self.index.get(&id)?;
        self.slots[slot as usize].as_ref().map(|s| &s.entry)
    }

    pub fn get_mut(&mut self, id: SeriesId) -> Option<&mut SeriesState> {
        let slot = *self.index.get(&id)?;
        self.slots[slot as usize].as_mut().map(|s| &mut s.entry)
    }

    /// Append a series at the end of the iteration order
    ///
    /// # Errors
    /// * `InvalidSeries` if the id is already active
    /// * `TooManySeries` if `capacity` (clamped to MAX_SERIES) is reached
    pub fn insert(&mut self, entry: SeriesState, capacity: usize) -> Result<()> {
        if self.contains(entry.series.id) {
            return Err(AmmError::InvalidSeries);
        }
        if self.len() >= capacity.min(MAX_SERIES) {
            return Err(AmmError::TooManySeries);
        }
        let slot = self.free.pop().ok_or(AmmError::TooManySeries)?;

        self.slots[slot as usize] = Some(Slot { entry, prev: self.tail, next: None });
        match self.tail {
            Some(tail) => self.link_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(entry.series.id, slot);
        Ok(())
    }

    /// Remove a series, returning its final state
    pub fn remove(&mut self, id: SeriesId) -> Option<SeriesState> {
        let slot = self.index.remove(&id)?;
        let removed = self.slots[slot as usize].take()?;

        match removed.prev {
            Some(prev) => self.link_mut(prev).next = removed.next,
            None => self.head = removed.next,
        }
        match removed.next {
            Some(next) => self.link_mut(next).prev = removed.prev,
            None => self.tail = removed.prev,
        }
        self.free.push(slot);
        Some(removed.entry)
    }

    fn link_mut(&mut self, slot: u16) -> &mut Slot {
        match self.slots[slot as usize].as_mut() {
            Some(s) => s,
            None => unreachable!("linked slot {} is vacant", slot),
        }
    }

    /// Active series in insertion order
    pub fn iter(&self) -> Iter<'_> {
        Iter { registry: self, cursor: self.head }
    }

    pub fn ids(&self) -> Vec<SeriesId> {
        self.iter().map(|s| s.series.id).collect()
    }
}

pub struct Iter<'a> {
    registry: &'a SeriesRegistry,
    cursor: Option<u16>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a SeriesState;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.registry.slots[self.cursor? as usize].as_ref()?;
        self.cursor = slot.next;
        Some(&slot.entry)
    }
}
