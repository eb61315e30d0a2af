// SPDX-License-Identifier: MIT

use core::fmt;

/// Pool state recorded in each label (`state` key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum PoolState {
    Active = 0,
    Exported = 1,
    Destroyed = 2,
    /// Reserved hot spare
    Spare = 3,
    /// Level 2 ARC device
    L2Cache = 4,
}

impl PoolState {
    pub fn from_raw(raw: u64) -> Option<Self> {
        Some(match raw {
            0 => PoolState::Active,
            1 => PoolState::Exported,
            2 => PoolState::Destroyed,
            3 => PoolState::Spare,
            4 => PoolState::L2Cache,
            _ => return None,
        })
    }

    /// Spare and cache vdevs never sync a txg into their label.
    #[inline]
    pub fn allows_zero_txg(self) -> bool {
        matches!(self, PoolState::Spare | PoolState::L2Cache)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoolState::Active => "ACTIVE",
            PoolState::Exported => "EXPORTED",
            PoolState::Destroyed => "DESTROYED",
            PoolState::Spare => "SPARE",
            PoolState::L2Cache => "L2CACHE",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three values that decide whether a label is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelVitals {
    pub guid: u64,
    /// Raw `state`, `None` when the key is absent
    pub state: Option<u64>,
    pub txg: u64,
}

impl LabelVitals {
    #[inline]
    pub fn pool_state(&self) -> Option<PoolState> {
        self.state.and_then(PoolState::from_raw)
    }

    /// Genuine iff the device guid is set, the state is known, and either a txg
    /// was synced or the vdev is a spare/cache device.
    pub fn is_genuine(&self) -> bool {
        match self.pool_state() {
            Some(state) => self.guid != 0 && (state.allows_zero_txg() || self.txg > 0),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals(guid: u64, state: u64, txg: u64) -> LabelVitals {
        LabelVitals {
            guid,
            state: Some(state),
            txg,
        }
    }

    #[test]
    fn active_needs_a_txg() {
        assert!(vitals(7, 0, 4).is_genuine());
        assert!(!vitals(7, 0, 0).is_genuine());
        assert!(!vitals(7, 1, 0).is_genuine());
        assert!(!vitals(7, 2, 0).is_genuine());
    }

    #[test]
    fn spare_and_cache_accept_zero_txg() {
        assert!(vitals(7, 3, 0).is_genuine());
        assert!(vitals(7, 4, 0).is_genuine());
    }

    #[test]
    fn guid_and_state_are_required() {
        assert!(!vitals(0, 0, 10).is_genuine());
        assert!(!vitals(0, 4, 0).is_genuine());
        assert!(!vitals(7, 5, 10).is_genuine());
        assert!(!vitals(7, u64::MAX, 10).is_genuine());
        assert!(
            !LabelVitals {
                guid: 7,
                state: None,
                txg: 10
            }
            .is_genuine()
        );
    }

    #[test]
    fn state_names() {
        assert_eq!(PoolState::from_raw(4), Some(PoolState::L2Cache));
        assert_eq!(PoolState::from_raw(5), None);
        assert_eq!(format!("{}", PoolState::Spare), "SPARE");
    }
}
