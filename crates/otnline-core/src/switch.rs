//! Switch namespace the engine creates objects under

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::ids::SwitchId;

/// Answers whether a switch is known
pub trait SwitchDirectory: Send + Sync {
    fn contains(&self, switch: SwitchId) -> bool;
}

/// In-memory switch directory
#[derive(Debug, Default)]
pub struct StaticSwitches {
    known: RwLock<HashSet<SwitchId>>,
}

impl StaticSwitches {
    pub fn new(switches: impl IntoIterator<Item = SwitchId>) -> Self {
        Self {
            known: RwLock::new(switches.into_iter().collect()),
        }
    }

    pub fn insert(&self, switch: SwitchId) -> bool {
        self.known
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(switch)
    }

    pub fn remove(&self, switch: SwitchId) -> bool {
        self.known
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&switch)
    }
}

impl SwitchDirectory for StaticSwitches {
    fn contains(&self, switch: SwitchId) -> bool {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&switch)
    }
}
