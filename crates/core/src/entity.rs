//! Entity trait: marketplace records that keep their identity while their
//! settings change (stores, commission reports).

use core::fmt::{Debug, Display};
use core::hash::Hash;

pub trait Entity {
    type Id: Clone + Eq + Hash + Debug + Display;

    /// Record kind used in log lines, e.g. `"store"`.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    /// `"<kind> <id>"`.
    fn label(&self) -> String {
        format!("{} {}", Self::KIND, self.id())
    }
}
