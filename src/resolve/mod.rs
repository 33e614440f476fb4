//! Entity resolution: turning free-text names from bank transactions into contact and cost centre
//! records from the snapshot.
//!
//! Resolvers are pure. They never fail for a missing match, they return `None` and leave it to the
//! caller to report the gap. Candidates are sorted by name and id when a resolver is constructed
//! so that "first match wins" does not depend on the order in which the snapshot was loaded.

mod contact;
mod cost_centre;

pub use contact::ContactResolver;
pub use cost_centre::CostCentreResolver;

use std::collections::BTreeMap;

/// Override mappings from a trigger phrase to a target name. They are evaluated in key order.
pub type Overrides = BTreeMap<String, String>;
