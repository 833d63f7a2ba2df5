//! fwport data model: change-set identity and porting units.

pub mod commit;
pub mod types;
pub mod unit;
