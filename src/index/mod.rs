//! Persistent skip-list index laid out across the pages of one file.

pub mod header;
pub mod key;
pub mod layout;
pub mod locate;
pub mod mutate;
pub mod plan;
pub mod predicate;
pub mod record;
pub mod scan;
pub mod skip_index;

#[cfg(test)]
mod unit_tests;
