//! Value and column-type contracts shared by the codec, comparator and predicates.
//!
//! No IO and no dependencies on the index modules.

pub mod datatype;
pub mod value;
