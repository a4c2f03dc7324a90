//! Every on-page byte offset and size the index uses.
//!
//! All multi-byte integers are little-endian.

use crate::storage::page::PAGE_SIZE;

// ---------------- page header (every block) ----------------
pub const HDR_KEY_COLUMNS: usize = 0; // i32
pub const HDR_UNIQUE: usize = 4; // u8
pub const HDR_FREE_OFFSET: usize = 5; // i32

// ---------------- block 0 only ----------------
pub const HDR_TOP_BLOCK: usize = 9; // i32
pub const HDR_TOP_OFFSET: usize = 13; // i32

pub const PAGE_HEADER_LEN: usize = 9;
pub const ROOT_HEADER_LEN: usize = 17;

/// First record byte in block 0.
pub const ROOT_RECORD_AREA: usize = ROOT_HEADER_LEN;
/// First record byte in every other block.
pub const RECORD_AREA: usize = PAGE_HEADER_LEN;

// ---------------- record type tags ----------------
pub const TAG_INTERNAL: u8 = 0;
pub const TAG_LEAF: u8 = 1;
pub const TAG_TOMBSTONE: u8 = 2;
pub const TAG_START: u8 = 3;

// ---------------- record fields (relative to record start) ----------------
pub const FIELD_TYPE: usize = 0;
pub const FIELD_PREV: usize = 1;
pub const FIELD_NEXT: usize = 9;
pub const FIELD_UP: usize = 17;
pub const FIELD_DOWN: usize = 25; // INTERNAL, START
pub const FIELD_RID: usize = 25; // LEAF, TOMBSTONE

pub const POINTER_LEN: usize = 8;
pub const RID_LEN: usize = 16;

pub const INTERNAL_HEADER_LEN: usize = FIELD_DOWN + POINTER_LEN; // 33
pub const LEAF_HEADER_LEN: usize = FIELD_RID + RID_LEN; // 41
pub const START_LEN: usize = FIELD_DOWN + POINTER_LEN; // 33

// ---------------- key column encoding ----------------
pub const KEY_NOT_NULL: u8 = 0;
pub const KEY_NULL: u8 = 1;

/// Largest record a non-root page can hold.
pub const MAX_RECORD_LEN: usize = PAGE_SIZE - RECORD_AREA;
