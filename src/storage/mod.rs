pub mod buffer;
pub mod page;
pub mod pagemgr;
