// Domain layer - Time-keyed tables, alignment, merge and decimation
pub mod align;
pub mod channel;
pub mod decimate;
pub mod error;
pub mod merge;
pub mod table;
pub mod timestamp;
