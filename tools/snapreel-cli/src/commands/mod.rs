pub mod check;
pub mod devices;
pub mod merge;
pub mod monitors;
pub mod record;
