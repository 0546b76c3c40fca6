pub mod reading;
pub mod record;

pub use reading::{Category, Readings};
pub use record::ResultRecord;
