pub mod flow_record;

pub use flow_record::*;
