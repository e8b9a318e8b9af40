pub mod dump;
pub mod row;
