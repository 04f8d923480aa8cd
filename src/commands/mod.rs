pub mod apply;
pub mod database;
pub mod plan;
pub mod status;
