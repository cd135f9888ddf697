pub mod alerts;
pub mod book;
pub mod instrument;
pub mod tape;
pub mod types;
