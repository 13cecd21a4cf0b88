pub mod filters;
pub mod text;
