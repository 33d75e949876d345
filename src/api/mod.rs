pub mod sheets;
pub mod youtube;
