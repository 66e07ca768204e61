pub mod events;
pub mod funnels;
