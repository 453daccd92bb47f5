//! Timer Drivers

pub mod pit;

pub use pit::init as init_pit;
