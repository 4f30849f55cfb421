pub mod health;
pub mod sensors;
pub mod system;
pub mod zones;
