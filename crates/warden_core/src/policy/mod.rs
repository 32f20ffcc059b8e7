pub mod access;
pub mod pause;

pub use access::AccessControl;
pub use pause::PauseSwitch;
