pub mod geocoding;
pub mod local_guide;
pub mod places;
pub mod toolkit;

pub use toolkit::Toolkit;
