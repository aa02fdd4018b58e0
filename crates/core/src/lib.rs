pub mod config;
pub mod error;
pub mod event;
pub mod observation;
pub mod shrink_config;

pub use config::{ScanConfig, ScanParams};
pub use error::*;
pub use event::*;
pub use observation::*;
pub use shrink_config::{validate_passes, ShrinkConfigDocument};
