//! External service integrations.

pub mod narrative {
    pub use crate::narrative::*;
}

pub mod services {
    pub use crate::services::*;
}
