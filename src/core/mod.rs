// Domain-layer modules and shared errors/models
pub mod evaluation {
    pub use crate::evaluation::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod policy {
    pub use crate::policy::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod errors {
    pub use crate::errors::*;
}
