pub mod alert;
pub mod resource;

pub use alert::*;
pub use resource::*;
