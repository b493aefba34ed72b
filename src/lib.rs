pub mod ink;
pub mod logging;
