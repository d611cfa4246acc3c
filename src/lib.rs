pub mod command;
pub mod config;
pub mod hardware;
pub mod monitor;
#[cfg(feature = "pi")]
pub mod pi;
pub mod relay;
pub mod supervisor;

#[cfg(test)]
mod sim;

pub mod prelude {
    pub use crate::{
        command::*, config::*, hardware::*, monitor::*, relay::*, supervisor::*,
    };
}
