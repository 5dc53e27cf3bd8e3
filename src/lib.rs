use std::fmt::Debug;

use log::error;

pub use bot::*;
pub use config::*;

pub mod args;
pub mod books;
mod bot;
pub mod commands;
mod config;
pub mod dice;
pub mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub trait LogUtil<T> {
    fn report_on_error(self) -> Option<T>;
}

impl<R, E: Debug> LogUtil<R> for Result<R, E> {
    fn report_on_error(self) -> Option<R> {
        match self {
            Ok(v) => Some(v),
            Err(err) => {
                error!("{:?}", err);
                None
            }
        }
    }
}
