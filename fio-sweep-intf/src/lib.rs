// SPDX-License-Identifier: Apache-2.0
pub mod args;

pub use args::{Args, Mode};

lazy_static::lazy_static! {
    pub static ref VERSION: &'static str = env!("CARGO_PKG_VERSION");
}
