// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity provisioning and version reporting for the STM32MP1 and iMX8X
//! starter kits.

pub mod args;
pub mod error;
pub mod mac;
pub mod reporter;
pub mod store;
pub mod tool;
pub mod version;

pub use error::{Error, Result, ToolError};

/// Sets up `env_logger` from `RUST_LOG`, defaulting to `info`. `chatty`
/// lists targets to force down to debug level.
pub fn init_logging(chatty: &[&str]) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    for &target in chatty {
        builder.filter(Some(target), log::LevelFilter::Debug);
    }
    builder.init();
}
