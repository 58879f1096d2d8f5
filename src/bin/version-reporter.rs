// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use ssk_provision::args::ReporterArgs;
use ssk_provision::reporter::{self, Announcement, Responder};
use ssk_provision::store::Tpm2Store;
use ssk_provision::tool::SystemRunner;
use ssk_provision::version;
use ssk_provision::Error;

fn main() -> Result<()> {
    let args = ReporterArgs::parse();

    // Reject bad credential combinations as usage errors (exit status 2)
    // before anything else happens.
    let settings = args.connection().unwrap_or_else(|e| {
        let msg = match e {
            Error::BadArguments(msg) => msg,
            other => other.to_string(),
        };
        ReporterArgs::command()
            .error(ErrorKind::ArgumentConflict, msg)
            .exit()
    });

    let chatty: &[&str] = if args.verbose { &["rumqttc"] } else { &[] };
    ssk_provision::init_logging(chatty);
    log::info!("thing name: {}", args.thing_name);

    let store = Tpm2Store::read_only(SystemRunner, args.nv_slot());
    let bundle = version::snapshot(&store, &SystemRunner, &args.snapshot_config())
        .context("taking version snapshot")?;
    let responder = Responder::new(bundle);

    let announce = args.mode.publishes().then(|| Announcement {
        topic: args.topic.clone(),
        message: args.message.clone(),
    });

    if let Err(e) = reporter::run(&settings, args.mode, announce, &responder) {
        if let Error::Connection(reason) = &e {
            println!("mqtt error");
            log::error!("{reason}");
            std::process::exit(-1);
        }
        return Err(anyhow::Error::new(e).context("serving version queries"));
    }

    Ok(())
}
