#[macro_use]
extern crate log;

use crossbeam::channel::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use pinger::{cli::App, summary::Summary, LogListener, Pinger};

fn main() {
    let options = match App::parse_args() {
        Ok(options) => options,
        Err(e) => {
            error!("Could not parse provided argument: {}", e);
            std::process::exit(1);
        }
    };

    trace!("Set up new pinger");

    let pinger = Pinger::new();
    let summary = Arc::new(Summary::new());
    pinger.set_listener(LogListener);
    pinger.add_listener(summary.clone());

    let (interrupt, interrupted) = channel::bounded(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt.try_send(());
    }) {
        error!("Could not install signal handler: {}", e);
        std::process::exit(1);
    }

    for config in options.configs {
        let id = pinger.start_config(config);
        trace!("Started session {}", id);
    }

    // Run until Ctrl + C, or until every session gave up on its own
    loop {
        match interrupted.recv_timeout(Duration::from_millis(200)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                println!();
                trace!("Registered signal interrupt -- Signalling shut down to sessions");
                break;
            }
            Err(RecvTimeoutError::Timeout) if pinger.active() == 0 => {
                warn!("No session left running");
                break;
            }
            Err(RecvTimeoutError::Timeout) => (),
        }
    }

    pinger.shutdown();

    trace!("Successfully shut down all sessions");

    summary.tally();

    trace!("Shutting down...");
}
