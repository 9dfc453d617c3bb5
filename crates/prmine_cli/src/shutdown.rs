use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use console::Term;

/// Install the Ctrl+C handler and return the flag it sets.
///
/// The first Ctrl+C requests a graceful stop; the harvest abandons
/// in-flight repositories, keeps what already finished, and flushes
/// the CSV. A second Ctrl+C force quits with the conventional 130
/// exit code.
pub(crate) fn install() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, saving collected rows...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, saving collected rows");
        }

        handler_flag.store(true, Ordering::SeqCst);

        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install second Ctrl+C handler");

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });

    flag
}
