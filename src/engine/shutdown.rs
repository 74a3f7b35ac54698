use super::shuffle::remove_root;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::path::PathBuf;
use std::thread;
use tracing::error;

/// Installed SIGINT/SIGTERM handler that removes the shuffle store
///
/// While the guard is alive, an interrupt removes the store root and exits the
/// process (130 for SIGINT, 143 for SIGTERM). Dropping the guard uninstalls the
/// handler; call it once the job has finished normally.
pub struct TeardownGuard {
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl TeardownGuard {
    pub fn install(shuffle_root: PathBuf) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("mapshuffle-teardown".to_string())
            .spawn(move || {
                #[allow(clippy::never_loop)]
                for sig in signals.forever() {
                    error!("Emergency shutdown! (signal {})", sig);
                    remove_root(&shuffle_root);
                    std::process::exit(exit_code(sig));
                }
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn exit_code(sig: i32) -> i32 {
    match sig {
        SIGINT => 130,
        SIGTERM => 143,
        other => 128 + other,
    }
}
