use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag. Workers stop picking up mutants once it is set and
/// kill an in-flight test process; restoration still runs.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Route Ctrl-C to this flag instead of terminating the process.
    /// The handler can only be installed once per process.
    pub fn install_ctrlc(&self) -> Result<(), String> {
        static INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let flag = Arc::clone(&self.flag);
        INIT.get_or_init(move || {
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
            })
            .map_err(|e| e.to_string())
        })
        .clone()
    }
}
