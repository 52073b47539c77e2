use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared abort flag for a scan. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Cancels the token once `budget` has elapsed, unless the returned
    /// guard is dropped first.
    pub fn cancel_after(&self, budget: Duration) -> DeadlineGuard {
        let token = self.clone();
        let disarmed = Arc::new(AtomicBool::new(false));
        let watch = Arc::clone(&disarmed);
        thread::spawn(move || {
            let step = Duration::from_millis(50);
            let mut waited = Duration::ZERO;
            while waited < budget {
                if watch.load(Ordering::SeqCst) {
                    return;
                }
                let nap = step.min(budget - waited);
                thread::sleep(nap);
                waited += nap;
            }
            if !watch.load(Ordering::SeqCst) {
                tracing::warn!("scan exceeded {:?}, cancelling", budget);
                token.cancel();
            }
        });
        DeadlineGuard { disarmed }
    }

    /// Cancels the token on the first Ctrl-C so a scan can return what it
    /// has. A second Ctrl-C exits immediately.
    pub fn cancel_on_interrupt(&self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let token = self.clone();
        thread::Builder::new()
            .name("devdiary-interrupt".into())
            .spawn(move || {
                runtime.block_on(async move {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    tracing::warn!("interrupted, finishing with partial results");
                    token.cancel();
                    if tokio::signal::ctrl_c().await.is_ok() {
                        std::process::exit(130);
                    }
                });
            })?;
        Ok(())
    }
}

pub struct DeadlineGuard {
    disarmed: Arc<AtomicBool>,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.disarmed.store(true, Ordering::SeqCst);
    }
}
