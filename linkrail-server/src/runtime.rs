//! Thread-per-core execution (spec §5 "one `monoio` runtime per OS thread,
//! no work stealing"), ported from `monolake::runtimes::{Runtimes,
//! RuntimeWrapper}`. Simplified by dropping `RuntimeConfig`'s file-loaded
//! fields (`entries`, `sqpoll_idle`, `cpu_affinity`) down to a plain worker
//! count, since external configuration loading is out of scope here -- a
//! caller embedding the facade picks its worker count directly.
use std::{future::Future, thread};

use monoio::{time::TimeDriver, LegacyDriver, Runtime, RuntimeBuilder};

#[cfg(target_os = "linux")]
use monoio::IoUringDriver;

enum RuntimeWrapper {
    #[cfg(target_os = "linux")]
    IoUring(Runtime<TimeDriver<IoUringDriver>>),
    Legacy(Runtime<TimeDriver<LegacyDriver>>),
}

impl RuntimeWrapper {
    fn build() -> Self {
        #[cfg(target_os = "linux")]
        {
            if let Ok(runtime) = RuntimeBuilder::<IoUringDriver>::new().enable_timer().build() {
                return RuntimeWrapper::IoUring(runtime);
            }
        }
        let runtime = RuntimeBuilder::<LegacyDriver>::new()
            .enable_timer()
            .build()
            .expect("failed to build a monoio runtime");
        RuntimeWrapper::Legacy(runtime)
    }

    fn exec<F: Future>(&mut self, future: F) -> F::Output {
        match self {
            #[cfg(target_os = "linux")]
            RuntimeWrapper::IoUring(rt) => rt.block_on(future),
            RuntimeWrapper::Legacy(rt) => rt.block_on(future),
        }
    }
}

/// Spawns `workers` OS threads, each running its own `monoio` runtime and
/// its own clone of `make_server`'s future. `make_server` is called once
/// per thread (inside that thread) so that whatever it captures -- an
/// `Rc`-based router, a non-`Send` listener -- never crosses a thread
/// boundary.
pub fn run_per_core<F, Fut>(workers: usize, make_server: F)
where
    F: Fn() -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let handles: Vec<_> = (0..workers.max(1))
        .map(|_| {
            let make_server = make_server.clone();
            thread::spawn(move || {
                let mut runtime = RuntimeWrapper::build();
                runtime.exec(make_server())
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
}
