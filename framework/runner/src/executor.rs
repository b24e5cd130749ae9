use std::future::Future;

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime) -> Self {
        Self { runtime }
    }

    /// Run async code in place, blocking the calling virtual user until it completes.
    ///
    /// The future is not cancelled when the run is stopped or the user is retired. Both only take
    /// effect between iterations, so a request that has been sent always gets its outcome
    /// recorded. Use the request timeout to bound how long a call can take.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }
}
