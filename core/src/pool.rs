use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;

/// Bounded pool of tokio tasks. At most `workers` submitted jobs run at once.
pub struct TaskPool {
    sem: Arc<Semaphore>,
    workers: usize,
}

impl Clone for TaskPool {
    fn clone(&self) -> Self { TaskPool { sem: self.sem.clone(), workers: self.workers } }
}

impl TaskPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        TaskPool { sem: Arc::new(Semaphore::new(workers)), workers }
    }

    pub fn workers(&self) -> usize { self.workers }

    /// Run `job` for every input and wait for all of them.
    ///
    /// Results come back in completion order, paired with their input. A job
    /// that panics yields its `JoinError` in place of a result.
    pub async fn run_all<T, R, F, Fut>(&self, inputs: impl IntoIterator<Item = T>, job: F) -> Vec<(T, Result<R, JoinError>)>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let inputs: Vec<T> = inputs.into_iter().collect();
        let (tx, mut rx) = mpsc::channel::<(T, Result<R, JoinError>)>(inputs.len().max(1));

        for input in inputs {
            let tx = tx.clone();
            let sem = self.sem.clone();
            let fut = job(input.clone());
            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else { return; };
                let out = tokio::spawn(fut).await;
                let _ = tx.send((input, out)).await;
            });
        }
        drop(tx);

        let mut done = Vec::new();
        while let Some(pair) = rx.recv().await {
            done.push(pair);
        }
        done
    }
}
