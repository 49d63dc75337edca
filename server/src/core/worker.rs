//! Worker pool. Handles synchronous tasks with 3 priority levels,
//! configurable worker threads. Script execution and zip packing run
//! here so the async reactor never blocks.

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use std::{sync::Arc, thread};

use crate::prelude::*;

#[derive(Clone, Copy, Debug)]
pub enum Priority {
	High,
	Medium,
	Low,
}

#[derive(Debug)]
pub struct WorkerPool {
	tx_high: Sender<Box<dyn FnOnce() + Send>>,
	tx_med: Sender<Box<dyn FnOnce() + Send>>,
	tx_low: Sender<Box<dyn FnOnce() + Send>>,
}

impl WorkerPool {
	pub fn new(n1: usize, n2: usize, n3: usize) -> Self {
		let (tx_high, rx_high) = flume::unbounded();
		let (tx_med, rx_med) = flume::unbounded();
		let (tx_low, rx_low) = flume::unbounded();

		let rx_high = Arc::new(rx_high);
		let rx_med = Arc::new(rx_med);
		let rx_low = Arc::new(rx_low);

		// Workers dedicated to High only
		for _ in 0..n1 {
			let rx_high = Arc::clone(&rx_high);
			thread::spawn(move || worker_loop(vec![rx_high]));
		}

		// Workers for High + Medium
		for _ in 0..n2 {
			let rx_high = Arc::clone(&rx_high);
			let rx_med = Arc::clone(&rx_med);
			thread::spawn(move || worker_loop(vec![rx_high, rx_med]));
		}

		// Workers for High + Medium + Low
		for _ in 0..n3 {
			let rx_high = Arc::clone(&rx_high);
			let rx_med = Arc::clone(&rx_med);
			let rx_low = Arc::clone(&rx_low);
			thread::spawn(move || worker_loop(vec![rx_high, rx_med, rx_low]));
		}

		Self { tx_high, tx_med, tx_low }
	}

	/// Submit a closure → returns a Future for the result.
	pub fn spawn<F, T>(
		&self,
		priority: Priority,
		f: F,
	) -> impl std::future::Future<Output = WrResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (res_tx, res_rx) = oneshot::channel();

		let job = Box::new(move || {
			let result = f();
			let _ = res_tx.send(result);
		});

		let tx = match priority {
			Priority::High => &self.tx_high,
			Priority::Medium => &self.tx_med,
			Priority::Low => &self.tx_low,
		};
		if tx.send(job).is_err() {
			error!("Failed to send job to {:?} priority worker queue", priority);
		}

		async move {
			res_rx
				.await
				.map_err(|_| Error::Internal("worker pool lost result".into()))
		}
	}

	pub fn run<F, T>(&self, f: F) -> impl std::future::Future<Output = WrResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		self.spawn(Priority::Medium, f)
	}
}

fn worker_loop(receivers: Vec<Arc<Receiver<Box<dyn FnOnce() + Send>>>>) {
	loop {
		// Drain higher priority queues first without blocking
		let mut did_work = false;
		for rx in &receivers {
			if let Ok(job) = rx.try_recv() {
				job();
				did_work = true;
				break;
			}
		}
		if did_work {
			continue;
		}

		// All queues empty: block on the last (widest) queue
		let Some(rx) = receivers.last() else { return };
		match rx.recv() {
			Ok(job) => job(),
			Err(_) => return, // pool dropped
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spawned_job_returns_result() {
		let pool = WorkerPool::new(1, 1, 1);
		let res = pool.spawn(Priority::High, || 21 * 2).await.unwrap();
		assert_eq!(res, 42);
	}

	#[tokio::test]
	async fn many_jobs_complete() {
		let pool = Arc::new(WorkerPool::new(1, 2, 1));
		let futs: Vec<_> = (0..64).map(|i| pool.spawn(Priority::Medium, move || i * i)).collect();
		for (i, fut) in futs.into_iter().enumerate() {
			assert_eq!(fut.await.unwrap(), i * i);
		}
	}
}

// vim: ts=4
