// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
#![deny(dead_code, unused_imports)]

use std::sync::Mutex;

type ReleaseAction = Box<dyn FnOnce() + Send + 'static>;

/// An ordered stack of cleanup actions for resources acquired one after another.
///
/// Actions run in reverse order of acquisition. A stack that is dropped before being
/// handed off with [ReleaseStack::into_release] runs every action it holds, so an early
/// return part-way through a setup sequence rolls back whatever had been acquired so far.
#[derive(Default)]
pub struct ReleaseStack {
  actions: Vec<(&'static str, ReleaseAction)>,
}

impl ReleaseStack {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a freshly acquired resource along with the action that releases it
  pub fn push<F>(&mut self, label: &'static str, action: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.actions.push((label, Box::new(action)));
  }

  /// Labels of the held resources, in acquisition order
  pub fn labels(&self) -> Vec<&'static str> {
    self.actions.iter().map(|(label, _)| *label).collect()
  }

  /// Runs every held action now, newest first
  pub fn unwind(mut self) {
    self.run();
  }

  /// Disarms the stack, moving its actions into a [Release] handle owned by the caller
  pub fn into_release(mut self) -> Release {
    let actions = std::mem::take(&mut self.actions);
    Release {
      pending: Mutex::new(Some(ReleaseStack { actions })),
    }
  }

  fn run(&mut self) {
    while let Some((label, action)) = self.actions.pop() {
      tracing::trace!(resource = label, "releasing");
      action();
    }
  }
}

impl Drop for ReleaseStack {
  fn drop(&mut self) {
    self.run();
  }
}

impl std::fmt::Debug for ReleaseStack {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ReleaseStack")
      .field("resources", &self.labels())
      .finish()
  }
}

/// Teardown handle for a completed acquisition sequence.
///
/// The first call to [Release::release] runs the actions in reverse acquisition order;
/// later calls, from any thread, do nothing. A handle dropped without being released
/// releases its resources as it goes.
pub struct Release {
  pending: Mutex<Option<ReleaseStack>>,
}

impl Release {
  pub fn release(&self) {
    let pending = match self.pending.lock() {
      Ok(mut guard) => guard.take(),
      Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(stack) = pending {
      stack.unwind();
    }
  }

  pub fn is_released(&self) -> bool {
    match self.pending.lock() {
      Ok(guard) => guard.is_none(),
      Err(poisoned) => poisoned.into_inner().is_none(),
    }
  }
}

impl std::fmt::Debug for Release {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Release")
      .field("released", &self.is_released())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::ReleaseStack;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  };

  fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, move |label| sink.lock().unwrap().push(label))
  }

  #[test]
  fn dropped_stack_unwinds_newest_first() {
    let (log, record) = recorder();
    {
      let mut stack = ReleaseStack::new();
      let r = record.clone();
      stack.push("user", move || r("user"));
      let r = record.clone();
      stack.push("resource", move || r("resource"));
      assert_eq!(stack.labels(), vec!["user", "resource"]);
    }
    assert_eq!(*log.lock().unwrap(), vec!["resource", "user"]);
  }

  #[test]
  fn handed_off_stack_waits_for_release() {
    let (log, record) = recorder();
    let mut stack = ReleaseStack::new();
    let r = record.clone();
    stack.push("user", move || r("user"));
    let r = record;
    stack.push("resource", move || r("resource"));
    let release = stack.into_release();
    assert!(
      log.lock().unwrap().is_empty(),
      "Handing off must not run any action"
    );
    assert!(!release.is_released());
    release.release();
    assert!(release.is_released());
    assert_eq!(*log.lock().unwrap(), vec!["resource", "user"]);
  }

  #[test]
  fn release_runs_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut stack = ReleaseStack::new();
    let c = count.clone();
    stack.push("only", move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    let release = stack.into_release();
    release.release();
    release.release();
    drop(release);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn concurrent_release_runs_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut stack = ReleaseStack::new();
    let c = count.clone();
    stack.push("only", move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    let release = Arc::new(stack.into_release());
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let release = release.clone();
        std::thread::spawn(move || release.release())
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn dropping_unreleased_handle_releases() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut stack = ReleaseStack::new();
    let c = count.clone();
    stack.push("only", move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    drop(stack.into_release());
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
