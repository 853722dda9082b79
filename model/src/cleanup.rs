/*!

Deferred deletion of cluster objects created by a test case.

Each step that creates an object registers its release action here at
creation time. The case runner runs the stack on every exit path, so a case
that fails halfway through still releases whatever it managed to create. When
the suite-wide cleanup flag is off the stack records nothing and created
objects are left behind for inspection.

!*/

use futures::future::BoxFuture;
use log::{info, warn};
use std::future::Future;

/// The result type for a release action. Boxed so that actions can come from
/// any layer (typed clients, plain `kube` calls, external commands).
pub type CleanupResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Action = Box<dyn FnOnce() -> BoxFuture<'static, CleanupResult> + Send>;

pub struct CleanupStack {
    enabled: bool,
    actions: Vec<(String, Action)>,
}

impl CleanupStack {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            actions: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Register a release action. No-op when cleanup is disabled.
    pub fn defer<S, F, Fut>(&mut self, label: S, action: F)
    where
        S: Into<String>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CleanupResult> + Send + 'static,
    {
        if !self.enabled {
            return;
        }
        self.actions
            .push((label.into(), Box::new(move || Box::pin(action()))));
    }

    /// Run all registered actions in reverse registration order. A failing
    /// action is logged and the remaining actions still run, so one stuck
    /// deletion does not leak everything registered before it.
    pub async fn run(mut self) {
        while let Some((label, action)) = self.actions.pop() {
            info!("cleanup: {}", label);
            if let Err(e) = action().await {
                warn!("cleanup '{}' failed: {}", label, e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn actions_run_in_reverse_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new(true);
        for label in ["namespace", "operator group", "subscription"] {
            let order = Arc::clone(&order);
            stack.defer(label, move || async move {
                order.lock().unwrap().push(label);
                Ok(())
            });
        }
        stack.run().await;
        assert_eq!(
            *order.lock().unwrap(),
            vec!["subscription", "operator group", "namespace"]
        );
    }

    #[tokio::test]
    async fn disabled_stack_registers_nothing() {
        let ran = Arc::new(Mutex::new(false));
        let mut stack = CleanupStack::new(false);
        let flag = Arc::clone(&ran);
        stack.defer("namespace", move || async move {
            *flag.lock().unwrap() = true;
            Ok(())
        });
        assert!(!stack.enabled());
        stack.run().await;
        assert!(!*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn failure_does_not_stop_remaining_actions() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new(true);
        let first = Arc::clone(&order);
        stack.defer("first", move || async move {
            first.lock().unwrap().push("first");
            Ok(())
        });
        stack.defer("failing", move || async move {
            Err("the object is stuck behind a finalizer".into())
        });
        let last = Arc::clone(&order);
        stack.defer("last", move || async move {
            last.lock().unwrap().push("last");
            Ok(())
        });
        stack.run().await;
        assert_eq!(*order.lock().unwrap(), vec!["last", "first"]);
    }
}
