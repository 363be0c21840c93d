//! # Permission Gate
//!
//! Reactive capability registry. Each capability is an observable boolean;
//! consumers register reactions instead of polling.
//!
//! ## Semantics
//!
//! - `can(actions, ..)` holds while **every** listed action is granted. Its
//!   `on_granted` reaction fires immediately if the condition already holds,
//!   and again on every later transition into it. `on_revoked` fires on every
//!   transition out of it.
//! - `cannot(actions, ..)` holds while **every** listed action is revoked,
//!   i.e. the set as a whole is unavailable. Same firing rules.
//! - `on_change` listeners see every individual `(action, value)` flip.
//!
//! Reactions run after the internal lock is released, so a reaction may
//! freely read or mutate the gate (or another gate).

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A named capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Edit,
    Add,
    Delete,
    Save,
    Login,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Read,
        Action::Edit,
        Action::Add,
        Action::Delete,
        Action::Save,
        Action::Login,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Edit => "edit",
            Action::Add => "add",
            Action::Delete => "delete",
            Action::Save => "save",
            Action::Login => "login",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CommonError::UnknownAction(s.to_string()))
    }
}

/// Reaction fired on a condition transition
pub type Reaction = Arc<dyn Fn() + Send + Sync>;

/// Listener fired on every individual flag flip
pub type ChangeListener = Arc<dyn Fn(Action, bool) + Send + Sync>;

/// Handle returned by `can`/`cannot`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Granted,
    Revoked,
}

struct Watcher {
    id: SubscriptionId,
    actions: Vec<Action>,
    polarity: Polarity,
    on_enter: Option<Reaction>,
    on_exit: Option<Reaction>,
    holds: bool,
}

#[derive(Default)]
struct GateState {
    flags: [bool; 6],
    watchers: Vec<Watcher>,
    listeners: Vec<ChangeListener>,
    next_id: u64,
}

impl GateState {
    fn evaluate(&self, actions: &[Action], polarity: Polarity) -> bool {
        match polarity {
            Polarity::Granted => actions.iter().all(|a| self.flags[a.index()]),
            Polarity::Revoked => actions.iter().all(|a| !self.flags[a.index()]),
        }
    }
}

/// Observable capability map, shared by cloning
#[derive(Clone, Default)]
pub struct PermissionGate {
    inner: Arc<Mutex<GateState>>,
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("granted", &self.summary())
            .finish()
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value of a single capability
    pub fn is(&self, action: Action) -> bool {
        self.state().flags[action.index()]
    }

    /// True iff every listed capability is granted
    pub fn all(&self, actions: &[Action]) -> bool {
        self.state().evaluate(actions, Polarity::Granted)
    }

    /// Set one capability, firing every reaction whose condition flipped
    pub fn set(&self, action: Action, value: bool) {
        let mut fired: Vec<Reaction> = Vec::new();
        let listeners: Vec<ChangeListener>;

        {
            let mut state = self.state();
            if state.flags[action.index()] == value {
                return;
            }
            state.flags[action.index()] = value;

            let flags = state.flags;
            for watcher in state.watchers.iter_mut() {
                let holds = match watcher.polarity {
                    Polarity::Granted => watcher.actions.iter().all(|a| flags[a.index()]),
                    Polarity::Revoked => watcher.actions.iter().all(|a| !flags[a.index()]),
                };
                if holds == watcher.holds {
                    continue;
                }
                watcher.holds = holds;
                let reaction = if holds { &watcher.on_enter } else { &watcher.on_exit };
                if let Some(reaction) = reaction {
                    fired.push(reaction.clone());
                }
            }
            listeners = state.listeners.clone();
        }

        debug!(action = %action, value, "Permission changed");

        for listener in listeners {
            listener(action, value);
        }
        for reaction in fired {
            reaction();
        }
    }

    /// Grant several capabilities
    pub fn on(&self, actions: &[Action]) {
        for action in actions {
            self.set(*action, true);
        }
    }

    /// Revoke several capabilities
    pub fn off(&self, actions: &[Action]) {
        for action in actions {
            self.set(*action, false);
        }
    }

    /// React while every listed capability is granted
    pub fn can<F>(&self, actions: &[Action], on_granted: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observe(actions, Polarity::Granted, Some(Arc::new(on_granted)), None)
    }

    /// Like `can`, also reacting when the condition stops holding
    pub fn can_or<F, G>(&self, actions: &[Action], on_granted: F, on_revoked: G) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        self.observe(
            actions,
            Polarity::Granted,
            Some(Arc::new(on_granted)),
            Some(Arc::new(on_revoked)),
        )
    }

    /// React while every listed capability is revoked
    pub fn cannot<F>(&self, actions: &[Action], on_revoked: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observe(actions, Polarity::Revoked, Some(Arc::new(on_revoked)), None)
    }

    /// Listen to every individual flag flip
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(Action, bool) + Send + Sync + 'static,
    {
        self.state().listeners.push(Arc::new(listener));
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state().watchers.retain(|w| w.id != id);
    }

    fn observe(
        &self,
        actions: &[Action],
        polarity: Polarity,
        on_enter: Option<Reaction>,
        on_exit: Option<Reaction>,
    ) -> SubscriptionId {
        let (id, immediate) = {
            let mut state = self.state();
            let id = SubscriptionId(state.next_id);
            state.next_id += 1;

            let holds = state.evaluate(actions, polarity);
            let immediate = if holds { on_enter.clone() } else { None };

            state.watchers.push(Watcher {
                id,
                actions: actions.to_vec(),
                polarity,
                on_enter,
                on_exit,
                holds,
            });
            (id, immediate)
        };

        if let Some(reaction) = immediate {
            reaction();
        }
        id
    }

    /// Granted capabilities in declaration order
    pub fn granted(&self) -> Vec<Action> {
        let state = self.state();
        Action::ALL
            .iter()
            .copied()
            .filter(|a| state.flags[a.index()])
            .collect()
    }

    /// Space-separated list of granted capabilities
    pub fn summary(&self) -> String {
        self.granted()
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_can_fires_immediately_when_granted() {
        let gate = PermissionGate::new();
        gate.set(Action::Read, true);

        let (count, reaction) = counter();
        gate.can(&[Action::Read], reaction);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_can_fires_on_every_transition() {
        let gate = PermissionGate::new();
        let (granted, on_granted) = counter();
        let (revoked, on_revoked) = counter();
        gate.can_or(&[Action::Save], on_granted, on_revoked);

        assert_eq!(granted.load(Ordering::SeqCst), 0);

        gate.set(Action::Save, true);
        gate.set(Action::Save, true);
        gate.set(Action::Save, false);
        gate.set(Action::Save, true);

        assert_eq!(granted.load(Ordering::SeqCst), 2);
        assert_eq!(revoked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_can_list_requires_all() {
        let gate = PermissionGate::new();
        let (count, reaction) = counter();
        gate.can(&[Action::Edit, Action::Add, Action::Delete], reaction);

        gate.on(&[Action::Edit, Action::Add]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gate.set(Action::Delete, true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cannot_list_requires_all_revoked() {
        let gate = PermissionGate::new();
        gate.on(&[Action::Edit, Action::Delete]);

        let (count, reaction) = counter();
        gate.cannot(&[Action::Delete, Action::Edit], reaction);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gate.set(Action::Delete, false);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gate.set(Action::Edit, false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reaction_may_mutate_gate() {
        let gate = PermissionGate::new();
        let inner = gate.clone();
        gate.can(&[Action::Read], move || inner.set(Action::Edit, true));

        gate.set(Action::Read, true);
        assert!(gate.is(Action::Edit));
    }

    #[test]
    fn test_on_change_and_summary() {
        let gate = PermissionGate::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        gate.on_change(move |action, value| sink.lock().unwrap().push((action, value)));

        gate.on(&[Action::Read, Action::Save]);
        gate.set(Action::Read, false);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (Action::Read, true),
                (Action::Save, true),
                (Action::Read, false)
            ]
        );
        assert_eq!(gate.summary(), "save");
    }

    #[test]
    fn test_unsubscribe() {
        let gate = PermissionGate::new();
        let (count, reaction) = counter();
        let id = gate.can(&[Action::Login], reaction);
        gate.unsubscribe(id);

        gate.set(Action::Login, true);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("delete".parse::<Action>().unwrap(), Action::Delete);
        assert!("fly".parse::<Action>().is_err());
    }
}
