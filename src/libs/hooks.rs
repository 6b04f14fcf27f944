//! Pipeline event hooks.
//!
//! Six slots fire around the per-app pipeline: `pre_check`, `post_check`,
//! `pre_install`, `post_install`, `post_verify`, and `error`. Each slot is
//! an ordered list of named callbacks invoked with the app's display name
//! and an optional JSON details payload. A failing callback is logged and
//! ignored; hooks can observe the pipeline but never abort it.
//!
//! The `error` slot receives a payload of the form
//! `{"phase": ..., "error_type": ..., "message": ...}`.

use crate::libs::messages::Message;
use crate::msg_warning;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;

/// The pipeline positions a callback can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSlot {
    PreCheck,
    PostCheck,
    PreInstall,
    PostInstall,
    PostVerify,
    Error,
}

impl HookSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookSlot::PreCheck => "pre_check",
            HookSlot::PostCheck => "post_check",
            HookSlot::PreInstall => "pre_install",
            HookSlot::PostInstall => "post_install",
            HookSlot::PostVerify => "post_verify",
            HookSlot::Error => "error",
        }
    }
}

/// A named callback: `(app_name, details_json)`.
pub type HookFn = Box<dyn Fn(&str, Option<&Value>) -> Result<()> + Send + Sync>;

/// Registry of callbacks per slot, fired in registration order.
#[derive(Default)]
pub struct Hooks {
    slots: HashMap<HookSlot, Vec<(String, HookFn)>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named callback to a slot.
    pub fn register(&mut self, slot: HookSlot, name: impl Into<String>, callback: HookFn) {
        self.slots.entry(slot).or_default().push((name.into(), callback));
    }

    /// Invokes every callback in a slot; failures are logged and swallowed.
    pub fn fire(&self, slot: HookSlot, app_name: &str, details: Option<&Value>) {
        let Some(callbacks) = self.slots.get(&slot) else {
            return;
        };
        for (name, callback) in callbacks {
            if let Err(e) = callback(app_name, details) {
                msg_warning!(Message::HookFailed {
                    slot: slot.as_str().to_string(),
                    name: name.clone(),
                    detail: e.to_string(),
                });
            }
        }
    }

    /// Fires the `error` slot with the standard failure payload.
    pub fn fire_error(&self, app_name: &str, phase: &str, error_type: &str, message: &str) {
        let payload = serde_json::json!({
            "phase": phase,
            "error_type": error_type,
            "message": message,
        });
        self.fire(HookSlot::Error, app_name, Some(&payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callbacks_fire_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            hooks.register(
                HookSlot::PreCheck,
                name,
                Box::new(move |_, _| {
                    order.lock().unwrap().push(name);
                    Ok(())
                }),
            );
        }

        hooks.fire(HookSlot::PreCheck, "App", None);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_callback_does_not_stop_the_slot() {
        let ran = Arc::new(Mutex::new(false));
        let mut hooks = Hooks::new();
        hooks.register(HookSlot::PostInstall, "boom", Box::new(|_, _| anyhow::bail!("hook exploded")));
        {
            let ran = ran.clone();
            hooks.register(
                HookSlot::PostInstall,
                "after",
                Box::new(move |_, _| {
                    *ran.lock().unwrap() = true;
                    Ok(())
                }),
            );
        }

        hooks.fire(HookSlot::PostInstall, "App", None);
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn error_slot_receives_the_failure_payload() {
        let seen = Arc::new(Mutex::new(None));
        let mut hooks = Hooks::new();
        {
            let seen = seen.clone();
            hooks.register(
                HookSlot::Error,
                "recorder",
                Box::new(move |app, details| {
                    *seen.lock().unwrap() = Some((app.to_string(), details.cloned()));
                    Ok(())
                }),
            );
        }

        hooks.fire_error("App", "install", "INSTALLATION_ERROR", "dpkg exploded");

        let (app, details) = seen.lock().unwrap().clone().unwrap();
        let details = details.unwrap();
        assert_eq!(app, "App");
        assert_eq!(details["phase"], "install");
        assert_eq!(details["error_type"], "INSTALLATION_ERROR");
        assert_eq!(details["message"], "dpkg exploded");
    }
}
