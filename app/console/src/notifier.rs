//! FILENAME: app/console/src/notifier.rs
// PURPOSE: User-facing notification service (errors, messages, loading state).

use std::sync::Mutex;

use crate::{log_debug, log_error, log_info};

pub trait Notifier {
    fn show_error(&self, message: &str);
    fn show_message(&self, message: &str);
    fn set_loading(&self, loading: bool);
}

/// Notifier for headless use: everything goes to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_error(&self, message: &str) {
        log_error!("NOTIFY", "{}", message);
    }

    fn show_message(&self, message: &str) {
        log_info!("NOTIFY", "{}", message);
    }

    fn set_loading(&self, loading: bool) {
        log_debug!("NOTIFY", "loading={}", loading);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error(String),
    Message(String),
    Loading(bool),
}

/// Keeps every notification in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Notification::Error(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Notification::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Current loading flag (false if never set).
    pub fn is_loading(&self) -> bool {
        self.events()
            .iter()
            .rev()
            .find_map(|e| match e {
                Notification::Loading(l) => Some(*l),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn push(&self, event: Notification) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, message: &str) {
        self.push(Notification::Error(message.to_string()));
    }

    fn show_message(&self, message: &str) {
        self.push(Notification::Message(message.to_string()));
    }

    fn set_loading(&self, loading: bool) {
        self.push(Notification::Loading(loading));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.set_loading(true);
        notifier.show_error("boom");
        notifier.show_message("done");
        notifier.set_loading(false);
        assert_eq!(notifier.errors(), vec!["boom".to_string()]);
        assert_eq!(notifier.messages(), vec!["done".to_string()]);
        assert!(!notifier.is_loading());
        assert_eq!(notifier.events().len(), 4);
    }
}
