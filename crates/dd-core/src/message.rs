//! Message log
//!
//! A bounded queue of tagged messages. The renderer consumes this
//! read-only; wrapping and scrolling are its problem, not ours.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::consts::MESSAGE_CAP;

/// Message severity, the renderer maps these to colors
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Severity {
    #[default]
    Info,
    Good,
    Warn,
    Bad,
}

/// Bounded message history, oldest entries dropped first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLog {
    entries: VecDeque<(String, Severity)>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, msg: impl Into<String>, severity: Severity) {
        if self.entries.len() == MESSAGE_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back((msg.into(), severity));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained messages, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &(String, Severity)> {
        self.entries.iter()
    }

    /// The most recent `n` messages, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &(String, Severity)> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let mut log = MessageLog::new();
        for i in 0..(MESSAGE_CAP + 10) {
            log.push(format!("msg {i}"), Severity::Info);
        }
        assert_eq!(log.len(), MESSAGE_CAP);
        // Oldest entries were dropped
        assert_eq!(log.iter().next().unwrap().0, "msg 10");
    }

    #[test]
    fn test_tail_returns_most_recent() {
        let mut log = MessageLog::new();
        log.push("one", Severity::Info);
        log.push("two", Severity::Warn);
        log.push("three", Severity::Bad);
        let tail: Vec<_> = log.tail(2).collect();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].0, "two");
        assert_eq!(tail[1].0, "three");
    }
}
