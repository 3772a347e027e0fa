use crate::{
    config::DebounceMode,
    types::{CommandEvent, FanCommand},
};

#[derive(Debug, Clone)]
pub struct CommandDebouncer {
    window_ms: u64,
    mode: DebounceMode,
    last_accepted: Option<(u64, FanCommand)>,
}

impl CommandDebouncer {
    pub fn new(window_ms: u64, mode: DebounceMode) -> Self {
        Self {
            window_ms,
            mode,
            last_accepted: None,
        }
    }

    pub fn last_accepted_at_ms(&self) -> Option<u64> {
        self.last_accepted.map(|(at, _)| at)
    }

    /// Returns the event when it passes the window, `None` when suppressed.
    ///
    /// An event stamped earlier than the last accepted one counts as inside
    /// the window.
    pub fn accept(&mut self, event: CommandEvent) -> Option<CommandEvent> {
        if let Some((last_at, last_value)) = self.last_accepted {
            let inside = event.received_at_ms.saturating_sub(last_at) < self.window_ms
                || event.received_at_ms < last_at;
            let suppress = match self.mode {
                DebounceMode::Time => inside,
                DebounceMode::Content => inside && last_value == event.value,
            };
            if suppress {
                return None;
            }
        }

        self.last_accepted = Some((event.received_at_ms, event.value));
        Some(event)
    }
}
