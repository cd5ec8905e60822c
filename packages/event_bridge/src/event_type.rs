use std::fmt;

/// Identifies the kind of an event delivered by an event source.
///
/// The bridge only understands the types it dispatches to an
/// [`EventHandler`][crate::EventHandler]; every other value is passed through opaquely and
/// can still be waited for.
///
/// # Example
///
/// ```rust
/// use event_bridge::EventType;
///
/// let custom = EventType::new(900);
///
/// assert_eq!(custom.get(), 900);
/// assert_ne!(custom, EventType::STREAM_STARTED);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EventType(u32);

impl EventType {
    /// A stream has started delivering data.
    pub const STREAM_STARTED: Self = Self(202);

    /// A stream has completed a seek to a new position.
    pub const STREAM_SEEKED: Self = Self(204);

    /// Creates an event type from its raw tag.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw tag of the event type.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for EventType {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventType {
    #[cfg_attr(test, mutants::skip)] // No API contract for display format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::STREAM_STARTED => write!(f, "stream_started({})", self.0),
            Self::STREAM_SEEKED => write!(f, "stream_seeked({})", self.0),
            Self(other) => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn raw_tag_round_trips() {
        assert_eq!(EventType::new(204), EventType::STREAM_SEEKED);
        assert_eq!(EventType::from(202), EventType::STREAM_STARTED);
        assert_eq!(EventType::STREAM_STARTED.get(), 202);
    }

    #[test]
    fn display_names_known_types() {
        assert_eq!(EventType::STREAM_STARTED.to_string(), "stream_started(202)");
        assert_eq!(EventType::new(7).to_string(), "7");
    }
}
