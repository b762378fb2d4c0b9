//! Mapping from recognized utterances to scroll directions.
//!
//! The vocabulary is deliberately tiny: any utterance containing "down"
//! scrolls down, any containing "up" scrolls up, everything else is ignored.

/// A discrete scroll direction spoken by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Down,
    Up,
}

impl ScrollDirection {
    /// Human-readable label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            ScrollDirection::Down => "down",
            ScrollDirection::Up => "up",
        }
    }
}

/// Maps a lowercased utterance to a scroll direction.
///
/// "down" is checked before "up", so an utterance containing both scrolls
/// down. That tie-break is an artifact of the check order, not intent.
/// Callers lowercase the transcript before routing.
pub fn route(utterance: &str) -> Option<ScrollDirection> {
    if utterance.contains("down") {
        Some(ScrollDirection::Down)
    } else if utterance.contains("up") {
        Some(ScrollDirection::Up)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_down_commands() {
        assert_eq!(route("scroll down please"), Some(ScrollDirection::Down));
        assert_eq!(route("down"), Some(ScrollDirection::Down));
    }

    #[test]
    fn routes_up_commands() {
        assert_eq!(route("go up now"), Some(ScrollDirection::Up));
        assert_eq!(route("up"), Some(ScrollDirection::Up));
    }

    #[test]
    fn ignores_everything_else() {
        assert_eq!(route("hello"), None);
        assert_eq!(route(""), None);
        assert_eq!(route("scroll left"), None);
    }

    #[test]
    fn down_wins_when_both_words_appear() {
        assert_eq!(route("up and down"), Some(ScrollDirection::Down));
        assert_eq!(route("down then up"), Some(ScrollDirection::Down));
    }

    #[test]
    fn matches_inside_larger_words() {
        // Substring containment, same as the vocabulary check itself.
        assert_eq!(route("update"), Some(ScrollDirection::Up));
        assert_eq!(route("showdown"), Some(ScrollDirection::Down));
    }
}
