//! Name mapping between Mopidy's Python identifiers and client-side names
//!
//! Mopidy methods and events are snake_case (`core.tracklist.get_tl_tracks`,
//! `track_playback_started`). The client exposes them camelCased, with the
//! `core` namespace root dropped from method paths.

/// Namespace root stripped from method paths
pub const NAMESPACE_ROOT: &str = "core";

/// Prefix of locally emitted server events
pub const EVENT_PREFIX: &str = "event:";

/// Convert a snake_case identifier to camelCase
///
/// Every underscore directly followed by an ASCII lowercase letter is removed
/// and the letter uppercased. Any other character, including underscores not
/// followed by a lowercase letter, is left untouched.
///
/// ```rust
/// use mopidy_core::naming::to_camel_case;
///
/// assert_eq!(to_camel_case("get_tl_tracks"), "getTlTracks");
/// assert_eq!(to_camel_case("foo__bar"), "foo_Bar");
/// assert_eq!(to_camel_case("track_1"), "track_1");
/// ```
pub fn to_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut chars = snake.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}

/// Split a dotted method name into path segments, dropping a leading `core`
///
/// Segments are returned as-is (not camelCased). A bare `"core"` yields no
/// segments at all.
///
/// ```rust
/// use mopidy_core::naming::split_method_path;
///
/// assert_eq!(split_method_path("core.playback.pause"), vec!["playback", "pause"]);
/// assert_eq!(split_method_path("foo_bar"), vec!["foo_bar"]);
/// assert!(split_method_path("core").is_empty());
/// ```
pub fn split_method_path(full_name: &str) -> Vec<String> {
    let mut segments = full_name.split('.');
    let first = segments.next().unwrap_or_default();

    let mut path = Vec::new();
    if first != NAMESPACE_ROOT {
        path.push(first.to_string());
    }
    path.extend(segments.map(str::to_string));
    path
}

/// Local event name for a server-pushed event
///
/// ```rust
/// use mopidy_core::naming::local_event_name;
///
/// assert_eq!(local_event_name("track_playback_started"), "event:trackPlaybackStarted");
/// ```
pub fn local_event_name(server_event: &str) -> String {
    format!("{}{}", EVENT_PREFIX, to_camel_case(server_event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_basic() {
        assert_eq!(to_camel_case("foo_bar"), "fooBar");
        assert_eq!(to_camel_case("get_time_position"), "getTimePosition");
        assert_eq!(to_camel_case("pause"), "pause");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn test_camel_case_leaves_other_underscores() {
        assert_eq!(to_camel_case("_private"), "Private");
        assert_eq!(to_camel_case("trailing_"), "trailing_");
        assert_eq!(to_camel_case("a_B"), "a_B");
        assert_eq!(to_camel_case("uri_2"), "uri_2");
        assert_eq!(to_camel_case("a.b_c"), "a.bC");
    }

    #[test]
    fn test_camel_case_is_idempotent() {
        for input in ["foo_bar", "foo__bar", "a_b_c_d", "already", "x_", "__x", "tl_track_1_a"] {
            let once = to_camel_case(input);
            assert_eq!(to_camel_case(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_split_strips_core_only_at_root() {
        assert_eq!(split_method_path("core.playback.pause"), vec!["playback", "pause"]);
        assert_eq!(split_method_path("playback.seek"), vec!["playback", "seek"]);
        assert_eq!(split_method_path("mixer.core.x"), vec!["mixer", "core", "x"]);
        assert_eq!(split_method_path("core.core"), vec!["core"]);
    }

    #[test]
    fn test_split_single_segment() {
        assert_eq!(split_method_path("foo_bar"), vec!["foo_bar"]);
        assert!(split_method_path("core").is_empty());
    }

    #[test]
    fn test_split_keeps_segments_unconverted() {
        assert_eq!(
            split_method_path("core.tracklist.get_tl_tracks"),
            vec!["tracklist", "get_tl_tracks"]
        );
    }

    #[test]
    fn test_local_event_name() {
        assert_eq!(local_event_name("volume_changed"), "event:volumeChanged");
        assert_eq!(local_event_name("stream_title_changed"), "event:streamTitleChanged");
    }
}
