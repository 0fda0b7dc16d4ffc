//! Locale pattern tables
//!
//! Text patterns the heuristics match against, covering the English and Dutch
//! host UI. All regexes are compiled once on first use.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

fn regex_set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).unwrap_or_else(|e| panic!("invalid built-in pattern set: {e}"))
}

/// Controls that reveal nested replies
pub static REPLY_CONTROLS: LazyLock<RegexSet> = LazyLock::new(|| {
    regex_set(&[
        r"(?i)alle\s+\d+\s+antwoorden\s+weergeven",
        r"(?i)\d+\s+antwoord\s+bekijken",
        r"(?i)\d+\s+antwoorden\s+bekijken",
        r"(?i)view\s+\d+\s+repl",
        r"(?i)view\s+more\s+repl",
        r"(?i)view\s+previous\s+repl",
        r"(?i)heeft\s+geantwoord",
        r"(?i)replied",
        r"(?i)\d+\s+antwoorden",
        r"(?i)\d+\s+replies",
        r"(?i)\d+\s+reply",
    ])
});

/// Controls that load more top-level comments
pub static MORE_COMMENT_CONTROLS: LazyLock<RegexSet> = LazyLock::new(|| {
    regex_set(&[
        r"(?i)view\s+more\s+comment",
        r"(?i)view\s+previous\s+comment",
        r"(?i)meer\s+reacties",
        r"(?i)meer\s+opmerkingen",
        r"(?i)vorige\s+reacties",
        r"(?i)bekijk\s+meer\s+reacties",
        r"(?i)weitere\s+kommentare",
        r"(?i)view\s+\d+\s+more\s+comment",
    ])
});

/// Accessible-label words that mark a comment or reply node
pub const COMMENT_LABEL_WORDS: &[&str] = &["Opmerking", "Antwoord", "Comment", "Reply", "comment", "reply"];

/// Accessible-label words counted when measuring how many comments are visible
pub const VISIBLE_COMMENT_LABEL_WORDS: &[&str] = &["Opmerking", "Comment", "comment"];

/// Words and shapes that mark UI chrome rather than a display name
pub static AUTHOR_DENYLIST: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\b(?:Like|Reply|Share|Reageren|Delen|ago|geleden)\b|•"));

/// Relative time at the start of a string ("3 h", "2d", "5 uur")
pub static LEADING_RELATIVE_TIME: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)^\d+\s*(?:min|hr|h|d|w|m|s|uur|dag|geleden|ago)"));

/// Relative-time words anywhere in a string
pub static RELATIVE_TIME_WORD: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)\b(?:ago|geleden)\b"));

pub static PURE_NUMBER: LazyLock<Regex> = LazyLock::new(|| regex(r"^\d+$"));

/// Time fragments that show up as link spans ("3u", "12")
pub static TIME_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| regex(r"^\d+u?$"));

/// Relative time inside an accessible label
pub static LABEL_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)(\d+\s+\w+\s+geleden|\d+\s+\w+\s+ago|yesterday|gisteren|vandaag|today)")
});

/// Duration shape in permalink text ("3 d", "2 weken", "5 min")
pub static LINK_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)\d+\s*(?:min|hr|h|d|w|m|s|uur|dag|week|maand|jaar|geleden|ago)")
});

/// Reply chrome that is never comment body text
pub static BODY_CHROME: LazyLock<RegexSet> = LazyLock::new(|| {
    regex_set(&[
        r"heeft geantwoord",
        r"replied",
        r"antwoord bekijken",
        r"antwoorden bekijken",
        r"(?i)view\s+(?:\d+\s+|more\s+|previous\s+)?repl",
    ])
});

/// Chrome indicating more nested replies exist than are shown
pub static UNRESOLVED_REPLIES: LazyLock<RegexSet> = LazyLock::new(|| {
    regex_set(&[
        r"heeft geantwoord",
        r"replied",
        r"(?i)\d+\s+antwoorden",
        r"(?i)\d+\s+replies",
        r"(?i)\d+\s+antwoord\s+bekijken",
    ])
});

/// Accessible-label phrases naming the comment a reply answers
pub static REPLY_RELATION_LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        regex(r"Antwoord van (?P<author>.+?) op de opmerking van (?P<parent>.+?)(?: \d+| een| a )"),
        regex(r"Reply from (?P<author>.+?) to comment from (?P<parent>.+?)(?: \d+| a )"),
        regex(r"Reply by (?P<author>.+?) to (?P<parent>.+?)'s comment"),
    ]
});

/// First `@name` mention in a comment body
pub static AT_MENTION: LazyLock<Regex> = LazyLock::new(|| regex(r"@([\w\s]+)"));

/// Post permalink: `/{account}/posts/{post_id}`
pub static POST_URL: LazyLock<Regex> = LazyLock::new(|| regex(r"facebook\.com/([^/]+)/posts/([^/?]+)"));

/// Media CDN host for avatars
pub const MEDIA_CDN: &str = "fbcdn.net";

/// Static-asset host on the media CDN (placeholders, icons)
pub const STATIC_ASSET_HOST: &str = "static.xx.fbcdn";

/// Origin used to absolutize site-relative profile links
pub const HOST_ORIGIN: &str = "https://www.facebook.com";

/// Whether a label marks a comment or reply node
pub fn is_comment_label(label: &str) -> bool {
    COMMENT_LABEL_WORDS.iter().any(|w| label.contains(w))
}

/// First `max` characters of `text`, for log lines
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_controls() {
        for text in ["View 3 replies", "Alle 12 antwoorden weergeven", "2 antwoorden bekijken", "Ann replied · 4 replies"] {
            assert!(REPLY_CONTROLS.is_match(text), "{text}");
        }
        assert!(!REPLY_CONTROLS.is_match("View more comments"));
    }

    #[test]
    fn test_more_comment_controls() {
        for text in ["View more comments", "View 10 more comments", "Meer reacties weergeven", "Weitere Kommentare"] {
            assert!(MORE_COMMENT_CONTROLS.is_match(text), "{text}");
        }
        assert!(!MORE_COMMENT_CONTROLS.is_match("View 3 replies"));
    }

    #[test]
    fn test_author_denylist_matches_whole_words() {
        assert!(AUTHOR_DENYLIST.is_match("Like"));
        assert!(AUTHOR_DENYLIST.is_match("3 days ago"));
        assert!(AUTHOR_DENYLIST.is_match("Ann • Follow"));
        assert!(!AUTHOR_DENYLIST.is_match("Santiago Likely"));
    }

    #[test]
    fn test_reply_relation_labels() {
        let label = "Antwoord van Piet op de opmerking van Jan Jansen 3 dagen geleden";
        let caps = REPLY_RELATION_LABELS.iter().find_map(|re| re.captures(label)).unwrap();
        assert_eq!(&caps["parent"], "Jan Jansen");
        assert_eq!(&caps["author"], "Piet");

        let english = "Reply by Bob to Ann Lee's comment 2 days ago";
        let caps = REPLY_RELATION_LABELS.iter().find_map(|re| re.captures(english)).unwrap();
        assert_eq!(&caps["parent"], "Ann Lee");
    }

    #[test]
    fn test_timestamps() {
        let caps = LABEL_TIMESTAMP.captures("Comment by Ann 3 days ago").unwrap();
        assert_eq!(&caps[0], "3 days ago");
        assert!(LINK_DURATION.is_match("5 uur"));
        assert!(LEADING_RELATIVE_TIME.is_match("2d"));
        assert!(!LEADING_RELATIVE_TIME.is_match("Great point"));
    }

    #[test]
    fn test_is_comment_label() {
        assert!(is_comment_label("Opmerking van Jan"));
        assert!(is_comment_label("Reply by Bob"));
        assert!(!is_comment_label("Story"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll");
        assert_eq!(preview("short", 50), "short");
    }
}
