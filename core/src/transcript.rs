//! Extraction of speaker-tagged dialogue segments from a generated
//! podcast transcript.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Person1,
    Person2,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Person1 => f.write_str("Person1"),
            Speaker::Person2 => f.write_str("Person2"),
        }
    }
}

/// One speaker-attributed span of dialogue, in transcript order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub speaker: Speaker,
    pub text: String,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The regex crate has no backreferences; open/close tag agreement is
    // checked on the captures instead.
    RE.get_or_init(|| Regex::new(r"(?s)<(Person[12])>(.*?)</(Person[12])>").unwrap())
}

/// Extract `<Person1>`/`<Person2>` segments in order. Mismatched tag
/// pairs and empty bodies are skipped; input with no recognized tags
/// yields an empty vector.
pub fn parse_segments(transcript: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for caps in tag_regex().captures_iter(transcript) {
        if caps[1] != caps[3] {
            continue;
        }
        let text = caps[2].trim();
        if text.is_empty() {
            continue;
        }
        let speaker = if &caps[1] == "Person1" {
            Speaker::Person1
        } else {
            Speaker::Person2
        };
        segments.push(Segment {
            speaker,
            text: text.to_string(),
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
<Person1>Welcome to the show!</Person1>
<Person2>Glad to be here.</Person2>
<Person1>Let's dig in.</Person1>";

    #[test]
    fn extracts_segments_in_order() {
        let segments = parse_segments(WELL_FORMED);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].speaker, Speaker::Person1);
        assert_eq!(segments[0].text, "Welcome to the show!");
        assert_eq!(segments[1].speaker, Speaker::Person2);
        assert_eq!(segments[2].text, "Let's dig in.");
    }

    #[test]
    fn extraction_is_idempotent_on_well_formed_input() {
        let first = parse_segments(WELL_FORMED);
        let rebuilt: String = first
            .iter()
            .map(|s| format!("<{}>{}</{}>\n", s.speaker, s.text, s.speaker))
            .collect();
        assert_eq!(parse_segments(&rebuilt), first);
    }

    #[test]
    fn no_tags_yields_empty() {
        assert!(parse_segments("just some narration, no tags").is_empty());
        assert!(parse_segments("").is_empty());
    }

    #[test]
    fn multiline_bodies_are_trimmed() {
        let segments = parse_segments("<Person1>\n  spread over\nlines  \n</Person1>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "spread over\nlines");
    }

    #[test]
    fn empty_bodies_are_skipped() {
        let segments = parse_segments("<Person1>   </Person1><Person2>ok</Person2>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker, Speaker::Person2);
    }

    #[test]
    fn mismatched_tags_are_skipped() {
        let segments = parse_segments("<Person1>oops</Person2><Person2>fine</Person2>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "fine");
    }
}
