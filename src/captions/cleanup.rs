//! Caption text cleanup.
//!
//! Subtitle markup (WebVTT, SRT) carries headers, cue timings and inline
//! styling that have no place in a transcript. Auto-generated captions also
//! repeat words across overlapping cues; those runs are collapsed here.

use regex::Regex;
use std::sync::LazyLock;

/// Longest repeated word run that gets collapsed.
pub const MAX_REPEATED_RUN: usize = 8;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Strip subtitle markup down to plain spoken text.
pub fn clean_markup(body: &str) -> String {
    let raw_lines: Vec<&str> = body
        .lines()
        .map(|raw| raw.trim().trim_start_matches('\u{feff}'))
        .collect();
    let mut lines: Vec<String> = Vec::new();
    let mut in_block = false;

    for (i, &line) in raw_lines.iter().enumerate() {

        if line.is_empty() {
            in_block = false;
            continue;
        }
        if in_block {
            continue;
        }
        if is_block_start(line) {
            in_block = true;
            continue;
        }
        if is_header_line(line) || is_timing_line(line) || is_cue_id(line, &raw_lines[i + 1..]) {
            continue;
        }

        let text = decode_entities(&TAG_PATTERN.replace_all(line, ""));
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }

        // Rolling captions repeat the previous cue line verbatim
        if lines.last().is_some_and(|prev| *prev == text) {
            continue;
        }
        lines.push(text);
    }

    let joined = lines.join(" ");
    collapse_repeated_runs(joined.split_whitespace(), MAX_REPEATED_RUN).join(" ")
}

/// Join caption fragments in order, dropping fragments that repeat the previous one.
pub fn join_fragments(fragments: &[String]) -> String {
    let mut kept: Vec<String> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let text = fragment.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || kept.last().is_some_and(|prev| *prev == text) {
            continue;
        }
        kept.push(text);
    }

    kept.join(" ")
}

/// Collapse immediately repeated runs of up to `max_run` words.
///
/// `"so so I think I think"` becomes `"so I think"`; words repeated further
/// apart are left alone.
pub fn collapse_repeated_runs<'a, I>(words: I, max_run: usize) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<&str> = Vec::new();

    for word in words {
        out.push(word);
        let len = out.len();
        for n in 1..=max_run.min(len / 2) {
            if out[len - n..] == out[len - 2 * n..len - n] {
                out.truncate(len - n);
                break;
            }
        }
    }

    out
}

fn is_block_start(line: &str) -> bool {
    line == "NOTE"
        || line.starts_with("NOTE ")
        || line == "STYLE"
        || line == "REGION"
}

fn is_header_line(line: &str) -> bool {
    line.starts_with("WEBVTT")
        || line.starts_with("Kind:")
        || line.starts_with("Language:")
        || line.starts_with("X-TIMESTAMP-MAP")
}

fn is_timing_line(line: &str) -> bool {
    line.contains("-->")
}

/// A numeric line is a cue id only when a timing line follows it.
fn is_cue_id(line: &str, rest: &[&str]) -> bool {
    line.chars().all(|c| c.is_ascii_digit())
        && rest
            .iter()
            .find(|next| !next.is_empty())
            .is_some_and(|next| is_timing_line(next))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTO_VTT: &str = "WEBVTT
Kind: captions
Language: en

NOTE
generated by a machine

00:00:00.000 --> 00:00:02.310 align:start position:0%

hello<00:00:00.480><c> everyone</c><00:00:01.020><c> and</c><00:00:01.260><c> welcome</c>

00:00:02.310 --> 00:00:02.320 align:start position:0%
hello everyone and welcome


00:00:02.320 --> 00:00:05.000 align:start position:0%
hello everyone and welcome
to<00:00:02.800><c> the</c><c> the</c><c> show</c>
";

    #[test]
    fn test_clean_auto_generated_vtt() {
        assert_eq!(clean_markup(AUTO_VTT), "hello everyone and welcome to the show");
    }

    #[test]
    fn test_clean_srt() {
        let srt = "1\n00:00:00,000 --> 00:00:02,500\n<i>Hello</i> world.\n\n2\n00:00:02,500 --> 00:00:05,000\nThis is a test &amp; more.\n";
        assert_eq!(clean_markup(srt), "Hello world. This is a test & more.");
    }

    #[test]
    fn test_numeric_caption_text_kept() {
        let vtt = "WEBVTT\n\n00:00.000 --> 00:01.000\nthe year was\n\n00:01.000 --> 00:02.000\n1984\n";
        assert_eq!(clean_markup(vtt), "the year was 1984");

        let srt = "1\n00:00:00,000 --> 00:00:01,000\ncount with me\n\n2\n00:00:01,000 --> 00:00:02,000\n3\n\n3\n00:00:02,000 --> 00:00:03,000\n2 1\n";
        assert_eq!(clean_markup(srt), "count with me 3 2 1");
    }

    #[test]
    fn test_style_block_removed() {
        let vtt = "WEBVTT\n\nSTYLE\n::cue { color: red }\n\n00:01.000 --> 00:02.000\nkept line\n";
        assert_eq!(clean_markup(vtt), "kept line");
    }

    #[test]
    fn test_adjacent_duplicates_collapsed() {
        let words = "the the cat sat sat sat down".split_whitespace();
        assert_eq!(collapse_repeated_runs(words, 8).join(" "), "the cat sat down");
    }

    #[test]
    fn test_repeated_runs_collapsed() {
        let words = "so so I think I think it works".split_whitespace();
        assert_eq!(collapse_repeated_runs(words, 8).join(" "), "so I think it works");
    }

    #[test]
    fn test_non_adjacent_duplicates_preserved() {
        let words = "the cat saw the dog and the cat ran".split_whitespace();
        assert_eq!(
            collapse_repeated_runs(words, 8).join(" "),
            "the cat saw the dog and the cat ran"
        );
    }

    #[test]
    fn test_partial_cue_overlap() {
        let vtt = "WEBVTT\n\n00:00.000 --> 00:01.000\nhello world this\n\n00:01.000 --> 00:02.000\nworld this is a test\n";
        assert_eq!(clean_markup(vtt), "hello world this is a test");
    }

    #[test]
    fn test_join_fragments() {
        let fragments = vec![
            "Hello\nthere".to_string(),
            "Hello there".to_string(),
            "  ".to_string(),
            "general Kenobi".to_string(),
        ];
        assert_eq!(join_fragments(&fragments), "Hello there general Kenobi");
    }
}
