//! crates/study_aid_core/src/parser.rs
//!
//! Turns loosely formatted model prose into a presentation outline:
//! an intro, numbered steps, an optional key takeaway, and trailing text.
//!
//! The scan is a single forward pass over trimmed lines. Recognised shapes:
//! - numbered lines: `1.`, `2)`, `Step 3.`, optionally wrapped in `**`
//! - ordinal starters: `First,`, `Then`, `Finally,` ...
//! - takeaway lead-ins: `Key Takeaway:`, `### In short`, `- **TL;DR**` ...
//!
//! A takeaway line always wins over a step line and ends the scan.

use regex::Regex;
use std::sync::LazyLock;

/// Below this many steps, callers should render the text as plain prose.
pub const MIN_STRUCTURED_STEPS: usize = 2;

static TAKEAWAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:[-*]|\d+[.)])\s*)?(?:#{1,6}\s*)?(?:\*\*)?(?:key\s*takeaway|takeaway|in\s*short|in\s*summary|to\s*summarize|bottom\s*line|tldr|tl;dr|remember|the\s*key\s*point|most\s*importantly|now\s*you\s*can\s*say)(?:\*\*)?(?::|\s|$)",
    )
    .unwrap()
});

static NUMBERED_STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\*\*)?(?:step\s*)?(\d+)[.)]\s+(.+)$").unwrap());

static ORDINAL_STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:\*\*)?(first|second|third|fourth|fifth|next|then|finally|lastly)(?:\*\*)?,?\s+(.+)$",
    )
    .unwrap()
});

// First dash/colon run splits "Title — description".
static STEP_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^–—:-]+)[–—:-]+\s*(.+)$").unwrap());

/// One numbered item of an explanation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub title: String,
    pub description: String,
}

/// The structured outline of one explanation.
///
/// Empty strings stand for "absent" everywhere except `key_takeaway`, which
/// is `Some` exactly when a takeaway marker line was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedExplanation {
    pub intro: String,
    pub steps: Vec<Step>,
    pub key_takeaway: Option<String>,
    pub remainder: String,
}

impl ParsedExplanation {
    /// Whether there are enough steps to present as a numbered list.
    pub fn is_structured(&self) -> bool {
        self.steps.len() >= MIN_STRUCTURED_STEPS
    }
}

/// Accumulator threaded through the line scan.
#[derive(Default)]
struct Outline {
    parsed: ParsedExplanation,
    in_steps: bool,
    after_steps: bool,
}

impl Outline {
    fn push_step(&mut self, step: Step) {
        self.in_steps = true;
        self.parsed.steps.push(step);
    }

    /// `text` may be empty when the line was only markup; it still counts as
    /// prose after the steps.
    fn push_text(&mut self, text: &str) {
        if self.in_steps {
            self.after_steps = true;
        }
        if text.is_empty() {
            return;
        }
        let target = if self.in_steps {
            &mut self.parsed.remainder
        } else {
            &mut self.parsed.intro
        };
        append_spaced(target, text);
    }

    fn paragraph_break(&mut self) {
        let remainder = &mut self.parsed.remainder;
        if self.after_steps && !remainder.is_empty() && !remainder.ends_with('\n') {
            remainder.push('\n');
        }
    }

    fn finish(mut self) -> ParsedExplanation {
        let trimmed_len = self.parsed.remainder.trim_end().len();
        self.parsed.remainder.truncate(trimmed_len);
        self.parsed
    }
}

fn append_spaced(target: &mut String, text: &str) {
    if !target.is_empty() && !target.ends_with('\n') {
        target.push(' ');
    }
    target.push_str(text);
}

/// Deletes literal `**` and `__` pairs. Not a markdown parser.
fn strip_markup(text: &str) -> String {
    text.replace("**", "").replace("__", "").trim().to_string()
}

fn step_text(line: &str) -> Option<&str> {
    NUMBERED_STEP_RE
        .captures(line)
        .or_else(|| ORDINAL_STEP_RE.captures(line))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

fn split_step(text: String) -> Step {
    match STEP_SPLIT_RE.captures(&text) {
        Some(caps) => Step {
            title: caps[1].trim().to_string(),
            description: caps[2].trim().to_string(),
        },
        None => Step {
            title: text,
            description: String::new(),
        },
    }
}

/// Parses raw explanation text into an outline. Total and deterministic.
pub fn parse_explanation(raw: &str) -> ParsedExplanation {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let mut outline = Outline::default();

    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            outline.paragraph_break();
            continue;
        }

        if let Some(marker) = TAKEAWAY_RE.find(line) {
            let inline = strip_markup(
                line[marker.end()..].trim_start_matches(|c: char| c == ':' || c.is_whitespace()),
            );
            let takeaway = if inline.is_empty() {
                let rest: Vec<&str> = lines[index + 1..]
                    .iter()
                    .copied()
                    .filter(|l| !l.is_empty())
                    .collect();
                strip_markup(&rest.join(" "))
            } else {
                inline
            };
            outline.parsed.key_takeaway = Some(takeaway);
            break;
        }

        if let Some(text) = step_text(line) {
            outline.push_step(split_step(strip_markup(text)));
            continue;
        }

        outline.push_text(&strip_markup(line));
    }

    outline.finish()
}
