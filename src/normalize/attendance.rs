//! Parsing of the free-text "attendance record" column.
//!
//! A single cell mixes three facts: the membership tier, commentary, and
//! whether the member has lapsed. [`AttendanceParser`] separates them with
//! an ordered list of rules; the first rule that claims the text decides
//! level and notes, while the active flag is computed from the whole text
//! independently of which rule fired.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::level::MembershipLevel;

pub const DEFAULT_INACTIVE_MARKERS: [&str; 3] = ["remove", "moved", "expired"];

const MEMBER_DASH_PATTERN: &str = r"(?i)^member\s*-\s*(\w+)(.*)";
const UNSPECIFIED_LEVEL_NOTE: &str = "member (level unspecified)";
const STANFORD_STUDENT_NOTE: &str = "Stanford Student";

/// Structured result of parsing one attendance cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendance {
    pub level: Option<MembershipLevel>,
    pub notes: Option<String>,
    pub active: bool,
}

impl Attendance {
    fn blank() -> Self {
        Self {
            level: None,
            notes: None,
            active: true,
        }
    }
}

/// Level and notes claimed by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Extraction {
    level: Option<MembershipLevel>,
    notes: Option<String>,
}

/// Attendance rules in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// `member - <word><remainder>`
    MemberDash,
    /// exactly `member`
    BareMember,
    /// `student` or `high school student`
    Student,
    /// `stanford student`
    StanfordStudent,
    /// `new member`
    NewMember,
}

const RULES: [Rule; 5] = [
    Rule::MemberDash,
    Rule::BareMember,
    Rule::Student,
    Rule::StanfordStudent,
    Rule::NewMember,
];

#[derive(Debug, Clone)]
pub struct AttendanceParser {
    member_dash: Regex,
    inactive_markers: Vec<String>,
}

impl AttendanceParser {
    /// Build a parser that treats any of `inactive_markers` (matched as
    /// case-insensitive substrings) as a lapsed membership.
    pub fn new<S: AsRef<str>>(inactive_markers: &[S]) -> Result<Self> {
        let markers: Vec<String> = inactive_markers
            .iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        if markers.is_empty() {
            bail!("at least one inactivity marker is required");
        }

        let member_dash = Regex::new(MEMBER_DASH_PATTERN)
            .context("failed to compile attendance pattern")?;

        Ok(Self {
            member_dash,
            inactive_markers: markers,
        })
    }

    pub fn parse(&self, raw: Option<&str>) -> Attendance {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Attendance::blank();
        };

        let active = self.is_active(text);
        let extraction = RULES
            .iter()
            .find_map(|rule| self.apply(*rule, text))
            .unwrap_or_else(|| Extraction {
                level: None,
                notes: Some(text.to_string()),
            });

        Attendance {
            level: extraction.level,
            notes: extraction.notes,
            active,
        }
    }

    pub fn is_active(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        !self
            .inactive_markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
    }

    fn apply(&self, rule: Rule, text: &str) -> Option<Extraction> {
        let lower = text.to_lowercase();
        match rule {
            Rule::MemberDash => {
                let caps = self.member_dash.captures(text)?;
                let word = caps.get(1)?.as_str();
                match MembershipLevel::from_word(word) {
                    Some(level) => {
                        let remainder = caps.get(2).map_or("", |m| m.as_str());
                        Some(Extraction {
                            level: Some(level),
                            notes: strip_remainder(remainder),
                        })
                    }
                    // "member - expired" and unrecognised words keep the full text.
                    None => Some(Extraction {
                        level: None,
                        notes: Some(text.to_string()),
                    }),
                }
            }
            Rule::BareMember => (lower == "member").then(|| Extraction {
                level: None,
                notes: Some(UNSPECIFIED_LEVEL_NOTE.to_string()),
            }),
            Rule::Student => match lower.as_str() {
                "student" => Some(Extraction {
                    level: Some(MembershipLevel::Student),
                    notes: None,
                }),
                "high school student" => Some(Extraction {
                    level: Some(MembershipLevel::Student),
                    notes: Some(text.to_string()),
                }),
                _ => None,
            },
            Rule::StanfordStudent => (lower == "stanford student").then(|| Extraction {
                level: Some(MembershipLevel::Student),
                notes: Some(STANFORD_STUDENT_NOTE.to_string()),
            }),
            Rule::NewMember => (lower == "new member").then(|| Extraction {
                level: None,
                notes: Some(text.to_string()),
            }),
        }
    }
}

/// Remainder after the level word, minus one separating dash.
fn strip_remainder(remainder: &str) -> Option<String> {
    let trimmed = remainder.trim();
    let stripped = trimmed
        .strip_prefix('-')
        .map(str::trim_start)
        .unwrap_or(trimmed)
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> AttendanceParser {
        AttendanceParser::new(&DEFAULT_INACTIVE_MARKERS).unwrap()
    }

    fn parse(text: &str) -> (Option<&'static str>, Option<String>, bool) {
        let parsed = parser().parse(Some(text));
        (parsed.level.map(|l| l.as_str()), parsed.notes, parsed.active)
    }

    #[test]
    fn test_blank_input() {
        let p = parser();
        assert_eq!(p.parse(None), Attendance::blank());
        assert_eq!(p.parse(Some("")), Attendance::blank());
        assert_eq!(p.parse(Some("   \t")), Attendance::blank());
    }

    #[test]
    fn test_member_dash_named_tier() {
        assert_eq!(parse("member - Bush"), (Some("Bush"), None, true));
        assert_eq!(parse("Member-ROOSEVELT"), (Some("Roosevelt"), None, true));
        assert_eq!(parse("MEMBER -lincoln  "), (Some("Lincoln"), None, true));
    }

    #[test]
    fn test_member_dash_generic_tier_with_notes() {
        assert_eq!(
            parse("member - individual - Lives in DC"),
            (Some("individual"), Some("Lives in DC".to_string()), true)
        );
        assert_eq!(
            parse("member - Family -- two kids"),
            (Some("family"), Some("- two kids".to_string()), true)
        );
        assert_eq!(
            parse("member - student, Stanford"),
            (Some("student"), Some(", Stanford".to_string()), true)
        );
    }

    #[test]
    fn test_member_dash_expired() {
        assert_eq!(
            parse("member - expired"),
            (None, Some("member - expired".to_string()), false)
        );
        assert_eq!(
            parse("Member - Expired 2023"),
            (None, Some("Member - Expired 2023".to_string()), false)
        );
    }

    #[test]
    fn test_member_dash_unknown_word_keeps_text() {
        assert_eq!(
            parse("member - gold"),
            (None, Some("member - gold".to_string()), true)
        );
        assert_eq!(
            parse("member - Bush2"),
            (None, Some("member - Bush2".to_string()), true)
        );
    }

    #[test]
    fn test_inactive_markers_apply_to_every_branch() {
        assert_eq!(
            parse("member - Reagan - moved to Texas"),
            (Some("Reagan"), Some("moved to Texas".to_string()), false)
        );
        assert_eq!(
            parse("please REMOVE from list"),
            (None, Some("please REMOVE from list".to_string()), false)
        );
        assert!(!parse("Moved away").2);
    }

    #[test]
    fn test_bare_member() {
        assert_eq!(
            parse("Member"),
            (None, Some("member (level unspecified)".to_string()), true)
        );
    }

    #[test]
    fn test_students() {
        assert_eq!(parse("student"), (Some("student"), None, true));
        assert_eq!(parse("STUDENT"), (Some("student"), None, true));
        assert_eq!(
            parse("high school student"),
            (Some("student"), Some("high school student".to_string()), true)
        );
        assert_eq!(
            parse("Stanford student"),
            (Some("student"), Some("Stanford Student".to_string()), true)
        );
    }

    #[test]
    fn test_new_member_and_fallthrough() {
        assert_eq!(
            parse("New Member"),
            (None, Some("New Member".to_string()), true)
        );
        assert_eq!(
            parse("  came to the gala  "),
            (None, Some("came to the gala".to_string()), true)
        );
        assert_eq!(
            parse("members - Bush"),
            (None, Some("members - Bush".to_string()), true)
        );
    }

    #[test]
    fn test_rules_in_isolation() {
        let p = parser();
        assert_eq!(p.apply(Rule::BareMember, "student"), None);
        assert_eq!(p.apply(Rule::Student, "stanford student"), None);
        assert_eq!(p.apply(Rule::MemberDash, "new member"), None);
        assert_eq!(
            p.apply(Rule::NewMember, "NEW MEMBER"),
            Some(Extraction {
                level: None,
                notes: Some("NEW MEMBER".to_string()),
            })
        );
    }

    #[test]
    fn test_custom_markers() {
        let p = AttendanceParser::new(&["Lapsed"]).unwrap();
        assert!(!p.parse(Some("lapsed in 2024")).active);
        assert!(p.parse(Some("member - expired")).active);
        assert!(!p.parse(Some("LAPSED")).active);
    }

    #[test]
    fn test_empty_marker_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(AttendanceParser::new(&empty).is_err());
        assert!(AttendanceParser::new(&["  "]).is_err());
    }
}
