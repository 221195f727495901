//! Phone number cleanup and classification.
//!
//! Numbers are written in every imaginable way in listings: ASCII and
//! full-width digits, hyphens of several widths, spaces, parentheses. This
//! module reduces them to a digit string and decides whether the number is
//! tied to a calling region at all.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneClass {
    Landline,
    Mobile,
    Freephone,
    IpPhone,
    Unknown,
}

impl PhoneClass {
    /// Only landlines carry a geographic area code.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Landline)
    }
}

impl fmt::Display for PhoneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landline => write!(f, "landline"),
            Self::Mobile => write!(f, "mobile"),
            Self::Freephone => write!(f, "freephone"),
            Self::IpPhone => write!(f, "ip_phone"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '-' | '－' | 'ー' | '‐' | '−' | '–' | ' ' | '\u{3000}' | '\t' | '(' | ')' | '（' | '）' | '.'
    )
}

fn is_hyphen(c: char) -> bool {
    matches!(c, '-' | '－' | 'ー' | '‐' | '−' | '–')
}

/// Fold full-width digits to ASCII; leave everything else untouched.
fn fold_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        _ => c,
    }
}

/// Strip separators (hyphens, ASCII and full-width spaces, parentheses, dots)
/// and fold full-width digits. Any other character is kept so that
/// [`classify`] can reject the number.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(fold_digit)
        .filter(|c| !is_separator(*c))
        .collect()
}

/// Classify a normalized digit string. Rules are checked in order.
pub fn classify(digits: &str) -> PhoneClass {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || !digits.starts_with('0') {
        return PhoneClass::Unknown;
    }
    if digits.starts_with("0120") || digits.starts_with("0800") {
        return PhoneClass::Freephone;
    }
    let b = digits.as_bytes();
    if b.len() >= 3 && matches!(b[1], b'7' | b'8' | b'9') && b[2] == b'0' {
        return PhoneClass::Mobile;
    }
    if digits.starts_with("050") {
        return PhoneClass::IpPhone;
    }
    PhoneClass::Landline
}

/// The leading digit group of a hyphenated raw number, if the number was
/// written with separators at all.
fn leading_group(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.chars().any(is_hyphen) {
        return None;
    }
    let group: String = raw
        .chars()
        .map(fold_digit)
        .take_while(|c| !is_hyphen(*c))
        .filter(|c| c.is_ascii_digit())
        .collect();
    Some(group)
}

/// A phone number as written plus its normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub raw: String,
    pub digits: String,
    pub class: PhoneClass,
}

impl PhoneNumber {
    pub fn parse(raw: &str) -> Self {
        let digits = normalize(raw);
        let class = classify(&digits);
        Self { raw: raw.to_string(), digits, class }
    }

    /// Area-code candidates in strictly decreasing specificity:
    /// 4 digits, the 3-digit hyphen variant, 3 digits, 2 digits.
    ///
    /// The hyphen variant (`"042-"`) is only offered when the raw number's
    /// first hyphen-separated group is exactly three digits, i.e. the writer
    /// told us the area code is three digits long.
    /// Numbers with anything but ASCII digits left after normalization have
    /// no candidates.
    pub fn candidate_prefixes(&self) -> Vec<String> {
        if !self.digits.bytes().all(|b| b.is_ascii_digit()) {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(4);
        let len = self.digits.len();
        if len > 4 {
            out.push(self.digits[..4].to_string());
        }
        if len > 3 {
            if let Some(group) = leading_group(&self.raw) {
                if group.len() == 3 && self.digits.starts_with(&group) {
                    out.push(format!("{group}-"));
                }
            }
            out.push(self.digits[..3].to_string());
        }
        if len > 2 {
            out.push(self.digits[..2].to_string());
        }
        out
    }
}

/// Candidates for a digit string with no hyphenation information.
pub fn candidate_prefixes(digits: &str) -> Vec<String> {
    PhoneNumber::parse(digits).candidate_prefixes()
}
