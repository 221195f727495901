//! Free-text Japanese address parsing down to municipality granularity.
//!
//! Only the prefecture and the municipality (city, special ward, designated
//! city ward, or town/village under a district) are extracted. Street-level
//! detail is ignored: geocoding runs at municipality granularity.

use crate::error::LocateError;
use crate::model::Place;
use crate::prefecture::PREFECTURES;

/// Result of splitting an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    pub prefecture: String,
    /// Rural district (`郡`) the town belongs to, when present.
    pub district: Option<String>,
    /// Municipality. Designated-city wards are already concatenated (`大阪市北区`).
    pub city: Option<String>,
}

impl AddressParts {
    pub fn place(&self) -> Place {
        Place::new(self.prefecture.clone(), self.city.clone())
    }

    /// Query string sent to the geocoder.
    pub fn query(&self) -> String {
        let mut q = self.prefecture.clone();
        if let Some(d) = &self.district {
            q.push_str(d);
        }
        if let Some(c) = &self.city {
            q.push_str(c);
        }
        q
    }
}

fn fold_width(c: char) -> char {
    match c {
        'Ａ'..='Ｚ' | 'ａ'..='ｚ' | '０'..='９' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        '－' | '−' | '‐' => '-',
        _ => c,
    }
}

/// Canonical cache key for an address: width-folded ASCII, no whitespace.
pub fn address_key(text: &str) -> String {
    text.chars()
        .map(fold_width)
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn strip_postal_code(s: &str) -> &str {
    let s = s.trim_start_matches('〒');
    let bytes = s.as_bytes();
    // 123-4567 or 1234567
    let digits_then = |n: usize| bytes.len() >= n && bytes[..n].iter().all(u8::is_ascii_digit);
    if digits_then(3) && bytes.get(3) == Some(&b'-') && bytes.len() >= 8 && bytes[4..8].iter().all(u8::is_ascii_digit) {
        return &s[8..];
    }
    if digits_then(7) {
        return &s[7..];
    }
    s
}

/// Take chars up to and including the first terminator found at char index >= 1.
fn take_until(chars: &[char], terminators: &[char]) -> Option<usize> {
    chars
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, c)| terminators.contains(c))
        .map(|(i, _)| i + 1)
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

/// Cities whose names carry 町 or 村 before the final 市.
const CITIES_WITH_TOWN_KANJI: [&str; 7] =
    ["東村山市", "武蔵村山市", "羽村市", "田村市", "大村市", "十日町市", "大町市"];

/// End (exclusive) of the first municipality name: the earliest 市, 区, 町 or
/// 村 at char index >= 1. A 市 directly followed by 町 or 郡 belongs to the
/// name (余市町, 余市郡).
fn municipality_end(chars: &[char]) -> Option<usize> {
    for name in CITIES_WITH_TOWN_KANJI {
        let name: Vec<char> = name.chars().collect();
        if chars.starts_with(&name) {
            return Some(name.len());
        }
    }
    for i in 1..chars.len() {
        match chars[i] {
            '市' if matches!(chars.get(i + 1), Some('町' | '郡')) => {}
            '市' => {
                // 四日市市, 廿日市市
                let extra = chars[i + 1..].iter().take_while(|c| **c == '市').count();
                return Some(i + 1 + extra);
            }
            '区' | '町' | '村' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// City (plus designated-city ward) from the part after the prefecture.
fn split_city(rest: &[char]) -> (Option<String>, Option<String>) {
    let Some(end) = municipality_end(rest) else {
        return (None, None);
    };

    // Rural district: a 郡 inside the first name, followed by a town or
    // village (大和郡山市 is a city).
    if let Some(g) = rest[1..end].iter().position(|c| *c == '郡').map(|i| i + 1) {
        let after = &rest[g + 1..];
        if let Some(town_end) = municipality_end(after).filter(|&e| matches!(after[e - 1], '町' | '村')) {
            return (Some(collect(&rest[..=g])), Some(collect(&after[..town_end])));
        }
    }

    let mut city = collect(&rest[..end]);
    if rest[end - 1] == '市' {
        let after = &rest[end..];
        if let Some(ward_end) = take_until(after, &['区']) {
            if ward_end <= 4 && !after[..ward_end].iter().any(|c| c.is_ascii_digit()) {
                city.push_str(&collect(&after[..ward_end]));
            }
        }
    }
    (None, Some(city))
}

/// Split an address into prefecture and municipality.
pub fn parse_address(text: &str) -> Result<AddressParts, LocateError> {
    let key = address_key(text);
    let body = strip_postal_code(&key);

    let pref = PREFECTURES
        .iter()
        .find(|p| body.starts_with(p.name))
        .ok_or_else(|| LocateError::InvalidAddressFormat(text.to_string()))?;

    let rest: Vec<char> = body[pref.name.len()..].chars().collect();
    let (district, city) = split_city(&rest);

    Ok(AddressParts {
        prefecture: pref.name.to_string(),
        district,
        city,
    })
}
