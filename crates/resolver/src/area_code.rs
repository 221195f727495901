//! Area-code table and longest-prefix resolution.
//!
//! The table is an immutable, versioned dataset. Corrections ship as a new
//! version (a new CSV, or a new built-in revision); nothing mutates a table
//! while a run is using it.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::LocateError;
use crate::model::{GeoPoint, Place};
use crate::phone::PhoneNumber;

pub const BUILTIN_VERSION: &str = "builtin-2024.2";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaCodeEntry {
    /// 2-4 digits, or 3 digits followed by `-`.
    pub prefix: String,
    pub prefecture: String,
    pub city: String,
    pub centroid: GeoPoint,
}

impl AreaCodeEntry {
    pub fn place(&self) -> Place {
        Place::new(self.prefecture.clone(), Some(self.city.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct AreaCodeTable {
    version: String,
    entries: HashMap<String, AreaCodeEntry>,
}

// (prefix, prefecture, city, lat, lng)
const BUILTIN: &[(&str, &str, &str, f64, f64)] = &[
    ("03", "東京都", "特別区部", 35.6895, 139.6917),
    ("04", "埼玉県", "所沢市", 35.7994, 139.4689),
    ("06", "大阪府", "大阪市", 34.6937, 135.5023),
    ("011", "北海道", "札幌市", 43.0621, 141.3544),
    ("0138", "北海道", "函館市", 41.7687, 140.7288),
    ("0166", "北海道", "旭川市", 43.7706, 142.3650),
    ("017", "青森県", "青森市", 40.8222, 140.7474),
    ("018", "秋田県", "秋田市", 39.7200, 140.1025),
    ("019", "岩手県", "盛岡市", 39.7020, 141.1545),
    ("022", "宮城県", "仙台市", 38.2682, 140.8694),
    ("023", "山形県", "山形市", 38.2554, 140.3396),
    ("024", "福島県", "福島市", 37.7608, 140.4748),
    ("025", "新潟県", "新潟市", 37.9162, 139.0364),
    ("026", "長野県", "長野市", 36.6486, 138.1948),
    ("027", "群馬県", "前橋市", 36.3895, 139.0634),
    ("028", "栃木県", "宇都宮市", 36.5551, 139.8828),
    ("029", "茨城県", "水戸市", 36.3659, 140.4714),
    ("042", "東京都", "八王子市", 35.6664, 139.3160),
    ("042-", "東京都", "八王子市", 35.6664, 139.3160),
    ("0422", "東京都", "武蔵野市", 35.7178, 139.5661),
    ("0428", "東京都", "青梅市", 35.7880, 139.2758),
    ("043", "千葉県", "千葉市", 35.6074, 140.1065),
    ("044", "神奈川県", "川崎市", 35.5308, 139.7029),
    ("045", "神奈川県", "横浜市", 35.4437, 139.6380),
    ("046", "神奈川県", "厚木市", 35.4430, 139.3625),
    ("0463", "神奈川県", "平塚市", 35.3274, 139.3490),
    ("0466", "神奈川県", "藤沢市", 35.3392, 139.4900),
    ("047", "千葉県", "船橋市", 35.6947, 139.9826),
    ("048", "埼玉県", "さいたま市", 35.8617, 139.6455),
    ("049", "埼玉県", "川越市", 35.9251, 139.4858),
    ("052", "愛知県", "名古屋市", 35.1815, 136.9066),
    ("053", "静岡県", "浜松市", 34.7108, 137.7261),
    ("054", "静岡県", "静岡市", 34.9756, 138.3828),
    ("055", "山梨県", "甲府市", 35.6620, 138.5683),
    ("058", "岐阜県", "岐阜市", 35.4233, 136.7606),
    ("059", "三重県", "四日市市", 34.9651, 136.6245),
    ("0564", "愛知県", "岡崎市", 34.9551, 137.1744),
    ("072", "大阪府", "堺市", 34.5733, 135.4831),
    ("073", "和歌山県", "和歌山市", 34.2306, 135.1708),
    ("075", "京都府", "京都市", 35.0116, 135.7681),
    ("076", "石川県", "金沢市", 36.5613, 136.6562),
    ("0764", "富山県", "富山市", 36.6959, 137.2137),
    ("0776", "福井県", "福井市", 36.0641, 136.2196),
    ("077", "滋賀県", "大津市", 35.0179, 135.8547),
    ("078", "兵庫県", "神戸市", 34.6901, 135.1955),
    ("079", "兵庫県", "姫路市", 34.8151, 134.6853),
    ("082", "広島県", "広島市", 34.3853, 132.4553),
    ("083", "山口県", "下関市", 33.9578, 130.9414),
    ("084", "広島県", "福山市", 34.4858, 133.3623),
    ("0852", "島根県", "松江市", 35.4681, 133.0484),
    ("0857", "鳥取県", "鳥取市", 35.5011, 134.2351),
    ("086", "岡山県", "岡山市", 34.6551, 133.9195),
    ("087", "香川県", "高松市", 34.3428, 134.0466),
    ("088", "高知県", "高知市", 33.5589, 133.5312),
    ("089", "愛媛県", "松山市", 33.8392, 132.7657),
    ("092", "福岡県", "福岡市", 33.5902, 130.4017),
    ("093", "福岡県", "北九州市", 33.8834, 130.8752),
    ("0942", "福岡県", "久留米市", 33.3192, 130.5083),
    ("0952", "佐賀県", "佐賀市", 33.2635, 130.3009),
    ("095", "長崎県", "長崎市", 32.7503, 129.8777),
    ("096", "熊本県", "熊本市", 32.8031, 130.7079),
    ("097", "大分県", "大分市", 33.2396, 131.6093),
    ("098", "沖縄県", "那覇市", 26.2124, 127.6792),
    ("0982", "宮崎県", "延岡市", 32.5823, 131.6650),
    ("0985", "宮崎県", "宮崎市", 31.9077, 131.4202),
    ("099", "鹿児島県", "鹿児島市", 31.5966, 130.5571),
];

fn valid_prefix(prefix: &str) -> bool {
    let digits = prefix.strip_suffix('-').unwrap_or(prefix);
    let hyphen_ok = !prefix.ends_with('-') || digits.len() == 3;
    (2..=4).contains(&digits.len())
        && hyphen_ok
        && digits.starts_with('0')
        && digits.chars().all(|c| c.is_ascii_digit())
}

impl AreaCodeTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(prefix, pref, city, lat, lng)| AreaCodeEntry {
                prefix: prefix.to_string(),
                prefecture: pref.to_string(),
                city: city.to_string(),
                centroid: GeoPoint::new(*lat, *lng),
            })
            .collect();
        Self::from_entries(BUILTIN_VERSION, entries).expect("built-in area-code table is valid")
    }

    /// Build a table, rejecting malformed or duplicate prefixes.
    pub fn from_entries(
        version: impl Into<String>,
        entries: Vec<AreaCodeEntry>,
    ) -> Result<Self, LocateError> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if !valid_prefix(&entry.prefix) {
                return Err(LocateError::Parse(format!("invalid area-code prefix '{}'", entry.prefix)));
            }
            if let Some(prev) = map.insert(entry.prefix.clone(), entry) {
                return Err(LocateError::Parse(format!("duplicate area-code prefix '{}'", prev.prefix)));
            }
        }
        Ok(Self { version: version.into(), entries: map })
    }

    /// Load a table version from CSV: `prefix,prefecture,city,lat,lng` with a header row.
    pub fn from_csv(version: impl Into<String>, csv_data: &str) -> Result<Self, LocateError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut entries = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| LocateError::Parse(e.to_string()))?;
            let field = |i: usize| record.get(i).unwrap_or("").to_string();
            let coord = |i: usize| -> Result<f64, LocateError> {
                field(i).parse().map_err(|_| {
                    LocateError::Parse(format!("row {}: bad coordinate '{}'", line + 2, field(i)))
                })
            };
            entries.push(AreaCodeEntry {
                prefix: field(0),
                prefecture: field(1),
                city: field(2),
                centroid: GeoPoint::new(coord(3)?, coord(4)?),
            });
        }
        Self::from_entries(version, entries)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, prefix: &str) -> Option<&AreaCodeEntry> {
        self.entries.get(prefix)
    }

    /// Longest-prefix match. The first candidate present in the table wins,
    /// and candidates are ordered most specific first.
    ///
    /// Non-landline numbers are rejected before any lookup.
    pub fn resolve(&self, phone: &PhoneNumber) -> Result<&AreaCodeEntry, LocateError> {
        if !phone.class.is_geographic() {
            return Err(LocateError::NotGeographic {
                digits: phone.digits.clone(),
                class: phone.class,
            });
        }
        let candidates = phone.candidate_prefixes();
        for candidate in &candidates {
            if let Some(entry) = self.entries.get(candidate) {
                return Ok(entry);
            }
        }
        Err(LocateError::NoAreaCodeMatch {
            digits: phone.digits.clone(),
            longest_prefix: candidates.first().cloned().unwrap_or_else(|| phone.digits.clone()),
        })
    }

    pub fn resolve_digits(&self, digits: &str) -> Result<&AreaCodeEntry, LocateError> {
        self.resolve(&PhoneNumber::parse(digits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(prefix: &str, pref: &str, city: &str) -> AreaCodeEntry {
        AreaCodeEntry {
            prefix: prefix.into(),
            prefecture: pref.into(),
            city: city.into(),
            centroid: GeoPoint::new(35.0, 139.0),
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let table = AreaCodeTable::from_entries(
            "t",
            vec![entry("042", "東京都", "八王子市"), entry("0422", "東京都", "武蔵野市")],
        )
        .unwrap();
        let hit = table.resolve(&PhoneNumber::parse("0422-12-3456")).unwrap();
        assert_eq!(hit.city, "武蔵野市");
        let hit = table.resolve(&PhoneNumber::parse("042-620-1234")).unwrap();
        assert_eq!(hit.city, "八王子市");
    }

    #[test]
    fn tokyo_scenario() {
        let table = AreaCodeTable::builtin();
        let hit = table.resolve(&PhoneNumber::parse("03-1234-5678")).unwrap();
        assert_eq!(hit.prefix, "03");
        assert_eq!(hit.prefecture, "東京都");
    }

    #[test]
    fn miyazaki_outranks_okinawa_family() {
        let table = AreaCodeTable::builtin();
        let hit = table.resolve(&PhoneNumber::parse("0985-12-3456")).unwrap();
        assert_eq!(hit.prefecture, "宮崎県");
        assert_eq!(hit.city, "宮崎市");

        let hit = table.resolve(&PhoneNumber::parse("098-861-1234")).unwrap();
        assert_eq!(hit.prefecture, "沖縄県");
    }

    #[test]
    fn hyphen_variant_ranks_above_bare_prefix() {
        let table = AreaCodeTable::from_entries(
            "t",
            vec![entry("042", "東京都", "八王子市"), entry("042-", "神奈川県", "相模原市")],
        )
        .unwrap();
        let hit = table.resolve(&PhoneNumber::parse("042-750-1234")).unwrap();
        assert_eq!(hit.prefix, "042-");
        let hit = table.resolve(&PhoneNumber::parse("0427501234")).unwrap();
        assert_eq!(hit.prefix, "042");
    }

    #[test]
    fn no_match_reports_longest_prefix() {
        let table = AreaCodeTable::from_entries("t", vec![entry("03", "東京都", "特別区部")]).unwrap();
        let err = table.resolve_digits("0155123456").unwrap_err();
        assert_eq!(
            err,
            LocateError::NoAreaCodeMatch {
                digits: "0155123456".into(),
                longest_prefix: "0155".into(),
            }
        );
    }

    #[test]
    fn non_geographic_never_hits() {
        let table = AreaCodeTable::builtin();
        for raw in ["090-1234-5678", "080-1234-5678", "070-1234-5678", "0120-123-456", "0800-123-4567", "050-1234-5678"] {
            let err = table.resolve(&PhoneNumber::parse(raw)).unwrap_err();
            assert!(matches!(err, LocateError::NotGeographic { .. }), "{raw}: {err}");
        }
    }

    #[test]
    fn rejects_bad_prefixes() {
        assert!(AreaCodeTable::from_entries("t", vec![entry("12", "x", "y")]).is_err());
        assert!(AreaCodeTable::from_entries("t", vec![entry("04-", "x", "y")]).is_err());
        assert!(AreaCodeTable::from_entries("t", vec![entry("03", "x", "y"), entry("03", "x", "z")]).is_err());
    }

    #[test]
    fn builtin_is_complete() {
        let table = AreaCodeTable::builtin();
        assert_eq!(table.len(), BUILTIN.len());
        assert_eq!(table.version(), BUILTIN_VERSION);
        for entry in BUILTIN {
            assert!(crate::prefecture::is_prefecture(entry.1), "{}", entry.1);
        }
    }

    #[test]
    fn csv_table_version() {
        let csv = "prefix,prefecture,city,lat,lng\n0422,東京都,武蔵野市,35.7178,139.5661\n042,東京都,八王子市,35.6664,139.3160\n";
        let table = AreaCodeTable::from_csv("2025.1", csv).unwrap();
        assert_eq!(table.version(), "2025.1");
        assert_eq!(table.resolve_digits("0422123456").unwrap().city, "武蔵野市");
    }

    #[test]
    fn csv_bad_coordinate() {
        let csv = "prefix,prefecture,city,lat,lng\n03,東京都,特別区部,north,139.7\n";
        assert!(AreaCodeTable::from_csv("x", csv).is_err());
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(local in "[1-9][0-9]{8}") {
            let table = AreaCodeTable::builtin();
            let digits = format!("0{local}");
            let a = table.resolve_digits(&digits).map(|e| e.prefix.clone());
            let b = table.resolve_digits(&digits).map(|e| e.prefix.clone());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn mobile_and_freephone_never_resolve(kind in 0usize..6, rest in "[0-9]{8}") {
            let head = ["090", "080", "070", "050", "0120", "0800"][kind];
            let table = AreaCodeTable::builtin();
            let is_not_geographic = matches!(
                table.resolve_digits(&format!("{head}{rest}")),
                Err(LocateError::NotGeographic { .. })
            );
            prop_assert!(is_not_geographic);
        }
    }
}
