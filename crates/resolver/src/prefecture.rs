//! Static prefecture reference: regional block, land neighbours and the
//! prefectural capital centroid.
//!
//! Regions are ordered roughly north to south so that the index distance
//! between two blocks is a usable proxy for how far apart they are.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::{GeoPoint, Place};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Hokkaido = 0,
    Tohoku = 1,
    Kanto = 2,
    Koshinetsu = 3,
    Hokuriku = 4,
    Tokai = 5,
    Kinki = 6,
    Chugoku = 7,
    Shikoku = 8,
    Kyushu = 9,
    Okinawa = 10,
}

impl Region {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn distance(self, other: Region) -> u8 {
        self.index().abs_diff(other.index())
    }
}

#[derive(Debug)]
pub struct Prefecture {
    pub name: &'static str,
    pub region: Region,
    pub capital: &'static str,
    pub centroid: GeoPoint,
    pub neighbours: &'static [&'static str],
}

impl Prefecture {
    pub fn capital_place(&self) -> Place {
        Place::new(self.name, Some(self.capital.to_string()))
    }
}

macro_rules! pref {
    ($name:expr, $region:ident, $capital:expr, $lat:expr, $lng:expr, [$($n:expr),* $(,)?]) => {
        Prefecture {
            name: $name,
            region: Region::$region,
            capital: $capital,
            centroid: GeoPoint::new($lat, $lng),
            neighbours: &[$($n),*],
        }
    };
}

pub static PREFECTURES: [Prefecture; 47] = [
    pref!("北海道", Hokkaido, "札幌市", 43.0642, 141.3469, ["青森県"]),
    pref!("青森県", Tohoku, "青森市", 40.8244, 140.7400, ["北海道", "岩手県", "秋田県"]),
    pref!("岩手県", Tohoku, "盛岡市", 39.7036, 141.1527, ["青森県", "秋田県", "宮城県"]),
    pref!("宮城県", Tohoku, "仙台市", 38.2688, 140.8721, ["岩手県", "秋田県", "山形県", "福島県"]),
    pref!("秋田県", Tohoku, "秋田市", 39.7186, 140.1024, ["青森県", "岩手県", "宮城県", "山形県"]),
    pref!("山形県", Tohoku, "山形市", 38.2404, 140.3633, ["秋田県", "宮城県", "福島県", "新潟県"]),
    pref!("福島県", Tohoku, "福島市", 37.7500, 140.4678, ["宮城県", "山形県", "新潟県", "群馬県", "栃木県", "茨城県"]),
    pref!("茨城県", Kanto, "水戸市", 36.3418, 140.4468, ["福島県", "栃木県", "埼玉県", "千葉県"]),
    pref!("栃木県", Kanto, "宇都宮市", 36.5657, 139.8836, ["福島県", "茨城県", "群馬県", "埼玉県"]),
    pref!("群馬県", Kanto, "前橋市", 36.3911, 139.0608, ["福島県", "栃木県", "埼玉県", "長野県", "新潟県"]),
    pref!("埼玉県", Kanto, "さいたま市", 35.8569, 139.6489, ["茨城県", "栃木県", "群馬県", "長野県", "山梨県", "東京都", "千葉県"]),
    pref!("千葉県", Kanto, "千葉市", 35.6047, 140.1233, ["茨城県", "埼玉県", "東京都"]),
    pref!("東京都", Kanto, "新宿区", 35.6895, 139.6917, ["埼玉県", "千葉県", "神奈川県", "山梨県"]),
    pref!("神奈川県", Kanto, "横浜市", 35.4478, 139.6425, ["東京都", "山梨県", "静岡県"]),
    pref!("新潟県", Koshinetsu, "新潟市", 37.9026, 139.0236, ["山形県", "福島県", "群馬県", "長野県", "富山県"]),
    pref!("富山県", Hokuriku, "富山市", 36.6953, 137.2113, ["新潟県", "長野県", "岐阜県", "石川県"]),
    pref!("石川県", Hokuriku, "金沢市", 36.5947, 136.6256, ["富山県", "岐阜県", "福井県"]),
    pref!("福井県", Hokuriku, "福井市", 36.0652, 136.2216, ["石川県", "岐阜県", "滋賀県", "京都府"]),
    pref!("山梨県", Koshinetsu, "甲府市", 35.6642, 138.5684, ["埼玉県", "東京都", "神奈川県", "静岡県", "長野県"]),
    pref!("長野県", Koshinetsu, "長野市", 36.6513, 138.1810, ["新潟県", "群馬県", "埼玉県", "山梨県", "静岡県", "愛知県", "岐阜県", "富山県"]),
    pref!("岐阜県", Tokai, "岐阜市", 35.3912, 136.7223, ["富山県", "石川県", "福井県", "長野県", "愛知県", "三重県", "滋賀県"]),
    pref!("静岡県", Tokai, "静岡市", 34.9769, 138.3831, ["神奈川県", "山梨県", "長野県", "愛知県"]),
    pref!("愛知県", Tokai, "名古屋市", 35.1802, 136.9066, ["静岡県", "長野県", "岐阜県", "三重県"]),
    pref!("三重県", Tokai, "津市", 34.7303, 136.5086, ["愛知県", "岐阜県", "滋賀県", "京都府", "奈良県", "和歌山県"]),
    pref!("滋賀県", Kinki, "大津市", 35.0045, 135.8686, ["福井県", "岐阜県", "三重県", "京都府"]),
    pref!("京都府", Kinki, "京都市", 35.0212, 135.7556, ["福井県", "滋賀県", "三重県", "奈良県", "大阪府", "兵庫県"]),
    pref!("大阪府", Kinki, "大阪市", 34.6863, 135.5200, ["京都府", "奈良県", "和歌山県", "兵庫県"]),
    pref!("兵庫県", Kinki, "神戸市", 34.6913, 135.1830, ["京都府", "大阪府", "鳥取県", "岡山県"]),
    pref!("奈良県", Kinki, "奈良市", 34.6851, 135.8328, ["三重県", "京都府", "大阪府", "和歌山県"]),
    pref!("和歌山県", Kinki, "和歌山市", 34.2261, 135.1675, ["三重県", "奈良県", "大阪府"]),
    pref!("鳥取県", Chugoku, "鳥取市", 35.5039, 134.2377, ["兵庫県", "岡山県", "広島県", "島根県"]),
    pref!("島根県", Chugoku, "松江市", 35.4723, 133.0505, ["鳥取県", "広島県", "山口県"]),
    pref!("岡山県", Chugoku, "岡山市", 34.6618, 133.9344, ["兵庫県", "鳥取県", "広島県"]),
    pref!("広島県", Chugoku, "広島市", 34.3966, 132.4596, ["岡山県", "鳥取県", "島根県", "山口県"]),
    pref!("山口県", Chugoku, "山口市", 34.1859, 131.4714, ["広島県", "島根県", "福岡県"]),
    pref!("徳島県", Shikoku, "徳島市", 34.0658, 134.5593, ["香川県", "愛媛県", "高知県"]),
    pref!("香川県", Shikoku, "高松市", 34.3401, 134.0434, ["徳島県", "愛媛県"]),
    pref!("愛媛県", Shikoku, "松山市", 33.8416, 132.7657, ["香川県", "徳島県", "高知県"]),
    pref!("高知県", Shikoku, "高知市", 33.5597, 133.5311, ["徳島県", "愛媛県"]),
    pref!("福岡県", Kyushu, "福岡市", 33.6064, 130.4181, ["山口県", "佐賀県", "熊本県", "大分県"]),
    pref!("佐賀県", Kyushu, "佐賀市", 33.2494, 130.2988, ["福岡県", "長崎県"]),
    pref!("長崎県", Kyushu, "長崎市", 32.7448, 129.8737, ["佐賀県"]),
    pref!("熊本県", Kyushu, "熊本市", 32.7898, 130.7417, ["福岡県", "大分県", "宮崎県", "鹿児島県"]),
    pref!("大分県", Kyushu, "大分市", 33.2382, 131.6126, ["福岡県", "熊本県", "宮崎県"]),
    pref!("宮崎県", Kyushu, "宮崎市", 31.9111, 131.4239, ["大分県", "熊本県", "鹿児島県"]),
    pref!("鹿児島県", Kyushu, "鹿児島市", 31.5602, 130.5581, ["熊本県", "宮崎県"]),
    pref!("沖縄県", Okinawa, "那覇市", 26.2124, 127.6809, []),
];

fn index() -> &'static HashMap<&'static str, &'static Prefecture> {
    static INDEX: OnceLock<HashMap<&'static str, &'static Prefecture>> = OnceLock::new();
    INDEX.get_or_init(|| PREFECTURES.iter().map(|p| (p.name, p)).collect())
}

pub fn lookup(name: &str) -> Option<&'static Prefecture> {
    index().get(name).copied()
}

pub fn is_prefecture(name: &str) -> bool {
    index().contains_key(name)
}

pub fn are_adjacent(a: &str, b: &str) -> bool {
    lookup(a).map(|p| p.neighbours.contains(&b)).unwrap_or(false)
}

/// Region-block distance between two prefectures. `None` if either name is unknown.
pub fn region_distance(a: &str, b: &str) -> Option<u8> {
    Some(lookup(a)?.region.distance(lookup(b)?.region))
}
