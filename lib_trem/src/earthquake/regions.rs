//! Static reference data for the 22 county-level regions of Taiwan and the
//! three-digit postal codes of their townships.

/// One county-level region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// ISO-like region code, e.g. `TWTPE`.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Centre latitude.
    pub lat: f64,
    /// Centre longitude.
    pub lon: f64,
    /// Soil amplification multiplier.
    pub site_effect: f64,
    /// Inclusive ZIP3 ranges of the region's townships.
    pub zip_ranges: &'static [(u16, u16)],
}

impl Region {
    /// True when `zip` is one of the region's township codes.
    pub fn contains_zip(&self, zip: u16) -> bool {
        self.zip_ranges.iter().any(|&(start, end)| (start..=end).contains(&zip))
    }
}

/// Geographic centre of Taiwan, used when a record carries no position.
pub const TAIWAN_CENTER: (f64, f64) = (23.97565, 120.9738819);

macro_rules! region {
    ($code:literal, $name:literal, $lat:literal, $lon:literal, $site:literal, [$(($a:literal, $b:literal)),+]) => {
        Region {
            code: $code,
            name: $name,
            lat: $lat,
            lon: $lon,
            site_effect: $site,
            zip_ranges: &[$(($a, $b)),+],
        }
    };
}

/// Every region, outlying islands first.
pub const REGIONS: &[Region] = &[
    region!("TWKIN", "金門縣", 24.43, 118.32, 0.75, [(890, 896)]),
    region!("TWLIE", "媽祖群島", 26.15, 119.92, 0.7, [(209, 212)]),
    region!("TWPEN", "澎湖縣", 23.57, 119.58, 0.8, [(880, 885)]),
    region!("TWTAO", "桃園市", 24.99, 121.31, 1.15, [(320, 338)]),
    region!("TWHSQ", "新竹縣", 24.84, 121.01, 1.1, [(302, 315)]),
    region!("TWHSZ", "新竹市", 24.80, 120.97, 1.1, [(300, 300)]),
    region!("TWMIA", "苗栗縣", 24.56, 120.82, 1.05, [(350, 369)]),
    region!("TWTXG", "臺中市", 24.14, 120.68, 1.0, [(400, 439)]),
    region!("TWNAN", "南投縣", 23.91, 120.69, 1.2, [(540, 558)]),
    region!("TWCHA", "彰化縣", 24.07, 120.54, 0.95, [(500, 530)]),
    region!("TWYUN", "雲林縣", 23.71, 120.43, 0.9, [(630, 655)]),
    region!("TWCYQ", "嘉義縣", 23.48, 120.45, 0.85, [(602, 625)]),
    region!("TWTNN", "臺南市", 22.99, 120.21, 0.95, [(700, 745)]),
    region!("TWKHH", "高雄市", 22.62, 120.31, 0.9, [(800, 852)]),
    region!("TWPIF", "屏東縣", 22.67, 120.49, 0.9, [(900, 947)]),
    region!("TWTTT", "臺東縣", 22.75, 121.15, 1.25, [(950, 966)]),
    region!("TWHUA", "花蓮縣", 23.97, 121.60, 1.3, [(970, 983)]),
    region!("TWILA", "宜蘭縣", 24.75, 121.75, 1.3, [(260, 272)]),
    region!("TWNWT", "新北市", 25.01, 121.45, 1.1, [(207, 208), (220, 253)]),
    region!("TWKEE", "基隆市", 25.13, 121.74, 1.15, [(200, 206)]),
    region!("TWTPE", "臺北市", 25.05, 121.55, 1.2, [(100, 116)]),
    region!("TWCYI", "嘉義市", 23.48, 120.45, 0.85, [(600, 600)]),
];

/// Township names by ZIP3, sorted by code. Cities that share one code for
/// all districts map to an empty name.
const ZIP3_TOWNS: &[(u16, &str)] = &[
    (100, "中正區"), (103, "大同區"), (104, "中山區"), (105, "松山區"), (106, "大安區"),
    (108, "萬華區"), (110, "信義區"), (111, "士林區"), (112, "北投區"), (114, "內湖區"),
    (115, "南港區"), (116, "文山區"),
    (200, "仁愛區"), (201, "信義區"), (202, "中正區"), (203, "中山區"), (204, "安樂區"),
    (205, "暖暖區"), (206, "七堵區"),
    (207, "萬里區"), (208, "金山區"),
    (209, "南竿鄉"), (210, "北竿鄉"), (211, "莒光鄉"), (212, "東引鄉"),
    (220, "板橋區"), (221, "汐止區"), (222, "深坑區"), (223, "石碇區"), (224, "瑞芳區"),
    (226, "平溪區"), (227, "雙溪區"), (228, "貢寮區"), (231, "新店區"), (232, "坪林區"),
    (233, "烏來區"), (234, "永和區"), (235, "中和區"), (236, "土城區"), (237, "三峽區"),
    (238, "樹林區"), (239, "鶯歌區"), (241, "三重區"), (242, "新莊區"), (243, "泰山區"),
    (244, "林口區"), (247, "蘆洲區"), (248, "五股區"), (249, "八里區"), (251, "淡水區"),
    (252, "三芝區"), (253, "石門區"),
    (260, "宜蘭市"), (261, "頭城鎮"), (262, "礁溪鄉"), (263, "壯圍鄉"), (264, "員山鄉"),
    (265, "羅東鎮"), (266, "三星鄉"), (267, "大同鄉"), (268, "五結鄉"), (269, "冬山鄉"),
    (270, "蘇澳鎮"), (272, "南澳鄉"),
    (300, ""),
    (302, "竹北市"), (303, "湖口鄉"), (304, "新豐鄉"), (305, "新埔鎮"), (306, "關西鎮"),
    (307, "芎林鄉"), (308, "寶山鄉"), (310, "竹東鎮"), (311, "五峰鄉"), (312, "橫山鄉"),
    (313, "尖石鄉"), (314, "北埔鄉"), (315, "峨眉鄉"),
    (320, "中壢區"), (324, "平鎮區"), (325, "龍潭區"), (326, "楊梅區"), (327, "新屋區"),
    (328, "觀音區"), (330, "桃園區"), (333, "龜山區"), (334, "八德區"), (335, "大溪區"),
    (336, "復興區"), (337, "大園區"), (338, "蘆竹區"),
    (350, "竹南鎮"), (351, "頭份市"), (352, "三灣鄉"), (353, "南庄鄉"), (354, "獅潭鄉"),
    (356, "後龍鎮"), (357, "通霄鎮"), (358, "苑裡鎮"), (360, "苗栗市"), (361, "造橋鄉"),
    (362, "頭屋鄉"), (363, "公館鄉"), (364, "大湖鄉"), (365, "泰安鄉"), (366, "銅鑼鄉"),
    (367, "三義鄉"), (368, "西湖鄉"), (369, "卓蘭鎮"),
    (400, "中區"), (401, "東區"), (402, "南區"), (403, "西區"), (404, "北區"),
    (406, "北屯區"), (407, "西屯區"), (408, "南屯區"), (411, "太平區"), (412, "大里區"),
    (413, "霧峰區"), (414, "烏日區"), (420, "豐原區"), (421, "后里區"), (422, "石岡區"),
    (423, "東勢區"), (424, "和平區"), (426, "新社區"), (427, "潭子區"), (428, "大雅區"),
    (429, "神岡區"), (432, "大肚區"), (433, "沙鹿區"), (434, "龍井區"), (435, "梧棲區"),
    (436, "清水區"), (437, "大甲區"), (438, "外埔區"), (439, "大安區"),
    (500, "彰化市"), (502, "芬園鄉"), (503, "花壇鄉"), (504, "秀水鄉"), (505, "鹿港鎮"),
    (506, "福興鄉"), (507, "線西鄉"), (508, "和美鎮"), (509, "伸港鄉"), (510, "員林市"),
    (511, "社頭鄉"), (512, "永靖鄉"), (513, "埔心鄉"), (514, "溪湖鎮"), (515, "大村鄉"),
    (516, "埔鹽鄉"), (520, "田中鎮"), (521, "北斗鎮"), (522, "田尾鄉"), (523, "埤頭鄉"),
    (524, "溪州鄉"), (525, "竹塘鄉"), (526, "二林鎮"), (527, "大城鄉"), (528, "芳苑鄉"),
    (530, "二水鄉"),
    (540, "南投市"), (541, "中寮鄉"), (542, "草屯鎮"), (544, "國姓鄉"), (545, "埔里鎮"),
    (546, "仁愛鄉"), (551, "名間鄉"), (552, "集集鎮"), (553, "水里鄉"), (555, "魚池鄉"),
    (556, "信義鄉"), (557, "竹山鎮"), (558, "鹿谷鄉"),
    (600, ""),
    (602, "番路鄉"), (603, "梅山鄉"), (604, "竹崎鄉"), (605, "阿里山鄉"), (606, "中埔鄉"),
    (607, "大埔鄉"), (608, "水上鄉"), (611, "鹿草鄉"), (612, "太保市"), (613, "朴子市"),
    (614, "東石鄉"), (615, "六腳鄉"), (616, "新港鄉"), (621, "民雄鄉"), (622, "大林鎮"),
    (623, "溪口鄉"), (624, "義竹鄉"), (625, "布袋鎮"),
    (630, "斗南鎮"), (631, "大埤鄉"), (632, "虎尾鎮"), (633, "土庫鎮"), (634, "褒忠鄉"),
    (635, "東勢鄉"), (636, "臺西鄉"), (637, "崙背鄉"), (638, "麥寮鄉"), (640, "斗六市"),
    (643, "林內鄉"), (646, "古坑鄉"), (647, "莿桐鄉"), (648, "西螺鎮"), (649, "二崙鄉"),
    (651, "北港鎮"), (652, "水林鄉"), (653, "口湖鄉"), (654, "四湖鄉"), (655, "元長鄉"),
    (700, "中西區"), (701, "東區"), (702, "南區"), (704, "北區"), (708, "安平區"),
    (709, "安南區"), (710, "永康區"), (711, "歸仁區"), (712, "新化區"), (713, "左鎮區"),
    (714, "玉井區"), (715, "楠西區"), (716, "南化區"), (717, "仁德區"), (718, "關廟區"),
    (719, "龍崎區"), (720, "官田區"), (721, "麻豆區"), (722, "佳里區"), (723, "西港區"),
    (724, "七股區"), (725, "將軍區"), (726, "學甲區"), (727, "北門區"), (730, "新營區"),
    (731, "後壁區"), (732, "白河區"), (733, "東山區"), (734, "六甲區"), (735, "下營區"),
    (736, "柳營區"), (737, "鹽水區"), (741, "善化區"), (742, "大內區"), (743, "山上區"),
    (744, "新市區"), (745, "安定區"),
    (800, "新興區"), (801, "前金區"), (802, "苓雅區"), (803, "鹽埕區"), (804, "鼓山區"),
    (805, "旗津區"), (806, "前鎮區"), (807, "三民區"), (811, "楠梓區"), (812, "小港區"),
    (813, "左營區"), (814, "仁武區"), (815, "大社區"), (817, "東沙群島"), (819, "南沙群島"),
    (820, "岡山區"), (821, "路竹區"), (822, "阿蓮區"), (823, "田寮區"), (824, "燕巢區"),
    (825, "橋頭區"), (826, "梓官區"), (827, "彌陀區"), (828, "永安區"), (829, "湖內區"),
    (830, "鳳山區"), (831, "大寮區"), (832, "林園區"), (833, "鳥松區"), (840, "大樹區"),
    (842, "旗山區"), (843, "美濃區"), (844, "六龜區"), (845, "內門區"), (846, "杉林區"),
    (847, "甲仙區"), (848, "桃源區"), (849, "那瑪夏區"), (851, "茂林區"), (852, "茄萣區"),
    (880, "馬公市"), (881, "西嶼鄉"), (882, "望安鄉"), (883, "七美鄉"), (884, "白沙鄉"),
    (885, "湖西鄉"),
    (890, "金沙鎮"), (891, "金湖鎮"), (892, "金寧鄉"), (893, "金城鎮"), (894, "烈嶼鄉"),
    (896, "烏坵鄉"),
    (900, "屏東市"), (901, "三地門鄉"), (902, "霧臺鄉"), (903, "瑪家鄉"), (904, "九如鄉"),
    (905, "里港鄉"), (906, "高樹鄉"), (907, "鹽埔鄉"), (908, "長治鄉"), (909, "麟洛鄉"),
    (911, "竹田鄉"), (912, "內埔鄉"), (913, "萬丹鄉"), (920, "潮州鎮"), (921, "泰武鄉"),
    (922, "來義鄉"), (923, "萬巒鄉"), (924, "崁頂鄉"), (925, "新埤鄉"), (926, "南州鄉"),
    (927, "林邊鄉"), (928, "東港鎮"), (929, "琉球鄉"), (931, "佳冬鄉"), (932, "新園鄉"),
    (940, "枋寮鄉"), (941, "枋山鄉"), (942, "春日鄉"), (943, "獅子鄉"), (944, "車城鄉"),
    (945, "牡丹鄉"), (946, "恆春鎮"), (947, "滿州鄉"),
    (950, "臺東市"), (951, "綠島鄉"), (952, "蘭嶼鄉"), (953, "延平鄉"), (954, "卑南鄉"),
    (955, "鹿野鄉"), (956, "關山鎮"), (957, "海端鄉"), (958, "池上鄉"), (959, "東河鄉"),
    (961, "成功鎮"), (962, "長濱鄉"), (963, "太麻里鄉"), (964, "金峰鄉"), (965, "大武鄉"),
    (966, "達仁鄉"),
    (970, "花蓮市"), (971, "新城鄉"), (972, "秀林鄉"), (973, "吉安鄉"), (974, "壽豐鄉"),
    (975, "鳳林鎮"), (976, "光復鄉"), (977, "豐濱鄉"), (978, "瑞穗鄉"), (979, "萬榮鄉"),
    (981, "玉里鎮"), (982, "卓溪鄉"), (983, "富里鄉"),
];

/// Looks a region up by its code.
pub fn region_by_code(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code == code)
}

/// Looks a region up by its display name.
pub fn region_by_name(name: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.name == name)
}

/// Region owning a township postal code.
pub fn county_for_zip(zip: u16) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.contains_zip(zip))
}

/// Township name of a postal code; empty for cities without district codes.
pub fn town_for_zip(zip: u16) -> Option<&'static str> {
    ZIP3_TOWNS
        .binary_search_by_key(&zip, |&(code, _)| code)
        .ok()
        .map(|idx| ZIP3_TOWNS[idx].1)
}

/// County and township joined for display, e.g. `臺南市東區`.
pub fn town_display(zip: u16) -> Option<String> {
    let county = county_for_zip(zip)?;
    let town = town_for_zip(zip)?;
    Some(format!("{}{}", county.name, town))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_complete_and_sorted() {
        assert_eq!(REGIONS.len(), 22);
        assert!(ZIP3_TOWNS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn every_town_belongs_to_exactly_one_region() {
        for &(zip, _) in ZIP3_TOWNS {
            let owners = REGIONS.iter().filter(|r| r.contains_zip(zip)).count();
            assert_eq!(owners, 1, "zip {} has {} owners", zip, owners);
        }
    }

    #[test]
    fn zip_lookups() {
        assert_eq!(county_for_zip(701).map(|r| r.code), Some("TWTNN"));
        assert_eq!(county_for_zip(210).map(|r| r.code), Some("TWLIE"));
        assert_eq!(county_for_zip(208).map(|r| r.code), Some("TWNWT"));
        assert_eq!(county_for_zip(999), None);
        assert_eq!(town_display(972).as_deref(), Some("花蓮縣秀林鄉"));
        assert_eq!(town_display(300).as_deref(), Some("新竹市"));
        assert_eq!(town_for_zip(101), None);
    }

    #[test]
    fn name_and_code_lookups_agree() {
        let tainan = region_by_name("臺南市").unwrap();
        assert_eq!(region_by_code("TWTNN"), Some(tainan));
    }
}
