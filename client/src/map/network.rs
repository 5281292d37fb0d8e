//! Transit network data: stations and line geometry
//!
//! The dataset is a JSON document:
//!
//! ```json
//! {
//!   "stations": [
//!     { "name": "Курская", "name_en": "Kurskaya", "lat": 55.758, "lon": 37.659,
//!       "lines": [ { "ref": "3", "colour": "#0078BE" }, { "ref": "5", "colour": "#894E35" } ] }
//!   ],
//!   "lines": [ { "color": "#894E35", "coords": [[55.776, 37.655], [55.758, 37.659]] } ]
//! }
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use super::hit_test::PointEntity;
use super::projection::GeoPoint;

/// Environment variable holding the path of the dataset
pub const DATA_ENV: &str = "METROMAP_DATA";

/// Color used for stations and lines without a colour tag
pub const DEFAULT_LINE_COLOR: &str = "#888888";

/// Bundled sample of central Moscow
const SAMPLE_NETWORK: &str = include_str!("../../assets/metro.json");

#[derive(Debug, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    stations: Vec<StationRecord>,
    #[serde(default)]
    lines: Vec<LineRecord>,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    name: String,
    #[serde(default)]
    name_en: Option<String>,
    lat: f64,
    lon: f64,
    #[serde(default)]
    lines: Vec<LineMembership>,
}

#[derive(Debug, Clone, Deserialize)]
struct LineMembership {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default = "default_colour")]
    colour: String,
}

fn default_colour() -> String {
    DEFAULT_LINE_COLOR.to_string()
}

#[derive(Debug, Deserialize)]
struct LineRecord {
    #[serde(default = "default_colour")]
    color: String,
    coords: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub name: String,
    pub name_en: String,
    pub position: GeoPoint,
    /// Line refs, numeric first
    pub lines: Vec<String>,
    /// Colors in the same order as `lines`
    pub line_colors: Vec<String>,
}

impl Station {
    /// Primary color (first line)
    pub fn color(&self) -> &str {
        self.line_colors
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LINE_COLOR)
    }

    pub fn is_transfer(&self) -> bool {
        self.line_colors.len() > 1
    }

    pub fn lines_label(&self) -> String {
        self.lines.join(", ")
    }
}

impl PointEntity for Station {
    fn position(&self) -> GeoPoint {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineGeometry {
    pub color: String,
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitNetwork {
    pub stations: Vec<Station>,
    pub lines: Vec<LineGeometry>,
}

impl TransitNetwork {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: NetworkFile = serde_json::from_str(json).context("invalid network JSON")?;
        Ok(Self::build(file))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read network {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("failed to load network {}", path.display()))
    }

    /// The bundled central Moscow sample
    pub fn sample() -> Self {
        match Self::from_json(SAMPLE_NETWORK) {
            Ok(network) => network,
            Err(e) => {
                log::warn!("{:#}", e);
                Self::default()
            }
        }
    }

    /// Load from `METROMAP_DATA` if set, else the bundled sample. A broken
    /// file yields an empty network so the map stays usable.
    pub fn from_env() -> Self {
        let network = match std::env::var(DATA_ENV) {
            Ok(path) => Self::load(&path).unwrap_or_else(|e| {
                log::warn!("{:#}; continuing without stations", e);
                Self::default()
            }),
            Err(_) => Self::sample(),
        };
        log::info!(
            "Transit network: {} stations, {} line segments",
            network.stations.len(),
            network.lines.len()
        );
        network
    }

    fn build(file: NetworkFile) -> Self {
        let mut seen_names = HashSet::new();
        let mut stations = Vec::with_capacity(file.stations.len());

        for record in file.stations {
            if record.name.is_empty() || !record.lat.is_finite() || !record.lon.is_finite() {
                continue;
            }
            if !seen_names.insert(record.name.clone()) {
                continue;
            }

            let mut memberships: Vec<LineMembership> = Vec::new();
            for line in record.lines {
                if !memberships.iter().any(|m| m.reference == line.reference) {
                    memberships.push(line);
                }
            }
            memberships.sort_by(|a, b| compare_line_refs(&a.reference, &b.reference));

            let name_en = match record.name_en {
                Some(name_en) if !name_en.is_empty() => name_en,
                _ => transliterate(&record.name),
            };

            stations.push(Station {
                name: record.name,
                name_en,
                position: GeoPoint::new(record.lat, record.lon),
                lines: memberships.iter().map(|m| m.reference.clone()).collect(),
                line_colors: memberships.into_iter().map(|m| m.colour).collect(),
            });
        }
        stations.sort_by(|a, b| compare_station_names(&a.name, &b.name));

        let lines = file
            .lines
            .into_iter()
            .filter(|line| line.coords.len() >= 2)
            .map(|line| LineGeometry {
                color: line.color,
                points: line
                    .coords
                    .into_iter()
                    .map(|[lat, lon]| GeoPoint::new(lat, lon))
                    .collect(),
            })
            .collect();

        Self { stations, lines }
    }
}

/// Alphabetical order for Russian names: case-insensitive, `ё` sorted with
/// `е`, exact text as the tie-break. Code point order alone would put `Ё`
/// before `А`.
fn compare_station_names(a: &str, b: &str) -> Ordering {
    fn primary(name: &str) -> impl Iterator<Item = char> + '_ {
        name.chars().flat_map(char::to_lowercase).map(|c| if c == 'ё' { 'е' } else { c })
    }
    primary(a).cmp(primary(b)).then_with(|| a.cmp(b))
}

/// Numeric refs ("1", "11A") sort before others ("D1"), then lexically
fn compare_line_refs(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| s.chars().next().is_some_and(|c| c.is_ascii_digit());
    numeric(b).cmp(&numeric(a)).then_with(|| a.cmp(b))
}

/// Cyrillic to Latin transliteration for stations without an English name
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let latin = match c {
            'А' => "A", 'Б' => "B", 'В' => "V", 'Г' => "G", 'Д' => "D", 'Е' => "E", 'Ё' => "Yo",
            'Ж' => "Zh", 'З' => "Z", 'И' => "I", 'Й' => "Y", 'К' => "K", 'Л' => "L", 'М' => "M",
            'Н' => "N", 'О' => "O", 'П' => "P", 'Р' => "R", 'С' => "S", 'Т' => "T", 'У' => "U",
            'Ф' => "F", 'Х' => "Kh", 'Ц' => "Ts", 'Ч' => "Ch", 'Ш' => "Sh", 'Щ' => "Shch",
            'Ъ' => "", 'Ы' => "Y", 'Ь' => "", 'Э' => "E", 'Ю' => "Yu", 'Я' => "Ya",
            'а' => "a", 'б' => "b", 'в' => "v", 'г' => "g", 'д' => "d", 'е' => "e", 'ё' => "yo",
            'ж' => "zh", 'з' => "z", 'и' => "i", 'й' => "y", 'к' => "k", 'л' => "l", 'м' => "m",
            'н' => "n", 'о' => "o", 'п' => "p", 'р' => "r", 'с' => "s", 'т' => "t", 'у' => "u",
            'ф' => "f", 'х' => "kh", 'ц' => "ts", 'ч' => "ch", 'ш' => "sh", 'щ' => "shch",
            'ъ' => "", 'ы' => "y", 'ь' => "", 'э' => "e", 'ю' => "yu", 'я' => "ya",
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(latin);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("Щёлковская"), "Shchyolkovskaya");
        assert_eq!(transliterate("Охотный Ряд"), "Okhotnyy Ryad");
        assert_eq!(transliterate("ВДНХ-2"), "VDNKh-2");
    }

    #[test]
    fn test_station_names_sort_alphabetically() {
        let mut names = vec!["Жулебино", "Ёлки", "Арбатская", "Елоховская", "белорусская", "Ясенево"];
        names.sort_by(|a, b| compare_station_names(a, b));
        assert_eq!(names, vec!["Арбатская", "белорусская", "Ёлки", "Елоховская", "Жулебино", "Ясенево"]);
        assert_ne!(compare_station_names("Ёлки", "Елки"), Ordering::Equal);
    }

    #[test]
    fn test_line_ref_order() {
        let mut refs = vec!["D1", "11", "2", "МЦК", "11A", "1"];
        refs.sort_by(|a, b| compare_line_refs(a, b));
        assert_eq!(refs, vec!["1", "11", "11A", "2", "D1", "МЦК"]);
    }

    #[test]
    fn test_build_network() {
        let json = r##"{
            "stations": [
                { "name": "Курская", "lat": 55.7586, "lon": 37.6590,
                  "lines": [ { "ref": "5", "colour": "#894E35" }, { "ref": "3", "colour": "#0078BE" },
                             { "ref": "5", "colour": "#894E35" } ] },
                { "name": "Арбатская", "name_en": "Arbatskaya", "lat": 55.7522, "lon": 37.6033,
                  "lines": [ { "ref": "3" } ] },
                { "name": "Курская", "lat": 0.0, "lon": 0.0 },
                { "name": "", "lat": 1.0, "lon": 1.0 }
            ],
            "lines": [
                { "color": "#0078BE", "coords": [[55.75, 37.60], [55.76, 37.66]] },
                { "color": "#0078BE", "coords": [[55.75, 37.60]] }
            ]
        }"##;
        let network = TransitNetwork::from_json(json).unwrap();

        assert_eq!(network.stations.len(), 2);
        let arbatskaya = &network.stations[0];
        assert_eq!(arbatskaya.name_en, "Arbatskaya");
        assert_eq!(arbatskaya.color(), DEFAULT_LINE_COLOR);
        assert!(!arbatskaya.is_transfer());

        let kurskaya = &network.stations[1];
        assert_eq!(kurskaya.name_en, "Kurskaya");
        assert_eq!(kurskaya.lines, vec!["3", "5"]);
        assert_eq!(kurskaya.line_colors, vec!["#0078BE", "#894E35"]);
        assert_eq!(kurskaya.lines_label(), "3, 5");
        assert!(kurskaya.is_transfer());
        assert_eq!(kurskaya.position, GeoPoint::new(55.7586, 37.6590));

        assert_eq!(network.lines.len(), 1);
        assert_eq!(network.lines[0].points.len(), 2);
    }

    #[test]
    fn test_bundled_sample_parses() {
        let network = TransitNetwork::sample();
        assert!(!network.stations.is_empty());
        assert!(!network.lines.is_empty());
        assert!(network.stations.iter().any(Station::is_transfer));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(TransitNetwork::from_json("{ not json").is_err());
    }
}
