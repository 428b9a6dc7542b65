//! Station ("barra") mapping between the two upstream naming schemes.
//!
//! The Online feed identifies a bus by `barra_transf` (e.g. `P.MONTT_______220`),
//! the Programmed feed by `llave_cmg` (e.g. `PMontt220`). The mapping is fixed and
//! authoritative; the fragment table only backs the degraded fuzzy mode.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How Online rows are attributed to a known station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StationMatch {
    /// Exact lookup on the upstream `barra_transf` identifier.
    #[default]
    Exact,
    /// Exact lookup first, then a case-insensitive name fragment plus voltage
    /// match against `barra_info`.
    ///
    /// Only meant for periods where the upstream identifier format is unstable.
    Fragment,
}

/// One known station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub online_key: String,
    pub programmed_key: String,
    /// Upper-case fragment of the bus name, used by `StationMatch::Fragment`.
    pub fragment: String,
}

impl Station {
    pub fn new(online_key: &str, programmed_key: &str, fragment: &str) -> Self {
        Self {
            online_key: online_key.to_string(),
            programmed_key: programmed_key.to_string(),
            fragment: fragment.to_string(),
        }
    }

    /// Readable label derived from the online key.
    ///
    /// `P.MONTT_______220` → `P Montt 220 kV`.
    pub fn display_name(&self) -> String {
        display_name(&self.online_key)
    }

    /// Voltage level in kV, the trailing token of the online key.
    pub fn voltage(&self) -> &str {
        voltage_token(&self.online_key)
    }
}

const DEFAULT_STATIONS: [(&str, &str, &str); 8] = [
    ("P.MONTT_______220", "PMontt220", "PUERTO MONTT"),
    ("A.JAHUEL______220", "AJahuel220", "JAHUEL"),
    ("POLPAICO______220", "Polpaico220", "POLPAICO"),
    ("P.AZUCAR______220", "PAzucar220", "AZUCAR"),
    ("CARDONES______220", "Cardones220", "CARDONES"),
    ("QUILLOTA______220", "Quillota220", "QUILLOTA"),
    ("CRUCERO_______220", "Crucero220", "CRUCERO"),
    ("CHARRUA_______220", "Charrua220", "CHARRUA"),
];

/// Immutable bijection between the two station naming schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationMap {
    stations: Vec<Station>,
}

impl Default for StationMap {
    fn default() -> Self {
        Self::new(
            DEFAULT_STATIONS
                .iter()
                .map(|&(online, programmed, fragment)| Station::new(online, programmed, fragment))
                .collect(),
        )
    }
}

impl StationMap {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn by_online_key(&self, key: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.online_key == key)
    }

    pub fn by_programmed_key(&self, key: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.programmed_key == key)
    }

    /// Resolve an Online row to a station using the configured strategy.
    ///
    /// Fragment mode still prefers the exact key. The name is only consulted
    /// for an unknown `barra_transf`, and must carry the station's voltage so
    /// other voltage levels of the same substation are not folded in.
    pub fn resolve_online(&self, mode: StationMatch, online_key: &str, name: &str) -> Option<&Station> {
        let exact = self.by_online_key(online_key.trim());
        match mode {
            StationMatch::Exact => exact,
            StationMatch::Fragment => exact.or_else(|| {
                let upper = name.to_uppercase();
                self.stations.iter().find(|s| {
                    upper.contains(&s.fragment.to_uppercase()) && numeric_tokens(&upper).any(|t| t == s.voltage())
                })
            }),
        }
    }

    /// Look up a station by key, display name or name fragment (case-insensitive).
    pub fn find(&self, query: &str) -> Option<&Station> {
        let q = query.trim();
        self.by_online_key(q)
            .or_else(|| self.by_programmed_key(q))
            .or_else(|| {
                self.stations
                    .iter()
                    .find(|s| s.display_name().eq_ignore_ascii_case(q))
            })
            .or_else(|| {
                self.stations
                    .iter()
                    .find(|s| s.programmed_key.eq_ignore_ascii_case(q))
            })
            .or_else(|| {
                let q = q.to_uppercase();
                if q.is_empty() {
                    return None;
                }
                self.stations
                    .iter()
                    .find(|s| s.fragment.contains(&q) || s.display_name().to_uppercase().contains(&q))
            })
    }
}

fn voltage_token(online_key: &str) -> &str {
    online_key.trim_matches('_').rsplit('_').next().unwrap_or_default()
}

/// Maximal runs of ASCII digits, so `220KV` yields `220` and `2200` never does.
fn numeric_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_ascii_digit()).filter(|t| !t.is_empty())
}

fn display_name(online_key: &str) -> String {
    let base = online_key.split('_').next().unwrap_or_default().replace('.', " ");
    format!("{} {} kV", title_case(base.trim()), voltage_token(online_key))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if prev_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_readable() {
        let map = StationMap::default();
        let names: Vec<String> = map.stations().iter().map(Station::display_name).collect();
        assert_eq!(names[0], "P Montt 220 kV");
        assert_eq!(names[1], "A Jahuel 220 kV");
        assert_eq!(names[2], "Polpaico 220 kV");
    }

    #[test]
    fn mapping_is_a_bijection() {
        let map = StationMap::default();
        assert_eq!(map.len(), 8);
        for s in map.stations() {
            assert_eq!(map.by_online_key(&s.online_key), Some(s));
            assert_eq!(map.by_programmed_key(&s.programmed_key), Some(s));
        }
    }

    #[test]
    fn exact_match_ignores_names() {
        let map = StationMap::default();
        let hit = map.resolve_online(StationMatch::Exact, "CHARRUA_______220", "whatever");
        assert_eq!(hit.map(|s| s.programmed_key.as_str()), Some("Charrua220"));
        assert!(map.resolve_online(StationMatch::Exact, "CHARRUA_220", "CHARRUA 220").is_none());
    }

    #[test]
    fn fragment_match_is_case_insensitive() {
        let map = StationMap::default();
        let hit = map.resolve_online(StationMatch::Fragment, "", "S/E Puerto Montt 220kV");
        assert_eq!(hit.map(|s| s.programmed_key.as_str()), Some("PMontt220"));
        assert!(map.resolve_online(StationMatch::Fragment, "", "Alto Jahuel 220").is_some());
        assert!(map.resolve_online(StationMatch::Fragment, "", "Lo Aguirre 220").is_none());
    }

    #[test]
    fn fragment_match_keeps_other_voltages_apart() {
        let map = StationMap::default();
        let known = map.resolve_online(StationMatch::Fragment, "CHARRUA_______220", "BA S/E CHARRUA 500KV");
        assert_eq!(known.map(|s| s.programmed_key.as_str()), Some("Charrua220"));

        assert!(map.resolve_online(StationMatch::Fragment, "CHARRUA_______500", "BA S/E CHARRUA 500KV").is_none());
        assert!(map.resolve_online(StationMatch::Fragment, "", "Alto Jahuel").is_none());
        assert!(map.resolve_online(StationMatch::Fragment, "", "CHARRUA 2200KV").is_none());

        let renamed = map.resolve_online(StationMatch::Fragment, "CHARRUA_220", "BA S/E CHARRUA 220KV");
        assert_eq!(renamed.map(|s| s.online_key.as_str()), Some("CHARRUA_______220"));
    }

    #[test]
    fn find_accepts_any_naming_scheme() {
        let map = StationMap::default();
        assert_eq!(map.find("Quillota220").map(|s| s.online_key.as_str()), Some("QUILLOTA______220"));
        assert_eq!(map.find("quillota220").map(|s| s.online_key.as_str()), Some("QUILLOTA______220"));
        assert_eq!(map.find("crucero 220 kv").map(|s| s.programmed_key.as_str()), Some("Crucero220"));
        assert_eq!(map.find("charrua").map(|s| s.programmed_key.as_str()), Some("Charrua220"));
        assert!(map.find("nowhere").is_none());
    }
}
