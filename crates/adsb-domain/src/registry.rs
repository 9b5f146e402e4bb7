use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Reference data for one airframe, keyed by ICAO hex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftInfo {
    pub registration: Option<String>,
    pub icao_type: Option<String>,
    pub model: Option<String>,
    pub is_military: bool,
    pub is_interesting: bool,
    pub is_pia: bool,
    pub is_ladd: bool,
}

/// In-memory lookup over the tar1090-style aircraft reference file.
///
/// File format: semicolon-delimited, `icao;registration;type;flags;model`,
/// no header. The flags field is a single integer; bit 0 = military,
/// bit 1 = interesting, bit 2 = PIA, bit 3 = LADD. Rows that fail to parse
/// are skipped, never fatal.
///
/// An empty registry (no file configured) is valid: every lookup misses and
/// enrichment fields stay absent on the envelope.
#[derive(Debug, Default)]
pub struct AircraftRegistry {
    entries: HashMap<String, AircraftInfo>,
}

impl AircraftRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open aircraft reference file {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line.context("failed to read aircraft reference file")?;
            match parse_row(&line) {
                Some((icao, info)) => {
                    entries.insert(icao, info);
                }
                None => {
                    if !line.trim().is_empty() {
                        skipped += 1;
                    }
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %path.display(), "skipped unparseable aircraft reference rows");
        }
        info!(entries = entries.len(), path = %path.display(), "loaded aircraft reference data");
        Ok(Self { entries })
    }

    pub fn lookup(&self, icao_hex: &str) -> Option<&AircraftInfo> {
        let hit = self.entries.get(icao_hex.trim().to_uppercase().as_str());
        if hit.is_none() {
            debug!(icao = icao_hex, "aircraft reference miss");
        }
        hit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_row(line: &str) -> Option<(String, AircraftInfo)> {
    let mut fields = line.split(';');
    let icao = fields.next()?.trim().to_uppercase();
    if icao.is_empty() {
        return None;
    }

    // A row with no delimiter at all is not reference data
    let registration = non_empty(Some(fields.next()?));
    let icao_type = non_empty(fields.next());
    let flags = fields
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<u8>().ok())
        .unwrap_or(0);
    let model = non_empty(fields.next());

    let info = AircraftInfo {
        registration,
        icao_type,
        model,
        is_military: flags & 0b0001 != 0,
        is_interesting: flags & 0b0010 != 0,
        is_pia: flags & 0b0100 != 0,
        is_ladd: flags & 0b1000 != 0,
    };
    Some((icao, info))
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
