//! Optional municipality directory (`municipalities.csv`): names and
//! regions used to label spatial results and the report.

use std::collections::BTreeMap;
use std::path::Path;

use crime_stats_crime_models::{MunicipalityId, State, is_capital};
use serde::{Deserialize, Serialize};

use crate::SourceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub municipality_id: MunicipalityId,
    pub name: String,
    pub state: State,
    #[serde(default)]
    pub region: String,
}

/// Lookup by municipality code, tolerant of the 6-digit (no check digit)
/// and 7-digit IBGE forms.
#[derive(Debug, Clone, Default)]
pub struct MunicipalityDirectory {
    by_code: BTreeMap<MunicipalityId, Municipality>,
}

/// Drops the IBGE check digit from a 7-digit code.
const fn short_code(id: MunicipalityId) -> MunicipalityId {
    if id >= 1_000_000 { id / 10 } else { id }
}

impl MunicipalityDirectory {
    #[must_use]
    pub fn new(entries: Vec<Municipality>) -> Self {
        let mut by_code = BTreeMap::new();
        for m in entries {
            by_code.entry(short_code(m.municipality_id)).or_insert(m);
        }
        Self { by_code }
    }

    /// Reads `path`. A missing file yields an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        if !path.is_file() {
            log::info!("No municipality directory at {}", path.display());
            return Ok(Self::default());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<Municipality>, _>>()?;
        log::info!("Loaded {} municipalities from {}", entries.len(), path.display());
        Ok(Self::new(entries))
    }

    #[must_use]
    pub fn get(&self, id: MunicipalityId) -> Option<&Municipality> {
        self.by_code.get(&short_code(id))
    }

    /// Display name, falling back to the code.
    #[must_use]
    pub fn name(&self, id: MunicipalityId) -> String {
        self.get(id).map_or_else(|| id.to_string(), |m| m.name.clone())
    }

    #[must_use]
    pub fn region(&self, id: MunicipalityId) -> String {
        self.get(id).map(|m| m.region.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_capital(&self, id: MunicipalityId) -> bool {
        is_capital(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_both_code_forms() {
        let dir = MunicipalityDirectory::new(vec![Municipality {
            municipality_id: 3_304_557,
            name: "Rio de Janeiro".to_string(),
            state: State::Rj,
            region: "Metropolitana".to_string(),
        }]);
        assert_eq!(dir.name(330_455), "Rio de Janeiro");
        assert_eq!(dir.name(3_304_557), "Rio de Janeiro");
        assert_eq!(dir.region(330_455), "Metropolitana");
        assert_eq!(dir.name(1), "1");
        assert!(dir.is_capital(330_455));
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = MunicipalityDirectory::load(&tmp.path().join("municipalities.csv")).unwrap();
        assert!(dir.is_empty());
    }

    #[test]
    fn loads_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("municipalities.csv");
        std::fs::write(
            &path,
            "municipality_id,name,state,region\n355030,São Paulo,SP,Metropolitana de São Paulo\n330330,Niterói,RJ,\n",
        )
        .unwrap();
        let dir = MunicipalityDirectory::load(&path).unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get(3_550_308).unwrap().state, State::Sp);
        assert_eq!(dir.region(330_330), "");
    }
}
