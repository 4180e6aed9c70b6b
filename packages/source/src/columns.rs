//! Header resolution: maps a file's raw headers onto canonical columns.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_crime_models::CrimeType;

use crate::SourceError;
use crate::parsing::normalize_header;
use crate::source_def::{CanonicalColumn, SourceDefinition};

/// Where a crime count comes from in a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSource {
    Column(usize),
    /// Sum of several raw columns.
    Sum(Vec<usize>),
}

/// Field positions of every canonical column in one raw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub year: usize,
    pub month: usize,
    pub municipality_id: usize,
    /// One entry per crime type, in canonical order.
    pub crimes: Vec<(CrimeType, CountSource)>,
    /// Number of header fields; records of another length are rejected.
    pub width: usize,
}

fn malformed(def: &SourceDefinition, message: String) -> SourceError {
    SourceError::MalformedInput {
        source_id: def.id.clone(),
        message,
    }
}

/// Resolves `headers` against `def`.
///
/// Headers are trimmed and lowercased. A header resolves through
/// `column_aliases`, or directly when it already is a canonical name.
///
/// # Errors
///
/// Returns [`SourceError::MalformedInput`] when a required column cannot
/// be resolved, two headers resolve to the same column, a derived target
/// is also aliased, a derived input or date column is absent, or
/// `strict_columns` is set and a header is not mentioned by the
/// definition.
pub fn resolve_columns(headers: &[String], def: &SourceDefinition) -> Result<ColumnPlan, SourceError> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let position = |name: &str| normalized.iter().position(|h| h == name);

    let derived_inputs: BTreeSet<&str> = def
        .derived
        .iter()
        .flat_map(|d| d.sum_of.iter().map(String::as_str))
        .collect();

    let mut resolved: BTreeMap<CanonicalColumn, usize> = BTreeMap::new();
    for (idx, header) in normalized.iter().enumerate() {
        let name = def
            .column_aliases
            .get(header)
            .map_or(header.as_str(), String::as_str);
        let target = CanonicalColumn::parse(name);

        let Some(column) = target else {
            let mentioned = derived_inputs.contains(header.as_str())
                || def.date_columns.iter().any(|d| d == header);
            if !mentioned {
                if def.strict_columns {
                    return Err(malformed(def, format!("unmapped column {header:?}")));
                }
                log::debug!("{}: ignoring unmapped column {header:?}", def.id);
            }
            continue;
        };

        if let Some(&first) = resolved.get(&column) {
            return Err(malformed(
                def,
                format!(
                    "ambiguous column {}: both {:?} and {header:?} resolve to it",
                    column.name(),
                    normalized[first]
                ),
            ));
        }
        resolved.insert(column, idx);
    }

    for date_col in &def.date_columns {
        if position(date_col).is_none() {
            return Err(malformed(def, format!("missing date column {date_col:?}")));
        }
    }

    let mut derived: BTreeMap<CrimeType, CountSource> = BTreeMap::new();
    for d in &def.derived {
        let Some(CanonicalColumn::Crime(crime)) = CanonicalColumn::parse(&d.target) else {
            return Err(malformed(def, format!("derived target {:?} is not a crime type", d.target)));
        };
        if resolved.contains_key(&CanonicalColumn::Crime(crime)) || derived.contains_key(&crime) {
            return Err(malformed(
                def,
                format!("ambiguous column {crime}: derived and also provided by a header"),
            ));
        }
        let parts = d
            .sum_of
            .iter()
            .map(|name| {
                position(name)
                    .ok_or_else(|| malformed(def, format!("missing column {name:?} for derived {crime}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        derived.insert(crime, CountSource::Sum(parts));
    }

    let missing: Vec<String> = CanonicalColumn::required()
        .into_iter()
        .filter(|c| match c {
            CanonicalColumn::Crime(crime) => {
                !resolved.contains_key(c) && !derived.contains_key(crime)
            }
            _ => !resolved.contains_key(c),
        })
        .map(CanonicalColumn::name)
        .collect();
    if !missing.is_empty() {
        return Err(malformed(
            def,
            format!("missing required column(s): {}", missing.join(", ")),
        ));
    }

    let crimes = CrimeType::all()
        .iter()
        .map(|&crime| {
            let source = resolved
                .get(&CanonicalColumn::Crime(crime))
                .map(|&i| CountSource::Column(i))
                .or_else(|| derived.remove(&crime))
                .unwrap_or(CountSource::Sum(Vec::new()));
            (crime, source)
        })
        .collect();

    Ok(ColumnPlan {
        year: resolved[&CanonicalColumn::Year],
        month: resolved[&CanonicalColumn::Month],
        municipality_id: resolved[&CanonicalColumn::MunicipalityId],
        crimes,
        width: headers.len(),
    })
}
