use super::{INF, MAXLOOP};
use crate::core::sequence::alphabet::{NUM_BASES, NUM_PAIR_TYPES};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// A free energy or enthalpy in dcal/mol; `INF` marks a forbidden entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Energy(pub i32);

impl Energy {
    pub const INF: Energy = Energy(INF);

    pub fn is_inf(self) -> bool {
        self.0 >= INF
    }
}

impl From<i32> for Energy {
    fn from(value: i32) -> Self {
        Energy(value)
    }
}

impl Serialize for Energy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_inf() {
            serializer.serialize_str("INF")
        } else {
            serializer.serialize_i32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Energy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EnergyVisitor;

        impl Visitor<'_> for EnergyVisitor {
            type Value = Energy;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer energy in dcal/mol or the string \"INF\"")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Energy, E> {
                i32::try_from(value)
                    .map(|v| Energy(v.min(INF)))
                    .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Energy, E> {
                i32::try_from(value)
                    .map(|v| Energy(v.min(INF)))
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Energy, E> {
                if value.eq_ignore_ascii_case("INF") {
                    Ok(Energy::INF)
                } else {
                    Err(E::invalid_value(Unexpected::Str(value), &self))
                }
            }
        }

        deserializer.deserialize_any(EnergyVisitor)
    }
}

pub type Table1 = Vec<Energy>;
pub type Table2 = Vec<Vec<Energy>>;
pub type Table3 = Vec<Vec<Vec<Energy>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialHairpin {
    pub energy: Energy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enthalpy: Option<Energy>,
}

/// Optional enthalpy tables. Tables left out scale purely entropically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Enthalpies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Table2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hairpin: Option<Table1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulge: Option<Table1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interior: Option<Table1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_hairpin: Option<Table3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_interior: Option<Table3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_multi: Option<Table3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_exterior: Option<Table3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangle5: Option<Table2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangle3: Option<Table2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_closing: Option<Energy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_intern: Option<Energy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_base: Option<Energy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ninio: Option<Energy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_au: Option<Energy>,
}

/// Raw nearest-neighbour parameters at 37 °C.
///
/// Pair-type indexed tables have 8 rows (no pair, CG, GC, GU, UG, AU, UA,
/// non-standard); base indexed dimensions have 5 entries (unknown, A, C, G,
/// U). Loop initiation tables are indexed by loop size `0..=30`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyParams {
    pub stack: Table2,
    pub hairpin: Table1,
    pub bulge: Table1,
    pub interior: Table1,
    pub mismatch_hairpin: Table3,
    pub mismatch_interior: Table3,
    pub mismatch_multi: Table3,
    pub mismatch_exterior: Table3,
    pub dangle5: Table2,
    pub dangle3: Table2,
    pub ml_closing: Energy,
    pub ml_intern: Energy,
    pub ml_base: Energy,
    pub ninio: Energy,
    pub max_ninio: Energy,
    pub terminal_au: Energy,
    pub lxc: f64,
    pub gapped_hairpin: Energy,
    #[serde(default)]
    pub special_hairpins: BTreeMap<String, SpecialHairpin>,
    #[serde(default)]
    pub enthalpies: Enthalpies,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Incomplete energy model: table '{table}' {detail}")]
pub struct IncompleteModel {
    pub table: String,
    pub detail: String,
}

impl IncompleteModel {
    fn new(table: &str, detail: impl Into<String>) -> Self {
        Self {
            table: table.to_string(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Incomplete(#[from] IncompleteModel),
}

impl EnergyParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let params: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ParamLoadError> {
        let params: Self = toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Checks table dimensions and that every entry reachable by a canonical
    /// pair is finite.
    pub fn validate(&self) -> Result<(), IncompleteModel> {
        check_table2("stack", &self.stack, NUM_PAIR_TYPES, NUM_PAIR_TYPES)?;
        for t in 1..=6 {
            for u in 1..=6 {
                if self.stack[t][u].is_inf() {
                    return Err(IncompleteModel::new(
                        "stack",
                        format!("entry [{t}][{u}] is INF"),
                    ));
                }
            }
        }

        check_loop_table("hairpin", &self.hairpin, 3)?;
        check_loop_table("bulge", &self.bulge, 1)?;
        check_loop_table("interior", &self.interior, 2)?;

        for (name, table) in [
            ("mismatch_hairpin", &self.mismatch_hairpin),
            ("mismatch_interior", &self.mismatch_interior),
            ("mismatch_multi", &self.mismatch_multi),
            ("mismatch_exterior", &self.mismatch_exterior),
        ] {
            check_table3(name, table)?;
            for (t, rows) in table.iter().enumerate().take(7).skip(1) {
                for (a, row) in rows.iter().enumerate() {
                    if let Some(b) = row.iter().position(|e| e.is_inf()) {
                        return Err(IncompleteModel::new(
                            name,
                            format!("entry [{t}][{a}][{b}] is INF"),
                        ));
                    }
                }
            }
        }

        for (name, table) in [("dangle5", &self.dangle5), ("dangle3", &self.dangle3)] {
            check_table2(name, table, NUM_PAIR_TYPES, NUM_BASES)?;
            for (t, row) in table.iter().enumerate().take(7).skip(1) {
                if let Some(b) = row.iter().position(|e| e.is_inf()) {
                    return Err(IncompleteModel::new(name, format!("entry [{t}][{b}] is INF")));
                }
            }
        }

        for (name, value) in [
            ("ml_closing", self.ml_closing),
            ("ml_intern", self.ml_intern),
            ("ml_base", self.ml_base),
            ("ninio", self.ninio),
            ("max_ninio", self.max_ninio),
            ("terminal_au", self.terminal_au),
            ("gapped_hairpin", self.gapped_hairpin),
        ] {
            if value.is_inf() {
                return Err(IncompleteModel::new(name, "is INF"));
            }
        }

        if !self.lxc.is_finite() {
            return Err(IncompleteModel::new("lxc", "is not a finite number"));
        }

        self.validate_enthalpies()
    }

    fn validate_enthalpies(&self) -> Result<(), IncompleteModel> {
        let h = &self.enthalpies;
        if let Some(t) = &h.stack {
            check_table2("enthalpies.stack", t, NUM_PAIR_TYPES, NUM_PAIR_TYPES)?;
        }
        for (name, t) in [
            ("enthalpies.hairpin", &h.hairpin),
            ("enthalpies.bulge", &h.bulge),
            ("enthalpies.interior", &h.interior),
        ] {
            if let Some(t) = t {
                check_len(name, t.len(), MAXLOOP + 1)?;
            }
        }
        for (name, t) in [
            ("enthalpies.mismatch_hairpin", &h.mismatch_hairpin),
            ("enthalpies.mismatch_interior", &h.mismatch_interior),
            ("enthalpies.mismatch_multi", &h.mismatch_multi),
            ("enthalpies.mismatch_exterior", &h.mismatch_exterior),
        ] {
            if let Some(t) = t {
                check_table3(name, t)?;
            }
        }
        for (name, t) in [("enthalpies.dangle5", &h.dangle5), ("enthalpies.dangle3", &h.dangle3)] {
            if let Some(t) = t {
                check_table2(name, t, NUM_PAIR_TYPES, NUM_BASES)?;
            }
        }
        Ok(())
    }
}

fn check_len(table: &str, found: usize, expected: usize) -> Result<(), IncompleteModel> {
    if found == expected {
        Ok(())
    } else {
        Err(IncompleteModel::new(
            table,
            format!("has {found} entries, expected {expected}"),
        ))
    }
}

fn check_table2(
    table: &str,
    values: &Table2,
    rows: usize,
    cols: usize,
) -> Result<(), IncompleteModel> {
    check_len(table, values.len(), rows)?;
    for (idx, row) in values.iter().enumerate() {
        check_len(&format!("{table}[{idx}]"), row.len(), cols)?;
    }
    Ok(())
}

fn check_table3(table: &str, values: &Table3) -> Result<(), IncompleteModel> {
    check_len(table, values.len(), NUM_PAIR_TYPES)?;
    for (idx, plane) in values.iter().enumerate() {
        check_table2(&format!("{table}[{idx}]"), plane, NUM_BASES, NUM_BASES)?;
    }
    Ok(())
}

fn check_loop_table(table: &str, values: &Table1, first_finite: usize) -> Result<(), IncompleteModel> {
    check_len(table, values.len(), MAXLOOP + 1)?;
    match (first_finite..=MAXLOOP).find(|&idx| values[idx].is_inf()) {
        Some(idx) => Err(IncompleteModel::new(table, format!("entry {idx} is INF"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize)]
    struct EnergyFields {
        single: Energy,
        row: Vec<Energy>,
    }

    #[test]
    fn energy_accepts_integers_and_inf_marker() {
        let fields: EnergyFields = toml::from_str(
            r#"
            single = "INF"
            row = [-240, "inf", 130]
            "#,
        )
        .unwrap();
        assert!(fields.single.is_inf());
        assert_eq!(fields.row, vec![Energy(-240), Energy::INF, Energy(130)]);
    }

    #[test]
    fn energy_rejects_other_strings() {
        let result: Result<EnergyFields, _> = toml::from_str("single = \"big\"\nrow = []");
        assert!(result.is_err());
    }

    #[test]
    fn default_parameters_validate() {
        assert_eq!(EnergyParams::default().validate(), Ok(()));
    }

    #[test]
    fn validate_names_table_and_index_of_missing_entry() {
        let mut params = EnergyParams::default();
        params.hairpin[5] = Energy::INF;
        let err = params.validate().unwrap_err();
        assert_eq!(err.table, "hairpin");
        assert!(err.detail.contains('5'));
    }

    #[test]
    fn validate_rejects_wrongly_sized_tables() {
        let mut params = EnergyParams::default();
        params.dangle3.pop();
        let err = params.validate().unwrap_err();
        assert_eq!(err.table, "dangle3");
    }

    #[test]
    fn validate_rejects_infinite_canonical_stack() {
        let mut params = EnergyParams::default();
        params.stack[2][5] = Energy::INF;
        assert_eq!(params.validate().unwrap_err().table, "stack");
    }

    #[test]
    fn load_reads_parameter_file_written_as_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        let params = EnergyParams::default();
        fs::write(&path, toml::to_string(&params).unwrap()).unwrap();

        let loaded = EnergyParams::load(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = EnergyParams::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn from_toml_str_fails_for_malformed_content() {
        let result = EnergyParams::from_toml_str("this is not toml");
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }
}
