//! GRIB2 parameter and level lookup tables.
//!
//! Translates GRIB2 numeric codes into the short names and level
//! descriptions used in logs and status output. The built-in table covers
//! the MRMS local discipline (209); callers can extend or replace it.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    Static(String),
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting `{value}` if it's a template.
    pub fn format(&self, value: u32) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => t.replace("{value}", &value.to_string()),
        }
    }
}

static MRMS_TABLES: Lazy<Grib2Tables> = Lazy::new(Grib2Tables::mrms);

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    parameters: HashMap<ParamKey, String>,
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance of [`Grib2Tables::mrms`].
    pub fn builtin() -> &'static Grib2Tables {
        &MRMS_TABLES
    }

    /// Tables for the MRMS products.
    pub fn mrms() -> Self {
        let mut tables = Self::new();

        // Discipline 209, category 0: reflectivity
        tables.add_parameter(209, 0, 16, "REFL".to_string());
        tables.add_parameter(209, 3, 0, "MergedReflectivityQCComposite".to_string());
        tables.add_parameter(209, 3, 1, "MergedReflectivityQComposite".to_string());
        // Category 1: precipitation
        tables.add_parameter(209, 1, 0, "PRECIP_RATE".to_string());
        tables.add_parameter(209, 1, 1, "QPE".to_string());
        // NCEP radar imagery, occasionally used for the same field
        tables.add_parameter(0, 16, 195, "REFD".to_string());
        tables.add_parameter(0, 16, 196, "REFC".to_string());

        tables.add_level(1, LevelDescription::Static("surface".to_string()));
        tables.add_level(
            102,
            LevelDescription::Template("{value} m above MSL".to_string()),
        );
        tables.add_level(
            103,
            LevelDescription::Template("{value} m above ground".to_string()),
        );
        tables.add_level(
            200,
            LevelDescription::Static("entire atmosphere".to_string()),
        );

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    pub fn get_level_description(&self, level_type: u8, level_value: u32) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}
