// Optional TOML configuration.
//
// Every key has a default, so an absent file and an empty file behave the
// same. The lookup tables built here are the only process-wide state and are
// handed to the pipeline by reference.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ReportError;
use crate::normalize::NormalizeSettings;
use crate::resolve::{ColumnResolver, DEFAULT_COST_CENTER_COLUMN};
use crate::tables::{HeaderSynonyms, TypeCodeTable};
use crate::types::{CanonicalField, Rate};

pub const DEFAULT_LABOR_RATE: f64 = 75.0;

/// How the report is sectioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum GroupBy {
    /// `Craft` when the data has a craft column, otherwise one `All` section.
    #[default]
    Auto,
    None,
    Field(CanonicalField),
}

impl FromStr for GroupBy {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(GroupBy::Auto),
            "none" | "all" => Ok(GroupBy::None),
            _ => s.parse::<CanonicalField>().map(GroupBy::Field),
        }
    }
}

impl TryFrom<String> for GroupBy {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::Auto => write!(f, "auto"),
            GroupBy::None => write!(f, "none"),
            GroupBy::Field(field) => write!(f, "{}", field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub labor_rate: f64,
    pub currency: String,
    /// Zero-indexed worksheet to read.
    pub sheet: usize,
    pub cost_center_column: usize,
    pub cost_center_fallback: bool,
    pub required_fields: Vec<CanonicalField>,
    pub group_by: GroupBy,
    pub breakdown_by: CanonicalField,
    pub retain_columns: Vec<String>,
    pub type_codes: BTreeMap<String, String>,
    pub synonyms: BTreeMap<String, CanonicalField>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            labor_rate: DEFAULT_LABOR_RATE,
            currency: "$".to_string(),
            sheet: 0,
            cost_center_column: DEFAULT_COST_CENTER_COLUMN,
            cost_center_fallback: true,
            required_fields: Vec::new(),
            group_by: GroupBy::Auto,
            breakdown_by: CanonicalField::Type,
            retain_columns: Vec::new(),
            type_codes: BTreeMap::new(),
            synonyms: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ReportError> {
        let cfg: AppConfig =
            toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        Rate::new(self.labor_rate)?;
        if let Some(bad) = self
            .type_codes
            .keys()
            .find(|k| k.trim().chars().count() != 1)
        {
            return Err(ReportError::Config(format!(
                "type code '{}' must be a single character",
                bad
            )));
        }
        Ok(())
    }

    pub fn rate(&self) -> Result<Rate, ReportError> {
        Rate::new(self.labor_rate)
    }

    pub fn type_code_table(&self) -> TypeCodeTable {
        TypeCodeTable::default().with_overrides(
            self.type_codes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    pub fn header_synonyms(&self) -> HeaderSynonyms {
        HeaderSynonyms::default()
            .with_overrides(self.synonyms.iter().map(|(k, f)| (k.clone(), *f)))
    }

    pub fn column_resolver(&self) -> ColumnResolver {
        ColumnResolver::standard(self.cost_center_fallback.then_some(self.cost_center_column))
    }

    pub fn normalize_settings(&self) -> NormalizeSettings {
        NormalizeSettings {
            required: self.required_fields.clone(),
            retain_columns: self.retain_columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.labor_rate, 75.0);
        assert_eq!(cfg.cost_center_column, 13);
    }

    #[test]
    fn overrides_flow_into_tables() {
        let cfg = AppConfig::from_toml_str(
            r#"
labor_rate = 92.5
group_by = "none"
required_fields = ["Hours"]

[type_codes]
"9" = "Shutdown"

[synonyms]
"crew" = "Craft"
"#,
        )
        .unwrap();
        assert_eq!(cfg.group_by, GroupBy::None);
        assert_eq!(cfg.required_fields, vec![CanonicalField::Hours]);
        assert_eq!(cfg.type_code_table().resolve("9"), Some("Shutdown"));
        assert_eq!(cfg.type_code_table().resolve("1"), Some("Maintenance Order"));
        assert_eq!(cfg.header_synonyms().lookup("crew"), Some(CanonicalField::Craft));
    }

    #[test]
    fn group_by_accepts_field_names() {
        assert_eq!("craft".parse::<GroupBy>().unwrap(), GroupBy::Field(CanonicalField::Craft));
        assert_eq!("AUTO".parse::<GroupBy>().unwrap(), GroupBy::Auto);
        assert!("shift".parse::<GroupBy>().is_err());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            AppConfig::from_toml_str("labor_rate = -5.0"),
            Err(ReportError::InvalidRate(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[type_codes]\n\"PM\" = \"Preventive\""),
            Err(ReportError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("colour = \"blue\""),
            Err(ReportError::Config(_))
        ));
    }

    #[test]
    fn disabling_fallback_drops_positional_strategy() {
        let cfg = AppConfig::from_toml_str("cost_center_fallback = false").unwrap();
        assert_eq!(
            cfg.column_resolver().strategy_names(),
            vec!["exact-header", "synonym-header"]
        );
    }
}
