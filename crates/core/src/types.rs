//! Domain models shared across the pipeline
//!
//! This module contains the core types used throughout the planner, including:
//! - Query types and classifications
//! - Battery chemistry, operating conditions and electrode materials
//! - Parsed requirements
//! - Formulations, protocols and experiment plans
//! - Small text helpers used by the keyword heuristics

use serde::{Deserialize, Serialize};

// ============================================================================
// Query Classification
// ============================================================================

/// Intents a raw query can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Greeting,
    Help,
    OffTopic,
    ElectrolyteDesign,
    LiteratureSearch,
    PropertyCheck,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Greeting => "greeting",
            QueryType::Help => "help",
            QueryType::OffTopic => "off_topic",
            QueryType::ElectrolyteDesign => "electrolyte_design",
            QueryType::LiteratureSearch => "literature_search",
            QueryType::PropertyCheck => "property_check",
        }
    }

    /// Lenient mapping of model output onto a query type
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "greeting" | "greet" | "hello" => Some(QueryType::Greeting),
            "help" | "usage" | "capabilities" => Some(QueryType::Help),
            "off_topic" | "offtopic" | "unrelated" => Some(QueryType::OffTopic),
            "electrolyte_design" | "design" | "formulation" | "electrolyte" => {
                Some(QueryType::ElectrolyteDesign)
            }
            "literature_search" | "literature" | "search" | "research" => {
                Some(QueryType::LiteratureSearch)
            }
            "property_check" | "property" | "compatibility" | "properties" => {
                Some(QueryType::PropertyCheck)
            }
            _ => None,
        }
    }
}

/// Result of classifying a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub query_type: QueryType,
    pub confidence: f64,
    pub should_delegate: bool,
    pub reason: String,
}

// ============================================================================
// Requirements
// ============================================================================

/// Detected family of battery technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatteryChemistry {
    LithiumIon,
    Zinc,
    SodiumIon,
    Magnesium,
    SolidState,
    Aqueous,
}

impl BatteryChemistry {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryChemistry::LithiumIon => "lithium-ion",
            BatteryChemistry::Zinc => "zinc",
            BatteryChemistry::SodiumIon => "sodium-ion",
            BatteryChemistry::Magnesium => "magnesium",
            BatteryChemistry::SolidState => "solid-state",
            BatteryChemistry::Aqueous => "aqueous",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "lithium-ion" | "lithium" | "li-ion" | "li" => Some(BatteryChemistry::LithiumIon),
            "zinc" | "zn" | "zinc-ion" | "zn-ion" => Some(BatteryChemistry::Zinc),
            "sodium-ion" | "sodium" | "na-ion" | "na" => Some(BatteryChemistry::SodiumIon),
            "magnesium" | "mg" | "mg-ion" => Some(BatteryChemistry::Magnesium),
            "solid-state" | "solid state" => Some(BatteryChemistry::SolidState),
            "aqueous" => Some(BatteryChemistry::Aqueous),
            _ => None,
        }
    }
}

/// Target application inferred from the query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    #[default]
    General,
    ElectricVehicle,
    GridStorage,
    ConsumerElectronics,
    FastCharging,
}

impl Application {
    pub fn as_str(&self) -> &'static str {
        match self {
            Application::General => "general",
            Application::ElectricVehicle => "electric_vehicle",
            Application::GridStorage => "grid_storage",
            Application::ConsumerElectronics => "consumer_electronics",
            Application::FastCharging => "fast_charging",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Application::General => "General",
            Application::ElectricVehicle => "Electric Vehicle",
            Application::GridStorage => "Grid Storage",
            Application::ConsumerElectronics => "Consumer Electronics",
            Application::FastCharging => "Fast Charging",
        }
    }
}

pub const DEFAULT_MAX_VOLTAGE: f64 = 4.2;
pub const DEFAULT_MAX_TEMPERATURE: f64 = 45.0;
pub const DEFAULT_MIN_TEMPERATURE: f64 = -20.0;

/// Operating window; consumers fall back to the DEFAULT_* constants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_voltage: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_temperature: Option<f64>,
}

impl OperatingConditions {
    pub fn voltage(&self) -> f64 {
        self.max_voltage.unwrap_or(DEFAULT_MAX_VOLTAGE)
    }

    pub fn temperature(&self) -> f64 {
        self.max_temperature.unwrap_or(DEFAULT_MAX_TEMPERATURE)
    }

    pub fn min_temperature_or_default(&self) -> f64 {
        self.min_temperature.unwrap_or(DEFAULT_MIN_TEMPERATURE)
    }

    pub fn is_empty(&self) -> bool {
        self.max_voltage.is_none() && self.max_temperature.is_none() && self.min_temperature.is_none()
    }

    /// "key: value" lines in a stable order, for prompts
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(v) = self.max_voltage {
            lines.push(format!("max_voltage: {}", v));
        }
        if let Some(t) = self.max_temperature {
            lines.push(format!("max_temperature: {}", t));
        }
        if let Some(t) = self.min_temperature {
            lines.push(format!("min_temperature: {}", t));
        }
        lines
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeMaterials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cathode: Option<String>,
}

impl ElectrodeMaterials {
    pub fn anode_or_default(&self) -> &str {
        self.anode.as_deref().unwrap_or("graphite")
    }

    pub fn cathode_or_default(&self) -> &str {
        self.cathode.as_deref().unwrap_or("NMC")
    }

    pub fn is_empty(&self) -> bool {
        self.anode.is_none() && self.cathode.is_none()
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ref a) = self.anode {
            lines.push(format!("anode: {}", a));
        }
        if let Some(ref c) = self.cathode {
            lines.push(format!("cathode: {}", c));
        }
        lines
    }
}

/// Structured requirements extracted from a free-text query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub components: Vec<String>,

    #[serde(default)]
    pub operating_conditions: OperatingConditions,

    #[serde(default)]
    pub electrode_materials: ElectrodeMaterials,

    #[serde(default)]
    pub application: Application,

    /// None when no chemistry keyword was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_type: Option<BatteryChemistry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_specified_materials: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_materials_raw_input: Option<String>,

    /// Free-form model analysis of the query, when a model is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<String>,
}

// ============================================================================
// Formulations and Plans
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    Solvent,
    Salt,
    Additive,
    LewisAcid,
    Other,
}

impl ComponentRole {
    /// Lenient parse of free-form role text ("co-solvent", "Lewis acid", ...)
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_lowercase();
        if lower.contains("solvent") || lower.contains("diluent") {
            ComponentRole::Solvent
        } else if lower.contains("salt") {
            ComponentRole::Salt
        } else if lower.contains("additive") {
            ComponentRole::Additive
        } else if lower.contains("lewis") {
            ComponentRole::LewisAcid
        } else {
            ComponentRole::Other
        }
    }
}

/// One named component of a formulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationComponent {
    pub name: String,
    pub abbreviation: String,
    pub concentration: f64,
    pub unit: String,
    pub role: ComponentRole,
}

impl FormulationComponent {
    pub fn new(name: &str, abbreviation: &str, concentration: f64, unit: &str, role: ComponentRole) -> Self {
        Self {
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            concentration,
            unit: unit.to_string(),
            role,
        }
    }
}

/// Standard lab protocol attached to a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub steps: Vec<String>,
    pub duration: String,
    pub equipment: Vec<String>,
}

/// Illustrative performance estimate for a formulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedMetrics {
    pub capacity_retention_percent: f64,
    pub cycle_stability_cycles: u32,
    #[serde(rename = "rate_capability_2C_percent")]
    pub rate_capability_2c_percent: f64,
    #[serde(rename = "ionic_conductivity_mS_cm")]
    pub ionic_conductivity_ms_cm: f64,
    #[serde(rename = "temperature_range_C")]
    pub temperature_range_c: (f64, f64),
}

/// A candidate formulation plus everything needed to test it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    pub plan_id: String,
    pub title: String,
    pub formulation: Vec<FormulationComponent>,
    pub rationale: String,
    pub battery_type: BatteryChemistry,
    pub experimental_steps: Vec<String>,
    pub safety_considerations: Vec<String>,
    pub estimated_cost: String,
    pub estimated_time: String,
    pub priority_score: f64,

    #[serde(default)]
    pub protocols: Vec<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_performance: Option<PredictedMetrics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_rationale: Option<String>,
}

/// Incoming request: the query plus optional free-text materials list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_materials: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_materials: None,
        }
    }
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Whole-term containment: `term` must not be glued to alphanumerics on either side.
/// Both arguments are expected to be lowercase already.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    for (idx, _) in haystack.match_indices(term) {
        let before_ok = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[idx + term.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

/// Truncate to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_labels() {
        assert_eq!(QueryType::OffTopic.as_str(), "off_topic");
        assert_eq!(QueryType::from_label("Literature Search"), Some(QueryType::LiteratureSearch));
        assert_eq!(QueryType::from_label("off-topic"), Some(QueryType::OffTopic));
        assert_eq!(QueryType::from_label("design"), Some(QueryType::ElectrolyteDesign));
        assert_eq!(QueryType::from_label("nonsense"), None);
    }

    #[test]
    fn test_query_type_serialization() {
        let json = serde_json::to_string(&QueryType::PropertyCheck).unwrap();
        assert_eq!(json, "\"property_check\"");
    }

    #[test]
    fn test_chemistry_serialization() {
        let json = serde_json::to_string(&BatteryChemistry::SodiumIon).unwrap();
        assert_eq!(json, "\"sodium-ion\"");
        assert_eq!(BatteryChemistry::from_name("Zn"), Some(BatteryChemistry::Zinc));
        assert_eq!(BatteryChemistry::from_name("unknown"), None);
    }

    #[test]
    fn test_operating_conditions_defaults() {
        let conditions = OperatingConditions::default();
        assert_eq!(conditions.voltage(), 4.2);
        assert_eq!(conditions.temperature(), 45.0);
        assert_eq!(conditions.min_temperature_or_default(), -20.0);
        assert!(conditions.is_empty());

        let json = serde_json::to_string(&conditions).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_component_role_parse() {
        assert_eq!(ComponentRole::parse("co-solvent"), ComponentRole::Solvent);
        assert_eq!(ComponentRole::parse("Salt"), ComponentRole::Salt);
        assert_eq!(ComponentRole::parse("SEI additive"), ComponentRole::Additive);
        assert_eq!(ComponentRole::parse("Lewis acid"), ComponentRole::LewisAcid);
        assert_eq!(ComponentRole::parse("binder"), ComponentRole::Other);
    }

    #[test]
    fn test_metrics_field_names() {
        let metrics = PredictedMetrics {
            capacity_retention_percent: 85.0,
            cycle_stability_cycles: 500,
            rate_capability_2c_percent: 70.0,
            ionic_conductivity_ms_cm: 10.0,
            temperature_range_c: (-20.0, 60.0),
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["rate_capability_2C_percent"], 70.0);
        assert_eq!(json["ionic_conductivity_mS_cm"], 10.0);
        assert_eq!(json["temperature_range_C"][0], -20.0);
    }

    #[test]
    fn test_contains_term_boundaries() {
        assert!(contains_term("ec and dmc", "ec"));
        assert!(!contains_term("electrolyte", "ec"));
        assert!(contains_term("use 2% vc.", "vc"));
        assert!(contains_term("1m zn(cf3so3)2 in water", "zn(cf3so3)2"));
        assert!(!contains_term("high voltage", "hi"));
        assert!(!contains_term("anything", ""));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("°C°C", 2), "°C");
    }

    #[test]
    fn test_requirements_roundtrip() {
        let requirements = Requirements {
            components: vec!["EC".to_string(), "LiPF6".to_string()],
            battery_type: Some(BatteryChemistry::LithiumIon),
            application: Application::ElectricVehicle,
            ..Default::default()
        };
        let json = serde_json::to_string(&requirements).unwrap();
        assert!(json.contains("\"battery_type\":\"lithium-ion\""));
        assert!(json.contains("\"application\":\"electric_vehicle\""));
        let recovered: Requirements = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, requirements);
    }
}
