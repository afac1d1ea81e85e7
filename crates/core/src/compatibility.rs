//! Molecular properties and compatibility rules
//!
//! Static lookup tables only. Rules fire when one of their components is
//! present and the trigger condition holds for the operating window,
//! electrodes or (when known) concentrations.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::llm::{LanguageModel, LlmRequest};
use crate::prompts::PromptLibrary;
use crate::types::{round_to, ElectrodeMaterials, FormulationComponent, OperatingConditions};

// ============================================================================
// Property Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    Solvent,
    Salt,
    Additive,
}

/// Tabulated properties; which fields are present depends on the category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentProperties {
    #[serde(skip)]
    pub name: &'static str,
    pub molecular_weight: f64,
    pub category: ComponentCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    /// mPa·s at 40 °C
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viscosity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dielectric_constant: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melting_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boiling_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_point: Option<f64>,
    /// V vs Li/Li+
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxidation_potential: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_potential: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decomposition_temp: Option<f64>,
    /// mS/cm in EC/DMC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ionic_conductivity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermal_stability: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moisture_sensitivity: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub al_corrosion: Option<bool>,
    /// wt% range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_concentration: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<&'static str>,
}

const BLANK: ComponentProperties = ComponentProperties {
    name: "",
    molecular_weight: 0.0,
    category: ComponentCategory::Solvent,
    density: None,
    viscosity: None,
    dielectric_constant: None,
    melting_point: None,
    boiling_point: None,
    flash_point: None,
    oxidation_potential: None,
    reduction_potential: None,
    decomposition_temp: None,
    ionic_conductivity: None,
    thermal_stability: None,
    moisture_sensitivity: None,
    al_corrosion: None,
    recommended_concentration: None,
    function: None,
};

#[allow(clippy::too_many_arguments)]
const fn solvent(
    name: &'static str,
    molecular_weight: f64,
    density: f64,
    viscosity: f64,
    dielectric_constant: f64,
    melting_point: f64,
    boiling_point: f64,
    flash_point: f64,
    oxidation_potential: f64,
    reduction_potential: f64,
) -> ComponentProperties {
    ComponentProperties {
        name,
        molecular_weight,
        category: ComponentCategory::Solvent,
        density: Some(density),
        viscosity: Some(viscosity),
        dielectric_constant: Some(dielectric_constant),
        melting_point: Some(melting_point),
        boiling_point: Some(boiling_point),
        flash_point: Some(flash_point),
        oxidation_potential: Some(oxidation_potential),
        reduction_potential: Some(reduction_potential),
        ..BLANK
    }
}

const fn salt(
    name: &'static str,
    molecular_weight: f64,
    decomposition_temp: f64,
    ionic_conductivity: f64,
    thermal_stability: &'static str,
    moisture_sensitivity: &'static str,
) -> ComponentProperties {
    ComponentProperties {
        name,
        molecular_weight,
        category: ComponentCategory::Salt,
        decomposition_temp: Some(decomposition_temp),
        ionic_conductivity: Some(ionic_conductivity),
        thermal_stability: Some(thermal_stability),
        moisture_sensitivity: Some(moisture_sensitivity),
        ..BLANK
    }
}

const fn additive(
    name: &'static str,
    molecular_weight: f64,
    recommended: (f64, f64),
    function: &'static str,
) -> ComponentProperties {
    ComponentProperties {
        name,
        molecular_weight,
        category: ComponentCategory::Additive,
        recommended_concentration: Some(recommended),
        function: Some(function),
        ..BLANK
    }
}

pub const PROPERTY_TABLE: &[ComponentProperties] = &[
    solvent("EC", 88.06, 1.32, 1.9, 89.8, 36.4, 248.0, 160.0, 6.2, 0.8),
    solvent("DMC", 90.08, 1.07, 0.59, 3.1, 4.6, 91.0, 18.0, 6.7, 1.0),
    solvent("EMC", 104.1, 1.01, 0.65, 2.9, -53.0, 110.0, 25.0, 6.7, 1.0),
    solvent("DEC", 118.13, 0.98, 0.75, 2.8, -74.3, 126.0, 31.0, 6.7, 1.0),
    solvent("PC", 102.09, 1.20, 2.5, 64.9, -48.8, 242.0, 132.0, 6.6, 0.9),
    salt("LiPF6", 151.91, 80.0, 10.7, "moderate", "high"),
    ComponentProperties {
        al_corrosion: Some(true),
        ..salt("LiTFSI", 287.09, 360.0, 9.0, "excellent", "low")
    },
    salt("LiFSI", 187.07, 200.0, 12.0, "good", "moderate"),
    salt("LiBF4", 93.75, 293.0, 3.4, "good", "high"),
    additive("VC", 86.05, (1.0, 2.0), "SEI_former"),
    additive("FEC", 106.05, (5.0, 10.0), "SEI_former"),
    additive("PS", 122.14, (1.0, 3.0), "anode_passivation"),
    additive("LiBOB", 193.79, (0.5, 1.0), "cathode_stabilizer"),
];

/// Case-insensitive property lookup
pub fn get_property(component: &str) -> Option<&'static ComponentProperties> {
    let wanted = component.trim();
    PROPERTY_TABLE.iter().find(|p| p.name.eq_ignore_ascii_case(wanted))
}

pub fn list_components_by_category(category: ComponentCategory) -> Vec<&'static str> {
    PROPERTY_TABLE
        .iter()
        .filter(|p| p.category == category)
        .map(|p| p.name)
        .collect()
}

// ============================================================================
// Compatibility Rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Anode description contains the text
    AnodeContains(&'static str),
    /// Max voltage strictly above the threshold (V)
    VoltageAbove(f64),
    /// Max temperature strictly above the threshold (°C)
    TemperatureAbove(f64),
    /// Percent concentration of the component strictly above the threshold
    ConcentrationAbove(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityRule {
    pub rule_id: &'static str,
    pub components: &'static [&'static str],
    pub trigger: Trigger,
    pub issue: &'static str,
    pub severity: Severity,
    pub solution: &'static str,
}

pub const COMPATIBILITY_RULES: &[CompatibilityRule] = &[
    CompatibilityRule {
        rule_id: "PC_graphite",
        components: &["PC"],
        trigger: Trigger::AnodeContains("graphite"),
        issue: "PC causes graphite exfoliation due to co-intercalation",
        severity: Severity::Critical,
        solution: "Use EC-based electrolyte or add FEC (10%)",
    },
    CompatibilityRule {
        rule_id: "LiTFSI_Al",
        components: &["LiTFSI"],
        trigger: Trigger::VoltageAbove(3.8),
        issue: "LiTFSI corrodes aluminum at high voltages",
        severity: Severity::High,
        solution: "Add LiPF6 (50:50 ratio) or use LiTFSI concentration < 0.5M",
    },
    CompatibilityRule {
        rule_id: "LiPF6_thermal",
        components: &["LiPF6"],
        trigger: Trigger::TemperatureAbove(60.0),
        issue: "LiPF6 decomposes, releasing HF",
        severity: Severity::High,
        solution: "Use LiBF4 or LiFSI for high-temperature applications",
    },
    CompatibilityRule {
        rule_id: "high_EC_viscosity",
        components: &["EC"],
        trigger: Trigger::ConcentrationAbove(50.0),
        issue: "High viscosity reduces rate capability",
        severity: Severity::Medium,
        solution: "Add linear carbonates (DMC, EMC, DEC) to reduce viscosity",
    },
    CompatibilityRule {
        rule_id: "FEC_gas_generation",
        components: &["FEC"],
        trigger: Trigger::ConcentrationAbove(15.0),
        issue: "Excessive CO2 generation during cycling",
        severity: Severity::Medium,
        solution: "Keep FEC between 5-10 wt%",
    },
    CompatibilityRule {
        rule_id: "high_voltage_cathode",
        components: &["EC", "DMC", "EMC", "DEC"],
        trigger: Trigger::VoltageAbove(4.5),
        issue: "Carbonate solvents oxidize at high voltages",
        severity: Severity::High,
        solution: "Add FEC, use fluorinated solvents, or consider high-concentration electrolyte",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityIssue {
    pub rule_id: &'static str,
    pub issue: &'static str,
    pub severity: Severity,
    pub solution: &'static str,
}

impl From<&CompatibilityRule> for CompatibilityIssue {
    fn from(rule: &CompatibilityRule) -> Self {
        Self {
            rule_id: rule.rule_id,
            issue: rule.issue,
            severity: rule.severity,
            solution: rule.solution,
        }
    }
}

/// A component name with its percent concentration, when known
#[derive(Debug, Clone, Copy)]
struct Dose<'a> {
    name: &'a str,
    percent: Option<f64>,
}

fn rule_fires(
    rule: &CompatibilityRule,
    doses: &[Dose<'_>],
    conditions: &OperatingConditions,
    electrodes: &ElectrodeMaterials,
) -> bool {
    let present: Vec<&Dose<'_>> = doses
        .iter()
        .filter(|d| rule.components.iter().any(|rc| rc.eq_ignore_ascii_case(d.name)))
        .collect();
    if present.is_empty() {
        return false;
    }

    match rule.trigger {
        Trigger::AnodeContains(text) => electrodes.anode_or_default().to_lowercase().contains(text),
        Trigger::VoltageAbove(limit) => conditions.voltage() > limit,
        Trigger::TemperatureAbove(limit) => conditions.temperature() > limit,
        Trigger::ConcentrationAbove(limit) => present
            .iter()
            .any(|d| d.percent.is_some_and(|p| p > limit)),
    }
}

fn evaluate_rules(
    doses: &[Dose<'_>],
    conditions: &OperatingConditions,
    electrodes: &ElectrodeMaterials,
) -> Vec<CompatibilityIssue> {
    COMPATIBILITY_RULES
        .iter()
        .filter(|rule| rule_fires(rule, doses, conditions, electrodes))
        .map(CompatibilityIssue::from)
        .collect()
}

// ============================================================================
// Aggregates and Recommendations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateProperties {
    #[serde(rename = "estimated_viscosity_mPas")]
    pub estimated_viscosity_mpas: f64,
    pub estimated_dielectric_constant: f64,
    /// (max reduction, min oxidation) potential in V
    pub electrochemical_window: (f64, f64),
    #[serde(rename = "window_width_V")]
    pub window_width_v: f64,
}

/// Equal-parts estimate over the known solvents
fn aggregate_properties(props: &[&ComponentProperties]) -> Option<AggregateProperties> {
    let solvents: Vec<_> = props
        .iter()
        .filter(|p| p.category == ComponentCategory::Solvent)
        .collect();
    if solvents.is_empty() {
        return None;
    }

    let n = solvents.len() as f64;
    let viscosity = solvents.iter().map(|s| s.viscosity.unwrap_or(1.0)).sum::<f64>() / n;
    let dielectric = solvents.iter().map(|s| s.dielectric_constant.unwrap_or(10.0)).sum::<f64>() / n;
    let min_oxidation = solvents
        .iter()
        .map(|s| s.oxidation_potential.unwrap_or(6.0))
        .fold(f64::INFINITY, f64::min);
    let max_reduction = solvents
        .iter()
        .map(|s| s.reduction_potential.unwrap_or(0.5))
        .fold(f64::NEG_INFINITY, f64::max);

    Some(AggregateProperties {
        estimated_viscosity_mpas: round_to(viscosity, 2),
        estimated_dielectric_constant: round_to(dielectric, 1),
        electrochemical_window: (round_to(max_reduction, 2), round_to(min_oxidation, 2)),
        window_width_v: round_to(min_oxidation - max_reduction, 2),
    })
}

fn recommendations(
    issues: &[CompatibilityIssue],
    props: &[&ComponentProperties],
    conditions: &OperatingConditions,
) -> Vec<String> {
    let mut recs: Vec<String> = issues
        .iter()
        .filter(|i| i.severity >= Severity::High)
        .map(|i| format!("PRIORITY: {}", i.solution))
        .collect();

    if conditions.voltage() > 4.3 {
        recs.push("Consider adding VC or FEC for high-voltage stability".to_string());
    }
    if conditions.temperature() > 50.0 {
        recs.push("Consider LiFSI or LiBF4 instead of LiPF6 for thermal stability".to_string());
    }
    if !props.iter().any(|p| p.category == ComponentCategory::Additive) {
        recs.push("Consider adding VC (1-2 wt%) for improved cycle life".to_string());
    }

    if recs.is_empty() {
        recs.push("Formulation appears compatible for intended use".to_string());
    }
    recs
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyEntry {
    Known(&'static ComponentProperties),
    Unknown { status: &'static str, note: &'static str },
}

impl PropertyEntry {
    fn unknown() -> Self {
        PropertyEntry::Unknown { status: "unknown", note: "Not in database" }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyReport {
    pub component_properties: BTreeMap<String, PropertyEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_properties: Option<AggregateProperties>,
    pub compatibility_issues: Vec<CompatibilityIssue>,
    pub recommendations: Vec<String>,
    pub is_compatible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<String>,
}

fn build_report(
    doses: &[Dose<'_>],
    conditions: &OperatingConditions,
    electrodes: &ElectrodeMaterials,
) -> PropertyReport {
    let mut component_properties = BTreeMap::new();
    let mut known = Vec::new();
    for dose in doses {
        match get_property(dose.name) {
            Some(p) => {
                if !known.iter().any(|k: &&ComponentProperties| k.name == p.name) {
                    known.push(p);
                }
                component_properties.insert(p.name.to_string(), PropertyEntry::Known(p));
            }
            None => {
                component_properties.insert(dose.name.to_string(), PropertyEntry::unknown());
            }
        }
    }

    let issues = evaluate_rules(doses, conditions, electrodes);
    let recommendations = recommendations(&issues, &known, conditions);
    let is_compatible = !issues.iter().any(|i| i.severity == Severity::Critical);

    PropertyReport {
        component_properties,
        aggregate_properties: aggregate_properties(&known),
        compatibility_issues: issues,
        recommendations,
        is_compatible,
        llm_analysis: None,
    }
}

/// Check named components against the operating window; concentrations are unknown
pub fn check_compatibility(
    components: &[String],
    conditions: &OperatingConditions,
    electrodes: &ElectrodeMaterials,
) -> PropertyReport {
    tracing::info!("[Property] Analyzing components: {:?}", components);
    let doses: Vec<Dose<'_>> = components
        .iter()
        .map(|c| Dose { name: c.as_str(), percent: None })
        .collect();
    build_report(&doses, conditions, electrodes)
}

/// Check a concrete formulation; percent-unit concentrations feed the
/// concentration rules
pub fn check_formulation(
    formulation: &[FormulationComponent],
    conditions: &OperatingConditions,
    electrodes: &ElectrodeMaterials,
) -> PropertyReport {
    let doses: Vec<Dose<'_>> = formulation
        .iter()
        .map(|c| Dose {
            name: if c.abbreviation.is_empty() { c.name.as_str() } else { c.abbreviation.as_str() },
            percent: c.unit.contains('%').then_some(c.concentration),
        })
        .collect();
    build_report(&doses, conditions, electrodes)
}

// ============================================================================
// LLM Analysis
// ============================================================================

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert electrochemist. Analyze the compatibility of the given
electrolyte components under the specified conditions. Identify:
1. Known compatibility issues
2. Potential degradation pathways
3. Temperature-dependent concerns
4. Electrode material interactions

Provide specific, actionable insights based on electrochemistry principles."#;

const ANALYSIS_PROMPT: &str = r#"Analyze compatibility for these electrolyte components:

Components: {{components}}

Operating Conditions:
- Max voltage: {{max_voltage}}V
- Temperature range: {{min_temperature}}°C to {{max_temperature}}°C

Identify any compatibility concerns and suggest mitigations."#;

pub fn analyze_with_llm(
    components: &[String],
    conditions: &OperatingConditions,
    llm: &dyn LanguageModel,
    prompts: &PromptLibrary,
) -> Result<String> {
    let joined = components.join(", ");
    let voltage = conditions.voltage().to_string();
    let min_t = conditions.min_temperature_or_default().to_string();
    let max_t = conditions.temperature().to_string();

    let system = prompts.render("compatibility_system", ANALYSIS_SYSTEM_PROMPT, &[]);
    let prompt = prompts.render(
        "compatibility",
        ANALYSIS_PROMPT,
        &[
            ("components", &joined),
            ("max_voltage", &voltage),
            ("min_temperature", &min_t),
            ("max_temperature", &max_t),
        ],
    );

    llm.generate(&LlmRequest::new(prompt).system(system).temperature(0.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedModel;
    use crate::types::ComponentRole;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rule_ids(report: &PropertyReport) -> Vec<&'static str> {
        report.compatibility_issues.iter().map(|i| i.rule_id).collect()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(get_property("lipf6").map(|p| p.name), Some("LiPF6"));
        assert_eq!(get_property("LITFSI").map(|p| p.name), Some("LiTFSI"));
        assert_eq!(get_property(" ec ").map(|p| p.name), Some("EC"));
        assert!(get_property("DTD").is_none());
    }

    #[test]
    fn test_list_by_category() {
        assert_eq!(list_components_by_category(ComponentCategory::Solvent), vec!["EC", "DMC", "EMC", "DEC", "PC"]);
        assert_eq!(list_components_by_category(ComponentCategory::Additive), vec!["VC", "FEC", "PS", "LiBOB"]);
        assert_eq!(list_components_by_category(ComponentCategory::Salt).len(), 4);
    }

    #[test]
    fn test_pc_on_default_graphite_is_critical() {
        let report = check_compatibility(&names(&["PC", "LiPF6"]), &OperatingConditions::default(), &ElectrodeMaterials::default());
        assert_eq!(rule_ids(&report), vec!["PC_graphite"]);
        assert!(!report.is_compatible);
        assert_eq!(report.recommendations[0], "PRIORITY: Use EC-based electrolyte or add FEC (10%)");
    }

    #[test]
    fn test_pc_on_silicon_without_graphite() {
        let electrodes = ElectrodeMaterials { anode: Some("silicon".to_string()), cathode: None };
        let report = check_compatibility(&names(&["PC"]), &OperatingConditions::default(), &electrodes);
        assert!(report.compatibility_issues.is_empty());
        assert!(report.is_compatible);
    }

    #[test]
    fn test_voltage_and_temperature_triggers() {
        let conditions = OperatingConditions {
            max_voltage: Some(4.6),
            max_temperature: Some(65.0),
            min_temperature: None,
        };
        let report = check_compatibility(&names(&["ec", "LiTFSI", "LiPF6"]), &conditions, &ElectrodeMaterials::default());
        assert_eq!(rule_ids(&report), vec!["LiTFSI_Al", "LiPF6_thermal", "high_voltage_cathode"]);
        assert!(report.is_compatible);
        assert!(report.recommendations.contains(&"Consider adding VC or FEC for high-voltage stability".to_string()));
        assert!(report.recommendations.contains(&"Consider LiFSI or LiBF4 instead of LiPF6 for thermal stability".to_string()));
        assert_eq!(report.recommendations.last().map(String::as_str), Some("Consider adding VC (1-2 wt%) for improved cycle life"));
    }

    #[test]
    fn test_concentration_rules_need_known_concentration() {
        let report = check_compatibility(&names(&["EC", "FEC"]), &OperatingConditions::default(), &ElectrodeMaterials::default());
        assert!(report.compatibility_issues.is_empty());
        assert_eq!(report.recommendations, vec!["Formulation appears compatible for intended use"]);

        let formulation = vec![
            FormulationComponent::new("Ethylene Carbonate", "EC", 60.0, "vol%", ComponentRole::Solvent),
            FormulationComponent::new("Lithium Hexafluorophosphate", "LiPF6", 1.2, "M", ComponentRole::Salt),
            FormulationComponent::new("Fluoroethylene Carbonate", "FEC", 20.0, "wt%", ComponentRole::Additive),
        ];
        let report = check_formulation(&formulation, &OperatingConditions::default(), &ElectrodeMaterials::default());
        assert_eq!(rule_ids(&report), vec!["high_EC_viscosity", "FEC_gas_generation"]);
        assert!(report.compatibility_issues.iter().all(|i| i.severity == Severity::Medium));
    }

    #[test]
    fn test_unknown_components_reported() {
        let report = check_compatibility(&names(&["Sulfolane", "EC"]), &OperatingConditions::default(), &ElectrodeMaterials::default());
        assert_eq!(report.component_properties.get("Sulfolane"), Some(&PropertyEntry::unknown()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["component_properties"]["Sulfolane"]["note"], "Not in database");
        assert_eq!(json["component_properties"]["EC"]["category"], "solvent");
    }

    #[test]
    fn test_aggregate_over_solvents() {
        let report = check_compatibility(&names(&["EC", "DMC", "EMC", "LiPF6"]), &OperatingConditions::default(), &ElectrodeMaterials::default());
        let agg = report.aggregate_properties.unwrap();
        assert_eq!(agg.estimated_viscosity_mpas, 1.05);
        assert_eq!(agg.estimated_dielectric_constant, 31.9);
        assert_eq!(agg.electrochemical_window, (1.0, 6.2));
        assert_eq!(agg.window_width_v, 5.2);

        let salts_only = check_compatibility(&names(&["LiPF6"]), &OperatingConditions::default(), &ElectrodeMaterials::default());
        assert!(salts_only.aggregate_properties.is_none());
    }

    #[test]
    fn test_llm_analysis_prompt_uses_defaults() {
        let model = ScriptedModel::new(&[("Analyze compatibility", "Watch HF formation.")]);
        let text = analyze_with_llm(&names(&["EC", "LiPF6"]), &OperatingConditions::default(), &model, &PromptLibrary::builtin()).unwrap();
        assert_eq!(text, "Watch HF formation.");
        let calls = model.calls.lock().unwrap();
        assert!(calls[0].contains("Components: EC, LiPF6"));
        assert!(calls[0].contains("Temperature range: -20°C to 45°C"));
    }
}
