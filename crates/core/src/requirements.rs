//! Requirement extraction from free-text queries
//!
//! Pure keyword and regex matching. Chemistry is detected first because it
//! decides which component vocabulary, operating window and electrodes apply.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{
    contains_term, Application, BatteryChemistry, ElectrodeMaterials, OperatingConditions,
    Requirements,
};

// ============================================================================
// Vocabulary
// ============================================================================

/// Checked in order; the first chemistry with a matching keyword wins
const CHEMISTRY_KEYWORDS: &[(BatteryChemistry, &[&str])] = &[
    (
        BatteryChemistry::Zinc,
        &[
            "zinc", "zn-ion", "zn ion", "zinc-ion", "aqueous zinc", "zn metal", "zn anode",
            "zinc metal", "zinc anode",
        ],
    ),
    (
        BatteryChemistry::SodiumIon,
        &["sodium", "na-ion", "na ion", "sodium-ion", "na metal"],
    ),
    (
        BatteryChemistry::Magnesium,
        &["magnesium", "mg-ion", "mg ion", "magnesium-ion", "mg metal"],
    ),
    (
        BatteryChemistry::SolidState,
        &["solid-state", "solid state", "all-solid", "solid electrolyte", "polymer electrolyte"],
    ),
    (
        BatteryChemistry::LithiumIon,
        &["lithium", "li-ion", "li ion", "lithium-ion", "lipf6", "lifsi"],
    ),
    (BatteryChemistry::Aqueous, &["aqueous", "water-based", "water based"]),
];

/// (lowercase pattern, canonical name)
const ZINC_COMPONENTS: &[(&str, &str)] = &[
    ("znso4", "ZnSO4"),
    ("zn(cf3so3)2", "Zn(CF3SO3)2"),
    ("zncl2", "ZnCl2"),
    ("zn triflate", "Zn(CF3SO3)2"),
    ("zinc triflate", "Zn(CF3SO3)2"),
    ("zinc sulfate", "ZnSO4"),
    ("litfsi", "LiTFSI"),
    ("mno2", "MnO2"),
    ("mnso4", "MnSO4"),
];

const SODIUM_COMPONENTS: &[(&str, &str)] = &[
    ("napf6", "NaPF6"),
    ("natfsi", "NaTFSI"),
    ("nafsi", "NaFSI"),
    ("naclo4", "NaClO4"),
    ("ec", "EC"),
    ("pc", "PC"),
    ("dme", "DME"),
    ("diglyme", "Diglyme"),
    ("tetraglyme", "Tetraglyme"),
];

const MAGNESIUM_COMPONENTS: &[(&str, &str)] = &[
    ("mgcl2", "MgCl2"),
    ("mg(tfsi)2", "Mg(TFSI)2"),
    ("mgtfsi2", "Mg(TFSI)2"),
    ("thf", "THF"),
    ("dme", "DME"),
    ("diglyme", "Diglyme"),
    ("tetraglyme", "Tetraglyme"),
    ("tegdme", "TEGDME"),
];

const LITHIUM_COMPONENTS: &[&str] = &[
    // solvents
    "EC", "DMC", "EMC", "DEC", "PC",
    // salts
    "LiPF6", "LiFSI", "LiTFSI", "LiBF4",
    // additives
    "VC", "FEC", "PS", "LiBOB", "DTD",
];

/// Alias table for materials users name explicitly
const KNOWN_MATERIALS: &[(&str, &str)] = &[
    // Solvents
    ("dmso", "DMSO"),
    ("acetonitrile", "ACN"),
    ("acn", "ACN"),
    ("propylene carbonate", "PC"),
    ("ethylene carbonate", "EC"),
    ("dimethyl carbonate", "DMC"),
    ("diethyl carbonate", "DEC"),
    ("ethyl methyl carbonate", "EMC"),
    ("gamma-butyrolactone", "GBL"),
    ("gbl", "GBL"),
    ("sulfolane", "Sulfolane"),
    ("dmf", "DMF"),
    ("dimethylformamide", "DMF"),
    ("nmp", "NMP"),
    ("thf", "THF"),
    ("tetrahydrofuran", "THF"),
    ("dme", "DME"),
    ("dimethoxyethane", "DME"),
    ("diglyme", "Diglyme"),
    ("triglyme", "Triglyme"),
    ("tetraglyme", "Tetraglyme"),
    ("tegdme", "TEGDME"),
    ("dol", "DOL"),
    ("dioxolane", "DOL"),
    ("water", "H2O"),
    ("h2o", "H2O"),
    ("ionic liquid", "IL"),
    // Lithium salts
    ("lipf6", "LiPF6"),
    ("lifsi", "LiFSI"),
    ("litfsi", "LiTFSI"),
    ("libf4", "LiBF4"),
    ("libob", "LiBOB"),
    ("lidfob", "LiDFOB"),
    ("liclo4", "LiClO4"),
    ("lino3", "LiNO3"),
    ("liasf6", "LiAsF6"),
    // Sodium salts
    ("napf6", "NaPF6"),
    ("natfsi", "NaTFSI"),
    ("nafsi", "NaFSI"),
    ("naclo4", "NaClO4"),
    ("nabf4", "NaBF4"),
    // Zinc salts
    ("znso4", "ZnSO4"),
    ("zinc sulfate", "ZnSO4"),
    ("zncl2", "ZnCl2"),
    ("zinc chloride", "ZnCl2"),
    ("zn(cf3so3)2", "Zn(CF3SO3)2"),
    ("zinc triflate", "Zn(CF3SO3)2"),
    ("zn(tfsi)2", "Zn(TFSI)2"),
    ("zn(otf)2", "Zn(OTf)2"),
    ("znf2", "ZnF2"),
    // Magnesium salts
    ("mgcl2", "MgCl2"),
    ("mg(tfsi)2", "Mg(TFSI)2"),
    ("mgtfsi2", "Mg(TFSI)2"),
    ("mg(cb11h12)2", "Mg(CB11H12)2"),
    // Additives
    ("vc", "VC"),
    ("vinylene carbonate", "VC"),
    ("fec", "FEC"),
    ("fluoroethylene carbonate", "FEC"),
    ("ps", "PS"),
    ("propane sultone", "PS"),
    ("dtd", "DTD"),
    ("es", "ES"),
    ("ethylene sulfite", "ES"),
    ("peg", "PEG"),
    ("polyethylene glycol", "PEG"),
    ("pvdf", "PVDF"),
    ("tte", "TTE"),
    ("btfe", "BTFE"),
    // Solid electrolytes
    ("llzo", "LLZO"),
    ("lgps", "LGPS"),
    ("lipon", "LiPON"),
    ("nasicon", "NASICON"),
    ("lisicon", "LISICON"),
    ("peo", "PEO"),
    ("polyethylene oxide", "PEO"),
];

/// Capitalized two-letter words the formula regex would otherwise pick up
const FORMULA_STOP_WORDS: &[&str] = &[
    "In", "If", "Is", "It", "An", "As", "At", "Be", "By", "Do", "Go", "He", "Me", "My", "No",
    "Of", "On", "Or", "So", "To", "Up", "Us", "We",
];

/// Electrode abbreviations are tracked in `electrode_materials`, not components
const ELECTRODE_TERMS: &[&str] = &["NMC", "NCM", "NCA", "LCO", "LFP", "LMO", "LNMO"];

const DEFAULT_COMPONENTS: &[&str] = &["EC", "EMC", "LiPF6"];

fn formula_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][a-z]?(?:\d*[A-Z][a-z]?)*(?:\d+)?(?:\([^)]+\)\d*)?)\b")
            .expect("Invalid regex")
    })
}

fn concentration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(M|m|mol|wt%|vol%|%)\s+(\w+)").expect("Invalid regex")
    })
}

// ============================================================================
// Extraction
// ============================================================================

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Battery chemistry named in the query, if any
pub fn detect_chemistry(query: &str) -> Option<BatteryChemistry> {
    let q = query.to_lowercase();
    CHEMISTRY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_term(&q, kw)))
        .map(|(chemistry, _)| *chemistry)
}

fn detect_components(q: &str, chemistry: Option<BatteryChemistry>) -> Vec<String> {
    let mut components = Vec::new();

    let table = match chemistry {
        Some(BatteryChemistry::Zinc) => Some(ZINC_COMPONENTS),
        Some(BatteryChemistry::SodiumIon) => Some(SODIUM_COMPONENTS),
        Some(BatteryChemistry::Magnesium) => Some(MAGNESIUM_COMPONENTS),
        _ => None,
    };

    match table {
        Some(table) => {
            for (pattern, canonical) in table {
                if contains_term(q, pattern) {
                    push_unique(&mut components, canonical);
                }
            }
        }
        None => {
            for name in LITHIUM_COMPONENTS {
                if contains_term(q, &name.to_lowercase()) {
                    push_unique(&mut components, name);
                }
            }
        }
    }

    components
}

/// Materials the user names explicitly: alias table, chemical formulas and
/// concentration phrases such as `1M ZnSO4` or `2% VC`
pub fn extract_user_materials(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut materials = Vec::new();

    for (pattern, canonical) in KNOWN_MATERIALS {
        if contains_term(&lower, pattern) {
            push_unique(&mut materials, canonical);
        }
    }

    for cap in formula_regex().captures_iter(text) {
        let formula = &cap[1];
        if formula.len() >= 2
            && !FORMULA_STOP_WORDS.contains(&formula)
            && !ELECTRODE_TERMS.contains(&formula)
        {
            push_unique(&mut materials, formula);
        }
    }

    for cap in concentration_regex().captures_iter(text) {
        let material = &cap[3];
        if material.len() >= 2 && !ELECTRODE_TERMS.contains(&material) {
            push_unique(&mut materials, material);
        }
    }

    materials
}

fn detect_operating_conditions(q: &str, chemistry: Option<BatteryChemistry>) -> OperatingConditions {
    let mut conditions = OperatingConditions::default();

    match chemistry {
        Some(BatteryChemistry::Zinc) => {
            conditions.max_voltage = Some(1.8);
            conditions.max_temperature = Some(50.0);
        }
        Some(BatteryChemistry::SodiumIon) => {
            conditions.max_voltage = Some(4.0);
            conditions.max_temperature = Some(55.0);
        }
        Some(BatteryChemistry::Magnesium) => {
            conditions.max_voltage = Some(3.0);
            conditions.max_temperature = Some(50.0);
        }
        _ => {
            let voltage = if q.contains("high voltage") || q.contains("high-voltage") {
                4.5
            } else if q.contains("4.5") || q.contains("4.6") {
                4.5
            } else if q.contains("4.3") || q.contains("4.4") {
                4.35
            } else {
                4.2
            };
            conditions.max_voltage = Some(voltage);

            if q.contains("high temp") || q.contains("high-temp") || q.contains("thermal") {
                conditions.max_temperature = Some(60.0);
            } else if q.contains("low temp") || q.contains("cold") {
                conditions.min_temperature = Some(-30.0);
            } else {
                conditions.max_temperature = Some(45.0);
            }
        }
    }

    conditions
}

fn detect_electrodes(q: &str, chemistry: Option<BatteryChemistry>) -> ElectrodeMaterials {
    let (anode, cathode) = match chemistry {
        Some(BatteryChemistry::Zinc) => {
            let cathode = if q.contains("mno2") || q.contains("manganese") {
                "MnO2"
            } else if q.contains("v2o5") || q.contains("vanadium") {
                "V2O5"
            } else {
                "MnO2"
            };
            ("zinc metal", cathode)
        }
        Some(BatteryChemistry::SodiumIon) => ("hard carbon", "Na layered oxide"),
        Some(BatteryChemistry::Magnesium) => ("magnesium metal", "Mo6S8 (Chevrel)"),
        _ => {
            let anode = if q.contains("silicon") || q.contains("si anode") {
                "silicon-graphite"
            } else {
                "graphite"
            };
            let cathode = if q.contains("nmc") || q.contains("ncm") {
                "NMC"
            } else if q.contains("lco") || q.contains("licoo2") {
                "LCO"
            } else if q.contains("lfp") || q.contains("lifepo4") {
                "LFP"
            } else {
                "NMC"
            };
            (anode, cathode)
        }
    };

    ElectrodeMaterials {
        anode: Some(anode.to_string()),
        cathode: Some(cathode.to_string()),
    }
}

fn detect_application(q: &str) -> Application {
    if contains_term(q, "ev") || q.contains("electric vehicle") {
        Application::ElectricVehicle
    } else if q.contains("grid") || q.contains("storage") {
        Application::GridStorage
    } else if q.contains("consumer") || q.contains("phone") || q.contains("laptop") {
        Application::ConsumerElectronics
    } else if q.contains("fast charg") {
        Application::FastCharging
    } else {
        Application::General
    }
}

/// Parse a query (plus optional free-text materials list) into requirements
pub fn extract_requirements(query: &str, user_materials: Option<&str>) -> Requirements {
    let q = query.to_lowercase();
    let chemistry = detect_chemistry(query);
    tracing::debug!(
        "Detected chemistry: {}",
        chemistry.map_or("unspecified", |c| c.as_str())
    );

    let mut components = detect_components(&q, chemistry);

    let mut user_specified = extract_user_materials(query);
    let raw_input = user_materials
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(ref raw) = raw_input {
        for material in extract_user_materials(raw) {
            push_unique(&mut user_specified, &material);
        }
    }

    for material in &user_specified {
        let upper = material.to_uppercase();
        if !components.iter().any(|c| c.to_uppercase() == upper) {
            components.push(material.clone());
        }
    }

    let lithium_or_unknown = matches!(chemistry, None | Some(BatteryChemistry::LithiumIon));
    if components.is_empty() && user_specified.is_empty() && lithium_or_unknown {
        components = DEFAULT_COMPONENTS.iter().map(|s| s.to_string()).collect();
    }

    let operating_conditions = detect_operating_conditions(&q, chemistry);
    let electrode_materials = detect_electrodes(&q, chemistry);

    if electrode_materials.anode.as_deref() == Some("silicon-graphite") {
        push_unique(&mut components, "FEC");
    }

    Requirements {
        components,
        operating_conditions,
        electrode_materials,
        application: detect_application(&q),
        battery_type: chemistry,
        user_specified_materials: user_specified,
        user_materials_raw_input: raw_input,
        llm_analysis: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_chemistry_order() {
        assert_eq!(detect_chemistry("Aqueous zinc battery"), Some(BatteryChemistry::Zinc));
        assert_eq!(detect_chemistry("sodium-ion with hard carbon"), Some(BatteryChemistry::SodiumIon));
        assert_eq!(detect_chemistry("Mg metal anode"), Some(BatteryChemistry::Magnesium));
        assert_eq!(detect_chemistry("solid state lithium cell"), Some(BatteryChemistry::SolidState));
        assert_eq!(detect_chemistry("LiPF6 in carbonate"), Some(BatteryChemistry::LithiumIon));
        assert_eq!(detect_chemistry("water-based electrolyte"), Some(BatteryChemistry::Aqueous));
        assert_eq!(detect_chemistry("design an electrolyte"), None);
    }

    #[test]
    fn test_lithium_components_whole_terms() {
        let req = extract_requirements("Electrolyte with EC/DMC, LiPF6 and 2% VC for graphite", None);
        assert!(req.components.starts_with(&["EC".to_string(), "DMC".to_string(), "LiPF6".to_string(), "VC".to_string()]));
        // "electrolyte" must not produce EC on its own
        let req = extract_requirements("electrolyte for a phone", None);
        assert_eq!(req.components, vec!["EC", "EMC", "LiPF6"]);
        assert_eq!(req.application, Application::ConsumerElectronics);
    }

    #[test]
    fn test_default_components_only_for_lithium_or_unknown() {
        let req = extract_requirements("Design a zinc battery electrolyte", None);
        assert_eq!(req.battery_type, Some(BatteryChemistry::Zinc));
        assert!(req.components.is_empty());

        let req = extract_requirements("design an electrolyte", None);
        assert_eq!(req.battery_type, None);
        assert_eq!(req.components, vec!["EC", "EMC", "LiPF6"]);
    }

    #[test]
    fn test_zinc_requirements() {
        let req = extract_requirements("Aqueous zinc-ion battery with 2M ZnSO4 and MnSO4 additive", None);
        assert_eq!(req.battery_type, Some(BatteryChemistry::Zinc));
        assert_eq!(req.components[0], "ZnSO4");
        assert!(req.components.contains(&"MnSO4".to_string()));
        assert_eq!(req.operating_conditions.max_voltage, Some(1.8));
        assert_eq!(req.operating_conditions.max_temperature, Some(50.0));
        assert_eq!(req.electrode_materials.anode.as_deref(), Some("zinc metal"));
        assert_eq!(req.electrode_materials.cathode.as_deref(), Some("MnO2"));
    }

    #[test]
    fn test_zinc_vanadium_cathode() {
        let req = extract_requirements("zinc battery with V2O5 cathode", None);
        assert_eq!(req.electrode_materials.cathode.as_deref(), Some("V2O5"));
    }

    #[test]
    fn test_sodium_and_magnesium_windows() {
        let na = extract_requirements("sodium-ion electrolyte with NaPF6 in diglyme", None);
        assert_eq!(na.operating_conditions.max_voltage, Some(4.0));
        assert_eq!(na.operating_conditions.max_temperature, Some(55.0));
        assert_eq!(na.electrode_materials.anode.as_deref(), Some("hard carbon"));
        assert!(na.components.contains(&"NaPF6".to_string()));
        assert!(na.components.contains(&"Diglyme".to_string()));

        let mg = extract_requirements("magnesium battery using MgCl2 in THF", None);
        assert_eq!(mg.operating_conditions.max_voltage, Some(3.0));
        assert_eq!(mg.electrode_materials.cathode.as_deref(), Some("Mo6S8 (Chevrel)"));
        assert_eq!(&mg.components[..2], &["MgCl2".to_string(), "THF".to_string()]);
    }

    #[test]
    fn test_lithium_voltage_and_temperature() {
        let req = extract_requirements("high-voltage electrolyte", None);
        assert_eq!(req.operating_conditions.max_voltage, Some(4.5));
        assert_eq!(req.operating_conditions.max_temperature, Some(45.0));

        let req = extract_requirements("cells cycled to 4.4 V at high temperature", None);
        assert_eq!(req.operating_conditions.max_voltage, Some(4.35));
        assert_eq!(req.operating_conditions.max_temperature, Some(60.0));

        let req = extract_requirements("electrolyte for cold climates", None);
        assert_eq!(req.operating_conditions.max_voltage, Some(4.2));
        assert_eq!(req.operating_conditions.min_temperature, Some(-30.0));
        assert_eq!(req.operating_conditions.max_temperature, None);
    }

    #[test]
    fn test_silicon_anode_adds_fec() {
        let req = extract_requirements("Design a high-voltage electrolyte for NMC cathode with silicon anode", None);
        assert_eq!(req.electrode_materials.anode.as_deref(), Some("silicon-graphite"));
        assert_eq!(req.electrode_materials.cathode.as_deref(), Some("NMC"));
        assert!(req.components.contains(&"FEC".to_string()));
        assert!(!req.components.contains(&"NMC".to_string()));
    }

    #[test]
    fn test_cathode_detection() {
        let req = extract_requirements("electrolyte for LFP cells", None);
        assert_eq!(req.electrode_materials.cathode.as_deref(), Some("LFP"));
        let req = extract_requirements("electrolyte for LiCoO2", None);
        assert_eq!(req.electrode_materials.cathode.as_deref(), Some("LCO"));
    }

    #[test]
    fn test_application_detection() {
        assert_eq!(extract_requirements("EV battery", None).application, Application::ElectricVehicle);
        assert_eq!(extract_requirements("electrolyte for grid storage", None).application, Application::GridStorage);
        assert_eq!(extract_requirements("fast charging cells", None).application, Application::FastCharging);
        // "ev" inside another word is not an EV
        assert_eq!(extract_requirements("develop a new electrolyte", None).application, Application::General);
    }

    #[test]
    fn test_extract_user_materials() {
        let materials = extract_user_materials("Try 1M LiTFSI in DME with TTE diluent");
        assert_eq!(materials, vec!["DME", "LiTFSI", "TTE"]);

        let materials = extract_user_materials("It is a test of 0.5 m Zn(OTf)2 In water");
        assert!(materials.contains(&"Zn(OTf)2".to_string()));
        assert!(materials.contains(&"H2O".to_string()));
        assert!(!materials.contains(&"It".to_string()));
        assert!(!materials.contains(&"In".to_string()));
    }

    #[test]
    fn test_user_materials_input_merged() {
        let req = extract_requirements("Design an electrolyte for NMC", Some("  sulfolane, LiDFOB  "));
        assert_eq!(req.user_materials_raw_input.as_deref(), Some("sulfolane, LiDFOB"));
        assert_eq!(req.user_specified_materials, vec!["Sulfolane", "LiDFOB"]);
        assert_eq!(req.components, vec!["Sulfolane", "LiDFOB"]);
    }

    #[test]
    fn test_user_materials_not_duplicated() {
        let req = extract_requirements("lithium electrolyte with LiPF6", Some("lipf6"));
        assert_eq!(req.components.iter().filter(|c| c.eq_ignore_ascii_case("lipf6")).count(), 1);
    }
}
