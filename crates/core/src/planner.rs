//! Experiment planning
//!
//! Produces three candidate formulations with steps, safety notes and the
//! standard lab protocols. The language model proposes chemistry-specific
//! plans; static per-chemistry templates cover the offline case.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::literature::LiteratureReport;
use crate::llm::{parse_json_from_text, value_as_f64, LanguageModel, LlmRequest};
use crate::prompts::PromptLibrary;
use crate::requirements::detect_chemistry;
use crate::types::{
    truncate_chars, Application, BatteryChemistry, ComponentRole, ElectrodeMaterials,
    ExperimentPlan, FormulationComponent, OperatingConditions, Protocol,
};

const MAX_PLANS: usize = 3;
const DEFAULT_PRIORITY: f64 = 0.85;

// ============================================================================
// Protocols
// ============================================================================

struct ProtocolTemplate {
    name: &'static str,
    steps: &'static [&'static str],
    duration: &'static str,
    equipment: &'static [&'static str],
}

const PROTOCOLS: &[ProtocolTemplate] = &[
    ProtocolTemplate {
        name: "Cell Assembly",
        steps: &[
            "Prepare electrodes according to battery type specifications",
            "Dry components under vacuum at appropriate temperature",
            "Transfer to controlled atmosphere environment",
            "Stack electrodes with appropriate separator",
            "Add electrolyte with precise volume",
            "Seal cell according to cell format",
            "Rest before testing",
        ],
        duration: "1-2 days",
        equipment: &["Glovebox/dry room", "Cell assembly tools", "Vacuum oven"],
    },
    ProtocolTemplate {
        name: "Galvanostatic Cycling",
        steps: &[
            "Connect cell to battery cycler",
            "Set voltage window appropriate for battery chemistry",
            "Perform formation cycles at low rate",
            "Run regular cycling at specified rate",
            "Record capacity, efficiency, voltage profiles",
        ],
        duration: "1-4 weeks depending on cycle number",
        equipment: &["Battery cycler", "Temperature chamber"],
    },
    ProtocolTemplate {
        name: "Rate Capability Test",
        steps: &[
            "Complete formation cycles",
            "Cycle at progressively higher rates",
            "Return to low rate for recovery check",
            "Plot capacity vs rate",
        ],
        duration: "3-5 days",
        equipment: &["Battery cycler"],
    },
    ProtocolTemplate {
        name: "Electrochemical Impedance Spectroscopy (EIS)",
        steps: &[
            "Equilibrate cell at desired state of charge",
            "Apply small AC perturbation",
            "Sweep frequency range",
            "Analyze impedance response",
        ],
        duration: "2-4 hours per measurement",
        equipment: &["Potentiostat/Galvanostat", "Frequency response analyzer"],
    },
    ProtocolTemplate {
        name: "Ionic Conductivity Measurement",
        steps: &[
            "Prepare electrolyte sample",
            "Fill conductivity cell",
            "Measure impedance",
            "Calculate conductivity",
            "Optional: temperature-dependent measurements",
        ],
        duration: "1-2 hours",
        equipment: &["Conductivity cell", "Impedance analyzer"],
    },
];

/// Cell assembly, cycling, rate capability, EIS and conductivity
pub fn standard_protocols() -> Vec<Protocol> {
    PROTOCOLS
        .iter()
        .map(|p| Protocol {
            name: p.name.to_string(),
            steps: p.steps.iter().map(|s| s.to_string()).collect(),
            duration: p.duration.to_string(),
            equipment: p.equipment.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

// ============================================================================
// Fallback Templates
// ============================================================================

type TemplateComponent = (&'static str, &'static str, f64, &'static str, ComponentRole);

struct PlanTemplate {
    title: &'static str,
    formulation: &'static [TemplateComponent],
    rationale: &'static str,
    priority: f64,
}

/// Ordered advanced, optimized, baseline
struct ChemistryTemplates([PlanTemplate; 3]);

use ComponentRole::{Additive, LewisAcid, Salt, Solvent};

const ZINC_TEMPLATES: ChemistryTemplates = ChemistryTemplates([
    PlanTemplate {
        title: "Water-in-Salt Zinc Electrolyte",
        formulation: &[
            ("Zinc Trifluoromethanesulfonate", "Zn(CF3SO3)2", 4.0, "M", Salt),
            ("Lithium bis(trifluoromethanesulfonyl)imide", "LiTFSI", 21.0, "M", Salt),
            ("Water", "H2O", 100.0, "vol%", Solvent),
        ],
        rationale: "Water-in-salt electrolyte with expanded electrochemical stability window and dendrite suppression.",
        priority: 0.88,
    },
    PlanTemplate {
        title: "Optimized Zinc Triflate Electrolyte",
        formulation: &[
            ("Zinc Trifluoromethanesulfonate", "Zn(CF3SO3)2", 3.0, "M", Salt),
            ("Water", "H2O", 100.0, "vol%", Solvent),
            ("Lithium bis(trifluoromethanesulfonyl)imide", "LiTFSI", 0.5, "M", Additive),
        ],
        rationale: "High-concentration zinc triflate with LiTFSI for improved Zn plating/stripping reversibility.",
        priority: 0.90,
    },
    PlanTemplate {
        title: "Baseline Aqueous Zinc Electrolyte",
        formulation: &[
            ("Zinc Sulfate", "ZnSO4", 2.0, "M", Salt),
            ("Water", "H2O", 100.0, "vol%", Solvent),
            ("Manganese Sulfate", "MnSO4", 0.1, "M", Additive),
        ],
        rationale: "Standard aqueous zinc electrolyte with MnSO4 to suppress Mn dissolution from cathode.",
        priority: 0.85,
    },
]);

const SODIUM_TEMPLATES: ChemistryTemplates = ChemistryTemplates([
    PlanTemplate {
        title: "Advanced Concentrated Na Electrolyte",
        formulation: &[
            ("Dimethoxyethane", "DME", 100.0, "vol%", Solvent),
            ("Sodium bis(fluorosulfonyl)imide", "NaFSI", 4.0, "M", Salt),
        ],
        rationale: "High-concentration NaFSI in ether for stable Na metal anode performance.",
        priority: 0.88,
    },
    PlanTemplate {
        title: "Optimized Ether-based Na Electrolyte",
        formulation: &[
            ("Diethylene Glycol Dimethyl Ether", "Diglyme", 100.0, "vol%", Solvent),
            ("Sodium bis(trifluoromethanesulfonyl)imide", "NaTFSI", 1.0, "M", Salt),
        ],
        rationale: "Ether-based electrolyte with improved Na metal compatibility and lower viscosity.",
        priority: 0.90,
    },
    PlanTemplate {
        title: "Baseline Sodium-ion Electrolyte",
        formulation: &[
            ("Ethylene Carbonate", "EC", 50.0, "vol%", Solvent),
            ("Propylene Carbonate", "PC", 50.0, "vol%", Solvent),
            ("Sodium Hexafluorophosphate", "NaPF6", 1.0, "M", Salt),
        ],
        rationale: "Standard carbonate-based electrolyte for sodium-ion batteries.",
        priority: 0.85,
    },
]);

const LITHIUM_TEMPLATES: ChemistryTemplates = ChemistryTemplates([
    PlanTemplate {
        title: "Advanced Dual-Salt Li Electrolyte",
        formulation: &[
            ("Ethylene Carbonate", "EC", 30.0, "vol%", Solvent),
            ("Dimethyl Carbonate", "DMC", 35.0, "vol%", Solvent),
            ("Ethyl Methyl Carbonate", "EMC", 35.0, "vol%", Solvent),
            ("Lithium Hexafluorophosphate", "LiPF6", 0.8, "M", Salt),
            ("Lithium bis(fluorosulfonyl)imide", "LiFSI", 0.2, "M", Salt),
            ("Vinylene Carbonate", "VC", 2.0, "wt%", Additive),
            ("1,3,2-Dioxathiolane 2,2-dioxide", "DTD", 1.0, "wt%", Additive),
        ],
        rationale: "Dual-salt system with synergistic SEI formation from VC and DTD.",
        priority: 0.88,
    },
    PlanTemplate {
        title: "Optimized Li-ion Electrolyte",
        formulation: &[
            ("Ethylene Carbonate", "EC", 30.0, "vol%", Solvent),
            ("Dimethyl Carbonate", "DMC", 40.0, "vol%", Solvent),
            ("Ethyl Methyl Carbonate", "EMC", 30.0, "vol%", Solvent),
            ("Lithium bis(fluorosulfonyl)imide", "LiFSI", 1.2, "M", Salt),
            ("Vinylene Carbonate", "VC", 1.5, "wt%", Additive),
            ("Fluoroethylene Carbonate", "FEC", 5.0, "wt%", Additive),
        ],
        rationale: "Ternary solvent with LiFSI for improved conductivity and thermal stability.",
        priority: 0.90,
    },
    PlanTemplate {
        title: "Baseline Commercial-type Electrolyte",
        formulation: &[
            ("Ethylene Carbonate", "EC", 30.0, "vol%", Solvent),
            ("Ethyl Methyl Carbonate", "EMC", 70.0, "vol%", Solvent),
            ("Lithium Hexafluorophosphate", "LiPF6", 1.0, "M", Salt),
            ("Vinylene Carbonate", "VC", 2.0, "wt%", Additive),
        ],
        rationale: "Industry-standard EC:EMC electrolyte with VC additive for SEI formation.",
        priority: 0.85,
    },
]);

const MAGNESIUM_TEMPLATES: ChemistryTemplates = ChemistryTemplates([
    PlanTemplate {
        title: "Advanced Mg Electrolyte with Boron Cluster",
        formulation: &[
            ("Magnesium Carborane", "Mg(CB11H12)2", 0.5, "M", Salt),
            ("Tetraglyme", "TEGDME", 100.0, "vol%", Solvent),
        ],
        rationale: "Carborane-based anion provides high oxidative stability and non-nucleophilic character.",
        priority: 0.82,
    },
    PlanTemplate {
        title: "Optimized Mg(TFSI)2 Electrolyte",
        formulation: &[
            ("Magnesium bis(trifluoromethanesulfonyl)imide", "Mg(TFSI)2", 0.5, "M", Salt),
            ("Dimethoxyethane", "DME", 50.0, "vol%", Solvent),
            ("Tetraglyme", "TEGDME", 50.0, "vol%", Solvent),
        ],
        rationale: "Non-corrosive Mg(TFSI)2 salt in glyme-based solvents for wider compatibility.",
        priority: 0.88,
    },
    PlanTemplate {
        title: "Baseline APC Magnesium Electrolyte",
        formulation: &[
            ("Magnesium Chloride", "MgCl2", 0.25, "M", Salt),
            ("Aluminum Chloride", "AlCl3", 0.5, "M", LewisAcid),
            ("Tetrahydrofuran", "THF", 100.0, "vol%", Solvent),
        ],
        rationale: "All-phenyl complex (APC) type electrolyte, well-established for Mg batteries.",
        priority: 0.85,
    },
]);

fn templates_for(chemistry: BatteryChemistry) -> &'static ChemistryTemplates {
    match chemistry {
        BatteryChemistry::Zinc => &ZINC_TEMPLATES,
        BatteryChemistry::SodiumIon => &SODIUM_TEMPLATES,
        BatteryChemistry::Magnesium => &MAGNESIUM_TEMPLATES,
        BatteryChemistry::LithiumIon | BatteryChemistry::SolidState | BatteryChemistry::Aqueous => {
            &LITHIUM_TEMPLATES
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Offline plans from the static templates
pub fn template_plans(chemistry: BatteryChemistry) -> Vec<ExperimentPlan> {
    let chem = chemistry.as_str();
    templates_for(chemistry)
        .0
        .iter()
        .map(|t| ExperimentPlan {
            plan_id: short_id(),
            title: t.title.to_string(),
            formulation: t
                .formulation
                .iter()
                .map(|(name, abbr, conc, unit, role)| FormulationComponent::new(name, abbr, *conc, unit, *role))
                .collect(),
            rationale: t.rationale.to_string(),
            battery_type: chemistry,
            experimental_steps: vec![
                format!("Prepare electrolyte for {} battery", chem),
                "Verify purity and water content".to_string(),
                "Assemble test cells".to_string(),
                "Perform formation cycles".to_string(),
                "Run cycling tests".to_string(),
                "Conduct EIS measurements".to_string(),
                "Analyze results".to_string(),
            ],
            safety_considerations: vec![
                "Handle all chemicals with appropriate PPE".to_string(),
                "Work in appropriate atmosphere (glovebox for air-sensitive)".to_string(),
                "Follow MSDS guidelines for all components".to_string(),
            ],
            estimated_cost: "$300-600".to_string(),
            estimated_time: "4-8 weeks".to_string(),
            priority_score: t.priority,
            protocols: Vec::new(),
            predicted_performance: None,
            prediction_confidence: None,
            prediction_notes: None,
            llm_rationale: None,
        })
        .collect()
}

// ============================================================================
// LLM Plans
// ============================================================================

const PLANNER_SYSTEM_PROMPT: &str = r#"You are an expert electrochemist specializing in {{chemistry}} battery electrolyte design.

Your task is to generate practical, chemistry-appropriate electrolyte formulations.

CRITICAL RULES:
1. ONLY use components appropriate for {{CHEMISTRY}} chemistry
2. Do NOT default to lithium-ion components for non-lithium batteries
3. Include specific concentrations and units
4. Consider the operating conditions and application requirements
5. Base recommendations on established electrochemistry principles

For {{CHEMISTRY}} batteries, typical components include:
{{hints}}

Respond ONLY with valid JSON."#;

const PLANNER_PROMPT: &str = r#"Generate 3 electrolyte formulation plans for the following battery research:

## User Query
{{query}}

## Battery Chemistry
{{CHEMISTRY}} battery system
{{user_materials}}
## Target Application
{{application}}

## Operating Conditions
{{conditions}}

## Electrode Materials
{{electrodes}}

## Literature Context
{{literature}}

## Requirements
Generate THREE distinct experiment plans with formulations:

1. **User-Specified Formulation**: If the user specified any materials, create a plan using those exact materials
2. **Optimized Plan**: Enhanced formulation addressing the specific requirements
3. **Alternative Plan**: Different approach or cutting-edge formulation

For each plan, provide:
- A specific electrolyte formulation with exact components and concentrations
- Components must be appropriate for the battery chemistry
- Rationale explaining the choices
- Experimental steps
- Safety considerations
- Estimated cost and time

CRITICAL RULES:
1. If user specified materials like "ZnCl2", "DMSO", "acetonitrile", etc. - USE THEM in at least one plan
2. Use components appropriate for {{CHEMISTRY}} batteries
3. Do NOT ignore user-specified materials in favor of "standard" formulations

Respond in JSON format:
{
    "plans": [
        {
            "title": "Plan title",
            "formulation": [
                {"name": "Full chemical name", "abbreviation": "ABBREV", "concentration": number, "unit": "M or vol% or wt%", "role": "salt/solvent/additive"}
            ],
            "rationale": "Explanation of formulation choices for {{chemistry}}",
            "experimental_steps": ["step1", "step2", ...],
            "safety_considerations": ["consideration1", ...],
            "estimated_cost": "$X-Y",
            "estimated_time": "X weeks",
            "priority_score": 0.85-0.95
        }
    ]
}"#;

fn chemistry_hints(chemistry: BatteryChemistry) -> &'static str {
    match chemistry {
        BatteryChemistry::Zinc => "- Zinc salts: ZnSO4, Zn(CF3SO3)2 (zinc triflate), ZnCl2\n- Solvents: Water (aqueous), acetonitrile, DMSO\n- Additives: LiTFSI (anti-dendrite), MnSO4, polyethylene glycol",
        BatteryChemistry::SodiumIon => "- Sodium salts: NaPF6, NaTFSI, NaClO4, NaFSI\n- Solvents: EC, PC, DME, diglyme\n- Additives: FEC, VC",
        BatteryChemistry::Magnesium => "- Magnesium salts: MgCl2, Mg(TFSI)2, Mg(CB11H12)2\n- Solvents: THF, DME, diglyme, TEGDME\n- Additives: AlCl3 (for APC electrolyte)",
        BatteryChemistry::LithiumIon => "- Lithium salts: LiPF6, LiFSI, LiTFSI, LiBOB\n- Solvents: EC, DMC, EMC, DEC, PC\n- Additives: VC, FEC, PS, DTD",
        BatteryChemistry::SolidState | BatteryChemistry::Aqueous => "",
    }
}

/// What the planner needs from earlier stages
#[derive(Debug, Clone, Copy)]
pub struct PlanningInput<'a> {
    pub query: &'a str,
    pub battery_type: Option<BatteryChemistry>,
    pub literature: Option<&'a LiteratureReport>,
    pub application: Application,
    pub conditions: &'a OperatingConditions,
    pub electrodes: &'a ElectrodeMaterials,
    pub user_specified_materials: &'a [String],
    pub detected_components: &'a [String],
}

impl<'a> PlanningInput<'a> {
    /// Explicit chemistry, else detected from the query, else lithium-ion
    pub fn chemistry(&self) -> BatteryChemistry {
        self.battery_type
            .or_else(|| detect_chemistry(self.query))
            .unwrap_or(BatteryChemistry::LithiumIon)
    }
}

fn user_materials_section(input: &PlanningInput<'_>) -> String {
    let mut all: Vec<&str> = Vec::new();
    for m in input.user_specified_materials.iter().chain(input.detected_components) {
        if !all.contains(&m.as_str()) {
            all.push(m);
        }
    }
    if all.is_empty() {
        return String::new();
    }
    format!(
        "\n## USER-SPECIFIED MATERIALS (MUST BE INCLUDED)\n\
         The user has explicitly mentioned these materials in their query:\n\
         {}\n\n\
         **CRITICAL**: At least one of your experiment plans MUST include these user-specified materials.\n\
         If the user specified a salt, solvent, or additive, incorporate it into the formulation.\n",
        all.join(", ")
    )
}

fn literature_context(report: Option<&LiteratureReport>) -> String {
    match report {
        Some(r) if !r.results.is_empty() => r
            .results
            .iter()
            .take(3)
            .map(|res| format!("- {}: {}...", res.title, truncate_chars(&res.content, 200)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "No specific literature references available.".to_string(),
    }
}

fn pretty_or(value: impl Serialize, empty: bool, fallback: &str) -> String {
    if empty {
        return fallback.to_string();
    }
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| fallback.to_string())
}

#[derive(Deserialize, Debug, Default)]
struct RawPlans {
    #[serde(default)]
    plans: Vec<RawPlan>,
}

#[derive(Deserialize, Debug, Default)]
struct RawPlan {
    title: Option<String>,
    #[serde(default)]
    formulation: Vec<RawComponent>,
    rationale: Option<String>,
    #[serde(default)]
    experimental_steps: Vec<Value>,
    #[serde(default)]
    safety_considerations: Vec<Value>,
    estimated_cost: Option<Value>,
    estimated_time: Option<Value>,
    priority_score: Option<Value>,
}

#[derive(Deserialize, Debug, Default)]
struct RawComponent {
    name: Option<String>,
    abbreviation: Option<String>,
    concentration: Option<Value>,
    unit: Option<String>,
    role: Option<String>,
}

fn text_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .collect()
}

fn text_or(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

fn normalize_component(raw: RawComponent) -> Option<FormulationComponent> {
    let name = raw.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let abbreviation = raw.abbreviation.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    if name.is_none() && abbreviation.is_none() {
        return None;
    }
    Some(FormulationComponent {
        name: name.clone().or_else(|| abbreviation.clone()).unwrap_or_default(),
        abbreviation: abbreviation.or(name).unwrap_or_default(),
        concentration: raw.concentration.as_ref().and_then(value_as_f64).unwrap_or(0.0),
        unit: raw.unit.unwrap_or_default(),
        role: raw.role.as_deref().map_or(ComponentRole::Other, ComponentRole::parse),
    })
}

fn normalize_plans(raw: RawPlans, chemistry: BatteryChemistry) -> Vec<ExperimentPlan> {
    raw.plans
        .into_iter()
        .filter_map(|plan| {
            let formulation: Vec<FormulationComponent> =
                plan.formulation.into_iter().filter_map(normalize_component).collect();
            if formulation.is_empty() {
                return None;
            }
            Some(ExperimentPlan {
                plan_id: short_id(),
                title: plan
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "Untitled Plan".to_string()),
                formulation,
                rationale: plan.rationale.unwrap_or_default(),
                battery_type: chemistry,
                experimental_steps: text_list(&plan.experimental_steps),
                safety_considerations: text_list(&plan.safety_considerations),
                estimated_cost: text_or(plan.estimated_cost.as_ref(), "TBD"),
                estimated_time: text_or(plan.estimated_time.as_ref(), "TBD"),
                priority_score: plan
                    .priority_score
                    .as_ref()
                    .and_then(value_as_f64)
                    .unwrap_or(DEFAULT_PRIORITY)
                    .clamp(0.0, 1.0),
                protocols: Vec::new(),
                predicted_performance: None,
                prediction_confidence: None,
                prediction_notes: None,
                llm_rationale: None,
            })
        })
        .take(MAX_PLANS)
        .collect()
}

pub fn generate_plans_with_llm(
    input: &PlanningInput<'_>,
    llm: &dyn LanguageModel,
    prompts: &PromptLibrary,
) -> Result<Vec<ExperimentPlan>> {
    let chemistry = input.chemistry();
    let chem = chemistry.as_str();
    let chem_upper = chem.to_uppercase();

    let system = prompts.render(
        "planner_system",
        PLANNER_SYSTEM_PROMPT,
        &[("chemistry", chem), ("CHEMISTRY", &chem_upper), ("hints", chemistry_hints(chemistry))],
    );

    let user_materials = user_materials_section(input);
    let conditions = pretty_or(input.conditions, input.conditions.is_empty(), "Standard conditions");
    let electrodes = pretty_or(input.electrodes, input.electrodes.is_empty(), "Not specified");
    let literature = literature_context(input.literature);

    let prompt = prompts.render(
        "planner",
        PLANNER_PROMPT,
        &[
            ("query", input.query),
            ("chemistry", chem),
            ("CHEMISTRY", &chem_upper),
            ("user_materials", &user_materials),
            ("application", input.application.as_str()),
            ("conditions", &conditions),
            ("electrodes", &electrodes),
            ("literature", &literature),
        ],
    );

    let request = LlmRequest::new(prompt)
        .system(system)
        .temperature(0.4)
        .max_tokens(3000);

    let text = llm.generate(&request)?;
    let raw: RawPlans = parse_json_from_text(&text)?;
    let plans = normalize_plans(raw, chemistry);
    if plans.is_empty() {
        return Err(anyhow!("LLM returned no usable plans"));
    }
    Ok(plans)
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    LlmGenerated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningReport {
    pub experiment_plans: Vec<ExperimentPlan>,
    pub total_plans: usize,
    pub battery_type: BatteryChemistry,
    pub recommendation: String,
    pub generation_method: GenerationMethod,
}

pub fn recommendation(plans: &[ExperimentPlan], chemistry: BatteryChemistry) -> String {
    let chem = chemistry.as_str();
    match plans.first() {
        None => format!(
            "Unable to generate recommendations for {} battery. Please provide more context.",
            chem
        ),
        Some(top) => format!(
            "Recommended for {} battery: '{}' (priority: {:.2}). \
             This formulation uses components specifically selected for {} chemistry. \
             Estimated cost: {}, timeline: {}.",
            chem.to_uppercase(),
            top.title,
            top.priority_score,
            chem,
            top.estimated_cost,
            top.estimated_time
        ),
    }
}

/// Model plans when available, templates otherwise; ranked by priority
pub fn plan_experiments(
    input: &PlanningInput<'_>,
    llm: Option<&dyn LanguageModel>,
    prompts: &PromptLibrary,
) -> PlanningReport {
    let chemistry = input.chemistry();
    tracing::info!("[Planner] Generating experiment plans for {} battery", chemistry.as_str());
    if !input.user_specified_materials.is_empty() {
        tracing::debug!("[Planner] User-specified materials: {:?}", input.user_specified_materials);
    }

    let generated = llm.and_then(|llm| match generate_plans_with_llm(input, llm, prompts) {
        Ok(plans) => Some(plans),
        Err(e) => {
            tracing::warn!("LLM plan generation failed: {}", e);
            None
        }
    });

    let (mut plans, generation_method) = match generated {
        Some(plans) => (plans, GenerationMethod::LlmGenerated),
        None => (template_plans(chemistry), GenerationMethod::Template),
    };

    for plan in &mut plans {
        plan.protocols = standard_protocols();
    }
    plans.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

    PlanningReport {
        total_plans: plans.len(),
        recommendation: recommendation(&plans, chemistry),
        experiment_plans: plans,
        battery_type: chemistry,
        generation_method,
    }
}
