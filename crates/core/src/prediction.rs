//! Performance prediction
//!
//! Numbers here are illustrative estimates. With a model backend the model is
//! asked for metrics; otherwise (or on any failure) a per-chemistry baseline
//! with a small random jitter is returned.

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::llm::{parse_json_from_text, value_as_f64, LanguageModel, LlmRequest};
use crate::prompts::PromptLibrary;
use crate::types::{round_to, BatteryChemistry, ElectrodeMaterials, OperatingConditions, PredictedMetrics};

/// Abbreviation → concentration
pub type FormulationMap = BTreeMap<String, f64>;

// ============================================================================
// Baselines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemistryBaseline {
    pub capacity: f64,
    pub cycles: f64,
    pub rate: f64,
    pub conductivity: f64,
    pub temp_range: (f64, f64),
}

const LITHIUM_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 85.0,
    cycles: 500.0,
    rate: 70.0,
    conductivity: 10.0,
    temp_range: (-20.0, 60.0),
};

const ZINC_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 80.0,
    cycles: 300.0,
    rate: 65.0,
    // aqueous electrolytes conduct better
    conductivity: 50.0,
    temp_range: (0.0, 50.0),
};

const SODIUM_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 80.0,
    cycles: 400.0,
    rate: 65.0,
    conductivity: 8.0,
    temp_range: (-20.0, 55.0),
};

const MAGNESIUM_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 75.0,
    cycles: 200.0,
    rate: 50.0,
    conductivity: 5.0,
    temp_range: (0.0, 50.0),
};

const AQUEOUS_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 80.0,
    cycles: 500.0,
    rate: 80.0,
    conductivity: 100.0,
    temp_range: (0.0, 40.0),
};

const UNKNOWN_BASELINE: ChemistryBaseline = ChemistryBaseline {
    capacity: 75.0,
    cycles: 300.0,
    rate: 60.0,
    conductivity: 5.0,
    temp_range: (-10.0, 50.0),
};

/// Solid-state has no dedicated baseline and uses the conservative default
pub fn baseline_for(chemistry: Option<BatteryChemistry>) -> ChemistryBaseline {
    match chemistry {
        Some(BatteryChemistry::LithiumIon) => LITHIUM_BASELINE,
        Some(BatteryChemistry::Zinc) => ZINC_BASELINE,
        Some(BatteryChemistry::SodiumIon) => SODIUM_BASELINE,
        Some(BatteryChemistry::Magnesium) => MAGNESIUM_BASELINE,
        Some(BatteryChemistry::Aqueous) => AQUEOUS_BASELINE,
        Some(BatteryChemistry::SolidState) | None => UNKNOWN_BASELINE,
    }
}

const CHEMISTRY_INDICATORS: &[(BatteryChemistry, &[&str])] = &[
    (
        BatteryChemistry::LithiumIon,
        &["LIPF6", "LIFSI", "LITFSI", "LIBF4", "LIBOB", "LI", "LITHIUM"],
    ),
    (
        BatteryChemistry::Zinc,
        &["ZN", "ZNSO4", "ZNCL2", "ZNTFSI", "ZN(CF3SO3)2", "ZINC"],
    ),
    (
        BatteryChemistry::SodiumIon,
        &["NA", "NAPF6", "NATFSI", "NAFSI", "SODIUM"],
    ),
    (
        BatteryChemistry::Magnesium,
        &["MG", "MGCL2", "MGTFSI", "MAGNESIUM"],
    ),
    (BatteryChemistry::Aqueous, &["H2O", "WATER", "AQUEOUS"]),
];

/// Infer chemistry from component names (substring indicators, lithium first)
pub fn detect_chemistry_from_formulation(formulation: &FormulationMap) -> Option<BatteryChemistry> {
    let upper: Vec<String> = formulation.keys().map(|k| k.to_uppercase()).collect();
    CHEMISTRY_INDICATORS
        .iter()
        .find(|(_, indicators)| {
            indicators
                .iter()
                .any(|ind| upper.iter().any(|comp| comp.contains(ind)))
        })
        .map(|(chemistry, _)| *chemistry)
}

fn chemistry_label(chemistry: Option<BatteryChemistry>) -> &'static str {
    chemistry.map_or("unknown", |c| c.as_str())
}

/// Composite ranking score used to compare formulations
pub fn composite_score(capacity: f64, cycles: f64, rate: f64) -> f64 {
    capacity * 0.3 + (cycles / 10.0) * 0.4 + rate * 0.3
}

fn jitter() -> f64 {
    rand::thread_rng().gen_range(-5.0..=5.0)
}

// ============================================================================
// Result Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    LlmBased,
    BasicEstimation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePrediction {
    pub predictions: PredictedMetrics,
    pub confidence_score: f64,
    pub model_notes: String,
    pub battery_chemistry: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
    pub formulation_analyzed: FormulationMap,
    pub prediction_method: PredictionMethod,
}

/// Everything the predictor looks at for one formulation
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput<'a> {
    pub formulation: &'a FormulationMap,
    pub conditions: &'a OperatingConditions,
    pub electrodes: &'a ElectrodeMaterials,
    pub battery_type: Option<BatteryChemistry>,
    pub query_context: &'a str,
}

// ============================================================================
// Basic Estimation
// ============================================================================

/// Baseline plus one shared variation `v`: capacity ±v, cycles ±10v, rate ±v,
/// conductivity ±0.1v
pub fn estimate_with_variation(
    formulation: &FormulationMap,
    battery_type: Option<BatteryChemistry>,
    variation: f64,
) -> PerformancePrediction {
    let chemistry = battery_type.or_else(|| detect_chemistry_from_formulation(formulation));
    let base = baseline_for(chemistry);
    let label = chemistry_label(chemistry);

    PerformancePrediction {
        predictions: PredictedMetrics {
            capacity_retention_percent: round_to(base.capacity + variation, 1),
            cycle_stability_cycles: (base.cycles + variation * 10.0).max(0.0) as u32,
            rate_capability_2c_percent: round_to(base.rate + variation, 1),
            ionic_conductivity_ms_cm: round_to(base.conductivity + variation * 0.1, 2),
            temperature_range_c: base.temp_range,
        },
        confidence_score: 0.5,
        model_notes: format!(
            "Basic estimation for {} chemistry. LLM service not available for detailed analysis.",
            label
        ),
        battery_chemistry: label.to_string(),
        key_factors: Vec::new(),
        formulation_analyzed: formulation.clone(),
        prediction_method: PredictionMethod::BasicEstimation,
    }
}

pub fn basic_estimation(formulation: &FormulationMap, battery_type: Option<BatteryChemistry>) -> PerformancePrediction {
    estimate_with_variation(formulation, battery_type, jitter())
}

// ============================================================================
// LLM Prediction
// ============================================================================

const PREDICTION_SYSTEM_PROMPT: &str = r#"You are an expert electrochemist specializing in battery electrolyte performance prediction.

Your task is to predict performance metrics for the given electrolyte formulation based on:
1. The specific components and their concentrations
2. Known electrochemical properties of the components
3. The battery chemistry (Li-ion, Zn, Na-ion, Mg, solid-state, etc.)
4. Operating conditions and electrode materials

Provide realistic predictions with appropriate confidence levels. Be conservative - don't overestimate performance.

IMPORTANT: Your predictions must be specific to the actual battery chemistry. Do NOT apply lithium-ion assumptions to other chemistries.

You MUST respond in valid JSON format with this exact structure:
{
    "predictions": {
        "capacity_retention_percent": <number 50-99>,
        "cycle_stability_cycles": <integer 100-2000>,
        "rate_capability_2C_percent": <number 40-95>,
        "ionic_conductivity_mS_cm": <number 0.1-20>,
        "temperature_range_C": [<min_temp>, <max_temp>]
    },
    "confidence_score": <number 0.5-0.95>,
    "model_notes": "<string with key insights about the prediction>",
    "battery_chemistry_detected": "<detected battery type>",
    "key_performance_factors": ["<factor1>", "<factor2>", "<factor3>"]
}"#;

const PREDICTION_PROMPT: &str = r#"Analyze the following electrolyte formulation and predict its performance:

## Battery Type Context
{{battery_type}}

## Original Query Context
{{query_context}}

## Electrolyte Formulation
{{formulation}}

## Operating Conditions
{{conditions}}

## Electrode Materials
{{electrodes}}

Based on electrochemical principles and the specific components listed:
1. First identify the battery chemistry (Li-ion, Zn, Na-ion, etc.)
2. Evaluate how each component affects performance
3. Consider interactions between components
4. Account for operating conditions
5. Provide realistic performance predictions

Remember:
- Different battery chemistries have different typical performance ranges
- Aqueous electrolytes (Zn, some Na) behave differently from organic (Li-ion)
- Consider the stability window of the electrolyte
- Factor in the specific salts and solvents used

Respond with the JSON predictions:"#;

fn indented(lines: Vec<String>, empty: &str) -> String {
    if lines.is_empty() {
        return format!("  {}", empty);
    }
    lines
        .iter()
        .map(|l| format!("  - {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(input: &PredictionInput<'_>, prompts: &PromptLibrary) -> String {
    let formulation = indented(
        input
            .formulation
            .iter()
            .map(|(comp, conc)| format!("{}: {} (concentration)", comp, conc))
            .collect(),
        "No specific formulation provided",
    );
    let conditions = indented(input.conditions.lines(), "Standard conditions (25°C, 1 atm)");
    let electrodes = indented(input.electrodes.lines(), "Not specified");
    let battery_type = input
        .battery_type
        .map_or("Infer from the formulation components", |c| c.as_str());
    let query_context = if input.query_context.trim().is_empty() {
        "General electrolyte design"
    } else {
        input.query_context
    };

    prompts.render(
        "prediction",
        PREDICTION_PROMPT,
        &[
            ("battery_type", battery_type),
            ("query_context", query_context),
            ("formulation", &formulation),
            ("conditions", &conditions),
            ("electrodes", &electrodes),
        ],
    )
}

#[derive(Deserialize, Debug, Default)]
struct RawMetrics {
    capacity_retention_percent: Option<Value>,
    cycle_stability_cycles: Option<Value>,
    #[serde(rename = "rate_capability_2C_percent")]
    rate_capability: Option<Value>,
    #[serde(rename = "ionic_conductivity_mS_cm")]
    ionic_conductivity: Option<Value>,
    #[serde(rename = "temperature_range_C")]
    temperature_range: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
struct RawPrediction {
    predictions: Option<RawMetrics>,
    confidence_score: Option<Value>,
    model_notes: Option<Value>,
    battery_chemistry_detected: Option<String>,
    key_performance_factors: Option<Vec<Value>>,
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_as_text).collect::<Vec<_>>().join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalize_prediction(raw: RawPrediction, input: &PredictionInput<'_>) -> PerformancePrediction {
    let detected = raw.battery_chemistry_detected.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let chemistry = input
        .battery_type
        .or_else(|| detected.and_then(BatteryChemistry::from_name))
        .or_else(|| detect_chemistry_from_formulation(input.formulation));
    let base = baseline_for(chemistry);

    let metrics = raw.predictions.unwrap_or_default();
    let num = |v: &Option<Value>| v.as_ref().and_then(value_as_f64);

    let temperature_range_c = match metrics.temperature_range.as_deref() {
        Some([lo, hi, ..]) => match (value_as_f64(lo), value_as_f64(hi)) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => base.temp_range,
        },
        _ => base.temp_range,
    };

    let predictions = PredictedMetrics {
        capacity_retention_percent: num(&metrics.capacity_retention_percent).unwrap_or(base.capacity),
        cycle_stability_cycles: num(&metrics.cycle_stability_cycles)
            .unwrap_or(base.cycles)
            .max(0.0)
            .round() as u32,
        rate_capability_2c_percent: num(&metrics.rate_capability).unwrap_or(base.rate),
        ionic_conductivity_ms_cm: num(&metrics.ionic_conductivity).unwrap_or(base.conductivity),
        temperature_range_c,
    };

    let confidence_score = raw
        .confidence_score
        .as_ref()
        .and_then(value_as_f64)
        .unwrap_or(0.7)
        .clamp(0.0, 1.0);

    PerformancePrediction {
        predictions,
        confidence_score,
        model_notes: raw.model_notes.as_ref().map(value_as_text).unwrap_or_default(),
        battery_chemistry: detected
            .map(str::to_string)
            .unwrap_or_else(|| chemistry_label(chemistry).to_string()),
        key_factors: raw
            .key_performance_factors
            .unwrap_or_default()
            .iter()
            .map(value_as_text)
            .filter(|s| !s.is_empty())
            .collect(),
        formulation_analyzed: input.formulation.clone(),
        prediction_method: PredictionMethod::LlmBased,
    }
}

pub fn predict_with_llm(
    input: &PredictionInput<'_>,
    llm: &dyn LanguageModel,
    prompts: &PromptLibrary,
) -> Result<PerformancePrediction> {
    let system = prompts.render("prediction_system", PREDICTION_SYSTEM_PROMPT, &[]);
    let request = LlmRequest::new(build_prompt(input, prompts))
        .system(system)
        .temperature(0.3)
        .max_tokens(800);

    let text = llm.generate(&request)?;
    let raw: RawPrediction = parse_json_from_text(&text)?;
    Ok(normalize_prediction(raw, input))
}

/// Model prediction when available, basic estimation otherwise
pub fn predict_performance(
    input: &PredictionInput<'_>,
    llm: Option<&dyn LanguageModel>,
    prompts: &PromptLibrary,
) -> PerformancePrediction {
    tracing::debug!(
        "[Prediction] Formulation: {:?}, battery type: {}",
        input.formulation,
        chemistry_label(input.battery_type)
    );

    if let Some(llm) = llm {
        match predict_with_llm(input, llm, prompts) {
            Ok(prediction) => return prediction,
            Err(e) => tracing::warn!("LLM prediction failed: {}", e),
        }
    }
    basic_estimation(input.formulation, input.battery_type)
}

// ============================================================================
// Comparison
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationRanking {
    pub formulation_id: usize,
    pub formulation: FormulationMap,
    pub battery_chemistry: String,
    pub capacity_retention: f64,
    pub cycle_stability: u32,
    pub rate_capability: f64,
    pub composite_score: f64,
}

/// Rank formulations by composite score using the baseline estimate
pub fn compare_formulations(
    formulations: &[FormulationMap],
    battery_type: Option<BatteryChemistry>,
) -> Vec<FormulationRanking> {
    let mut rng = rand::thread_rng();
    compare_formulations_with(formulations, battery_type, || rng.gen_range(-5.0..=5.0))
}

pub fn compare_formulations_with(
    formulations: &[FormulationMap],
    battery_type: Option<BatteryChemistry>,
    mut variation: impl FnMut() -> f64,
) -> Vec<FormulationRanking> {
    let mut ranked: Vec<FormulationRanking> = formulations
        .iter()
        .enumerate()
        .map(|(i, form)| {
            let chemistry = battery_type.or_else(|| detect_chemistry_from_formulation(form));
            let base = baseline_for(chemistry);
            let v = variation();
            let capacity = base.capacity + v;
            let cycles = base.cycles + v * 10.0;
            let rate = base.rate + v;

            FormulationRanking {
                formulation_id: i + 1,
                formulation: form.clone(),
                battery_chemistry: chemistry_label(chemistry).to_string(),
                capacity_retention: round_to(capacity, 1),
                cycle_stability: cycles.max(0.0) as u32,
                rate_capability: round_to(rate, 1),
                composite_score: round_to(composite_score(capacity, cycles, rate), 1),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    ranked
}
