//! Pipeline coordinator
//!
//! Classifies a query and routes it: greetings, help and off-topic queries get
//! a direct reply, literature and property questions run a single stage, and
//! everything else runs the full design chain. Every stage degrades to its
//! fallback, so `process` never fails.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::compatibility::{analyze_with_llm, check_compatibility, PropertyReport};
use crate::config::AppConfig;
use crate::intent::classify_query;
use crate::literature::{search_literature, summarize_with_llm, DocumentStore, LiteratureReport};
use crate::llm::{LanguageModel, LlmRequest};
use crate::planner::{plan_experiments, GenerationMethod, PlanningInput, PlanningReport};
use crate::prediction::{
    compare_formulations, predict_performance, FormulationMap, FormulationRanking, PredictionInput,
};
use crate::prompts::PromptLibrary;
use crate::requirements::extract_requirements;
use crate::types::{
    round_to, Classification, ExperimentPlan, FormulationComponent, PredictedMetrics, QueryRequest,
    QueryType, Requirements,
};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Orchestrator,
    LiteratureRag,
    PropertyCompatibility,
    PerformancePrediction,
    ExperimentPlanning,
}

impl AgentType {
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::Orchestrator => "Orchestrator",
            AgentType::LiteratureRag => "Literature Rag",
            AgentType::PropertyCompatibility => "Property Compatibility",
            AgentType::PerformancePrediction => "Performance Prediction",
            AgentType::ExperimentPlanning => "Experiment Planning",
        }
    }
}

/// `Degraded` means a configured model call failed and the stage used its fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectReply {
    pub response_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanPrediction {
    pub plan_id: String,
    pub plan_title: String,
    pub predictions: PredictedMetrics,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRollup {
    pub predictions_per_plan: Vec<PlanPrediction>,
    pub average_confidence: f64,
    pub total_plans_evaluated: usize,
    pub ranking: Vec<FormulationRanking>,
}

/// Stage payload, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageData {
    Direct(DirectReply),
    Literature(LiteratureReport),
    Property(PropertyReport),
    Planning(PlanningReport),
    Prediction(PredictionRollup),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub agent_type: AgentType,
    pub status: StageStatus,
    pub message: String,
    pub data: StageData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignResponse {
    pub query: String,
    pub agent_responses: Vec<AgentResponse>,
    pub experiment_plans: Vec<ExperimentPlan>,
    pub summary: String,
    /// Seconds, two decimals
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_parsed: Option<Requirements>,
}

fn status_of(degraded: bool) -> StageStatus {
    if degraded {
        StageStatus::Degraded
    } else {
        StageStatus::Success
    }
}

// ============================================================================
// Prompts and Static Text
// ============================================================================

const GREETING_SYSTEM_PROMPT: &str =
    "You are a friendly AI assistant specializing in lithium-ion battery electrolyte design.";

const GREETING_PROMPT: &str = "User said: '{{query}}'. Respond warmly and briefly introduce yourself as an AI assistant for electrolyte design. Mention you can help design battery electrolytes and generate experiment plans.";

const GREETING_TEXT: &str = "Hello! I'm the Electrolyte Design Assistant. I can help you design battery electrolytes, analyze component compatibility, predict performance, and generate detailed experiment plans. What would you like to work on today?";

const OFF_TOPIC_SYSTEM_PROMPT: &str = "You are an AI assistant specializing in lithium-ion battery electrolyte design. Politely redirect off-topic questions.";

const OFF_TOPIC_PROMPT: &str = "User asked: '{{query}}'. Politely explain that you specialize in battery electrolyte design and redirect them. Be helpful but brief.";

const OFF_TOPIC_TEXT: &str = "I'm specialized in lithium-ion battery electrolyte design. I can help you design electrolyte formulations, check component compatibility, predict performance, and generate experiment plans. Would you like to explore any of these capabilities?";

const HELP_TEXT: &str = r#"## Electrolyte Design System - Help

### What I Can Do:
I coordinate a chain of specialized stages for battery electrolyte design. Here's how I can help:

**Design Electrolytes**
- Describe your requirements (high voltage, fast charging, long cycle life, etc.)
- Specify electrode materials (NMC, LFP, silicon anode, etc.)
- I'll generate optimized formulations with scientific rationale

**Search Literature**
- Point me at a folder of research notes to index
- I'll search both your documents and my knowledge base
- Get summaries of relevant electrolyte research

**Check Compatibility**
- Ask about specific components (EC, DMC, LiPF6, VC, FEC, etc.)
- I'll identify compatibility issues and constraints
- Get recommendations for safe formulations

**Predict Performance**
- Get predictions for capacity retention, cycle life, rate capability
- Understand temperature operating ranges
- Compare different formulation options

### Example Queries:
- "Design a high-voltage electrolyte for NMC cathode with silicon anode"
- "What additives improve cycle life for fast-charging applications?"
- "Check compatibility of LiPF6 with FEC at high temperatures"
- "Compare EC/DMC vs EC/EMC solvent systems"

### Getting Started:
Simply describe your electrolyte design requirements, and I'll run the design stages to deliver three experiment plans!"#;

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert electrochemist specializing in lithium-ion battery electrolyte design.
Analyze the user's query and extract:
1. Target application (EV, consumer electronics, grid storage, etc.)
2. Desired properties (high voltage, fast charging, long cycle life, etc.)
3. Specific components mentioned (solvents, salts, additives)
4. Operating conditions (temperature, voltage range)
5. Electrode materials mentioned

Return your analysis as a structured JSON object."#;

const ANALYSIS_PROMPT: &str = r#"Analyze this electrolyte design query:

Query: {{query}}

Provide a detailed analysis in JSON format."#;

const RATIONALE_SYSTEM_PROMPT: &str = r#"You are an expert electrochemist. Provide a clear, scientific rationale
for the proposed electrolyte formulation. Explain:
1. Why each component was chosen
2. Expected synergistic effects
3. Potential concerns and mitigations
4. Comparison to standard formulations

Be concise but scientifically rigorous."#;

const RATIONALE_PROMPT: &str = r#"Generate a scientific rationale for this electrolyte formulation:

Formulation:
{{formulation}}

Requirements:
- Application: {{application}}
- Target voltage: {{max_voltage}}V
- Anode: {{anode}}
- Cathode: {{cathode}}

Provide a concise but comprehensive rationale."#;

/// Abbreviation → concentration; components without an abbreviation are skipped
pub fn formulation_to_map(formulation: &[FormulationComponent]) -> FormulationMap {
    formulation
        .iter()
        .filter(|c| !c.abbreviation.trim().is_empty())
        .map(|c| (c.abbreviation.clone(), c.concentration))
        .collect()
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct Coordinator {
    config: AppConfig,
    llm: Option<Arc<dyn LanguageModel>>,
    store: Option<Box<dyn DocumentStore>>,
    prompts: PromptLibrary,
}

impl Coordinator {
    pub fn new(
        config: AppConfig,
        llm: Option<Arc<dyn LanguageModel>>,
        store: Option<Box<dyn DocumentStore>>,
    ) -> Self {
        let prompts = PromptLibrary::with_dir(config.prompts.dir.clone());
        if let Some(ref llm) = llm {
            tracing::info!("[Coordinator] Model backend: {}", llm.model_name());
        } else {
            tracing::info!("[Coordinator] No model backend, using fallbacks");
        }
        Self {
            config,
            llm,
            store,
            prompts,
        }
    }

    /// Swap the document store used by literature search
    pub fn set_document_store(&mut self, store: Option<Box<dyn DocumentStore>>) {
        self.store = store;
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    fn llm(&self) -> Option<&dyn LanguageModel> {
        self.llm.as_deref()
    }

    fn store(&self) -> Option<&dyn DocumentStore> {
        self.store.as_deref()
    }

    pub fn classify(&self, query: &str) -> Classification {
        classify_query(query, self.llm(), &self.prompts)
    }

    /// Stage name → "active" / "inactive"
    pub fn agent_status(&self) -> BTreeMap<&'static str, &'static str> {
        let mut status: BTreeMap<&'static str, &'static str> =
            ["literature", "property", "prediction", "planning"]
                .into_iter()
                .map(|name| (name, "active"))
                .collect();
        status.insert("llm", if self.llm.is_some() { "active" } else { "inactive" });
        status
    }

    pub fn process(&self, request: &QueryRequest) -> DesignResponse {
        let start = Instant::now();
        let query = request.query.as_str();
        tracing::info!("[Coordinator] Processing query: {}", query);
        if let Some(ref materials) = request.user_materials {
            tracing::info!("[Coordinator] User-specified materials input: {}", materials);
        }

        let classification = self.classify(query);
        tracing::info!(
            "[Coordinator] Query classified: {} (confidence: {:.2})",
            classification.query_type.as_str(),
            classification.confidence
        );

        let mut response = if !classification.should_delegate
            && matches!(
                classification.query_type,
                QueryType::Greeting | QueryType::Help | QueryType::OffTopic
            ) {
            self.direct_response(query, classification.query_type)
        } else {
            match classification.query_type {
                QueryType::LiteratureSearch => self.literature_only(query),
                QueryType::PropertyCheck => self.property_only(query, request.user_materials.as_deref()),
                _ => self.full_design(query, request.user_materials.as_deref()),
            }
        };

        response.processing_time = round_to(start.elapsed().as_secs_f64(), 2);
        response
    }

    // ------------------------------------------------------------------------
    // Direct responses
    // ------------------------------------------------------------------------

    fn chat_reply(&self, query: &str, name: &str, system: &str, prompt: &str, fallback: &str) -> String {
        let Some(llm) = self.llm() else {
            return fallback.to_string();
        };
        let system = self.prompts.render(&format!("{}_system", name), system, &[]);
        let prompt = self.prompts.render(name, prompt, &[("query", query)]);
        let request = LlmRequest::new(prompt)
            .system(system)
            .temperature(0.7)
            .max_tokens(150);
        match llm.generate(&request) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback.to_string(),
            Err(e) => {
                tracing::warn!("LLM {} reply failed: {}", name, e);
                fallback.to_string()
            }
        }
    }

    fn direct_response(&self, query: &str, query_type: QueryType) -> DesignResponse {
        let (summary, message, response_type) = match query_type {
            QueryType::Greeting => (
                self.chat_reply(query, "greeting", GREETING_SYSTEM_PROMPT, GREETING_PROMPT, GREETING_TEXT),
                "Direct response - greeting",
                "greeting",
            ),
            QueryType::OffTopic => (
                self.chat_reply(query, "off_topic", OFF_TOPIC_SYSTEM_PROMPT, OFF_TOPIC_PROMPT, OFF_TOPIC_TEXT),
                "Direct response - redirected off-topic query",
                "off_topic_redirect",
            ),
            _ => (HELP_TEXT.to_string(), "Direct response - help information", "help"),
        };

        DesignResponse {
            query: query.to_string(),
            agent_responses: vec![AgentResponse {
                agent_type: AgentType::Orchestrator,
                status: StageStatus::Success,
                message: message.to_string(),
                data: StageData::Direct(DirectReply {
                    response_type: response_type.to_string(),
                }),
            }],
            experiment_plans: Vec::new(),
            summary,
            processing_time: 0.0,
            requirements_parsed: None,
        }
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    /// Literature search plus model summary; the flag is true when the summary failed
    fn literature_stage(&self, query: &str) -> (LiteratureReport, bool) {
        let mut report = search_literature(query, self.store(), self.config.literature.max_results);
        let mut degraded = false;
        if let Some(llm) = self.llm() {
            if !report.results.is_empty() {
                match summarize_with_llm(&report, llm, &self.prompts) {
                    Ok(summary) => report.llm_summary = Some(summary),
                    Err(e) => {
                        tracing::warn!("LLM summarization failed: {}", e);
                        degraded = true;
                    }
                }
            }
        }
        (report, degraded)
    }

    fn property_stage(&self, requirements: &Requirements) -> (PropertyReport, bool) {
        let mut report = check_compatibility(
            &requirements.components,
            &requirements.operating_conditions,
            &requirements.electrode_materials,
        );
        let mut degraded = false;
        if let Some(llm) = self.llm() {
            match analyze_with_llm(
                &requirements.components,
                &requirements.operating_conditions,
                llm,
                &self.prompts,
            ) {
                Ok(analysis) => report.llm_analysis = Some(analysis),
                Err(e) => {
                    tracing::warn!("LLM compatibility analysis failed: {}", e);
                    degraded = true;
                }
            }
        }
        (report, degraded)
    }

    fn analyze_query(&self, query: &str, requirements: &mut Requirements) {
        let Some(llm) = self.llm() else {
            return;
        };
        let system = self.prompts.render("query_analysis_system", ANALYSIS_SYSTEM_PROMPT, &[]);
        let prompt = self.prompts.render("query_analysis", ANALYSIS_PROMPT, &[("query", query)]);
        match llm.generate(&LlmRequest::new(prompt).system(system).temperature(0.3)) {
            Ok(analysis) => requirements.llm_analysis = Some(analysis),
            Err(e) => tracing::warn!("LLM query analysis failed: {}", e),
        }
    }

    fn plan_rationale(
        &self,
        llm: &dyn LanguageModel,
        plan: &ExperimentPlan,
        requirements: &Requirements,
    ) -> anyhow::Result<String> {
        let formulation = plan
            .formulation
            .iter()
            .map(|c| format!("- {} ({}): {} {}", c.name, c.abbreviation, c.concentration, c.unit))
            .collect::<Vec<_>>()
            .join("\n");
        let voltage = requirements.operating_conditions.voltage().to_string();

        let system = self.prompts.render("rationale_system", RATIONALE_SYSTEM_PROMPT, &[]);
        let prompt = self.prompts.render(
            "rationale",
            RATIONALE_PROMPT,
            &[
                ("formulation", &formulation),
                ("application", requirements.application.as_str()),
                ("max_voltage", &voltage),
                ("anode", requirements.electrode_materials.anode_or_default()),
                ("cathode", requirements.electrode_materials.cathode_or_default()),
            ],
        );

        let request = LlmRequest::new(prompt)
            .system(system)
            .temperature(0.5)
            .max_tokens(500);
        llm.generate(&request)
    }

    // ------------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------------

    fn literature_only(&self, query: &str) -> DesignResponse {
        tracing::info!("[Coordinator] Routing: literature search only");
        let (report, degraded) = self.literature_stage(query);

        let text = report.llm_summary.as_deref().unwrap_or(&report.summary);
        let summary = format!("## Literature Search Results\n\n{}", text);

        DesignResponse {
            query: query.to_string(),
            agent_responses: vec![AgentResponse {
                agent_type: AgentType::LiteratureRag,
                status: status_of(degraded),
                message: format!("Found {} relevant sources", report.sources_count),
                data: StageData::Literature(report),
            }],
            experiment_plans: Vec::new(),
            summary,
            processing_time: 0.0,
            requirements_parsed: None,
        }
    }

    fn property_only(&self, query: &str, user_materials: Option<&str>) -> DesignResponse {
        tracing::info!("[Coordinator] Routing: property check only");
        let requirements = extract_requirements(query, user_materials);
        let (report, degraded) = self.property_stage(&requirements);

        let mut parts = vec![
            "## Property & Compatibility Analysis\n".to_string(),
            format!("**Components analyzed**: {}\n", requirements.components.join(", ")),
        ];

        if !report.compatibility_issues.is_empty() {
            parts.push("### Compatibility Issues:".to_string());
            for issue in &report.compatibility_issues {
                parts.push(format!("- **{}**: {}", issue.severity.as_str().to_uppercase(), issue.issue));
                parts.push(format!("  - Solution: {}", issue.solution));
            }
        }

        if !report.recommendations.is_empty() {
            parts.push("\n### Recommendations:".to_string());
            for rec in &report.recommendations {
                parts.push(format!("- {}", rec));
            }
        }

        if let Some(ref analysis) = report.llm_analysis {
            parts.push(format!("\n### Model Analysis:\n{}", analysis));
        }

        DesignResponse {
            query: query.to_string(),
            agent_responses: vec![AgentResponse {
                agent_type: AgentType::PropertyCompatibility,
                status: status_of(degraded),
                message: format!("Analyzed {} components", requirements.components.len()),
                data: StageData::Property(report),
            }],
            experiment_plans: Vec::new(),
            summary: parts.join("\n"),
            processing_time: 0.0,
            requirements_parsed: Some(requirements),
        }
    }

    fn full_design(&self, query: &str, user_materials: Option<&str>) -> DesignResponse {
        tracing::info!("[Coordinator] Routing: full design workflow");
        let mut requirements = extract_requirements(query, user_materials);
        self.analyze_query(query, &mut requirements);

        tracing::info!("[Coordinator] Step 1: literature and document search");
        let (literature, lit_degraded) = self.literature_stage(query);

        tracing::info!("[Coordinator] Step 2: property and compatibility analysis");
        let (property, prop_degraded) = self.property_stage(&requirements);

        tracing::info!("[Coordinator] Step 3: generating experiment plans");
        let planning = plan_experiments(
            &PlanningInput {
                query,
                battery_type: requirements.battery_type,
                literature: Some(&literature),
                application: requirements.application,
                conditions: &requirements.operating_conditions,
                electrodes: &requirements.electrode_materials,
                user_specified_materials: &requirements.user_specified_materials,
                detected_components: &requirements.components,
            },
            self.llm(),
            &self.prompts,
        );
        let mut agent_responses = vec![
            AgentResponse {
                agent_type: AgentType::LiteratureRag,
                status: status_of(lit_degraded),
                message: format!("Found {} relevant sources", literature.sources_count),
                data: StageData::Literature(literature),
            },
            AgentResponse {
                agent_type: AgentType::PropertyCompatibility,
                status: status_of(prop_degraded),
                message: format!(
                    "Analyzed {} components, found {} issues",
                    requirements.components.len(),
                    property.compatibility_issues.len()
                ),
                data: StageData::Property(property),
            },
        ];

        let mut plans = planning.experiment_plans.clone();
        let planning_degraded =
            self.llm.is_some() && planning.generation_method == GenerationMethod::Template;
        agent_responses.push(AgentResponse {
            agent_type: AgentType::ExperimentPlanning,
            status: status_of(planning_degraded),
            message: format!("Generated {} experiment plans with formulations", planning.total_plans),
            data: StageData::Planning(planning),
        });

        tracing::info!("[Coordinator] Step 4: predicting performance per formulation");
        let rollup = self.predict_plans(query, &requirements, &mut plans);
        agent_responses.push(AgentResponse {
            agent_type: AgentType::PerformancePrediction,
            status: StageStatus::Success,
            message: format!(
                "Evaluated {} formulations with {} average confidence",
                rollup.total_plans_evaluated,
                percent(rollup.average_confidence)
            ),
            data: StageData::Prediction(rollup),
        });

        if let Some(llm) = self.llm() {
            for plan in &mut plans {
                match self.plan_rationale(llm, plan, &requirements) {
                    Ok(text) => plan.llm_rationale = Some(text),
                    Err(e) => tracing::warn!("LLM rationale generation failed: {}", e),
                }
            }
        }

        let summary = design_summary(query, &agent_responses, &plans, &requirements);

        DesignResponse {
            query: query.to_string(),
            agent_responses,
            experiment_plans: plans,
            summary,
            processing_time: 0.0,
            requirements_parsed: Some(requirements),
        }
    }

    fn predict_plans(
        &self,
        query: &str,
        requirements: &Requirements,
        plans: &mut [ExperimentPlan],
    ) -> PredictionRollup {
        let mut per_plan = Vec::with_capacity(plans.len());
        let mut maps = Vec::with_capacity(plans.len());

        for (i, plan) in plans.iter_mut().enumerate() {
            tracing::debug!("[Coordinator] Step 4.{}: predicting performance for {}", i + 1, plan.title);
            let formulation = formulation_to_map(&plan.formulation);
            let prediction = predict_performance(
                &PredictionInput {
                    formulation: &formulation,
                    conditions: &requirements.operating_conditions,
                    electrodes: &requirements.electrode_materials,
                    battery_type: requirements.battery_type.or(Some(plan.battery_type)),
                    query_context: query,
                },
                self.llm(),
                &self.prompts,
            );

            plan.predicted_performance = Some(prediction.predictions.clone());
            plan.prediction_confidence = Some(prediction.confidence_score);
            plan.prediction_notes = Some(prediction.model_notes.clone());

            per_plan.push(PlanPrediction {
                plan_id: plan.plan_id.clone(),
                plan_title: plan.title.clone(),
                predictions: prediction.predictions,
                confidence_score: prediction.confidence_score,
            });
            maps.push(formulation);
        }

        let average = if per_plan.is_empty() {
            0.0
        } else {
            per_plan.iter().map(|p| p.confidence_score).sum::<f64>() / per_plan.len() as f64
        };

        PredictionRollup {
            total_plans_evaluated: per_plan.len(),
            predictions_per_plan: per_plan,
            average_confidence: round_to(average, 2),
            ranking: compare_formulations(&maps, requirements.battery_type),
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

fn design_summary(
    query: &str,
    agent_responses: &[AgentResponse],
    plans: &[ExperimentPlan],
    requirements: &Requirements,
) -> String {
    let electrodes = &requirements.electrode_materials;
    let mut parts = vec![
        format!("## Analysis Summary for Query: \"{}\"\n", query),
        "### Interpreted Requirements:".to_string(),
        format!("- **Target voltage**: {}V", requirements.operating_conditions.voltage()),
        format!(
            "- **Electrode system**: {} / {}",
            electrodes.cathode_or_default(),
            electrodes.anode_or_default()
        ),
        format!("- **Application**: {}", requirements.application.label()),
        format!("- **Key components identified**: {}", requirements.components.join(", ")),
        "\n### Agent Analysis:".to_string(),
    ];

    for response in agent_responses {
        parts.push(format!("- **{}**: {}", response.agent_type.display_name(), response.message));
    }

    parts.push("\n### Recommended Experiments with Predicted Performance:".to_string());
    for (i, plan) in plans.iter().take(3).enumerate() {
        parts.push(format!(
            "\n{}. **{}** (Priority: {:.2}, Prediction Confidence: {})\n   - Cost: {}, Time: {}",
            i + 1,
            plan.title,
            plan.priority_score,
            percent(plan.prediction_confidence.unwrap_or(0.0)),
            plan.estimated_cost,
            plan.estimated_time
        ));

        if let Some(ref m) = plan.predicted_performance {
            parts.push("   - **Predicted Performance:**".to_string());
            parts.push(format!("     - Capacity Retention: {}%", m.capacity_retention_percent));
            parts.push(format!("     - Cycle Life: {} cycles", m.cycle_stability_cycles));
            parts.push(format!("     - Rate Capability (2C): {}%", m.rate_capability_2c_percent));
            parts.push(format!("     - Ionic Conductivity: {} mS/cm", m.ionic_conductivity_ms_cm));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literature::InMemoryDocumentStore;
    use crate::llm::test_support::ScriptedModel;
    use crate::types::BatteryChemistry;

    fn offline() -> Coordinator {
        Coordinator::new(AppConfig::default(), None, None)
    }

    fn with_model(model: ScriptedModel) -> (Coordinator, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let llm: Arc<dyn LanguageModel> = model.clone();
        (Coordinator::new(AppConfig::default(), Some(llm), None), model)
    }

    #[test]
    fn test_greeting_offline() {
        let response = offline().process(&QueryRequest::new("Hello there"));
        assert_eq!(response.summary, GREETING_TEXT);
        assert_eq!(response.agent_responses.len(), 1);
        assert_eq!(response.agent_responses[0].agent_type, AgentType::Orchestrator);
        assert_eq!(response.agent_responses[0].message, "Direct response - greeting");
        assert!(response.experiment_plans.is_empty());
        assert!(response.requirements_parsed.is_none());
    }

    #[test]
    fn test_greeting_uses_model_reply() {
        let (coordinator, model) = with_model(ScriptedModel::new(&[("Respond warmly", "Hi! I design electrolytes.")]));
        let response = coordinator.process(&QueryRequest::new("hi"));
        assert_eq!(response.summary, "Hi! I design electrolytes.");
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn test_help_is_static() {
        let (coordinator, model) = with_model(ScriptedModel::failing());
        let response = coordinator.process(&QueryRequest::new("what can you do?"));
        assert!(response.summary.starts_with("## Electrolyte Design System - Help"));
        assert_eq!(response.agent_responses[0].message, "Direct response - help information");
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_off_topic_redirect_falls_back() {
        let (coordinator, _model) = with_model(ScriptedModel::new(&[(
            "Classify this query",
            r#"{"query_type": "off_topic", "confidence": 0.9, "should_delegate": false}"#,
        )]));
        let response = coordinator.process(&QueryRequest::new("Who won the football game?"));
        assert_eq!(response.summary, OFF_TOPIC_TEXT);
        assert_eq!(response.agent_responses[0].message, "Direct response - redirected off-topic query");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["agent_responses"][0]["data"]["response_type"], "off_topic_redirect");
    }

    #[test]
    fn test_literature_only_route() {
        let (coordinator, _model) = with_model(ScriptedModel::new(&[
            ("Classify this query", r#"{"query_type": "literature_search", "confidence": 0.85, "should_delegate": true}"#),
            ("Summarize these documents", "FEC forms a LiF-rich SEI."),
        ]));
        let response = coordinator.process(&QueryRequest::new("What does research say about FEC?"));
        assert_eq!(response.summary, "## Literature Search Results\n\nFEC forms a LiF-rich SEI.");
        assert_eq!(response.agent_responses[0].agent_type, AgentType::LiteratureRag);
        assert_eq!(response.agent_responses[0].status, StageStatus::Success);
        assert_eq!(response.agent_responses[0].message, "Found 1 relevant sources");
    }

    #[test]
    fn test_literature_summary_failure_is_degraded() {
        let (coordinator, _model) = with_model(ScriptedModel::new(&[(
            "Classify this query",
            r#"{"query_type": "literature_search", "confidence": 0.85, "should_delegate": true}"#,
        )]));
        let response = coordinator.process(&QueryRequest::new("papers on VC additive"));
        assert_eq!(response.agent_responses[0].status, StageStatus::Degraded);
        assert!(response.summary.starts_with("## Literature Search Results\n\nFound 1 relevant sources"));
    }

    #[test]
    fn test_property_only_route() {
        let (coordinator, _model) = with_model(ScriptedModel::new(&[(
            "Classify this query",
            r#"{"query_type": "property_check", "confidence": 0.9, "should_delegate": true}"#,
        )]));
        let response = coordinator.process(&QueryRequest::new("Is PC compatible with a graphite anode?"));
        assert!(response.summary.starts_with("## Property & Compatibility Analysis\n"));
        assert!(response.summary.contains("**Components analyzed**: PC"));
        assert!(response
            .summary
            .contains("- **CRITICAL**: PC causes graphite exfoliation due to co-intercalation"));
        assert!(response.summary.contains("  - Solution: Use EC-based electrolyte or add FEC (10%)"));
        assert!(!response.summary.contains("### Model Analysis:"));
        assert_eq!(response.agent_responses[0].message, "Analyzed 1 components");
        assert_eq!(response.agent_responses[0].status, StageStatus::Degraded);
        assert!(response.requirements_parsed.is_some());
    }

    #[test]
    fn test_full_design_offline() {
        let response = offline().process(&QueryRequest::new("Design a high-voltage electrolyte for NMC811 with EC and LiPF6"));

        let types: Vec<_> = response.agent_responses.iter().map(|r| r.agent_type).collect();
        assert_eq!(
            types,
            vec![
                AgentType::LiteratureRag,
                AgentType::PropertyCompatibility,
                AgentType::ExperimentPlanning,
                AgentType::PerformancePrediction,
            ]
        );
        assert!(response.agent_responses.iter().all(|r| r.status == StageStatus::Success));

        assert_eq!(response.experiment_plans.len(), 3);
        for plan in &response.experiment_plans {
            assert!(plan.predicted_performance.is_some());
            assert_eq!(plan.prediction_confidence, Some(0.5));
            assert!(plan.llm_rationale.is_none());
        }
        assert_eq!(
            response.agent_responses[3].message,
            "Evaluated 3 formulations with 50% average confidence"
        );
        assert_eq!(response.agent_responses[2].message, "Generated 3 experiment plans with formulations");

        let summary = &response.summary;
        assert!(summary.starts_with("## Analysis Summary for Query: \"Design a high-voltage"));
        assert!(summary.contains("- **Target voltage**: 4.5V"));
        assert!(summary.contains("- **Electrode system**: NMC / graphite"));
        assert!(summary.contains("- **Literature Rag**: Found"));
        assert!(summary.contains("1. **Optimized Li-ion Electrolyte** (Priority: 0.90, Prediction Confidence: 50%)"));
        assert!(summary.contains("     - Cycle Life:"));

        let requirements = response.requirements_parsed.unwrap();
        assert!(requirements.components.contains(&"EC".to_string()));
        assert!(requirements.llm_analysis.is_none());
    }

    #[test]
    fn test_full_design_with_failing_model_degrades() {
        let (coordinator, model) = with_model(ScriptedModel::failing());
        let response = coordinator.process(&QueryRequest::new("electrolyte for sodium-ion cells with NaPF6"));

        assert_eq!(response.experiment_plans.len(), 3);
        assert!(response.experiment_plans.iter().all(|p| p.battery_type == BatteryChemistry::SodiumIon));
        assert!(response.experiment_plans.iter().all(|p| p.llm_rationale.is_none()));
        match &response.agent_responses[2].data {
            StageData::Planning(report) => assert_eq!(report.generation_method, GenerationMethod::Template),
            other => panic!("unexpected stage data: {:?}", other),
        }
        assert_eq!(response.agent_responses[2].status, StageStatus::Degraded);
        assert!(model.call_count() > 0);
    }

    #[test]
    fn test_rationale_attached_when_model_answers() {
        let (coordinator, _model) = with_model(ScriptedModel::new(&[("scientific rationale for this", "Because SEI.")]));
        let response = coordinator.process(&QueryRequest::new("Design an electrolyte for fast charging"));
        assert!(response
            .experiment_plans
            .iter()
            .all(|p| p.llm_rationale.as_deref() == Some("Because SEI.")));
    }

    #[test]
    fn test_user_materials_reach_planner() {
        let (coordinator, model) = with_model(ScriptedModel::failing());
        let mut request = QueryRequest::new("Design a zinc battery electrolyte");
        request.user_materials = Some("ZnCl2, DMSO".to_string());
        let response = coordinator.process(&request);

        let requirements = response.requirements_parsed.unwrap();
        assert!(requirements.user_specified_materials.contains(&"ZnCl2".to_string()));
        assert!(requirements.user_specified_materials.contains(&"DMSO".to_string()));
        assert_eq!(requirements.user_materials_raw_input.as_deref(), Some("ZnCl2, DMSO"));
        let calls = model.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c.contains("USER-SPECIFIED MATERIALS") && c.contains("ZnCl2")));
    }

    #[test]
    fn test_documents_feed_literature_stage() {
        let mut store = InMemoryDocumentStore::default();
        store.add_text("notes.txt", "Dual-salt LiFSI LiPF6 electrolytes improve cycling of NMC cells.");
        let mut coordinator = offline();
        coordinator.set_document_store(Some(Box::new(store)));

        let response = coordinator.process(&QueryRequest::new("dual-salt LiFSI electrolyte design"));
        match &response.agent_responses[0].data {
            StageData::Literature(report) => {
                assert!(report.results.iter().any(|r| r.title == "notes.txt"));
            }
            other => panic!("unexpected stage data: {:?}", other),
        }
    }

    #[test]
    fn test_formulation_to_map_skips_blank_abbreviations() {
        use crate::types::ComponentRole;
        let map = formulation_to_map(&[
            FormulationComponent::new("Ethylene Carbonate", "EC", 30.0, "vol%", ComponentRole::Solvent),
            FormulationComponent::new("Mystery", " ", 1.0, "M", ComponentRole::Other),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["EC"], 30.0);
    }

    #[test]
    fn test_agent_status() {
        let status = offline().agent_status();
        assert_eq!(status["literature"], "active");
        assert_eq!(status["planning"], "active");
        assert_eq!(status["llm"], "inactive");

        let (coordinator, _model) = with_model(ScriptedModel::failing());
        assert_eq!(coordinator.agent_status()["llm"], "active");
    }

    #[test]
    fn test_response_serializes() {
        let response = offline().process(&QueryRequest::new("Design an EV electrolyte"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["agent_responses"][0]["agent_type"], "literature_rag");
        assert_eq!(json["agent_responses"][0]["status"], "success");
        assert!(json["processing_time"].as_f64().is_some());
        assert!(json["experiment_plans"][0]["predicted_performance"]["rate_capability_2C_percent"].is_number());
    }
}
