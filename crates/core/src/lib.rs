//! Electrolyte Planner Core Library
//!
//! This crate provides the query pipeline for battery electrolyte design:
//! - Query classification (keyword heuristics and LLM-based)
//! - Requirement extraction (chemistry, components, conditions, electrodes)
//! - Literature lookup (knowledge base and document store)
//! - Property and compatibility checks
//! - Performance prediction
//! - Experiment planning
//! - The coordinator that chains them together

pub mod types;

pub mod compatibility;
pub mod config;
pub mod coordinator;
pub mod intent;
pub mod literature;
pub mod llm;
pub mod planner;
pub mod prediction;
pub mod prompts;
pub mod requirements;

// Re-export commonly used types at crate root
pub use types::{
    Application, BatteryChemistry, Classification, ComponentRole, ElectrodeMaterials,
    ExperimentPlan, FormulationComponent, OperatingConditions, PredictedMetrics, Protocol,
    QueryRequest, QueryType, Requirements,
};

pub use config::AppConfig;
pub use coordinator::{AgentResponse, AgentType, Coordinator, DesignResponse, StageData, StageStatus};
pub use intent::{classify_query, classify_query_stub};
pub use literature::{DocumentStore, InMemoryDocumentStore};
pub use llm::{LanguageModel, LlmRequest, OpenAiClient};
pub use prompts::PromptLibrary;
pub use requirements::extract_requirements;
