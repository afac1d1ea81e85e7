//! Literature lookup
//!
//! Combines an optional similarity-search document store with a small built-in
//! knowledge base of common solvents, salts, additives and research trends.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::llm::{LanguageModel, LlmRequest};
use crate::prompts::PromptLibrary;
use crate::types::{contains_term, round_to, truncate_chars};

// ============================================================================
// Knowledge Base
// ============================================================================

/// One entry of the built-in knowledge table
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeEntry {
    pub abbreviation: &'static str,
    pub name: &'static str,
    pub properties: &'static str,
    pub use_case: &'static str,
}

const fn entry(
    abbreviation: &'static str,
    name: &'static str,
    properties: &'static str,
    use_case: &'static str,
) -> KnowledgeEntry {
    KnowledgeEntry { abbreviation, name, properties, use_case }
}

pub const SOLVENTS: &[KnowledgeEntry] = &[
    entry("EC", "Ethylene Carbonate", "High dielectric constant (~90), high melting point (36°C)", "Primary solvent for lithium-ion batteries, excellent SEI former"),
    entry("DMC", "Dimethyl Carbonate", "Low viscosity, low dielectric constant", "Co-solvent to reduce viscosity, improves ion mobility"),
    entry("EMC", "Ethyl Methyl Carbonate", "Low viscosity, good low-temperature performance", "Co-solvent for improved rate capability"),
    entry("DEC", "Diethyl Carbonate", "Very low viscosity, wide liquid range", "Co-solvent for high-rate applications"),
    entry("PC", "Propylene Carbonate", "High dielectric constant, low melting point (-49°C)", "Single solvent for some applications, graphite incompatible"),
];

pub const SALTS: &[KnowledgeEntry] = &[
    entry("LiPF6", "Lithium Hexafluorophosphate", "High ionic conductivity, thermally unstable above 60°C", "Most common commercial lithium salt"),
    entry("LiTFSI", "Lithium bis(trifluoromethanesulfonyl)imide", "Thermally stable, corrosive to aluminum at high voltage", "Solid-state and high-temperature applications"),
    entry("LiFSI", "Lithium bis(fluorosulfonyl)imide", "High ionic conductivity, better thermal stability than LiPF6", "High-performance liquid electrolytes"),
    entry("LiBF4", "Lithium Tetrafluoroborate", "Lower conductivity, better thermal stability", "High-temperature applications"),
];

pub const ADDITIVES: &[KnowledgeEntry] = &[
    entry("VC", "Vinylene Carbonate", "Polymerizes on anode surface", "SEI stabilizer, improves cycle life (1-2 wt%)"),
    entry("FEC", "Fluoroethylene Carbonate", "Forms fluorinated SEI components", "Silicon anode stabilizer, high-voltage stabilizer (5-10 wt%)"),
    entry("PS", "Propane Sultone", "Forms sulfur-containing SEI", "Anode passivation, reduces gas generation (1-3 wt%)"),
    entry("LiBOB", "Lithium bis(oxalato)borate", "Forms protective cathode film", "High-voltage cathode stabilizer (0.5-1 wt%)"),
    entry("DTD", "1,3,2-Dioxathiolane 2,2-dioxide", "Sulfur-containing additive", "SEI former, capacity retention improvement (1-2 wt%)"),
];

pub const RECENT_TRENDS: &[&str] = &[
    "High-concentration electrolytes (>3M) for extended voltage windows",
    "Localized high-concentration electrolytes with diluents",
    "Fluorinated solvents for high-voltage stability",
    "Ionic liquid electrolytes for safety",
    "Solid-state electrolytes: sulfides, oxides, polymers",
    "Dual-salt electrolytes for synergistic effects",
    "Weakly-coordinating anions for improved kinetics",
];

const TREND_KEYWORDS: &[&str] = &[
    "high-voltage",
    "safety",
    "solid-state",
    "silicon",
    "fast-charging",
    "concentration",
];

const KNOWLEDGE_RELEVANCE: f64 = 0.9;
const TREND_RELEVANCE: f64 = 0.75;
const DEFAULT_DOCUMENT_RELEVANCE: f64 = 0.85;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    KnowledgeBase,
    UploadedDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureResult {
    pub title: String,
    pub content: String,
    pub relevance_score: f64,
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureReport {
    pub query: String,
    pub results: Vec<LiteratureResult>,
    pub summary: String,
    pub sources_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_summary: Option<String>,
}

// ============================================================================
// Document Store
// ============================================================================

/// A chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoredChunk {
    pub content: String,
    pub source: String,
    pub page: Option<u32>,
    pub chunk_id: Option<String>,
    /// Vector distance, lower is closer
    pub distance: Option<f64>,
    /// Already-normalized relevance in 0..=1
    pub relevance: Option<f64>,
}

impl ScoredChunk {
    /// Distance wins over relevance; a chunk with neither scores 0.85
    pub fn similarity(&self) -> f64 {
        match (self.distance, self.relevance) {
            (Some(d), _) => round_to((1.0 - d / 2.0).clamp(0.0, 1.0), 2),
            (None, Some(r)) => round_to(r, 2),
            (None, None) => DEFAULT_DOCUMENT_RELEVANCE,
        }
    }
}

/// External similarity search over uploaded documents
pub trait DocumentStore: Send + Sync {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    fn document_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct StoredChunk {
    content: String,
    lower_words: Vec<String>,
    source: String,
    chunk_id: String,
}

/// Keyword-overlap store for plain text documents
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    chunks: Vec<StoredChunk>,
    chunk_words: usize,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new(200)
    }
}

impl InMemoryDocumentStore {
    pub fn new(chunk_words: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_words: chunk_words.max(1),
        }
    }

    /// Split `text` into fixed-size word chunks; returns the number added
    pub fn add_text(&mut self, source: &str, text: &str) -> usize {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut added = 0;
        for (i, window) in words.chunks(self.chunk_words).enumerate() {
            let content = window.join(" ");
            self.chunks.push(StoredChunk {
                lower_words: window.iter().map(|w| w.to_lowercase()).collect(),
                content,
                source: source.to_string(),
                chunk_id: format!("{}#{}", source, i),
            });
            added += 1;
        }
        added
    }

    /// Load every `.txt` and `.md` file directly inside `dir`
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read documents dir: {}", dir.display()))?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("txt") | Some("md")
                    )
            })
            .collect();
        paths.sort();

        let mut total = 0;
        for path in paths {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read: {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
            let added = self.add_text(&name, &content);
            tracing::debug!("Indexed {} chunks from {}", added, name);
            total += added;
        }
        Ok(total)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let mut query_words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        query_words.sort();
        query_words.dedup();
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f64, &StoredChunk)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let overlap = query_words
                    .iter()
                    .filter(|w| chunk.lower_words.contains(w))
                    .count();
                (overlap > 0).then(|| (overlap as f64 / query_words.len() as f64, chunk))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| ScoredChunk {
                content: chunk.content.clone(),
                source: chunk.source.clone(),
                page: None,
                chunk_id: Some(chunk.chunk_id.clone()),
                distance: None,
                relevance: Some(score),
            })
            .collect())
    }

    fn document_count(&self) -> usize {
        self.chunks.len()
    }
}

// ============================================================================
// Search
// ============================================================================

fn entry_result(kind: &str, e: &KnowledgeEntry) -> LiteratureResult {
    LiteratureResult {
        title: format!("{}: {} ({})", kind, e.name, e.abbreviation),
        content: format!("Properties: {}. Use case: {}", e.properties, e.use_case),
        relevance_score: KNOWLEDGE_RELEVANCE,
        source: ResultSource::KnowledgeBase,
        page: None,
        chunk_id: None,
    }
}

/// Look the query up in the built-in knowledge table
pub fn search_knowledge_base(query: &str) -> Vec<LiteratureResult> {
    let q = query.to_lowercase();
    let mut results = Vec::new();

    for (kind, table) in [("Solvent", SOLVENTS), ("Salt", SALTS), ("Additive", ADDITIVES)] {
        for e in table {
            if contains_term(&q, &e.abbreviation.to_lowercase()) || q.contains(&e.name.to_lowercase()) {
                results.push(entry_result(kind, e));
            }
        }
    }

    for keyword in TREND_KEYWORDS {
        if !q.contains(keyword) {
            continue;
        }
        for trend in RECENT_TRENDS {
            if trend.to_lowercase().contains(keyword) {
                results.push(LiteratureResult {
                    title: "Recent Research Trend".to_string(),
                    content: trend.to_string(),
                    relevance_score: TREND_RELEVANCE,
                    source: ResultSource::KnowledgeBase,
                    page: None,
                    chunk_id: None,
                });
            }
        }
    }

    results
}

fn search_documents(store: &dyn DocumentStore, query: &str, k: usize) -> Vec<LiteratureResult> {
    match store.similarity_search(query, k) {
        Ok(chunks) => chunks
            .into_iter()
            .map(|chunk| LiteratureResult {
                relevance_score: chunk.similarity(),
                title: if chunk.source.is_empty() {
                    "Uploaded Document".to_string()
                } else {
                    chunk.source.clone()
                },
                content: chunk.content,
                source: ResultSource::UploadedDocument,
                page: chunk.page,
                chunk_id: chunk.chunk_id,
            })
            .collect(),
        Err(e) => {
            tracing::error!("Vector store search failed: {}", e);
            Vec::new()
        }
    }
}

fn summarize_results(query: &str, results: &[LiteratureResult]) -> String {
    if results.is_empty() {
        return format!(
            "No specific literature found for query: '{}'. Consider refining your search or uploading relevant documents.",
            query
        );
    }

    let mut parts = vec![format!("Found {} relevant sources for '{}':\n", results.len(), query)];
    for (i, r) in results.iter().take(5).enumerate() {
        parts.push(format!("{}. {}: {}...", i + 1, r.title, truncate_chars(&r.content, 200)));
    }
    parts.join("\n")
}

/// Document store hits first, then knowledge-base matches
pub fn search_literature(query: &str, store: Option<&dyn DocumentStore>, k: usize) -> LiteratureReport {
    tracing::info!("[Literature] Processing query: {}", query);

    let mut results = Vec::new();
    if let Some(store) = store {
        results.extend(search_documents(store, query, k));
    }
    results.extend(search_knowledge_base(query));

    let summary = summarize_results(query, &results);

    LiteratureReport {
        query: query.to_string(),
        sources_count: results.len(),
        results,
        summary,
        llm_summary: None,
    }
}

// ============================================================================
// LLM Summary
// ============================================================================

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an expert at summarizing scientific literature on battery electrolytes.
Synthesize the key findings from the provided documents, focusing on:
1. Relevant formulations mentioned
2. Performance data and benchmarks
3. Key insights for electrolyte design
4. Any contradicting findings or debates in the field

Be concise and cite specific findings where relevant."#;

const SUMMARY_PROMPT: &str = r#"Summarize these documents in relation to the query: "{{query}}"

Documents:
{{documents}}

Provide a synthesized summary of the key findings."#;

/// Ask the model to synthesize the first five results
pub fn summarize_with_llm(
    report: &LiteratureReport,
    llm: &dyn LanguageModel,
    prompts: &PromptLibrary,
) -> Result<String> {
    let documents = report
        .results
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, r)| {
            let source = match r.source {
                ResultSource::KnowledgeBase => "knowledge_base",
                ResultSource::UploadedDocument => r.title.as_str(),
            };
            format!("Document {} (Source: {}):\n{}", i + 1, source, truncate_chars(&r.content, 1000))
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = prompts.render("literature_summary_system", SUMMARY_SYSTEM_PROMPT, &[]);
    let prompt = prompts.render(
        "literature_summary",
        SUMMARY_PROMPT,
        &[("query", &report.query), ("documents", &documents)],
    );

    let request = LlmRequest::new(prompt)
        .system(system)
        .temperature(0.3)
        .max_tokens(800);
    llm.generate(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedModel;
    use anyhow::anyhow;

    struct FailingStore;

    impl DocumentStore for FailingStore {
        fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>> {
            Err(anyhow!("collection missing"))
        }

        fn document_count(&self) -> usize {
            0
        }
    }

    struct DistanceStore;

    impl DocumentStore for DistanceStore {
        fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>> {
            Ok(vec![ScoredChunk {
                content: "LiFSI in DME enables dendrite-free plating".to_string(),
                source: "paper.pdf".to_string(),
                page: Some(3),
                chunk_id: Some("c1".to_string()),
                distance: Some(0.5),
                relevance: None,
            }])
        }

        fn document_count(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_knowledge_base_abbreviations() {
        let results = search_knowledge_base("Compare EC and DMC with LiPF6");
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Solvent: Ethylene Carbonate (EC)",
                "Solvent: Dimethyl Carbonate (DMC)",
                "Salt: Lithium Hexafluorophosphate (LiPF6)",
            ]
        );
        assert!(results.iter().all(|r| r.relevance_score == 0.9));
    }

    #[test]
    fn test_knowledge_base_full_names_and_boundaries() {
        let results = search_knowledge_base("what does vinylene carbonate do in an electrolyte?");
        assert_eq!(results.len(), 1);
        assert!(results[0].title.contains("(VC)"));
        assert!(results[0].content.starts_with("Properties: Polymerizes on anode surface."));
    }

    #[test]
    fn test_trend_keywords() {
        let results = search_knowledge_base("high-concentration electrolytes");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.title == "Recent Research Trend" && r.relevance_score == 0.75));
    }

    #[test]
    fn test_no_results_summary() {
        let report = search_literature("quantum widgets", None, 5);
        assert_eq!(report.sources_count, 0);
        assert_eq!(
            report.summary,
            "No specific literature found for query: 'quantum widgets'. Consider refining your search or uploading relevant documents."
        );
    }

    #[test]
    fn test_summary_lists_first_five() {
        let report = search_literature("EC DMC EMC DEC PC LiPF6 VC", None, 5);
        assert_eq!(report.sources_count, 7);
        let lines: Vec<_> = report.summary.lines().collect();
        assert!(lines[0].starts_with("Found 7 relevant sources"));
        assert!(report.summary.contains("5. Solvent: Propylene Carbonate (PC)"));
        assert!(!report.summary.contains("6."));
    }

    #[test]
    fn test_similarity_conversion() {
        let mut chunk = ScoredChunk { distance: Some(0.5), ..Default::default() };
        assert_eq!(chunk.similarity(), 0.75);
        chunk.distance = Some(3.0);
        assert_eq!(chunk.similarity(), 0.0);
        chunk.distance = None;
        chunk.relevance = Some(0.456);
        assert_eq!(chunk.similarity(), 0.46);
        chunk.relevance = None;
        assert_eq!(chunk.similarity(), 0.85);
    }

    #[test]
    fn test_document_results_come_first() {
        let report = search_literature("LiFSI", Some(&DistanceStore), 5);
        assert_eq!(report.results[0].source, ResultSource::UploadedDocument);
        assert_eq!(report.results[0].title, "paper.pdf");
        assert_eq!(report.results[0].relevance_score, 0.75);
        assert_eq!(report.results[0].page, Some(3));
        assert_eq!(report.results[1].source, ResultSource::KnowledgeBase);
    }

    #[test]
    fn test_store_failure_contributes_nothing() {
        let report = search_literature("LiFSI", Some(&FailingStore), 5);
        assert_eq!(report.sources_count, 1);
    }

    #[test]
    fn test_in_memory_store_chunking_and_search() {
        let mut store = InMemoryDocumentStore::new(4);
        let added = store.add_text("notes.txt", "fec improves silicon anodes a lot and vc helps graphite");
        assert_eq!(added, 3);
        assert_eq!(store.document_count(), 3);

        let hits = store.similarity_search("FEC silicon", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relevance, Some(1.0));
        assert_eq!(hits[0].chunk_id.as_deref(), Some("notes.txt#0"));

        assert!(store.similarity_search("   ", 5).unwrap().is_empty());
        store.clear();
        assert_eq!(store.document_count(), 0);
    }

    #[test]
    fn test_load_dir_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "zinc sulfate electrolyte").unwrap();
        fs::write(dir.path().join("b.md"), "# notes\nsodium salts").unwrap();
        fs::write(dir.path().join("c.pdf"), "binary").unwrap();

        let mut store = InMemoryDocumentStore::default();
        assert_eq!(store.load_dir(dir.path()).unwrap(), 2);

        let hits = store.similarity_search("zinc", 5).unwrap();
        assert_eq!(hits[0].source, "a.txt");
    }

    #[test]
    fn test_load_missing_dir_is_error() {
        let mut store = InMemoryDocumentStore::default();
        assert!(store.load_dir(Path::new("/nonexistent/docs")).is_err());
    }

    #[test]
    fn test_llm_summary_prompt() {
        let model = ScriptedModel::new(&[("Summarize these documents", "LiPF6 dominates.")]);
        let report = search_literature("LiPF6", None, 5);
        let summary = summarize_with_llm(&report, &model, &PromptLibrary::builtin()).unwrap();
        assert_eq!(summary, "LiPF6 dominates.");
        let calls = model.calls.lock().unwrap();
        assert!(calls[0].contains("Document 1 (Source: knowledge_base)"));
    }
}
