//! Question-set evaluation: vector-only baseline against the reranked ranking

use crate::error::{Result, RerankError};
use crate::retrieval::{HybridQueryEngine, RankedResult};
use serde::Deserialize;
use std::path::Path;

/// Characters of the top result shown per table cell
const CELL_CHARS: usize = 50;

#[derive(Deserialize)]
#[serde(untagged)]
enum Question {
    Text(String),
    Object { q: String },
}

/// Top results for one question under both rankings
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRow {
    pub question: String,
    pub baseline: Option<String>,
    pub rerank: Option<String>,
}

/// Read a JSON list of questions given as strings or `{"q": ...}` objects
pub fn load_questions(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| RerankError::Io {
        source: e,
        context: format!("Failed to read questions: {}", path.display()),
    })?;
    let questions: Vec<Question> =
        serde_json::from_str(&content).map_err(|e| RerankError::Json {
            source: e,
            context: format!("Failed to parse questions: {}", path.display()),
        })?;

    Ok(questions
        .into_iter()
        .map(|q| match q {
            Question::Text(text) | Question::Object { q: text } => text,
        })
        .collect())
}

/// Run every question through both engines
///
/// A failed query is logged and recorded as no result; the rest still run.
pub fn evaluate(
    baseline: &HybridQueryEngine,
    rerank: &HybridQueryEngine,
    questions: &[String],
    top_k: usize,
) -> Vec<EvalRow> {
    questions
        .iter()
        .map(|question| EvalRow {
            question: question.clone(),
            baseline: top_text(baseline, question, top_k),
            rerank: top_text(rerank, question, top_k),
        })
        .collect()
}

fn top_text(engine: &HybridQueryEngine, question: &str, top_k: usize) -> Option<String> {
    match engine.query(question, top_k) {
        Ok(results) => results.into_iter().next().map(|r: RankedResult| r.text),
        Err(e) => {
            tracing::warn!("Query failed for '{}': {}", question, e);
            None
        }
    }
}

/// Markdown comparison table
pub fn render_table(rows: &[EvalRow]) -> String {
    let mut out = String::from("| Q | Baseline | Rerank | Notes |\n|---|---|---|---|\n");

    for (i, row) in rows.iter().enumerate() {
        let note = if row.baseline != row.rerank {
            "top result changed"
        } else {
            ""
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            cell(row.baseline.as_deref()),
            cell(row.rerank.as_deref()),
            note
        ));
    }

    out
}

fn cell(text: Option<&str>) -> String {
    let Some(text) = text else {
        return "None".to_string();
    };
    let mut shown: String = text.chars().take(CELL_CHARS).collect();
    if text.chars().count() > CELL_CHARS {
        shown.push_str("...");
    }
    shown.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalConfig, VectorConfig};
    use crate::corpus::SourceCatalog;
    use crate::index::{Bm25Params, IndexBuilder};
    use crate::test_utils::{corpus_from_texts, VocabularyEmbedder};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_load_mixed_questions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("questions.json");
        std::fs::write(&path, r#"["plain question", {"q": "object question"}]"#).unwrap();

        let questions = load_questions(&path).unwrap();
        assert_eq!(questions, vec!["plain question", "object question"]);
    }

    #[test]
    fn test_load_rejects_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("questions.json");
        std::fs::write(&path, r#"[{"question": "wrong key"}]"#).unwrap();

        assert!(matches!(
            load_questions(&path),
            Err(RerankError::Json { .. })
        ));
    }

    #[test]
    fn test_render_table() {
        let long = "x".repeat(60);
        let rows = vec![
            EvalRow {
                question: "one".to_string(),
                baseline: Some("same | text".to_string()),
                rerank: Some("same | text".to_string()),
            },
            EvalRow {
                question: "two".to_string(),
                baseline: None,
                rerank: Some(long),
            },
        ];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| Q | Baseline | Rerank | Notes |");
        assert_eq!(lines[2], "| 1 | same \\| text | same \\| text |  |");
        assert_eq!(
            lines[3],
            format!("| 2 | None | {}... | top result changed |", "x".repeat(50))
        );
    }

    #[test]
    fn test_evaluate_both_rankings() {
        let texts = [
            "fire safety procedure A",
            "electrical hazard checklist",
            "fire extinguisher maintenance",
        ];
        let embedder = Arc::new(VocabularyEmbedder::from_texts(&texts));
        let snapshot = IndexBuilder::new(8, Bm25Params::default())
            .build(corpus_from_texts(&texts), SourceCatalog::default(), embedder.as_ref())
            .unwrap();

        let vector_only = RetrievalConfig {
            alpha: 1.0,
            ..RetrievalConfig::default()
        };
        let baseline = HybridQueryEngine::new(
            snapshot.clone(),
            embedder.clone(),
            &vector_only,
            &VectorConfig::default(),
        )
        .unwrap();
        let rerank = HybridQueryEngine::new(
            snapshot,
            embedder,
            &RetrievalConfig::default(),
            &VectorConfig::default(),
        )
        .unwrap();

        let rows = evaluate(&baseline, &rerank, &["fire safety".to_string()], 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rerank.as_deref(), Some("fire safety procedure A"));
        assert!(rows[0].baseline.is_some());
    }
}
