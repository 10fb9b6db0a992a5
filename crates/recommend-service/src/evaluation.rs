//! Retrieval quality metrics over labelled queries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::recommender::Recommender;

/// A query with the names of the assessments judged relevant for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,
    #[serde(default)]
    pub relevant: Vec<String>,
}

/// Scores for one query. `error` is set when the pipeline failed; such
/// queries are excluded from the means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryScore {
    pub query: String,
    pub recommended: Vec<String>,
    pub recall: f64,
    pub average_precision: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub k: usize,
    pub queries: Vec<QueryScore>,
    pub mean_recall: f64,
    pub map: f64,
}

impl EvalReport {
    pub fn scored(&self) -> impl Iterator<Item = &QueryScore> {
        self.queries.iter().filter(|q| q.error.is_none())
    }

    pub fn failed(&self) -> usize {
        self.queries.iter().filter(|q| q.error.is_some()).count()
    }
}

/// Fraction of relevant items present in the top `k`. Zero when nothing is relevant.
pub fn recall_at_k(recommended: &[String], relevant: &[String], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = recommended
        .iter()
        .take(k)
        .filter(|r| relevant.contains(r))
        .count();
    hits as f64 / relevant.len() as f64
}

/// Average precision over the top `k`, normalized by `min(|relevant|, k)`.
pub fn average_precision_at_k(recommended: &[String], relevant: &[String], k: usize) -> f64 {
    let denominator = relevant.len().min(k);
    if denominator == 0 {
        return 0.0;
    }

    let mut hits = 0usize;
    let mut score = 0.0;
    for (i, item) in recommended.iter().take(k).enumerate() {
        if relevant.contains(item) {
            hits += 1;
            score += hits as f64 / (i + 1) as f64;
        }
    }
    score / denominator as f64
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Run every case through `recommender` at `k` and score it.
pub async fn evaluate(recommender: &Recommender, cases: &[EvalCase], k: usize) -> EvalReport {
    let mut queries = Vec::with_capacity(cases.len());

    for case in cases {
        let score = match recommender.recommend(&case.query, None, k).await {
            Ok(result) => {
                let recommended = result.names();
                QueryScore {
                    recall: recall_at_k(&recommended, &case.relevant, k),
                    average_precision: average_precision_at_k(&recommended, &case.relevant, k),
                    recommended,
                    query: case.query.clone(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(query = %case.query, error = %e, "Evaluation query failed");
                QueryScore {
                    query: case.query.clone(),
                    recommended: Vec::new(),
                    recall: 0.0,
                    average_precision: 0.0,
                    error: Some(e.to_string()),
                }
            }
        };
        queries.push(score);
    }

    let scored = || queries.iter().filter(|q| q.error.is_none());
    EvalReport {
        k,
        mean_recall: mean(scored().map(|q| q.recall)),
        map: mean(scored().map(|q| q.average_precision)),
        queries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recall_at_k() {
        let recommended = names(&["Python (New)", "Excel", "SQL (New)"]);
        let relevant = names(&["Python (New)", "SQL (New)", "JavaScript (New)"]);
        assert!((recall_at_k(&recommended, &relevant, 3) - 2.0 / 3.0).abs() < 1e-9);
        assert!((recall_at_k(&recommended, &relevant, 1) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(recall_at_k(&recommended, &[], 3), 0.0);
    }

    #[test]
    fn test_average_precision_at_k() {
        let recommended = names(&["Python (New)", "Excel", "SQL (New)"]);
        let relevant = names(&["Python (New)", "SQL (New)", "JavaScript (New)"]);
        // (1/1 + 2/3) / min(3, 3)
        let expected = (1.0 + 2.0 / 3.0) / 3.0;
        assert!((average_precision_at_k(&recommended, &relevant, 3) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_average_precision_denominator_capped_by_k() {
        let recommended = names(&["Java 8 (New)"]);
        let relevant = names(&["Java 8 (New)", "Core Java (New)", "Java Frameworks (New)"]);
        assert!((average_precision_at_k(&recommended, &relevant, 1) - 1.0).abs() < 1e-9);
        assert_eq!(average_precision_at_k(&recommended, &[], 1), 0.0);
    }

    #[test]
    fn test_cases_parse_without_relevant() {
        let cases: Vec<EvalCase> =
            serde_json::from_str(r#"[{"query": "a"}, {"query": "b", "relevant": ["x"]}]"#).unwrap();
        assert!(cases[0].relevant.is_empty());
        assert_eq!(cases[1].relevant, vec!["x"]);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(mean([1.0, 0.0].into_iter()), 0.5);
    }
}
