//! Offline retriever over a markdown corpus.
//!
//! The corpus is split into passages on `## ` headings, the same chunking
//! the Weaviate collection is ingested with, and scored by lexical term
//! overlap with the query.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use super::traits::{Passage, RetrievalError, RetrievalResult, RetrieverPort};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "has",
    "have", "he", "her", "his", "how", "i", "in", "is", "it", "its", "me", "of", "on", "or",
    "she", "tell", "that", "the", "their", "they", "this", "to", "was", "were", "what", "when",
    "where", "which", "who", "whom", "why", "with", "you",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

struct Indexed {
    content: String,
    terms: HashSet<String>,
}

pub struct InMemoryRetriever {
    passages: Vec<Indexed>,
}

impl InMemoryRetriever {
    pub fn new<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let passages = passages
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .map(|content| Indexed {
                terms: terms(&content),
                content,
            })
            .collect();
        Self { passages }
    }

    /// Split markdown into one passage per `## ` section.
    pub fn from_markdown(markdown: &str) -> Self {
        Self::new(markdown.split("## ").map(str::trim).filter(|s| !s.is_empty()))
    }

    pub async fn from_file(path: &Path) -> RetrievalResult<Self> {
        let markdown = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Configuration(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let retriever = Self::from_markdown(&markdown);
        if retriever.is_empty() {
            return Err(RetrievalError::Configuration(format!(
                "Corpus {} has no passages",
                path.display()
            )));
        }
        Ok(retriever)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait]
impl RetrieverPort for InMemoryRetriever {
    async fn search(&self, query: &str, k: usize) -> RetrievalResult<Vec<Passage>> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, query_terms.intersection(&p.terms).count()))
            .filter(|(_, hits)| *hits > 0)
            .collect();

        // Stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(k);

        let total = query_terms.len() as f32;
        Ok(scored
            .into_iter()
            .map(|(idx, hits)| {
                Passage::new(self.passages[idx].content.clone()).with_score(hits as f32 / total)
            })
            .collect())
    }

    async fn health_check(&self) -> RetrievalResult<()> {
        if self.passages.is_empty() {
            return Err(RetrievalError::Configuration("corpus is empty".into()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "# Harry Potter\n\nIntro text.\n\n\
## Early life\nHarry was raised by the Dursleys at Privet Drive.\n\n\
## Hogwarts\nHarry attended Hogwarts School and was sorted into Gryffindor.\n\n\
## Friends\nRon Weasley and Hermione Granger met Harry on the Hogwarts Express.\n";

    #[test]
    fn test_markdown_chunking() {
        let retriever = InMemoryRetriever::from_markdown(CORPUS);
        assert_eq!(retriever.len(), 4);
        assert!(retriever.passages[1].content.starts_with("Early life"));
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let retriever = InMemoryRetriever::from_markdown(CORPUS);
        let results = retriever
            .search("Which house was Harry sorted into at Hogwarts?", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("Gryffindor"));
        assert!(results[0].score.unwrap() > results[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_search_is_stable_and_bounded() {
        let retriever = InMemoryRetriever::new(vec!["owl post", "owl feathers", "owl eyes"]);
        let results = retriever.search("owl", 2).await.unwrap();
        let contents: Vec<_> = results.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["owl post", "owl feathers"]);

        assert!(retriever.search("the of and", 5).await.unwrap().is_empty());
        assert!(retriever.search("dragon", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(InMemoryRetriever::from_markdown(CORPUS).health_check().await.is_ok());
        let empty = InMemoryRetriever::new(Vec::<String>::new()).health_check().await;
        assert!(matches!(empty, Err(RetrievalError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.md");
        std::fs::write(&path, CORPUS).unwrap();
        let retriever = InMemoryRetriever::from_file(&path).await.unwrap();
        assert_eq!(retriever.len(), 4);

        let missing = InMemoryRetriever::from_file(&dir.path().join("nope.md")).await;
        assert!(matches!(missing, Err(RetrievalError::Configuration(_))));

        let blank = dir.path().join("blank.md");
        std::fs::write(&blank, "\n  \n").unwrap();
        let empty = InMemoryRetriever::from_file(&blank).await;
        assert!(matches!(empty, Err(RetrievalError::Configuration(_))));
    }
}
