use std::collections::HashMap;

/// A retrieval hit: chunk position in the indexed corpus plus cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub index: usize,
    pub score: f64,
}

/// In-memory TF-IDF index over text chunks.
///
/// Vectors use smooth inverse document frequency, `ln((1+n)/(1+df)) + 1`, and
/// are L2-normalised so cosine similarity reduces to a sparse dot product.
pub struct TfidfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<HashMap<usize, f64>>,
}

impl TfidfIndex {
    /// Build an index over the given documents.
    pub fn build<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|d| tokenize(d.as_ref()))
            .collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for tokens in &tokenized {
            let mut seen: Vec<usize> = Vec::new();
            for token in tokens {
                let term_id = match vocabulary.get(token) {
                    Some(&id) => id,
                    None => {
                        let id = vocabulary.len();
                        vocabulary.insert(token.clone(), id);
                        doc_freq.push(0);
                        id
                    }
                };
                if !seen.contains(&term_id) {
                    seen.push(term_id);
                }
            }
            for term_id in seen {
                doc_freq[term_id] += 1;
            }
        }

        let n = tokenized.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let vectors = tokenized
            .iter()
            .map(|tokens| weigh_and_normalise(tokens, &vocabulary, &idf))
            .collect();

        Self {
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Return the `k` chunks most similar to the query, best first.
    ///
    /// Chunks with zero similarity are excluded; ties keep corpus order.
    pub fn retrieve_top_k(&self, query: &str, k: usize) -> Vec<Retrieved> {
        let query_vec = weigh_and_normalise(&tokenize(query), &self.vocabulary, &self.idf);
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<Retrieved> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| Retrieved {
                index,
                score: dot(&query_vec, vector),
            })
            .filter(|r| r.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        scored.truncate(k);
        scored
    }
}

/// Lowercase alphanumeric tokens; everything else is a separator.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn weigh_and_normalise(
    tokens: &[String],
    vocabulary: &HashMap<String, usize>,
    idf: &[f64],
) -> HashMap<usize, f64> {
    let mut counts: HashMap<usize, f64> = HashMap::new();
    for token in tokens {
        if let Some(&term_id) = vocabulary.get(token) {
            *counts.entry(term_id).or_insert(0.0) += 1.0;
        }
    }

    for (term_id, weight) in counts.iter_mut() {
        *weight *= idf[*term_id];
    }

    let norm: f64 = counts.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in counts.values_mut() {
            *weight /= norm;
        }
    }
    counts
}

fn dot(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    // Iterate the smaller map
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term_id, w)| large.get(term_id).map(|v| w * v))
        .sum()
}
