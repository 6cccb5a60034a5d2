use std::collections::HashMap;

/// Lowercase alphanumeric runs
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
    /// Negative IDFs are floored at `epsilon * average_idf`
    pub epsilon: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Okapi BM25 over an in-memory corpus
#[derive(Debug, Clone)]
pub struct Bm25Okapi {
    params: Bm25Params,
    doc_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avgdl: f32,
    idf: HashMap<String, f32>,
}

impl Bm25Okapi {
    pub fn new<S: AsRef<str>>(corpus: &[S]) -> Self {
        Self::with_params(corpus, Bm25Params::default())
    }

    pub fn with_params<S: AsRef<str>>(corpus: &[S], params: Bm25Params) -> Self {
        let mut doc_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut df: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc.as_ref());
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for tok in tokens {
                *freqs.entry(tok).or_default() += 1;
            }
            for term in freqs.keys() {
                *df.entry(term.clone()).or_default() += 1;
            }
            doc_freqs.push(freqs);
        }

        let n = corpus.len() as f32;
        let total_len: usize = doc_lens.iter().sum();
        let avgdl = if corpus.is_empty() { 0.0 } else { total_len as f32 / n };

        let mut idf = HashMap::with_capacity(df.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, freq) in df {
            let value = ((n - freq as f32 + 0.5) / (freq as f32 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        let average_idf = if idf.is_empty() { 0.0 } else { idf_sum / idf.len() as f32 };
        let floor = params.epsilon * average_idf;
        for term in negative {
            idf.insert(term, floor);
        }

        Self {
            params,
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// One score per corpus document, in corpus order
    pub fn get_scores(&self, query: &str) -> Vec<f32> {
        let terms = tokenize(query);
        let Bm25Params { k1, b, .. } = self.params;

        self.doc_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &len)| {
                let norm = if self.avgdl > 0.0 { len as f32 / self.avgdl } else { 0.0 };
                terms
                    .iter()
                    .map(|term| {
                        let tf = freqs.get(term).copied().unwrap_or(0) as f32;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
                    })
                    .sum()
            })
            .collect()
    }
}
