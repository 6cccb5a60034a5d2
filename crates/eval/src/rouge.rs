use index::tokenize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScore {
    pub precision: f32,
    pub recall: f32,
    pub fmeasure: f32,
}

/// Length of the longest common subsequence, two-row DP
fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L of `candidate` against `reference`
pub fn rouge_l(reference: &str, candidate: &str) -> RougeScore {
    let ref_tokens = tokenize(reference);
    let cand_tokens = tokenize(candidate);
    if ref_tokens.is_empty() || cand_tokens.is_empty() {
        return RougeScore::default();
    }

    let lcs = lcs_len(&ref_tokens, &cand_tokens) as f32;
    let precision = lcs / cand_tokens.len() as f32;
    let recall = lcs / ref_tokens.len() as f32;
    let fmeasure = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    RougeScore {
        precision,
        recall,
        fmeasure,
    }
}
