use std::collections::HashMap;

const BLEU_MAX_ORDER: usize = 4;
const BLEU_SMOOTHING_EPSILON: f64 = 0.1;

fn lcs_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut previous = vec![0_usize; b.len() + 1];
    let mut current = vec![0_usize; b.len() + 1];

    for left in a {
        for (j, right) in b.iter().enumerate() {
            current[j + 1] = if left == right {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Normalized indel similarity over characters, 1.0 for identical input.
pub fn fuzz_ratio(reference: &[char], hypothesis: &[char]) -> f64 {
    let total = reference.len() + hypothesis.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(reference, hypothesis)) as f64 / total as f64
}

/// Sentence BLEU with effective order and add-epsilon smoothing.
pub fn bleu(reference: &[&str], hypothesis: &[&str]) -> f64 {
    match (reference.is_empty(), hypothesis.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let order = BLEU_MAX_ORDER.min(hypothesis.len());
    let mut log_precision_sum = 0.0;

    for n in 1..=order {
        let (matches, total) = clipped_ngram_matches(reference, hypothesis, n);
        if n == 1 && matches == 0 {
            return 0.0;
        }
        let precision = if matches == 0 {
            BLEU_SMOOTHING_EPSILON / total as f64
        } else {
            matches as f64 / total as f64
        };
        log_precision_sum += precision.ln();
    }

    brevity_penalty(reference.len(), hypothesis.len()) * (log_precision_sum / order as f64).exp()
}

fn clipped_ngram_matches(reference: &[&str], hypothesis: &[&str], n: usize) -> (usize, usize) {
    let mut reference_counts: HashMap<&[&str], usize> = HashMap::new();
    if reference.len() >= n {
        for gram in reference.windows(n) {
            *reference_counts.entry(gram).or_default() += 1;
        }
    }

    let mut hypothesis_counts: HashMap<&[&str], usize> = HashMap::new();
    for gram in hypothesis.windows(n) {
        *hypothesis_counts.entry(gram).or_default() += 1;
    }

    let matches = hypothesis_counts
        .iter()
        .map(|(gram, count)| (*count).min(reference_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let total = hypothesis.len() + 1 - n;

    (matches, total)
}

fn brevity_penalty(reference_len: usize, hypothesis_len: usize) -> f64 {
    if hypothesis_len >= reference_len {
        1.0
    } else {
        (1.0 - reference_len as f64 / hypothesis_len as f64).exp()
    }
}

pub(super) fn rouge_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// ROUGE-L F-measure over lowercase alphanumeric tokens.
pub fn rouge_l_f1(reference: &str, hypothesis: &str) -> f64 {
    let reference_tokens = rouge_tokens(reference);
    let hypothesis_tokens = rouge_tokens(hypothesis);

    match (reference_tokens.is_empty(), hypothesis_tokens.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let lcs = lcs_len(&reference_tokens, &hypothesis_tokens);
    if lcs == 0 {
        return 0.0;
    }

    let precision = lcs as f64 / hypothesis_tokens.len() as f64;
    let recall = lcs as f64 / reference_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}
