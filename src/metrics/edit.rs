#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordAlignment {
    pub hits: usize,
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
}

impl WordAlignment {
    pub fn distance(&self) -> usize {
        self.substitutions + self.deletions + self.insertions
    }
}

/// Minimum-cost alignment of hypothesis words against reference words.
///
/// Ties in the backtrace prefer a hit or substitution, then a deletion, so the
/// operation counts are deterministic for a given input pair.
pub fn align_words(reference: &[&str], hypothesis: &[&str]) -> WordAlignment {
    let rows = reference.len() + 1;
    let cols = hypothesis.len() + 1;
    let mut cost = vec![0_usize; rows * cols];

    for i in 0..rows {
        cost[i * cols] = i;
    }
    for (j, cell) in cost.iter_mut().enumerate().take(cols) {
        *cell = j;
    }

    for i in 1..rows {
        for j in 1..cols {
            let substitution =
                cost[(i - 1) * cols + j - 1] + usize::from(reference[i - 1] != hypothesis[j - 1]);
            let deletion = cost[(i - 1) * cols + j] + 1;
            let insertion = cost[i * cols + j - 1] + 1;
            cost[i * cols + j] = substitution.min(deletion).min(insertion);
        }
    }

    let mut alignment = WordAlignment::default();
    let (mut i, mut j) = (reference.len(), hypothesis.len());

    while i > 0 || j > 0 {
        let here = cost[i * cols + j];

        if i > 0 && j > 0 {
            let diagonal = cost[(i - 1) * cols + j - 1];
            let same = reference[i - 1] == hypothesis[j - 1];
            if same && here == diagonal {
                alignment.hits += 1;
                i -= 1;
                j -= 1;
                continue;
            }
            if !same && here == diagonal + 1 {
                alignment.substitutions += 1;
                i -= 1;
                j -= 1;
                continue;
            }
        }

        if i > 0 && here == cost[(i - 1) * cols + j] + 1 {
            alignment.deletions += 1;
            i -= 1;
            continue;
        }

        alignment.insertions += 1;
        j -= 1;
    }

    alignment
}
