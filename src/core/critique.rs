// src/core/critique.rs — Pull the 1-10 quality score out of free-form critique text

/// Find the critic's overall score.
///
/// Tries `N/10` first, then the first number on a line after the word
/// "score" with parenthesised text removed (so `score (1-10): 7` yields 7).
pub fn extract_score(critique: &str) -> Option<u8> {
    out_of_ten(critique).or_else(|| after_score_keyword(critique))
}

fn out_of_ten(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    for (i, _) in text.match_indices('/') {
        let rest = text[i + 1..].trim_start();
        let denominator_is_ten =
            rest.starts_with("10") && !rest[2..].starts_with(|c: char| c.is_ascii_digit());
        if !denominator_is_ten {
            continue;
        }

        let mut end = i;
        while end > 0 && bytes[end - 1] == b' ' {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && bytes[start - 1].is_ascii_digit() {
            start -= 1;
        }
        if let Some(score) = in_range(&text[start..end]) {
            return Some(score);
        }
    }
    None
}

fn after_score_keyword(text: &str) -> Option<u8> {
    text.lines().find_map(|line| {
        let lower = line.to_ascii_lowercase();
        let idx = lower.find("score")?;
        let tail = strip_parenthesised(&line[idx + "score".len()..]);
        let digits: String = tail
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        in_range(&digits)
    })
}

fn strip_parenthesised(text: &str) -> String {
    let mut depth = 0usize;
    text.chars()
        .filter(|&c| match c {
            '(' => {
                depth += 1;
                false
            }
            ')' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

fn in_range(digits: &str) -> Option<u8> {
    digits.parse::<u8>().ok().filter(|n| (1..=10).contains(n))
}
