/// A letter of the machine alphabet, 0..=25 for A-Z.
/// Non-alphabetic input maps to [`INVALID`], which downstream code treats as
/// a wildcard (cribs) or drops (ciphertext).
pub type Letter = i16;

pub const INVALID: Letter = -1;

pub const ALPHABET_SIZE: usize = 26;

pub fn letter_index(c: char) -> Letter {
    match c {
        'a'..='z' => c as Letter - 'a' as Letter,
        'A'..='Z' => c as Letter - 'A' as Letter,
        _ => INVALID,
    }
}

pub fn letter_char(l: Letter) -> char {
    if (0..26).contains(&l) {
        (b'A' + l as u8) as char
    } else {
        '?'
    }
}

pub fn digit_index(c: char) -> i16 {
    match c {
        '0'..='9' => c as i16 - '0' as i16,
        _ => -1,
    }
}

/// Converts text to letters. Non-alphabetic characters are kept as
/// [`INVALID`] sentinels so crib wildcards survive the conversion; callers
/// holding ciphertext are expected to pre-filter to A-Z.
pub fn to_letters(s: &str) -> Vec<Letter> {
    s.chars().map(letter_index).collect()
}

pub fn to_string(text: &[Letter]) -> String {
    text.iter().map(|&l| letter_char(l)).collect()
}

/// In-place Fisher-Yates shuffle of a letter visitation order.
pub fn shuffle_order(order: &mut [usize; 26], rng: &mut fastrand::Rng) {
    for count in (1..26).rev() {
        let i = rng.usize(0..=count);
        order.swap(count, i);
    }
}

/// Human-readable search time estimate from a normalized key count and an
/// empirical keys/second range.
pub fn estimated_time_string(normalized_keys: u64, min_rate: u64, max_rate: u64) -> String {
    let max_secs = normalized_keys / min_rate.max(1);
    let min_secs = normalized_keys / max_rate.max(1);
    fn fmt(mut secs: u64) -> String {
        if secs < 60 {
            return format!("{secs} seconds");
        }
        let hours = secs / 3600;
        secs %= 3600;
        let minutes = secs / 60;
        if hours > 0 {
            format!("{hours}h{minutes:02}m")
        } else {
            format!("{minutes} minutes")
        }
    }
    if min_secs == max_secs {
        fmt(max_secs)
    } else {
        format!("{} to {}", fmt(min_secs), fmt(max_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip() {
        assert_eq!(letter_index('A'), 0);
        assert_eq!(letter_index('z'), 25);
        assert_eq!(letter_index('?'), INVALID);
        assert_eq!(letter_char(4), 'E');
        assert_eq!(letter_char(INVALID), '?');
    }

    #[test]
    fn wildcards_survive_conversion() {
        let crib = to_letters("AB?DE");
        assert_eq!(crib, vec![0, 1, INVALID, 3, 4]);
        assert_eq!(to_string(&crib), "AB?DE");
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut order = [0usize; 26];
        for (i, slot) in order.iter_mut().enumerate() {
            *slot = i;
        }
        shuffle_order(&mut order, &mut rng);
        let mut seen = [false; 26];
        for &v in &order {
            assert!(!seen[v]);
            seen[v] = true;
        }
    }
}
