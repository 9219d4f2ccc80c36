/// Round to two decimal places, the precision used for scores and health.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Replace every non-whitespace character with the mask character while
/// keeping whitespace intact, so hidden segments still occupy their
/// final layout.
pub fn mask_text(text: &str, mask: char) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { mask })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(86.666_666), 86.67);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(99.996), 100.0);
        assert_eq!(round2(-1.004), -1.0);
    }

    #[test]
    fn test_round2_exact_values_unchanged() {
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(33.33), 33.33);
    }

    #[test]
    fn test_mask_text() {
        assert_eq!(mask_text("shepherd ", '_'), "________ ");
        assert_eq!(mask_text("don't", '_'), "_____");
        assert_eq!(mask_text(" \t\n", '_'), " \t\n");
        assert_eq!(mask_text("", '_'), "");
    }
}
