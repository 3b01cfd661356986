/// Show only the first and last `visible_chars` characters of a secret.
/// Empty input renders as `"None"`.
pub fn mask_sensitive_data(data: &str, visible_chars: usize, mask: &str) -> String {
    if data.is_empty() {
        return "None".to_string();
    }
    let chars: Vec<char> = data.chars().collect();
    let head: String = chars.iter().take(visible_chars).collect();
    let tail_start = chars.len().saturating_sub(visible_chars);
    let tail: String = chars[tail_start..].iter().collect();
    format!("{head}{mask}{tail}")
}

/// `mask_sensitive_data` with the defaults used in log lines.
pub fn mask(data: &str) -> String {
    mask_sensitive_data(data, 5, "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_middle_of_long_value() {
        assert_eq!(mask("abcdefghijklmnop"), "abcde...lmnop");
    }

    #[test]
    fn empty_value_renders_none() {
        assert_eq!(mask(""), "None");
    }

    #[test]
    fn short_value_repeats_overlap() {
        // Same slicing as a head/tail cut: short secrets are shown twice.
        assert_eq!(mask_sensitive_data("abc", 5, "..."), "abc...abc");
    }

    #[test]
    fn custom_mask_and_width() {
        assert_eq!(mask_sensitive_data("0123456789", 2, "**"), "01**89");
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        assert_eq!(mask_sensitive_data("ñandú-clave-ñandú", 2, "~"), "ña~dú");
    }
}
