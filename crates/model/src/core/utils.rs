/// Lowercase words separated by single hyphens; runs of non-alphanumeric
/// characters collapse into one separator and are trimmed at both ends.
pub fn kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::kebab_case;

    #[test]
    fn converts_words_and_digits() {
        assert_eq!(kebab_case("Hello World 123"), "hello-world-123");
        assert_eq!(kebab_case("orderItem"), "orderitem");
        assert_eq!(kebab_case("--a__b--"), "a-b");
        assert_eq!(kebab_case(""), "");
    }
}
