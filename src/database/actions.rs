pub mod favorites;
pub mod ingredients;
pub mod recipes;
pub mod shopping_cart;
pub mod subscriptions;
pub mod tags;
pub mod users;

/// Escapes `LIKE` wildcards so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escapes_wildcards() {
        assert_eq!(escape_like("salt"), "salt");
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }
}
