//! Physical producers
pub mod evdev;
pub mod hidraw;
pub mod iio;

/// An empty pattern list matches anything
fn matches_any<T: PartialEq>(value: T, patterns: &[T]) -> bool {
    patterns.is_empty() || patterns.contains(&value)
}

/// Glob variant of [matches_any] for device strings
fn matches_glob(value: Option<&str>, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    patterns
        .iter()
        .any(|pattern| glob_match::glob_match(pattern, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matching() {
        assert!(matches_any(0x17ef, &[]));
        assert!(matches_any(0x6182, &[0x6182, 0x6183]));
        assert!(!matches_any(0x6186, &[0x6182, 0x6183]));

        assert!(matches_glob(None, &[]));
        assert!(!matches_glob(None, &["Lenovo*".into()]));
        assert!(matches_glob(Some("Legion Controller for Windows"), &["Legion*".into()]));
        assert!(!matches_glob(Some("Xbox"), &["Legion*".into()]));
    }
}
