//! Slash-delimited group paths.

/// Split a path into its segments, dropping empty ones.
///
/// Leading, trailing and doubled separators are ignored, so `""`, `"/"` and
/// `"//"` all name the root. Segments are otherwise kept verbatim.
pub fn normalize(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render segments as a path string. The root renders as `""`.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_forms() {
        assert!(normalize("").is_empty());
        assert!(normalize("/").is_empty());
        assert!(normalize("///").is_empty());
    }

    #[test]
    fn redundant_separators_are_dropped() {
        let expected = vec!["Infra", "DB", "Creds"];
        assert_eq!(normalize("Infra/DB/Creds"), expected);
        assert_eq!(normalize("/Infra//DB/Creds/"), expected);
        assert_eq!(normalize("//Infra/DB///Creds"), expected);
    }

    #[test]
    fn segments_are_not_trimmed_or_folded() {
        assert_eq!(normalize(" a /B"), vec![" a ", "B"]);
    }

    #[test]
    fn join_has_no_trailing_separator() {
        assert_eq!(join(&["Infra", "DB"]), "Infra/DB");
        assert_eq!(join::<String>(&[]), "");
        assert_eq!(join(&normalize("/a//b/")), "a/b");
    }
}
