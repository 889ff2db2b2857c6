//! Filename sanitizing for downloads and uploads.

/// Reduce a user-supplied name to a safe, flat ASCII filename.
///
/// Path separators become word breaks, runs of whitespace become a single
/// underscore, anything outside `[A-Za-z0-9_.-]` is dropped, and leading or
/// trailing dots and underscores are stripped. May return an empty string.
pub fn sanitize(name: &str) -> String {
    let flattened = name.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lower-cased extension after the last dot, if any.
pub fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Nairobi.geojson"), "Nairobi.geojson");
        assert_eq!(sanitize("My County.geojson"), "My_County.geojson");
        assert_eq!(sanitize("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize("..\\evil.json"), "evil.json");
        assert_eq!(sanitize("Murang'a.geojson"), "Muranga.geojson");
        assert_eq!(sanitize("  ...  "), "");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.GeoJSON").as_deref(), Some("geojson"));
        assert_eq!(extension("archive.tar.json").as_deref(), Some("json"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), None);
    }
}
