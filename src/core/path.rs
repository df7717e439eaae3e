use crate::domain::model::BackendKind;

/// Normalizes a destination path into the root form the destination backend
/// expects. Idempotent.
///
/// Separators are unified to `/` and collapsed. Filesystem-like backends keep
/// absolute roots and end in exactly one `/` (an empty path becomes `./`).
/// Key-addressed backends get a relative prefix ending in `/`, or the empty
/// prefix for the bucket/database root.
pub fn normalize_destination(path: &str, kind: BackendKind) -> String {
    let unified = path.trim().replace('\\', "/");

    let mut collapsed = String::with_capacity(unified.len() + 1);
    for ch in unified.chars() {
        if ch == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(ch);
    }

    // key-addressed backends take relative prefixes
    if matches!(kind, BackendKind::ObjectStore | BackendKind::KeyValue) {
        let relative = collapsed.trim_start_matches(|c: char| c == '/' || c.is_whitespace());
        if relative.is_empty() {
            String::new()
        } else {
            with_trailing_separator(relative)
        }
    } else if collapsed.is_empty() {
        "./".to_string()
    } else {
        with_trailing_separator(&collapsed)
    }
}

fn with_trailing_separator(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [BackendKind; 4] = [
        BackendKind::Sftp,
        BackendKind::ObjectStore,
        BackendKind::Folder,
        BackendKind::KeyValue,
    ];

    #[test]
    fn test_folder_roots() {
        assert_eq!(normalize_destination("/data/out", BackendKind::Folder), "/data/out/");
        assert_eq!(normalize_destination("/data//out///", BackendKind::Folder), "/data/out/");
        assert_eq!(normalize_destination("C:\\data\\out", BackendKind::Folder), "C:/data/out/");
        assert_eq!(normalize_destination("", BackendKind::Folder), "./");
        assert_eq!(normalize_destination("/", BackendKind::Sftp), "/");
    }

    #[test]
    fn test_key_prefixes() {
        assert_eq!(normalize_destination("/uploads", BackendKind::ObjectStore), "uploads/");
        assert_eq!(normalize_destination("uploads/2024/", BackendKind::ObjectStore), "uploads/2024/");
        assert_eq!(normalize_destination("/", BackendKind::KeyValue), "");
        assert_eq!(normalize_destination("", BackendKind::ObjectStore), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "",
            " ",
            "/",
            "//",
            "./",
            "out",
            " out ",
            "/data/out",
            "/data//out\\\\",
            "/ /a",
            "\\\\share\\drop",
            "a/ /b/",
            "bucket-prefix///",
        ];

        for kind in KINDS {
            for input in inputs {
                let once = normalize_destination(input, kind);
                let twice = normalize_destination(&once, kind);
                assert_eq!(once, twice, "not idempotent for {:?} with {}", input, kind);
            }
        }
    }
}
