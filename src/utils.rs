use chrono::Utc;

pub const GEOJSON_EXTENSION: &str = "geojson";

/// Milliseconds since the Unix epoch, used to make staged names unique.
pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// True when `file_name` ends in `.{ext}` for one of `extensions` (ASCII case-insensitive).
pub fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|candidate| ext.eq_ignore_ascii_case(candidate)),
        None => false,
    }
}

/// File name without its last extension and without any directory part.
pub fn base_name(file_name: &str) -> &str {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// `<timestamp>-<base>.geojson`
pub fn output_file_name(timestamp: i64, source_name: &str) -> String {
    format!("{}-{}.{}", timestamp, base_name(source_name), GEOJSON_EXTENSION)
}

/// Joins a URL prefix and a file name with exactly one slash.
pub fn public_path(prefix: &str, file_name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), file_name)
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_extension() {
        assert!(has_extension("puntos.xlsx", &["xlsx", "xls"]));
        assert!(has_extension("PUNTOS.XLS", &["xlsx", "xls"]));
        assert!(!has_extension("puntos.csv", &["xlsx", "xls"]));
        assert!(!has_extension("xlsx", &["xlsx"]));
        assert!(!has_extension("puntos.xlsx.bak", &["xlsx"]));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("rios.shp"), "rios");
        assert_eq!(base_name("datos.v2.shp"), "datos.v2");
        assert_eq!(base_name("C:\\gis\\rios.shp"), "rios");
        assert_eq!(base_name("sin_extension"), "sin_extension");
        assert_eq!(base_name(".hidden"), ".hidden");
    }

    #[test]
    fn test_output_names() {
        let name = output_file_name(1700000000000, "rios.shp");
        assert_eq!(name, "1700000000000-rios.geojson");
        assert_eq!(public_path("/output", &name), "/output/1700000000000-rios.geojson");
        assert_eq!(public_path("/output/", "a.geojson"), "/output/a.geojson");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(52_428_800), "50.0 MB");
    }
}
