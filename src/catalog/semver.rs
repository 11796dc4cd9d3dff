use std::cmp::Ordering;

use semver::Version;

/// Version assumed for an empty version string.
pub const ZERO_VERSION: &str = "v0.0.0";

/// Normalize a version string into `v`-prefixed form.
///
/// An empty string maps to [`ZERO_VERSION`] so that any real version compares greater.
pub fn normalize_version(version: &str) -> String {
    if version.is_empty() {
        ZERO_VERSION.to_string()
    } else if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Strips a leading 'v' and pads partial versions with zeros.
///
/// Examples:
/// - "v1" -> Version(1, 0, 0)
/// - "1.2" -> Version(1, 2, 0)
/// - "v1.2.3" -> Version(1, 2, 3)
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}

/// Compare two version strings by semantic version ordering.
///
/// Both sides are normalized first. A string that does not parse compares lower than
/// every valid version and equal to any other unparseable string.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = parse_version(&normalize_version(a));
    let b = parse_version(&normalize_version(b));
    a.cmp(&b)
}

/// Extract the `(major, minor, patch)` triple of a strict `v<major>.<minor>.<patch>` version.
///
/// Components with leading zeros are rejected, matching [`parse_version`].
pub fn version_triple(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.strip_prefix('v')?.split('.');
    let major = parse_component(parts.next()?)?;
    let minor = parse_component(parts.next()?)?;
    let patch = parse_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

/// Parse a `latest_patch` base version such as "1.2" into `(major, minor)`.
pub fn parse_major_minor(version: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 2 {
        return Err(format!(
            "version must be in format 'major.minor', got: {}",
            version
        ));
    }

    let major = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid major version: {}", parts[0]))?;
    let minor = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid minor version: {}", parts[1]))?;

    Ok((major, minor))
}

/// Parse a `latest_minor` base version such as "1" into its major component.
pub fn parse_major(version: &str) -> Result<u32, String> {
    version
        .parse::<u32>()
        .map_err(|_| format!("invalid major version: {}", version))
}
