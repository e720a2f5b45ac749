//! Package-URL and CPE identifiers.

use crate::types::DependencyInfo;

/// `pkg:generic/<id>@<version>?checksum=<sha256>&download_url=<source>`.
///
/// Qualifiers are emitted in key order and left unescaped, which is the form
/// downstream tooling compares against.
pub fn purl(id: &str, version: &str, checksum: &str, source: &str) -> String {
    format!("pkg:generic/{id}@{version}?checksum={checksum}&download_url={source}")
}

/// CPE 2.3 formatted string for an application version.
pub fn cpe(dependency: &DependencyInfo, version: &str) -> String {
    format!(
        "cpe:2.3:a:{}:{}:{version}:*:*:*:*:*:*:*",
        dependency.cpe_vendor, dependency.cpe_product
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purl_format() {
        assert_eq!(
            purl(
                "nginx",
                "1.25.3",
                "64c5b975ca287939e828303fa857d22f142b251f17808dfe41733512d9cded86",
                "https://nginx.org/download/nginx-1.25.3.tar.gz"
            ),
            "pkg:generic/nginx@1.25.3?checksum=64c5b975ca287939e828303fa857d22f142b251f17808dfe41733512d9cded86&download_url=https://nginx.org/download/nginx-1.25.3.tar.gz"
        );
    }

    #[test]
    fn cpe_format() {
        assert_eq!(
            cpe(&DependencyInfo::default(), "1.25.3"),
            "cpe:2.3:a:nginx:nginx:1.25.3:*:*:*:*:*:*:*"
        );
    }
}
