//! IMS content-package manifest generation and validation.
//!
//! A QTI 2.2 package ships an `imsmanifest.xml` listing every resource:
//! shared passages first (type `webcontent`), then items, then assessments,
//! with `<dependency>` edges from items to the passages they use and from
//! assessments to their items. Validation is result-typed: structural
//! problems come back as a [`ValidationReport`], never as a thrown error,
//! so callers can render all findings at once.

use serde::{Deserialize, Serialize};

use crate::config::{
    has_unsafe_package_chars, IMSCP_NAMESPACE, PASSAGE_RESOURCE_TYPE, QTI_ITEM_RESOURCE_TYPE,
    QTI_NAMESPACE, QTI_TEST_RESOURCE_TYPE,
};
use crate::xml::escape_xml;

/// One package member as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ids of resources this one depends on: passages for items, items for
    /// assessments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Everything needed to build a package manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInput {
    pub package_id: String,
    #[serde(default)]
    pub passages: Vec<ManifestEntry>,
    #[serde(default)]
    pub items: Vec<ManifestEntry>,
    #[serde(default)]
    pub assessments: Vec<ManifestEntry>,
}

/// A `<resource>` row of the generated manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub identifier: String,
    pub resource_type: String,
    pub href: String,
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
}

/// The generated manifest, resources in package order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImsManifest {
    pub identifier: String,
    pub resources: Vec<Resource>,
}

/// Build the manifest structure: passages, then items, then assessments.
#[must_use]
pub fn build_manifest(input: &ManifestInput) -> ImsManifest {
    let mut resources = Vec::new();

    for passage in &input.passages {
        resources.push(Resource {
            identifier: passage.id.clone(),
            resource_type: PASSAGE_RESOURCE_TYPE.to_string(),
            href: passage.file_path.clone(),
            files: vec![passage.file_path.clone()],
            dependencies: Vec::new(),
        });
    }
    for item in &input.items {
        resources.push(Resource {
            identifier: item.id.clone(),
            resource_type: QTI_ITEM_RESOURCE_TYPE.to_string(),
            href: item.file_path.clone(),
            files: vec![item.file_path.clone()],
            dependencies: item.dependencies.clone(),
        });
    }
    for assessment in &input.assessments {
        resources.push(Resource {
            identifier: assessment.id.clone(),
            resource_type: QTI_TEST_RESOURCE_TYPE.to_string(),
            href: assessment.file_path.clone(),
            files: vec![assessment.file_path.clone()],
            dependencies: assessment.dependencies.clone(),
        });
    }

    ImsManifest {
        identifier: input.package_id.clone(),
        resources,
    }
}

/// Serialize a manifest to `imsmanifest.xml` content.
#[must_use]
pub fn manifest_to_xml(manifest: &ImsManifest) -> String {
    let mut out = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<manifest identifier="{id}" xmlns="{imscp}" xmlns:imsqti="{qti}">"#,
            "<metadata><schema>QTIv2.2 Package</schema>",
            "<schemaversion>1.0.0</schemaversion></metadata>",
            "<organizations/>",
            "<resources>"
        ),
        id = escape_xml(&manifest.identifier),
        imscp = IMSCP_NAMESPACE,
        qti = QTI_NAMESPACE,
    );

    for resource in &manifest.resources {
        out.push_str(&format!(
            r#"<resource identifier="{}" type="{}" href="{}">"#,
            escape_xml(&resource.identifier),
            escape_xml(&resource.resource_type),
            escape_xml(&resource.href)
        ));
        for file in &resource.files {
            out.push_str(&format!(r#"<file href="{}"/>"#, escape_xml(file)));
        }
        for dependency in &resource.dependencies {
            out.push_str(&format!(
                r#"<dependency identifierref="{}"/>"#,
                escape_xml(dependency)
            ));
        }
        out.push_str("</resource>");
    }

    out.push_str("</resources></manifest>");
    out
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable issue codes; consumers match on these, so the set is
/// stable and additions are append-only.
pub mod codes {
    pub const NO_ITEMS: &str = "NO_ITEMS";
    pub const PACKAGE_ID_CHARS: &str = "PACKAGE_ID_CHARS";
    pub const MISSING_ID: &str = "MISSING_ID";
    pub const MISSING_FILE_PATH: &str = "MISSING_FILE_PATH";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const MISSING_PASSAGE_DEPENDENCY: &str = "MISSING_PASSAGE_DEPENDENCY";
    pub const MISSING_ITEM_DEPENDENCY: &str = "MISSING_ITEM_DEPENDENCY";
    pub const NO_ITEM_DEPENDENCIES: &str = "NO_ITEM_DEPENDENCIES";
    pub const MISSING_XML_DECLARATION: &str = "MISSING_XML_DECLARATION";
    pub const MISSING_MANIFEST_ELEMENT: &str = "MISSING_MANIFEST_ELEMENT";
    pub const MISSING_NAMESPACE: &str = "MISSING_NAMESPACE";
    pub const MISSING_ORGANIZATIONS: &str = "MISSING_ORGANIZATIONS";
    pub const MISSING_RESOURCES: &str = "MISSING_RESOURCES";
    pub const NO_RESOURCES: &str = "NO_RESOURCES";
    pub const NO_QTI_RESOURCES: &str = "NO_QTI_RESOURCES";
    /// Reserved. Manifest serialization is plain string building and cannot
    /// currently fail, but the code stays in the public set.
    pub const GENERATION_ERROR: &str = "GENERATION_ERROR";
}

/// One validation finding with a stable machine-readable code.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
}

/// Collected validation findings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Valid means no error-severity findings; warnings alone still pass.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    #[must_use]
    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    fn error(&mut self, code: &str, message: String) {
        self.issues.push(ValidationIssue {
            code: code.to_string(),
            severity: Severity::Error,
            message,
        });
    }

    fn warning(&mut self, code: &str, message: String) {
        self.issues.push(ValidationIssue {
            code: code.to_string(),
            severity: Severity::Warning,
            message,
        });
    }
}

/// Validate manifest input before generation.
#[must_use]
pub fn validate_manifest_input(input: &ManifestInput) -> ValidationReport {
    let mut report = ValidationReport::default();

    if input.items.is_empty() {
        report.error(
            codes::NO_ITEMS,
            "package has no items; a QTI package must contain at least one item".to_string(),
        );
    }
    if has_unsafe_package_chars(&input.package_id) {
        report.warning(
            codes::PACKAGE_ID_CHARS,
            format!(
                "package id '{}' contains whitespace or XML-special characters that strict \
                 packaging tools reject",
                input.package_id
            ),
        );
    }

    let mut seen = std::collections::HashSet::new();
    let groups = [
        ("passage", &input.passages),
        ("item", &input.items),
        ("assessment", &input.assessments),
    ];
    for (kind, entries) in groups {
        for entry in entries.iter() {
            if entry.id.is_empty() {
                report.error(codes::MISSING_ID, format!("a {kind} entry has an empty id"));
                continue;
            }
            if entry.file_path.is_empty() {
                report.error(
                    codes::MISSING_FILE_PATH,
                    format!("{kind} '{}' has no file path", entry.id),
                );
            }
            if !seen.insert(entry.id.clone()) {
                report.error(
                    codes::DUPLICATE_ID,
                    format!("resource id '{}' is used more than once", entry.id),
                );
            }
        }
    }

    let passage_ids: std::collections::HashSet<&str> =
        input.passages.iter().map(|p| p.id.as_str()).collect();
    for item in &input.items {
        for dependency in &item.dependencies {
            if !passage_ids.contains(dependency.as_str()) {
                report.error(
                    codes::MISSING_PASSAGE_DEPENDENCY,
                    format!(
                        "item '{}' depends on passage '{}' which is not in the package",
                        item.id, dependency
                    ),
                );
            }
        }
    }

    let item_ids: std::collections::HashSet<&str> =
        input.items.iter().map(|i| i.id.as_str()).collect();
    for assessment in &input.assessments {
        if assessment.dependencies.is_empty() {
            report.warning(
                codes::NO_ITEM_DEPENDENCIES,
                format!("assessment '{}' references no items", assessment.id),
            );
        }
        for dependency in &assessment.dependencies {
            if !item_ids.contains(dependency.as_str()) {
                report.error(
                    codes::MISSING_ITEM_DEPENDENCY,
                    format!(
                        "assessment '{}' depends on item '{}' which is not in the package",
                        assessment.id, dependency
                    ),
                );
            }
        }
    }

    report
}

/// Sanity-check generated manifest XML.
///
/// String-level checks by design: this guards the serializer's own output
/// and the checks mirror what downstream import tools reject first.
#[must_use]
pub fn validate_generated_manifest(xml: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !xml.trim_start().starts_with("<?xml") {
        report.error(
            codes::MISSING_XML_DECLARATION,
            "manifest must start with an XML declaration".to_string(),
        );
    }
    if !xml.contains("<manifest") {
        report.error(
            codes::MISSING_MANIFEST_ELEMENT,
            "manifest root element is absent".to_string(),
        );
        return report;
    }
    for namespace in [IMSCP_NAMESPACE, QTI_NAMESPACE] {
        if !xml.contains(namespace) {
            report.error(
                codes::MISSING_NAMESPACE,
                format!("manifest must declare the {namespace} namespace"),
            );
        }
    }
    if !xml.contains("<organizations") {
        report.error(
            codes::MISSING_ORGANIZATIONS,
            "manifest must contain an <organizations> element, even when empty".to_string(),
        );
    }
    if !xml.contains("<resources") {
        report.error(
            codes::MISSING_RESOURCES,
            "manifest must contain a <resources> element".to_string(),
        );
    } else if !xml.contains("<resource ") {
        report.warning(codes::NO_RESOURCES, "manifest lists no resources".to_string());
    } else if !xml.contains(QTI_ITEM_RESOURCE_TYPE) && !xml.contains(QTI_TEST_RESOURCE_TYPE) {
        report.warning(
            codes::NO_QTI_RESOURCES,
            "manifest contains resources but none are QTI items or tests".to_string(),
        );
    }

    report
}

/// Outcome of an end-to-end package validation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageValidation {
    pub report: ValidationReport,
    /// Present only when input validation passed and generation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_xml: Option<String>,
}

/// Validate input, and when it passes, generate the manifest and validate
/// the generated XML too. Input errors suppress generation.
#[must_use]
pub fn validate_package(input: &ManifestInput) -> PackageValidation {
    let mut report = validate_manifest_input(input);
    if !report.is_valid() {
        return PackageValidation {
            report,
            manifest_xml: None,
        };
    }

    let xml = manifest_to_xml(&build_manifest(input));
    let generated = validate_generated_manifest(&xml);
    report.issues.extend(generated.issues);

    PackageValidation {
        report,
        manifest_xml: Some(xml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input_fixture() -> ManifestInput {
        ManifestInput {
            package_id: "pkg-1".to_string(),
            passages: vec![ManifestEntry {
                id: "passage-1".to_string(),
                file_path: "passages/passage-1.xml".to_string(),
                title: None,
                dependencies: Vec::new(),
            }],
            items: vec![ManifestEntry {
                id: "item-1".to_string(),
                file_path: "items/item-1.xml".to_string(),
                title: Some("Item one".to_string()),
                dependencies: vec!["passage-1".to_string()],
            }],
            assessments: Vec::new(),
        }
    }

    #[test]
    fn test_resources_are_ordered_passages_first() {
        let manifest = build_manifest(&input_fixture());
        let identifiers: Vec<_> = manifest
            .resources
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        assert_eq!(identifiers, vec!["passage-1", "item-1"]);
        assert_eq!(manifest.resources[0].resource_type, PASSAGE_RESOURCE_TYPE);
        assert_eq!(manifest.resources[1].resource_type, QTI_ITEM_RESOURCE_TYPE);
    }

    #[test]
    fn test_xml_contains_dependency_edge() {
        let xml = manifest_to_xml(&build_manifest(&input_fixture()));
        assert!(xml.contains(r#"<dependency identifierref="passage-1"/>"#));
        assert!(xml.contains(r#"<file href="items/item-1.xml"/>"#));
        assert!(xml.contains("<organizations/>"));
        assert!(validate_generated_manifest(&xml).is_valid());
    }

    #[test]
    fn test_missing_passage_dependency() {
        let mut input = input_fixture();
        input.passages.clear();
        let report = validate_manifest_input(&input);
        assert!(!report.is_valid());
        assert!(report.has_issue("MISSING_PASSAGE_DEPENDENCY"));
    }

    #[test]
    fn test_no_items_is_an_error() {
        let input = ManifestInput {
            package_id: "pkg".to_string(),
            ..ManifestInput::default()
        };
        let validation = validate_package(&input);
        assert!(!validation.report.is_valid());
        assert!(validation.report.has_issue("NO_ITEMS"));
        assert!(validation.manifest_xml.is_none());
    }

    #[test]
    fn test_duplicate_ids_across_groups() {
        let mut input = input_fixture();
        input.passages.push(ManifestEntry {
            id: "item-1".to_string(),
            file_path: "passages/dup.xml".to_string(),
            title: None,
            dependencies: Vec::new(),
        });
        let report = validate_manifest_input(&input);
        assert!(report.has_issue("DUPLICATE_ID"));
    }

    #[test]
    fn test_unsafe_package_id_is_a_warning() {
        let mut input = input_fixture();
        input.package_id = "my package".to_string();
        let report = validate_manifest_input(&input);
        assert!(report.is_valid());
        assert!(report.has_issue("PACKAGE_ID_CHARS"));
    }

    #[test]
    fn test_assessment_validation() {
        let mut input = input_fixture();
        input.assessments.push(ManifestEntry {
            id: "test-1".to_string(),
            file_path: "tests/test-1.xml".to_string(),
            title: None,
            dependencies: vec!["missing-item".to_string()],
        });
        let report = validate_manifest_input(&input);
        assert!(report.has_issue("MISSING_ITEM_DEPENDENCY"));

        input.assessments[0].dependencies.clear();
        let report = validate_manifest_input(&input);
        assert!(report.is_valid());
        assert!(report.has_issue("NO_ITEM_DEPENDENCIES"));
    }

    #[test]
    fn test_generated_manifest_checks() {
        let report = validate_generated_manifest("<manifest></manifest>");
        assert!(report.has_issue("MISSING_XML_DECLARATION"));
        assert!(report.has_issue("MISSING_NAMESPACE"));
        assert!(report.has_issue("MISSING_ORGANIZATIONS"));

        let report = validate_generated_manifest("not xml at all");
        assert!(report.has_issue("MISSING_MANIFEST_ELEMENT"));
    }

    #[test]
    fn test_generated_manifest_requires_both_namespaces() {
        let xml = manifest_to_xml(&build_manifest(&input_fixture()));
        assert!(validate_generated_manifest(&xml).is_valid());

        let without_qti = xml.replace(&format!(r#" xmlns:imsqti="{QTI_NAMESPACE}""#), "");
        let report = validate_generated_manifest(&without_qti);
        assert!(!report.is_valid());
        assert!(report.has_issue("MISSING_NAMESPACE"));

        let without_imscp = xml.replace(&format!(r#" xmlns="{IMSCP_NAMESPACE}""#), "");
        let report = validate_generated_manifest(&without_imscp);
        assert!(!report.is_valid());
        assert!(report.has_issue("MISSING_NAMESPACE"));
    }

    #[test]
    fn test_happy_path_package_validation() {
        let validation = validate_package(&input_fixture());
        assert!(validation.report.is_valid());
        let xml = validation.manifest_xml.unwrap();
        assert!(xml.contains(r#"identifier="pkg-1""#));
    }
}
