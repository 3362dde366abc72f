//! Configuration constants and validation functions for the interop engine.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{InteropError, Result};

/// IMS QTI 2.2 item namespace. Generated XML must carry this verbatim.
pub const QTI_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imsqti_v2p2";

/// Namespace for the opaque `<pie:sourceModel>` extension block.
pub const PIE_EXTENSION_NAMESPACE: &str = "http://pie-framework.org/xsd/pie-interop";

/// IMS Content Packaging namespace for `imsmanifest.xml`.
pub const IMSCP_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imscp_v1p1";

/// Resource type for a QTI 2.2 assessment item in a content package.
pub const QTI_ITEM_RESOURCE_TYPE: &str = "imsqti_item_xmlv2p2";

/// Resource type for a QTI 2.2 assessment (test) in a content package.
pub const QTI_TEST_RESOURCE_TYPE: &str = "imsqti_test_xmlv2p2";

/// Resource type for shared passage content in a content package.
pub const PASSAGE_RESOURCE_TYPE: &str = "webcontent";

/// Response identifier used for generated single-response interactions.
pub const DEFAULT_RESPONSE_ID: &str = "RESPONSE";

/// Identifier pattern for items, passages and resources:
/// leading letter or underscore, then word characters, dots or dashes.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.-]*$").expect("valid regex"));

/// Build the deterministic side-file path for an external passage.
///
/// # Examples
/// ```
/// use pie_interop::config::passage_file_path;
///
/// assert_eq!(passage_file_path("abc"), "passages/abc.xml");
/// ```
#[must_use]
pub fn passage_file_path(passage_id: &str) -> String {
    format!("passages/{passage_id}.xml")
}

/// Validate an item/passage identifier.
///
/// # Errors
/// Returns [`InteropError::Registry`] if the identifier is empty or contains
/// characters that are unsafe in XML identifiers and file paths.
pub fn validate_identifier(id: &str) -> Result<()> {
    if IDENTIFIER_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(InteropError::Registry(format!(
            "invalid identifier '{id}': expected a leading letter or underscore followed by word characters, dots or dashes"
        )))
    }
}

/// Check whether a package identifier contains characters that trip up
/// strict IMS packaging tools (whitespace or XML-special characters).
#[must_use]
pub fn has_unsafe_package_chars(id: &str) -> bool {
    id.chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '&' | '\''))
}
