//! Command-line interface for the interop engine.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;

use crate::detect::FormatDetectorRegistry;
use crate::engine::{InteropEngine, TransformContext};
use crate::error::{InteropError, Result};
use crate::manifest::{self, ManifestEntry, ManifestInput, Severity};
use crate::model::{ContentInput, FormatId, PassageStrategy, TransformInput, TransformOptions};

/// PIE interop - transform assessment items between QTI 2.2 and PIE JSON.
#[derive(Parser)]
#[command(name = "pie-interop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the format of an input file.
    Detect {
        /// Item file (QTI XML or PIE JSON)
        file: PathBuf,
    },
    /// Transform one item to the other format.
    Transform {
        /// Item file (QTI XML or PIE JSON)
        file: PathBuf,

        /// Target format (qti22 or pie); default: the opposite of the detected format
        #[arg(long)]
        to: Option<String>,

        /// Passage strategy (inline or external)
        #[arg(long)]
        passages: Option<String>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build and validate an IMS content-package manifest.
    Package {
        /// Transformed QTI item files
        items: Vec<PathBuf>,

        /// Passage files referenced by the items
        #[arg(long = "passage")]
        passages: Vec<PathBuf>,

        /// Package identifier
        #[arg(long, default_value = "package")]
        id: String,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { file } => detect_command(&file).await,
        Commands::Transform {
            file,
            to,
            passages,
            output,
        } => transform_command(&file, to.as_deref(), passages.as_deref(), output.as_deref()).await,
        Commands::Package {
            items,
            passages,
            id,
            output,
        } => package_command(&items, &passages, &id, output.as_deref()).await,
    }
}

async fn detect_command(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let detectors = FormatDetectorRegistry::with_defaults();

    match detectors.detect_format(&ContentInput::Text(content)).await {
        Some(format) => println!("{}", style(format.as_str()).green()),
        None => println!("{}", style("unknown").yellow()),
    }
    Ok(())
}

async fn transform_command(
    file: &Path,
    to: Option<&str>,
    passages: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    // A target format implies the source format.
    let source_format = match to {
        Some("qti22") => Some(FormatId::Pie),
        Some("pie") => Some(FormatId::Qti22),
        Some(other) => {
            return Err(InteropError::UnknownFormat {
                hint: Some(format!("unknown target format '{other}', expected qti22 or pie")),
            })
        }
        None => None,
    };
    let passage_strategy = match passages {
        Some("inline") => Some(PassageStrategy::Inline),
        Some("external") => Some(PassageStrategy::External),
        Some(other) => {
            return Err(InteropError::Registry(format!(
                "unknown passage strategy '{other}', expected inline or external"
            )))
        }
        None => None,
    };

    let output_dir = output.unwrap_or_else(|| Path::new("."));
    validate_output_dir(output_dir)?;

    let content = tokio::fs::read_to_string(file).await?;
    let engine = InteropEngine::new();
    let ctx = TransformContext::new().with_options(TransformOptions { passage_strategy });
    let input = TransformInput {
        content: ContentInput::Text(content),
        format: source_format,
    };

    let result = engine.transform(&input, &ctx).await?;

    for item in &result.items {
        let extension = match item.format {
            FormatId::Qti22 => "xml",
            FormatId::Pie => "json",
        };
        let path = output_dir.join(format!("{}.{extension}", item.id));
        tokio::fs::write(&path, &item.content).await?;
        println!(
            "{} {} ({})",
            style("Wrote").green().bold(),
            path.display(),
            item.format
        );
    }
    for passage_file in &result.passage_files {
        let path = output_dir.join(&passage_file.file_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &passage_file.xml).await?;
        println!("{} {}", style("Wrote").green().bold(), path.display());
    }

    if let Some(fidelity) = &result.metadata.fidelity {
        if fidelity != "full" {
            println!("  Fidelity: {}", style(fidelity).yellow());
        }
    }
    for warning in &result.metadata.warnings {
        println!("  {} {warning}", style("Warning:").yellow().bold());
    }
    Ok(())
}

async fn package_command(
    items: &[PathBuf],
    passages: &[PathBuf],
    package_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let output_dir = output.unwrap_or_else(|| Path::new("."));
    validate_output_dir(output_dir)?;

    let input = ManifestInput {
        package_id: package_id.to_string(),
        passages: passages.iter().map(|p| file_entry(p)).collect(),
        items: items.iter().map(|p| file_entry(p)).collect(),
        assessments: Vec::new(),
    };

    let validation = manifest::validate_package(&input);
    for issue in &validation.report.issues {
        let label = match issue.severity {
            Severity::Error => style("error").red().bold(),
            Severity::Warning => style("warning").yellow().bold(),
        };
        println!("  {label} [{}] {}", issue.code, issue.message);
    }

    let Some(xml) = validation.manifest_xml else {
        return Err(InteropError::Registry(format!(
            "manifest validation failed with {} issue(s)",
            validation.report.issues.len()
        )));
    };

    let path = output_dir.join("imsmanifest.xml");
    tokio::fs::write(&path, xml).await?;
    println!(
        "{} {}",
        style("Wrote").green().bold(),
        path.display()
    );
    Ok(())
}

/// Manifest entry for a file on disk: the stem is the resource id.
fn file_entry(path: &Path) -> ManifestEntry {
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    ManifestEntry {
        id,
        file_path: path.to_string_lossy().into_owned(),
        title: None,
        dependencies: Vec::new(),
    }
}

fn validate_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(InteropError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Output directory does not exist: {}", dir.display()),
        )));
    }
    if !dir.is_dir() {
        return Err(InteropError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Output path is not a directory: {}", dir.display()),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_detect() {
        let cli = Cli::parse_from(["pie-interop", "detect", "item.xml"]);
        let Commands::Detect { file } = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(file, PathBuf::from("item.xml"));
    }

    #[test]
    fn test_cli_parse_transform_with_flags() {
        let cli = Cli::parse_from([
            "pie-interop",
            "transform",
            "item.json",
            "--to",
            "qti22",
            "--passages",
            "external",
            "--output",
            "out",
        ]);
        let Commands::Transform {
            file,
            to,
            passages,
            output,
        } = cli.command
        else {
            panic!("expected transform");
        };
        assert_eq!(file, PathBuf::from("item.json"));
        assert_eq!(to.as_deref(), Some("qti22"));
        assert_eq!(passages.as_deref(), Some("external"));
        assert_eq!(output, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_cli_parse_package() {
        let cli = Cli::parse_from([
            "pie-interop",
            "package",
            "a.xml",
            "b.xml",
            "--passage",
            "passages/p.xml",
            "--id",
            "pkg-1",
        ]);
        let Commands::Package {
            items,
            passages,
            id,
            ..
        } = cli.command
        else {
            panic!("expected package");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(passages.len(), 1);
        assert_eq!(id, "pkg-1");
    }

    #[test]
    fn test_file_entry_uses_stem_as_id() {
        let entry = file_entry(Path::new("items/item-1.xml"));
        assert_eq!(entry.id, "item-1");
        assert_eq!(entry.file_path, "items/item-1.xml");
    }

    #[test]
    fn test_validate_output_dir_rejects_missing_dir() {
        assert!(validate_output_dir(Path::new("/definitely/not/here")).is_err());
    }

    #[tokio::test]
    async fn test_transform_command_writes_item_file() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("item.json");
        tokio::fs::write(
            &input_path,
            serde_json::json!({
                "id": "cli-item-1",
                "config": {"models": [{
                    "id": "1",
                    "element": "@pie-element/multiple-choice",
                    "choices": [{"value": "a", "label": "A", "correct": true}],
                    "choiceMode": "radio",
                    "shuffle": false
                }]}
            })
            .to_string(),
        )
        .await
        .unwrap();

        transform_command(&input_path, Some("qti22"), None, Some(dir.path()))
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(dir.path().join("cli-item-1.xml"))
            .await
            .unwrap();
        assert!(written.contains("<assessmentItem"));
    }

    #[tokio::test]
    async fn test_package_command_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        package_command(
            &[PathBuf::from("items/item-1.xml")],
            &[],
            "pkg-1",
            Some(dir.path()),
        )
        .await
        .unwrap();

        let written = tokio::fs::read_to_string(dir.path().join("imsmanifest.xml"))
            .await
            .unwrap();
        assert!(written.contains(r#"identifier="pkg-1""#));
    }

    #[tokio::test]
    async fn test_package_command_fails_on_empty_package() {
        let dir = tempfile::tempdir().unwrap();
        let err = package_command(&[], &[], "pkg-1", Some(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("manifest validation failed"));
    }
}
