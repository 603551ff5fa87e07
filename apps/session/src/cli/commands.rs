//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands, plus the
//! file I/O the core leaves to the application.

use crate::config::Config;
use serde_json::{Value, json};
use session_core::primitives::DEFAULT_RELATIONSHIP;
use session_core::{Attribute, Color, Point, Session, SessionError, Vector};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE FORMATS
// =============================================================================

/// On-disk representation of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON interchange document.
    Json,
    /// Binary snapshot (header + postcard payload).
    Snapshot,
}

impl FileFormat {
    /// `.bin` means snapshot; anything else is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => Self::Snapshot,
            _ => Self::Json,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Snapshot => "snapshot",
        }
    }
}

// =============================================================================
// INPUT AND OUTPUT PATHS
// =============================================================================

/// Resolve a session file to read.
///
/// The path must name a regular file no larger than `max_size`; the returned
/// path has symlinks and `..` resolved.
fn resolve_input(path: &Path, max_size: u64) -> Result<PathBuf, SessionError> {
    let resolved = path.canonicalize().map_err(|e| {
        SessionError::IoError(format!("cannot open session file {}: {e}", path.display()))
    })?;
    let metadata = std::fs::metadata(&resolved).map_err(|e| {
        SessionError::IoError(format!("cannot stat session file {}: {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(SessionError::IoError(format!(
            "{} is not a session file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(SessionError::SerializationError(format!(
            "{} is {} bytes; the configured limit is {max_size}",
            path.display(),
            metadata.len()
        )));
    }
    Ok(resolved)
}

/// Resolve a session file to write.
///
/// The file itself may not exist yet, but its directory must. A bare file
/// name is taken relative to the working directory.
fn resolve_output(path: &Path) -> Result<PathBuf, SessionError> {
    let file_name = path.file_name().ok_or_else(|| {
        SessionError::IoError(format!("{} does not name a file", path.display()))
    })?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let directory = directory
        .canonicalize()
        .ok()
        .filter(|resolved| resolved.is_dir())
        .ok_or_else(|| {
            SessionError::IoError(format!(
                "cannot write {}: directory {} does not exist",
                path.display(),
                directory.display()
            ))
        })?;
    Ok(directory.join(file_name))
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

/// Read a session file; the extension picks the format.
pub fn load_session(path: &Path, config: &Config) -> Result<Session, SessionError> {
    let resolved = resolve_input(path, config.max_file_size)?;

    let bytes = std::fs::read(&resolved)
        .map_err(|e| SessionError::IoError(format!("Failed to read '{}': {}", path.display(), e)))?;

    let format = FileFormat::from_path(path);
    let session = match format {
        FileFormat::Snapshot => Session::from_bytes(&bytes)?,
        FileFormat::Json => {
            let text = std::str::from_utf8(&bytes).map_err(|e| {
                SessionError::SerializationError(format!("File is not UTF-8: {}", e))
            })?;
            Session::from_json_str(text)?
        }
    };

    tracing::info!(
        path = %path.display(),
        format = format.label(),
        entities = session.len(),
        "session loaded"
    );
    Ok(session)
}

/// Write a session file; the extension picks the format.
pub fn save_session(session: &Session, path: &Path, config: &Config) -> Result<(), SessionError> {
    let resolved = resolve_output(path)?;
    let format = FileFormat::from_path(path);

    let bytes = match format {
        FileFormat::Snapshot => session.to_bytes()?,
        FileFormat::Json => session.to_json_string(config.pretty)?.into_bytes(),
    };

    std::fs::write(&resolved, &bytes)
        .map_err(|e| SessionError::IoError(format!("Failed to write '{}': {}", path.display(), e)))?;

    tracing::info!(
        path = %path.display(),
        format = format.label(),
        bytes = bytes.len(),
        "session saved"
    );
    Ok(())
}

// =============================================================================
// REPORTS
// =============================================================================

/// Summary of a session for `inspect`.
#[must_use]
pub fn inspect_report(session: &Session) -> Value {
    let tree = session.tree();
    let graph = session.graph();
    json!({
        "name": session.name(),
        "guid": session.guid().to_string(),
        "points": session.objects().points().count(),
        "vectors": session.objects().vectors().count(),
        "vertices": graph.number_of_vertices(),
        "edges": graph.number_of_edges(),
        "tree_nodes": tree.len(),
        "leaves": tree.leaves().count(),
        "root": tree.root().map(|root| root.name().to_string()),
    })
}

/// Build the sample session written by `demo`.
///
/// Three points and one vector: the first point is the root, the vector is
/// moved under the second point, and the points are related in a chain.
pub fn build_demo_session(name: &str) -> Result<Session, SessionError> {
    let mut session = Session::new(name);

    let origin = Point::new(session.next_guid(), 0.0, 0.0, 0.0).with_name("origin");
    let mut corner = Point::new(session.next_guid(), 1.0, 1.0, 0.0).with_name("corner");
    corner.pointcolor = Color::black(session.next_guid());
    corner.width = 2.0;
    let apex = Point::new(session.next_guid(), 0.5, 0.5, 1.0).with_name("apex");
    let normal = Vector::new(session.next_guid(), 0.0, 0.0, 1.0).with_name("normal");

    let origin = session.add_point(origin)?;
    let corner = session.add_point(corner)?;
    let apex = session.add_point(apex)?;
    let normal = session.add_vector(normal)?;

    session.add_hierarchy(corner, normal)?;
    session.add_relationship(origin, corner, "edge")?;
    session.add_relationship(corner, apex, "edge")?;
    session.add_relationship(apex, normal, DEFAULT_RELATIONSHIP)?;
    session.graph_mut().set_edge_attribute(
        &origin.to_string(),
        &corner.to_string(),
        Attribute::structured([("kind", "edge"), ("length", "1.414")]),
    )?;

    Ok(session)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Show counts and the hierarchy of a session file.
pub fn cmd_inspect(input: &Path, config: &Config, json_mode: bool) -> Result<(), SessionError> {
    let session = load_session(input, config)?;
    let report = inspect_report(&session);

    if json_mode {
        let mut report = report;
        report["hierarchy"] = Value::String(session.tree().render_hierarchy());
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Session: {} ({})", session.name(), session.guid());
    println!("==================");
    println!("Points:     {}", report["points"]);
    println!("Vectors:    {}", report["vectors"]);
    println!("Vertices:   {}", report["vertices"]);
    println!("Edges:      {}", report["edges"]);
    println!("Tree nodes: {}", report["tree_nodes"]);
    println!();
    println!("{}", session.tree().render_hierarchy());

    Ok(())
}

/// Check cross-structure consistency of a session file.
pub fn cmd_validate(input: &Path, config: &Config, json_mode: bool) -> Result<(), SessionError> {
    let session = load_session(input, config)?;
    let result = session.validate();

    if json_mode {
        let output = json!({
            "file": input.to_string_lossy(),
            "valid": result.is_ok(),
            "error": result.as_ref().err().map(ToString::to_string),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else if result.is_ok() {
        println!("OK: {} entities consistent", session.len());
    }

    result
}

/// Convert between JSON and binary snapshot.
pub fn cmd_convert(
    input: &Path,
    output: &Path,
    config: &Config,
    json_mode: bool,
) -> Result<(), SessionError> {
    let session = load_session(input, config)?;
    save_session(&session, output, config)?;

    let from = FileFormat::from_path(input).label();
    let to = FileFormat::from_path(output).label();
    if json_mode {
        let report = json!({
            "input": input.to_string_lossy(),
            "output": output.to_string_lossy(),
            "from": from,
            "to": to,
            "entities": session.len(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        println!(
            "Converted {} ({}) -> {} ({})",
            input.display(),
            from,
            output.display(),
            to
        );
    }
    Ok(())
}

/// Write the sample session.
pub fn cmd_demo(output: &Path, config: &Config, json_mode: bool) -> Result<(), SessionError> {
    let session = build_demo_session(&config.session_name)?;
    save_session(&session, output, config)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&inspect_report(&session)).unwrap_or_default()
        );
    } else {
        println!("Wrote {} to {}", session, output.display());
        println!("{}", session.tree().render_hierarchy());
    }
    Ok(())
}
