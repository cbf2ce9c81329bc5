//! Pipeline behind the `protomerge` subcommands.
//!
//! - `merge`: load the hierarchy and observation documents, merge, run the
//!   post-passes, write `classes.json` and `prototypes.json`
//! - `show`: read those two documents back and print a class's effective
//!   vtable
//!
//! All functions return `Result<T, MergeError>`; the binary turns errors
//! into a JSON error response and an exit code. Merge diagnostics are part
//! of the report, never errors.

use std::fs;
use std::path::Path;

use tracing::info;

use protomerge_core::config::MergeConfig;
use protomerge_core::error::MergeError;
use protomerge_core::hierarchy::ClassHierarchy;
use protomerge_core::load::{load_hierarchy, load_json, load_observations, LoadedObservations};
use protomerge_core::lookup::{EffectiveVtable, ExportedTables};
use protomerge_core::merge::merge;
use protomerge_core::output::{
    class_entries, prototype_entries, write_document, ClassEntry, MergeReport, PrototypeEntry,
    ReportCounts, VtableEncoding, WrittenOutputs, CLASSES_FILE, PROTOTYPES_FILE, REPORT_FILE,
};
use protomerge_core::synth::{fix_void_getters, synthesize_placeholders};

/// Everything a merge produces, before anything is written.
#[derive(Debug, Clone)]
pub struct MergeArtifacts {
    pub classes: Vec<ClassEntry>,
    pub prototypes: Vec<PrototypeEntry>,
    pub report: MergeReport,
}

/// Merge loaded observations over `hierarchy` and run the post-passes.
pub fn build_artifacts(
    hierarchy: &ClassHierarchy,
    loaded: LoadedObservations,
    encoding: VtableEncoding,
    fix_getters: bool,
) -> MergeArtifacts {
    let classes_dropped = loaded.dropped_classes();
    let output = merge(hierarchy, &loaded.store);

    let (prototypes, getters_fixed) = if fix_getters {
        fix_void_getters(output.prototypes)
    } else {
        (output.prototypes, 0)
    };
    let (prototypes, placeholders_synthesized) = synthesize_placeholders(prototypes);

    let counts = ReportCounts {
        classes: output.stats.classes_total,
        classes_resolved: output.stats.classes_resolved,
        classes_unobserved: output.stats.classes_unobserved,
        classes_failed: output.stats.classes_failed,
        classes_dropped,
        prototypes: prototypes.len(),
        placeholders_synthesized,
        getters_fixed,
        diagnostics: output.diagnostics.len(),
    };

    MergeArtifacts {
        classes: class_entries(&output.classes, encoding),
        prototypes: prototype_entries(&prototypes),
        report: MergeReport::new(counts, loaded.documents, output.diagnostics.into_vec()),
    }
}

/// Run a full merge and write the output documents under the configured
/// output directory. With `write_report`, the report is also written as
/// `report.json`.
pub fn run_merge(
    config: &MergeConfig,
    classes_path: &Path,
    observations_dir: &Path,
    write_report: bool,
) -> Result<MergeReport, MergeError> {
    let out_dir = &config.out_dir.value;
    refuse_output_into_observations(observations_dir, out_dir)?;

    let hierarchy = load_hierarchy(classes_path)?;
    let loaded = load_observations(
        observations_dir,
        &config.observation_glob.value,
        &hierarchy,
    )?;
    let artifacts = build_artifacts(
        &hierarchy,
        loaded,
        config.vtable_encoding.value,
        config.fix_getters.value,
    );

    fs::create_dir_all(out_dir).map_err(|e| MergeError::WriteFailed {
        path: out_dir.display().to_string(),
        message: e.to_string(),
    })?;

    let classes_out = out_dir.join(CLASSES_FILE);
    let prototypes_out = out_dir.join(PROTOTYPES_FILE);
    refuse_overwrite(classes_path, &classes_out)?;
    refuse_overwrite(classes_path, &prototypes_out)?;

    let pretty = config.pretty.value;
    write_document(&classes_out, &artifacts.classes, pretty)?;
    write_document(&prototypes_out, &artifacts.prototypes, pretty)?;

    let mut report = artifacts.report;
    let report_out = write_report.then(|| out_dir.join(REPORT_FILE));
    report.outputs = Some(WrittenOutputs {
        classes: classes_out.display().to_string(),
        prototypes: prototypes_out.display().to_string(),
        report: report_out.as_ref().map(|p| p.display().to_string()),
    });
    if let Some(path) = &report_out {
        write_document(path, &report, pretty)?;
    }

    info!(
        out_dir = %out_dir.display(),
        prototypes = report.counts.prototypes,
        "wrote output documents"
    );
    Ok(report)
}

/// The hierarchy input must survive the run.
fn refuse_overwrite(input: &Path, output: &Path) -> Result<(), MergeError> {
    let same = match (fs::canonicalize(input), fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(MergeError::InvalidArguments {
            message: format!(
                "output {} would overwrite the hierarchy input",
                output.display()
            ),
            details: Some(serde_json::json!({ "path": input.display().to_string() })),
        });
    }
    Ok(())
}

/// Output documents must not land where the next run reads observations.
fn refuse_output_into_observations(observations_dir: &Path, out_dir: &Path) -> Result<(), MergeError> {
    let same = match (fs::canonicalize(observations_dir), fs::canonicalize(out_dir)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(MergeError::InvalidArguments {
            message: format!(
                "output directory {} is the observation directory",
                out_dir.display()
            ),
            details: Some(serde_json::json!({ "path": observations_dir.display().to_string() })),
        });
    }
    Ok(())
}

/// Effective vtable of `class` from previously exported documents.
pub fn run_show(
    classes_path: &Path,
    prototypes_path: &Path,
    class: &str,
) -> Result<EffectiveVtable, MergeError> {
    let classes: Vec<ClassEntry> = load_json(classes_path)?;
    let prototypes: Vec<PrototypeEntry> = load_json(prototypes_path)?;
    let tables = ExportedTables::new(classes, prototypes);
    Ok(tables.effective_vtable(class)?)
}
