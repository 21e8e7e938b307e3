//! Mesh traversal: the run loop that turns every face into an exported panel.

use super::canonical::canonicalize;
use super::classify::classify_face;
use super::config::PanelizeOptions;
use super::encode::{encode, required_digits};
use super::error::PanelError;
use super::placement::{solve_for_face, TemplateBasis};
use super::side::Triangle;
use super::template::ResolvedTemplate;
use super::validate::{validate, Validation, ValidationFlag};
use crate::geometry::Transform3;
use crate::kernel::{Appearance, KernelOpError, MeshHost, PanelKernel};
use crate::topo::{FaceId, PanelId, RunId, VisitedEdgeIndex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Operator answer to a per-triangle problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Continue,
    Abort,
}

/// The person (or policy) supervising a run.
pub trait Operator {
    /// Asked once before any work, with the mesh's face and unique edge counts.
    fn confirm_start(&mut self, faces: usize, unique_edges: usize) -> bool;

    /// A triangle could not be sized or exported. `Continue` skips it.
    fn on_triangle_error(&mut self, record: &TriangleRecord, error: &TriangleError) -> Decision;

    /// A triangle failed validation. Only asked when prompting is enabled.
    fn on_invalid_triangle(&mut self, record: &TriangleRecord) -> Decision;

    /// A triangle has been fully handled.
    fn report_triangle(&mut self, _record: &TriangleRecord) {}

    /// Polled between faces.
    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Operator that accepts the run and continues past every problem.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Operator for Unattended {
    fn confirm_start(&mut self, _faces: usize, _unique_edges: usize) -> bool {
        true
    }

    fn on_triangle_error(&mut self, _record: &TriangleRecord, _error: &TriangleError) -> Decision {
        Decision::Continue
    }

    fn on_invalid_triangle(&mut self, _record: &TriangleRecord) -> Decision {
        Decision::Continue
    }
}

/// Failure confined to one triangle.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriangleError {
    #[error("Template rejected {parameter}: {cause}")]
    SideRejected { parameter: String, cause: KernelOpError },

    #[error("Combine failed: {0}")]
    Assemble(KernelOpError),

    #[error("Export failed: {0}")]
    Export(KernelOpError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriangleOutcome {
    /// Classified and validated; the run stopped before export.
    Classified,
    DryRun,
    Exported,
    Skipped(TriangleError),
}

/// Everything known about one face after it has been handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleRecord {
    pub face: FaceId,
    pub panel_id: PanelId,
    /// Canonical sides, longest first.
    pub triangle: Triangle,
    pub validation: Validation,
    pub outcome: TriangleOutcome,
    pub exported_path: Option<PathBuf>,
    pub placement: Option<Transform3>,
}

impl TriangleRecord {
    fn new(mesh_name: &str, face: FaceId, triangle: Triangle, validation: Validation) -> Self {
        Self {
            face,
            panel_id: PanelId::derive(mesh_name, triangle.indices()),
            triangle,
            validation,
            outcome: TriangleOutcome::Classified,
            exported_path: None,
            placement: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The operator declined the start confirmation.
    Declined,
    Cancelled,
    OperatorAbort { face: FaceId, cause: String },
    Fatal(PanelError),
}

impl From<PanelError> for AbortReason {
    fn from(err: PanelError) -> Self {
        AbortReason::Fatal(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraversalStatus {
    Done,
    Aborted(AbortReason),
}

/// Where the driver is in its per-face cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalState {
    Idle,
    Classify(FaceId),
    Canonicalize,
    Validate,
    Export,
    Skip,
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelizeReport {
    pub run_id: RunId,
    pub mesh_name: String,
    pub status: TraversalStatus,
    /// Faces in the mesh.
    pub faces: usize,
    pub unique_edges: usize,
    /// Key strip width of the template; zero when the template was never resolved.
    pub binary_digits: usize,
    pub triangles: Vec<TriangleRecord>,
    pub warnings: Vec<String>,
}

impl PanelizeReport {
    pub fn is_done(&self) -> bool {
        self.status == TraversalStatus::Done
    }

    pub fn exported(&self) -> impl Iterator<Item = &TriangleRecord> {
        self.triangles.iter().filter(|t| t.outcome == TriangleOutcome::Exported)
    }
}

/// `<mesh>_<i1>_<i2>_<i3>__<l1>_<l2>_<l3>.<ext>`, lengths in mm with three decimals.
///
/// Path separators and characters hosts refuse in file names are replaced with `_` in the
/// mesh name, so the result is always a single path component.
pub fn panel_file_name(mesh_name: &str, triangle: &Triangle, extension: &str) -> String {
    let stem: String = mesh_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let [i1, i2, i3] = triangle.indices();
    let [l1, l2, l3] = triangle.lengths();
    format!(
        "{}_{}_{}_{}__{:.3}_{:.3}_{:.3}.{}",
        stem, i1, i2, i3, l1, l2, l3, extension
    )
}

enum FaceFailure {
    Triangle(TriangleError),
    Fatal(PanelError),
}

impl From<TriangleError> for FaceFailure {
    fn from(err: TriangleError) -> Self {
        FaceFailure::Triangle(err)
    }
}

impl From<PanelError> for FaceFailure {
    fn from(err: PanelError) -> Self {
        FaceFailure::Fatal(err)
    }
}

/// Checks that must pass before the operator is even asked to start.
fn prepare<H, K>(
    host: &H,
    kernel: &K,
    options: &PanelizeOptions,
    faces: &[FaceId],
    unique_edges: usize,
) -> Result<ResolvedTemplate<K::Body>, PanelError>
where
    H: MeshHost + ?Sized,
    K: PanelKernel,
{
    let template = ResolvedTemplate::resolve(kernel, &options.template, &options.core_overrides)?;

    let required = required_digits(unique_edges);
    if required > template.digits {
        return Err(PanelError::InsufficientDigits {
            required,
            available: template.digits,
            unique_edges,
        });
    }

    for &face in faces {
        let edges = host.edges_of(face)?.len();
        if edges != 3 {
            return Err(PanelError::NonTriangularFace { face, edges });
        }
    }

    Ok(template)
}

/// Panelize every face of `host`'s mesh using the template held by `kernel`.
///
/// Setup problems (missing template assets, too few key digits, non-triangular faces) end
/// the run before the operator is asked to start, so nothing is exported. Panels exported
/// before a later abort or cancel stay on disk.
pub fn panelize<H, K, O>(host: &H, kernel: &mut K, operator: &mut O, options: &PanelizeOptions) -> PanelizeReport
where
    H: MeshHost + ?Sized,
    K: PanelKernel,
    O: Operator + ?Sized,
{
    let faces = host.list_faces();
    let unique_edges = host.unique_edge_count();
    let mut report = PanelizeReport {
        run_id: RunId::new(),
        mesh_name: host.mesh_name().to_string(),
        status: TraversalStatus::Done,
        faces: faces.len(),
        unique_edges,
        binary_digits: 0,
        triangles: Vec::new(),
        warnings: Vec::new(),
    };
    info!(
        "Run {}: panelizing '{}' ({} faces, {} unique edges)",
        report.run_id, report.mesh_name, report.faces, unique_edges
    );

    let template = match prepare(host, kernel, options, &faces, unique_edges) {
        Ok(template) => template,
        Err(e) => {
            error!("Run {} aborted before start: {}", report.run_id, e);
            report.status = TraversalStatus::Aborted(AbortReason::Fatal(e));
            return report;
        }
    };
    report.binary_digits = template.digits;

    if !operator.confirm_start(faces.len(), unique_edges) {
        info!("Run {} declined by operator", report.run_id);
        report.status = TraversalStatus::Aborted(AbortReason::Declined);
        return report;
    }

    if !options.dry_run {
        if let Err(e) = std::fs::create_dir_all(&options.output_dir) {
            let err = PanelError::OutputDirectory(format!("{}: {}", options.output_dir.display(), e));
            error!("Run {} aborted: {}", report.run_id, err);
            report.status = TraversalStatus::Aborted(AbortReason::Fatal(err));
            return report;
        }
    }

    let mut traversal = Traversal {
        host,
        kernel,
        operator,
        options,
        basis: TemplateBasis::for_thickness(options.panel_thickness),
        template,
        visited: VisitedEdgeIndex::new(),
        state: TraversalState::Idle,
        report,
    };
    traversal.run(&faces);
    traversal.report
}

struct Traversal<'a, H: ?Sized, K: PanelKernel, O: ?Sized> {
    host: &'a H,
    kernel: &'a mut K,
    operator: &'a mut O,
    options: &'a PanelizeOptions,
    basis: TemplateBasis,
    template: ResolvedTemplate<K::Body>,
    visited: VisitedEdgeIndex,
    state: TraversalState,
    report: PanelizeReport,
}

impl<'a, H, K, O> Traversal<'a, H, K, O>
where
    H: MeshHost + ?Sized,
    K: PanelKernel,
    O: Operator + ?Sized,
{
    fn enter(&mut self, state: TraversalState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.report.warnings.push(message);
    }

    fn run(&mut self, faces: &[FaceId]) {
        let limit = self.options.triangle_limit();
        let mut outcome = Ok(());

        for &face in faces.iter().take(limit) {
            if self.operator.cancel_requested() {
                outcome = Err(AbortReason::Cancelled);
                break;
            }
            if let Err(reason) = self.process_face(face) {
                outcome = Err(reason);
                break;
            }
        }

        match outcome {
            Ok(()) => {
                self.enter(TraversalState::Done);
                info!(
                    "Run {} done: {} triangles, {} exported",
                    self.report.run_id,
                    self.report.triangles.len(),
                    self.report.exported().count()
                );
            }
            Err(reason) => {
                self.enter(TraversalState::Aborted);
                warn!("Run {} aborted: {:?}", self.report.run_id, reason);
                self.report.status = TraversalStatus::Aborted(reason);
            }
        }
    }

    fn process_face(&mut self, face: FaceId) -> Result<(), AbortReason> {
        self.enter(TraversalState::Classify(face));
        let classified = classify_face(self.host, face, &mut self.visited)?;
        for (edge, e) in &classified.convexity_errors {
            self.report
                .warnings
                .push(format!("{}: convexity of {} unknown ({}), treated as not convex", face, edge, e));
        }

        self.enter(TraversalState::Canonicalize);
        let triangle = canonicalize(classified.sides);

        self.enter(TraversalState::Validate);
        let validation = validate(triangle.lengths(), &self.options.thresholds);
        let mut record = TriangleRecord::new(self.host.mesh_name(), face, triangle, validation);

        if let Err(reason) = self.flag_invalid(&record) {
            self.commit(record);
            return Err(reason);
        }

        if self.options.dry_run {
            self.enter(TraversalState::Skip);
            record.outcome = TriangleOutcome::DryRun;
            self.commit(record);
            self.enter(TraversalState::Idle);
            return Ok(());
        }

        self.enter(TraversalState::Export);
        match self.export(&mut record) {
            Ok(()) => {}
            Err(FaceFailure::Fatal(e)) => return Err(e.into()),
            Err(FaceFailure::Triangle(err)) => {
                warn!("Triangle on {} failed: {}", face, err);
                let decision = self.operator.on_triangle_error(&record, &err);
                self.enter(TraversalState::Skip);
                record.outcome = TriangleOutcome::Skipped(err.clone());
                self.commit(record);
                if decision == Decision::Abort {
                    return Err(AbortReason::OperatorAbort { face, cause: err.to_string() });
                }
                self.enter(TraversalState::Idle);
                return Ok(());
            }
        }

        self.commit(record);
        self.enter(TraversalState::Idle);
        Ok(())
    }

    fn flag_invalid(&mut self, record: &TriangleRecord) -> Result<(), AbortReason> {
        let appearance = match record.validation.flag {
            ValidationFlag::Ok => return Ok(()),
            ValidationFlag::ShortSide => Appearance::ShortSide,
            ValidationFlag::ShortAltitude => Appearance::ShortAltitude,
        };
        debug!(
            "{} fails validation: {:?}, altitude {:.3} mm",
            record.face, record.validation.flag, record.validation.altitude
        );

        if self.options.color_invalid_triangles {
            if let Err(e) = self.kernel.set_appearance(record.face, appearance) {
                self.warn(format!("Could not mark {}: {}", record.face, e));
            }
        }

        if self.options.prompt_on_invalid && self.operator.on_invalid_triangle(record) == Decision::Abort {
            return Err(AbortReason::OperatorAbort {
                face: record.face,
                cause: format!("triangle failed validation ({:?})", record.validation.flag),
            });
        }
        Ok(())
    }

    /// Drive the side parameters. Only a rejected third side fails the triangle.
    fn drive_sides(&mut self, triangle: &Triangle) -> Result<(), TriangleError> {
        let lengths = triangle.lengths();
        for slot in 0..3 {
            let parameter = self.template.side_parameters[slot].clone();
            if let Err(cause) = self.kernel.set_parametric_length(&parameter, lengths[slot]) {
                if slot == 2 {
                    return Err(TriangleError::SideRejected { parameter, cause });
                }
                self.warn(format!("Ignoring rejected {} = {:.3} mm: {}", parameter, lengths[slot], cause));
            }
        }
        Ok(())
    }

    /// Bit bodies for sides one to three, then hinge bodies for sides one to three.
    fn parts_for(&self, triangle: &Triangle) -> Result<Vec<K::Body>, PanelError> {
        let mut parts = Vec::new();
        for (slot, side) in triangle.sides.iter().enumerate() {
            let pattern = encode(side, self.template.digits)?;
            parts.extend(self.template.key_bodies(slot, &pattern.parts)?);
        }
        for (slot, side) in triangle.sides.iter().enumerate() {
            parts.extend(self.template.hinge_bodies(slot, side.hinge).iter().cloned());
        }
        Ok(parts)
    }

    fn export(&mut self, record: &mut TriangleRecord) -> Result<(), FaceFailure> {
        let triangle = record.triangle;
        self.drive_sides(&triangle)?;
        let parts = self.parts_for(&triangle)?;

        let frame = self.template.frame_for(record.face);
        let assembly = self.kernel.assemble(frame, &parts).map_err(TriangleError::Assemble)?;

        let file_name = panel_file_name(self.host.mesh_name(), &triangle, self.kernel.export_extension());
        let path = self.options.output_dir.join(file_name);
        let exported = self.kernel.export_panel(&assembly, &path);

        if exported.is_ok() {
            debug!("Exported {} as {}", record.face, path.display());
            record.exported_path = Some(path);
            record.outcome = TriangleOutcome::Exported;
            if self.options.preview_assembly {
                record.placement = self.place(record.face, &triangle, &assembly);
            }
        }

        self.kernel.release(assembly);
        exported.map_err(|e| TriangleError::Export(e).into())
    }

    fn place(&mut self, face: FaceId, triangle: &Triangle, assembly: &K::Assembly) -> Option<Transform3> {
        match solve_for_face(self.host, face, &self.basis, triangle) {
            Ok(transform) => match self.kernel.place_in_preview(assembly, &transform) {
                Ok(()) => Some(transform),
                Err(e) => {
                    self.warn(format!("Could not place {} in preview: {}", face, e));
                    None
                }
            },
            Err(e) => {
                self.warn(format!("No placement for {}: {}", face, e));
                None
            }
        }
    }

    fn commit(&mut self, record: TriangleRecord) {
        debug!("{} [{}] {:?}", record.face, record.triangle, record.outcome);
        if self.options.report_each_triangle {
            self.operator.report_triangle(&record);
        }
        self.report.triangles.push(record);
    }
}
