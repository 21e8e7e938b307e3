use crate::geometry::Transform3;
use crate::kernel::{
    Appearance, BodyRef, KernelOpError, KernelResult, ManifestKernel, MemoryMesh, MeshData, MeshHost, PanelKernel,
    PanelManifest,
};
use crate::panel::{
    panel_file_name, panelize, AbortReason, CoreOverrides, Decision, HingeRole, Operator, PanelError,
    PanelizeOptions, TemplateConfig, TraversalStatus, TriangleError, TriangleOutcome, TriangleRecord, Unattended,
    ValidationFlag,
};
use crate::topo::FaceId;
use crate::units::LengthUnit;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn mesh(name: &str, vertices: Vec<[f64; 3]>, faces: Vec<Vec<u32>>) -> MemoryMesh {
    MemoryMesh::from_data(MeshData {
        name: name.into(),
        unit: LengthUnit::Millimeter,
        vertices,
        faces,
    })
    .unwrap()
}

/// Two faces folded down along the x axis, each with two open edges.
fn pair() -> MemoryMesh {
    mesh(
        "pair",
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 100.0, -30.0], [50.0, -100.0, -30.0]],
        vec![vec![0, 1, 2], vec![1, 0, 3]],
    )
}

fn octahedron() -> MemoryMesh {
    mesh(
        "octa",
        vec![
            [100.0, 0.0, 0.0],
            [-100.0, 0.0, 0.0],
            [0.0, 100.0, 0.0],
            [0.0, -100.0, 0.0],
            [0.0, 0.0, 100.0],
            [0.0, 0.0, -100.0],
        ],
        vec![
            vec![0, 2, 4],
            vec![2, 1, 4],
            vec![1, 3, 4],
            vec![3, 0, 4],
            vec![2, 0, 5],
            vec![1, 2, 5],
            vec![3, 1, 5],
            vec![0, 3, 5],
        ],
    )
}

/// Output directory for one test, removed when dropped.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Self {
        Scratch(std::env::temp_dir().join(format!("meshmaker-{}", uuid::Uuid::new_v4())))
    }

    fn options(&self) -> PanelizeOptions {
        PanelizeOptions {
            output_dir: self.0.clone(),
            ..PanelizeOptions::default()
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[derive(Default)]
struct Script {
    decline: bool,
    abort_on_error: bool,
    abort_on_invalid: bool,
    cancel_after: Option<usize>,
    started: Option<(usize, usize)>,
    errors: Vec<(FaceId, TriangleError)>,
    invalid: Vec<FaceId>,
    reported: Vec<FaceId>,
}

impl Operator for Script {
    fn confirm_start(&mut self, faces: usize, unique_edges: usize) -> bool {
        self.started = Some((faces, unique_edges));
        !self.decline
    }

    fn on_triangle_error(&mut self, record: &TriangleRecord, error: &TriangleError) -> Decision {
        self.errors.push((record.face, error.clone()));
        if self.abort_on_error { Decision::Abort } else { Decision::Continue }
    }

    fn on_invalid_triangle(&mut self, record: &TriangleRecord) -> Decision {
        self.invalid.push(record.face);
        if self.abort_on_invalid { Decision::Abort } else { Decision::Continue }
    }

    fn report_triangle(&mut self, record: &TriangleRecord) {
        self.reported.push(record.face);
    }

    fn cancel_requested(&self) -> bool {
        self.cancel_after.is_some_and(|n| self.reported.len() >= n)
    }
}

/// Hinge roles seen per edge index across all records.
fn roles_by_index(records: &[TriangleRecord]) -> HashMap<usize, Vec<HingeRole>> {
    let mut roles: HashMap<usize, Vec<HingeRole>> = HashMap::new();
    for record in records {
        for side in &record.triangle.sides {
            roles.entry(side.index).or_default().push(side.hinge);
        }
    }
    roles
}

#[test]
fn test_two_faces_sharing_an_edge() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let mut operator = Script::default();

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert!(report.is_done(), "{:?}", report.status);
    assert_eq!(operator.started, Some((2, 5)));
    assert_eq!(report.triangles.len(), 2);

    let shared = |record: &TriangleRecord| {
        *record.triangle.sides.iter().find(|s| s.index == 0).unwrap()
    };
    assert_eq!(shared(&report.triangles[0]).hinge, HingeRole::Male);
    assert_eq!(shared(&report.triangles[1]).hinge, HingeRole::Female);

    for record in &report.triangles {
        let open: Vec<_> = record.triangle.sides.iter().filter(|s| s.hinge == HingeRole::OpenEdge).collect();
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|s| !s.convex));
        assert!(shared(record).convex);
        assert_eq!(record.outcome, TriangleOutcome::Exported);
    }

    assert_eq!(report.triangles[0].triangle.indices(), [1, 2, 0]);
    assert_eq!(report.triangles[1].triangle.indices(), [3, 4, 0]);
    assert_eq!(kernel.exports.len(), 2);
    assert_eq!(kernel.open_assemblies, 0);
}

#[test]
fn test_closed_mesh_pairs_every_edge() {
    let scratch = Scratch::new();
    let host = octahedron();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);

    let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());

    assert!(report.is_done());
    assert_eq!(report.unique_edges, 12);
    assert_eq!(report.binary_digits, 4);

    let roles = roles_by_index(&report.triangles);
    assert_eq!(roles.len(), 12);
    for (index, seen) in roles {
        assert_eq!(seen.len(), 2, "edge {} seen {} times", index, seen.len());
        assert!(seen.contains(&HingeRole::Male) && seen.contains(&HingeRole::Female), "edge {}", index);
    }

    assert!(report
        .triangles
        .iter()
        .flat_map(|r| r.triangle.sides.iter())
        .all(|s| s.convex));
}

#[test]
fn test_sides_are_longest_first() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());

    for record in &report.triangles {
        let [a, b, c] = record.triangle.lengths();
        assert!(a >= b && a >= c);
    }
    // Side parameters were driven with the last triangle's canonical lengths.
    assert_eq!(kernel.exports[1].1.parameters["sideThree"], 100.0);
}

#[test]
fn test_indices_are_stable_across_runs() {
    let scratch = Scratch::new();
    let host = octahedron();
    let run = || {
        let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);
        let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());
        let names: Vec<_> = kernel
            .exports
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_owned())
            .collect();
        (report, names)
    };

    let (first, first_names) = run();
    let (second, second_names) = run();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first_names, second_names);
    for (a, b) in first.triangles.iter().zip(&second.triangles) {
        assert_eq!(a.triangle, b.triangle);
        assert_eq!(a.panel_id, b.panel_id);
    }
}

#[test]
fn test_cancel_between_faces() {
    let scratch = Scratch::new();
    let host = octahedron();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);
    let mut operator = Script { cancel_after: Some(3), ..Script::default() };
    let options = PanelizeOptions { report_each_triangle: true, ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut operator, &options);

    assert_eq!(report.status, TraversalStatus::Aborted(AbortReason::Cancelled));
    assert_eq!(report.triangles.len(), 3);
    assert_eq!(operator.reported, vec![FaceId(0), FaceId(1), FaceId(2)]);
    assert_eq!(kernel.exports.len(), 3);
    assert_eq!(kernel.open_assemblies, 0);
}

#[test]
fn test_triangle_limit() {
    let scratch = Scratch::new();
    let host = octahedron();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);
    let options = PanelizeOptions { max_triangles: Some(5), ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    assert!(report.is_done());
    assert_eq!(report.faces, 8);
    assert_eq!(report.triangles.len(), 5);
    assert_eq!(kernel.exports.len(), 5);
}

#[test]
fn test_dry_run_exports_nothing() {
    let scratch = Scratch::new();
    let host = octahedron();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);
    let options = PanelizeOptions { dry_run: true, ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    assert!(report.is_done());
    assert_eq!(report.triangles.len(), 8);
    assert!(report.triangles.iter().all(|r| r.outcome == TriangleOutcome::DryRun));
    assert!(report.triangles.iter().all(|r| r.exported_path.is_none()));
    assert!(kernel.exports.is_empty());
    assert_eq!(kernel.parameter_value("sideOne"), Some(100.0));
    assert!(!options.output_dir.exists());
}

#[test]
fn test_declined_start() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let mut operator = Script { decline: true, ..Script::default() };

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert_eq!(report.status, TraversalStatus::Aborted(AbortReason::Declined));
    assert!(report.triangles.is_empty());
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_insufficient_digits_abort_before_start() {
    let scratch = Scratch::new();
    let host = octahedron();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let mut operator = Script::default();

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert_eq!(
        report.status,
        TraversalStatus::Aborted(AbortReason::Fatal(PanelError::InsufficientDigits {
            required: 4,
            available: 3,
            unique_edges: 12,
        }))
    );
    assert!(operator.started.is_none());
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_non_triangular_face_aborts_before_export() {
    let scratch = Scratch::new();
    let host = mesh(
        "mixed",
        vec![
            [0.0, 0.0, 0.0],
            [100.0, 0.0, 0.0],
            [100.0, 100.0, 0.0],
            [0.0, 100.0, 0.0],
            [200.0, 0.0, 0.0],
        ],
        vec![vec![1, 4, 2], vec![0, 1, 2, 3]],
    );
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 4);

    let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());

    assert_eq!(
        report.status,
        TraversalStatus::Aborted(AbortReason::Fatal(PanelError::NonTriangularFace { face: FaceId(1), edges: 4 }))
    );
    assert!(report.triangles.is_empty());
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_missing_template_body_aborts_before_export() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    kernel.remove_body(None, "3r");

    let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());

    match report.status {
        TraversalStatus::Aborted(AbortReason::Fatal(PanelError::MissingAsset(name))) => assert!(name.contains("3r")),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_rejected_third_side_skips_triangle() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    kernel.bound_parameter("sideThree", 150.0, 300.0);
    let mut operator = Script::default();

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert!(report.is_done());
    assert_eq!(operator.errors.len(), 2);
    assert!(matches!(operator.errors[0].1, TriangleError::SideRejected { ref parameter, .. } if parameter == "sideThree"));
    assert!(report.triangles.iter().all(|r| matches!(r.outcome, TriangleOutcome::Skipped(_))));
    assert!(kernel.exports.is_empty());
    assert_eq!(kernel.open_assemblies, 0);
}

#[test]
fn test_rejected_third_side_can_abort() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    kernel.bound_parameter("sideThree", 150.0, 300.0);
    let mut operator = Script { abort_on_error: true, ..Script::default() };

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert!(matches!(
        report.status,
        TraversalStatus::Aborted(AbortReason::OperatorAbort { face: FaceId(0), .. })
    ));
    assert_eq!(report.triangles.len(), 1);
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_rejected_first_side_is_ignored() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    kernel.bound_parameter("sideOne", 1.0, 50.0);

    let report = panelize(&host, &mut kernel, &mut Unattended, &scratch.options());

    assert!(report.is_done());
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(kernel.exports.len(), 2);
}

#[test]
fn test_invalid_triangle_is_marked() {
    let scratch = Scratch::new();
    let host = mesh(
        "sliver",
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 5.0, 0.0]],
        vec![vec![0, 1, 2]],
    );
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let mut operator = Script::default();

    let report = panelize(&host, &mut kernel, &mut operator, &scratch.options());

    assert!(report.is_done());
    assert_eq!(report.triangles[0].validation.flag, ValidationFlag::ShortAltitude);
    assert_eq!(kernel.appearances, vec![(FaceId(0), Appearance::ShortAltitude)]);
    // Advisory only: the panel is still exported and nobody was asked.
    assert_eq!(kernel.exports.len(), 1);
    assert!(operator.invalid.is_empty());
}

#[test]
fn test_invalid_triangle_prompt_can_abort() {
    let scratch = Scratch::new();
    let host = mesh(
        "sliver",
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 5.0, 0.0]],
        vec![vec![0, 1, 2]],
    );
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let mut operator = Script { abort_on_invalid: true, ..Script::default() };
    let options = PanelizeOptions {
        prompt_on_invalid: true,
        color_invalid_triangles: false,
        ..scratch.options()
    };

    let report = panelize(&host, &mut kernel, &mut operator, &options);

    assert!(matches!(report.status, TraversalStatus::Aborted(AbortReason::OperatorAbort { .. })));
    assert_eq!(operator.invalid, vec![FaceId(0)]);
    assert!(kernel.appearances.is_empty());
    assert!(kernel.exports.is_empty());
}

#[test]
fn test_combine_order_and_overrides() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    kernel.add_root_body("thickFrame");
    let mut overrides = CoreOverrides::default();
    overrides.insert("thickFrame", [FaceId(1)]);
    let options = PanelizeOptions { core_overrides: overrides, ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);
    assert!(report.is_done());

    assert_eq!(kernel.exports[0].1.frame, BodyRef::root("frame"));
    assert_eq!(kernel.exports[1].1.frame, BodyRef::root("thickFrame"));

    // Bits for sides one to three, then hinges.
    let parts = &kernel.exports[0].1.parts;
    let first_hinge = parts
        .iter()
        .position(|p| p.component.as_deref().map_or(true, |c| !c.starts_with("binaryBits")))
        .unwrap();
    assert!(parts[..first_hinge].windows(2).all(|w| w[0].component <= w[1].component));
    assert!(parts[first_hinge..]
        .iter()
        .all(|p| p.component.as_deref().map_or(true, |c| !c.starts_with("binaryBits"))));

    // Face 0's shared edge is its third side and Male there.
    assert!(parts[first_hinge..].iter().any(|p| p.component.as_deref() == Some("M1:3")));
    let female = &kernel.exports[1].1.parts;
    assert!(female.contains(&BodyRef::root("3l")) && female.contains(&BodyRef::root("3r")));
}

#[test]
fn test_preview_placement() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let options = PanelizeOptions { preview_assembly: true, ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    assert!(report.is_done());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(kernel.previews.len(), 2);

    // The template's local origin (on the panel surface) lands on a vertex of the face.
    let record = &report.triangles[0];
    let transform = record.placement.unwrap();
    let corner = transform * crate::geometry::Point3::origin();
    let on_vertex = [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 100.0, -30.0]]
        .iter()
        .any(|v| (corner - crate::geometry::Point3::new(v[0], v[1], v[2])).norm() < 2.0);
    assert!(on_vertex);
    assert_eq!(host.mesh_name(), "pair");
}

#[test]
fn test_records_carry_export_paths() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
    let options = scratch.options();

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    let paths: Vec<PathBuf> = report.exported().filter_map(|r| r.exported_path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            options.output_dir.join("pair_1_2_0__115.758_115.758_100.000.json"),
            options.output_dir.join("pair_3_4_0__115.758_115.758_100.000.json"),
        ]
    );
}

/// Template host whose preview placement always fails.
struct ReadOnlyPreview(ManifestKernel);

impl PanelKernel for ReadOnlyPreview {
    type Body = BodyRef;
    type Assembly = PanelManifest;

    fn lookup_named_body(&self, container: Option<&str>, name: &str) -> Option<BodyRef> {
        self.0.lookup_named_body(container, name)
    }

    fn component_bodies(&self, component: &str) -> Option<Vec<BodyRef>> {
        self.0.component_bodies(component)
    }

    fn parameter_value(&self, name: &str) -> Option<f64> {
        self.0.parameter_value(name)
    }

    fn set_parametric_length(&mut self, name: &str, mm: f64) -> KernelResult<()> {
        self.0.set_parametric_length(name, mm)
    }

    fn assemble(&mut self, frame: &BodyRef, parts: &[BodyRef]) -> KernelResult<PanelManifest> {
        self.0.assemble(frame, parts)
    }

    fn export_panel(&mut self, assembly: &PanelManifest, path: &Path) -> KernelResult<()> {
        self.0.export_panel(assembly, path)
    }

    fn place_in_preview(&mut self, _assembly: &PanelManifest, _transform: &Transform3) -> KernelResult<()> {
        Err(KernelOpError::OperationFailed("preview document is read-only".into()))
    }

    fn release(&mut self, assembly: PanelManifest) {
        self.0.release(assembly)
    }

    fn set_appearance(&mut self, face: FaceId, appearance: Appearance) -> KernelResult<()> {
        self.0.set_appearance(face, appearance)
    }

    fn export_extension(&self) -> &str {
        self.0.export_extension()
    }
}

#[test]
fn test_failed_placement_still_exports() {
    let scratch = Scratch::new();
    let host = pair();
    let mut kernel = ReadOnlyPreview(ManifestKernel::from_template(&TemplateConfig::default(), 3));
    let options = PanelizeOptions { preview_assembly: true, ..scratch.options() };

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    assert!(report.is_done(), "{:?}", report.status);
    assert_eq!(report.exported().count(), 2);
    assert!(report.triangles.iter().all(|r| r.placement.is_none() && r.exported_path.is_some()));
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().all(|w| w.contains("read-only")));
    assert_eq!(kernel.0.exports.len(), 2);
    assert_eq!(kernel.0.open_assemblies, 0);
}

#[test]
fn test_degenerate_neighbour_does_not_stop_the_run() {
    let scratch = Scratch::new();
    // Face 1 collapses onto the shared edge: vertex 3 lies between vertices 0 and 1.
    let host = mesh(
        "collapsed",
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 100.0, -30.0], [50.0, 0.0, 0.0]],
        vec![vec![0, 1, 2], vec![1, 0, 3]],
    );

    for dry_run in [true, false] {
        let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3);
        let options = PanelizeOptions { dry_run, ..scratch.options() };

        let report = panelize(&host, &mut kernel, &mut Unattended, &options);

        assert!(report.is_done(), "{:?}", report.status);
        assert_eq!(report.triangles.len(), 2);
        // Both faces see the shared edge, and neither can call it convex.
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().all(|w| w.contains("convexity")));
        assert!(report.triangles.iter().all(|r| r.triangle.sides.iter().all(|s| !s.convex)));
        assert_eq!(report.triangles[1].validation.flag, ValidationFlag::ShortAltitude);
        assert_eq!(kernel.appearances, vec![(FaceId(1), Appearance::ShortAltitude)]);
        assert_eq!(kernel.exports.len(), if dry_run { 0 } else { 2 });
    }
}

#[test]
fn test_mesh_name_cannot_leave_output_dir() {
    let scratch = Scratch::new();
    let host = mesh(
        "../escaped",
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [50.0, 100.0, 0.0]],
        vec![vec![0, 1, 2]],
    );
    let mut kernel = ManifestKernel::from_template(&TemplateConfig::default(), 3).persisted();
    let options = scratch.options();

    let report = panelize(&host, &mut kernel, &mut Unattended, &options);

    assert!(report.is_done(), "{:?}", report.status);
    let path = report.triangles[0].exported_path.clone().unwrap();
    assert_eq!(path.parent(), Some(options.output_dir.as_path()));
    assert!(path.file_name().unwrap().to_string_lossy().starts_with(".._escaped_"));
    assert!(path.exists());

    let name = panel_file_name("a/b\\c:d", &report.triangles[0].triangle, "stl");
    assert!(name.starts_with("a_b_c_d_"));
    assert!(!name.contains('/') && !name.contains('\\'));
}
