use super::overrides::CoreOverrides;
use super::template::TemplateConfig;
use super::validate::ValidationThresholds;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one panelization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelizeOptions {
    /// Directory panel files are written into. Created if missing.
    pub output_dir: PathBuf,
    /// Stop after this many faces. Zero means no limit.
    pub max_triangles: Option<usize>,
    /// Mark faces that fail validation with a cosmetic appearance.
    pub color_invalid_triangles: bool,
    /// Classify and validate only; no parameters are driven and nothing is exported.
    pub dry_run: bool,
    /// Hand every triangle record to the operator as it is produced.
    pub report_each_triangle: bool,
    /// Place each exported panel into the preview assembly.
    pub preview_assembly: bool,
    /// Ask the operator whether to continue when a triangle fails validation.
    pub prompt_on_invalid: bool,
    pub thresholds: ValidationThresholds,
    /// Panel thickness in mm; the template frame sits at half of it.
    pub panel_thickness: f64,
    pub template: TemplateConfig,
    pub core_overrides: CoreOverrides,
}

impl Default for PanelizeOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("panels"),
            max_triangles: None,
            color_invalid_triangles: true,
            dry_run: false,
            report_each_triangle: false,
            preview_assembly: false,
            prompt_on_invalid: false,
            thresholds: ValidationThresholds::default(),
            panel_thickness: 3.0,
            template: TemplateConfig::default(),
            core_overrides: CoreOverrides::default(),
        }
    }
}

impl PanelizeOptions {
    /// Number of faces the run may process.
    pub fn triangle_limit(&self) -> usize {
        match self.max_triangles {
            Some(0) | None => usize::MAX,
            Some(n) => n,
        }
    }
}
