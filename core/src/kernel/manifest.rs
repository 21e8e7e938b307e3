//! Reference template host.
//!
//! Keeps a catalogue of template bodies and user parameters in memory. "Combining" a
//! panel snapshots the frame, the combined bodies and the current parameter values into
//! a [`PanelManifest`]; "exporting" writes that manifest as JSON. A real CAD host would
//! run the boolean combine and write a mesh file instead.

use super::{Appearance, BodyRef, KernelOpError, KernelResult, PanelKernel};
use crate::geometry::Transform3;
use crate::panel::TemplateConfig;
use crate::topo::FaceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A frame body with key and hinge bodies combined onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelManifest {
    pub frame: BodyRef,
    pub parts: Vec<BodyRef>,
    /// Template parameters at combine time, millimetres.
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
pub struct ManifestKernel {
    root_bodies: HashSet<String>,
    /// Component name -> body names in host order.
    components: HashMap<String, Vec<String>>,
    parameters: BTreeMap<String, f64>,
    /// Accepted range per parameter; assignments outside it are rejected.
    bounds: HashMap<String, (f64, f64)>,
    /// Write manifests to disk on export. When false exports are only recorded.
    persist: bool,

    pub exports: Vec<(PathBuf, PanelManifest)>,
    pub previews: Vec<(PanelManifest, Transform3)>,
    pub appearances: Vec<(FaceId, Appearance)>,
    /// Assemblies combined but not yet released.
    pub open_assemblies: usize,
}

impl ManifestKernel {
    /// Empty catalogue that only records exports.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Catalogue holding every body and parameter `template` names, with bit strips of
    /// `digits` positions.
    pub fn from_template(template: &TemplateConfig, digits: usize) -> Self {
        let mut kernel = Self::in_memory();
        kernel.add_root_body(&template.frame_body);

        for slot in 0..3 {
            kernel.add_component(&template.male_components[slot], &["tab", "pin"]);
            kernel.add_component(&template.female_components[slot], &["socket"]);
            let (left, right) = &template.female_side_bodies[slot];
            kernel.add_root_body(left);
            kernel.add_root_body(right);

            let mut bits: Vec<String> = (1..=digits)
                .flat_map(|i| [template.top_bit_name(i), template.bottom_bit_name(i)])
                .collect();
            bits.extend(template.concavity_bodies.iter().cloned());
            let names: Vec<&str> = bits.iter().map(String::as_str).collect();
            kernel.add_component(&template.bit_components[slot], &names);

            kernel.set_parameter(&template.side_parameters[slot], 100.0);
        }
        kernel.set_parameter(&template.digits_parameter, digits as f64);
        kernel
    }

    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn add_root_body(&mut self, name: &str) {
        self.root_bodies.insert(name.to_string());
    }

    pub fn add_component(&mut self, component: &str, bodies: &[&str]) {
        self.components
            .insert(component.to_string(), bodies.iter().map(|b| b.to_string()).collect());
    }

    pub fn remove_body(&mut self, container: Option<&str>, name: &str) {
        match container {
            None => {
                self.root_bodies.remove(name);
            }
            Some(c) => {
                if let Some(bodies) = self.components.get_mut(c) {
                    bodies.retain(|b| b != name);
                }
            }
        }
    }

    pub fn remove_component(&mut self, component: &str) {
        self.components.remove(component);
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) {
        self.parameters.insert(name.to_string(), value);
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.parameters.remove(name);
    }

    pub fn bound_parameter(&mut self, name: &str, min: f64, max: f64) {
        self.bounds.insert(name.to_string(), (min, max));
    }

    fn contains(&self, body: &BodyRef) -> bool {
        match &body.component {
            None => self.root_bodies.contains(&body.name),
            Some(c) => self
                .components
                .get(c)
                .is_some_and(|bodies| bodies.iter().any(|b| b == &body.name)),
        }
    }
}

impl PanelKernel for ManifestKernel {
    type Body = BodyRef;
    type Assembly = PanelManifest;

    fn lookup_named_body(&self, container: Option<&str>, name: &str) -> Option<BodyRef> {
        let body = match container {
            None => BodyRef::root(name),
            Some(c) => BodyRef::in_component(c, name),
        };
        self.contains(&body).then_some(body)
    }

    fn component_bodies(&self, component: &str) -> Option<Vec<BodyRef>> {
        self.components.get(component).map(|bodies| {
            bodies.iter().map(|b| BodyRef::in_component(component, b)).collect()
        })
    }

    fn parameter_value(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    fn set_parametric_length(&mut self, name: &str, mm: f64) -> KernelResult<()> {
        if !self.parameters.contains_key(name) {
            return Err(KernelOpError::UnknownEntity(format!("parameter '{}'", name)));
        }
        if !mm.is_finite() || mm <= 0.0 {
            return Err(KernelOpError::OperationFailed(format!("{} = {:.3} mm is not a length", name, mm)));
        }
        if let Some(&(min, max)) = self.bounds.get(name) {
            if mm < min || mm > max {
                return Err(KernelOpError::OperationFailed(format!(
                    "{} = {:.3} mm outside [{:.3}, {:.3}]", name, mm, min, max
                )));
            }
        }
        // The host stores expressions with three decimals.
        self.parameters.insert(name.to_string(), (mm * 1000.0).round() / 1000.0);
        Ok(())
    }

    fn assemble(&mut self, frame: &BodyRef, parts: &[BodyRef]) -> KernelResult<PanelManifest> {
        if let Some(missing) = std::iter::once(frame).chain(parts).find(|b| !self.contains(b)) {
            return Err(KernelOpError::UnknownEntity(format!("body '{}'", missing)));
        }
        self.open_assemblies += 1;
        Ok(PanelManifest {
            frame: frame.clone(),
            parts: parts.to_vec(),
            parameters: self.parameters.clone(),
        })
    }

    fn export_panel(&mut self, assembly: &PanelManifest, path: &Path) -> KernelResult<()> {
        if self.persist {
            let json = serde_json::to_string_pretty(assembly)
                .map_err(|e| KernelOpError::ExportFailed(e.to_string()))?;
            std::fs::write(path, json)
                .map_err(|e| KernelOpError::ExportFailed(format!("{}: {}", path.display(), e)))?;
        }
        debug!("Exported panel with {} parts to {}", assembly.parts.len(), path.display());
        self.exports.push((path.to_path_buf(), assembly.clone()));
        Ok(())
    }

    fn place_in_preview(&mut self, assembly: &PanelManifest, transform: &Transform3) -> KernelResult<()> {
        self.previews.push((assembly.clone(), *transform));
        Ok(())
    }

    fn release(&mut self, _assembly: PanelManifest) {
        self.open_assemblies = self.open_assemblies.saturating_sub(1);
    }

    fn set_appearance(&mut self, face: FaceId, appearance: Appearance) -> KernelResult<()> {
        self.appearances.push((face, appearance));
        Ok(())
    }

    fn export_extension(&self) -> &str {
        "json"
    }
}
