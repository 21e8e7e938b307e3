//! Template catalogue: the names of every body and parameter the panelizer drives, and
//! their resolution against a [`PanelKernel`] before any work starts.

use super::encode::KeyPart;
use super::error::{PanelError, PanelResult};
use super::overrides::CoreOverrides;
use super::side::HingeRole;
use crate::kernel::PanelKernel;
use crate::topo::FaceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Names of the template document's bodies, components and parameters.
///
/// Arrays are indexed by canonical side slot: index 0 drives `side1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub frame_body: String,
    pub female_components: [String; 3],
    pub male_components: [String; 3],
    pub bit_components: [String; 3],
    /// Left and right female side bodies in the root component.
    pub female_side_bodies: [(String, String); 3],
    /// Concavity bodies in order left-top, right-top, left-bottom, right-bottom.
    pub concavity_bodies: [String; 4],
    pub side_parameters: [String; 3],
    pub digits_parameter: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        let slots = |prefix: &str| [1, 2, 3].map(|i| format!("{}:{}", prefix, i));
        Self {
            frame_body: "frame".into(),
            female_components: slots("F1"),
            male_components: slots("M1"),
            bit_components: slots("binaryBits"),
            female_side_bodies: [1, 2, 3].map(|i| (format!("{}l", i), format!("{}r", i))),
            concavity_bodies: ["lConcavet", "rConcavet", "lConcaveb", "rConcaveb"].map(String::from),
            side_parameters: ["sideOne", "sideTwo", "sideThree"].map(String::from),
            digits_parameter: "binaryDigits".into(),
        }
    }
}

impl TemplateConfig {
    pub fn top_bit_name(&self, slot: usize) -> String {
        format!("{}t", slot)
    }

    pub fn bottom_bit_name(&self, slot: usize) -> String {
        format!("{}b", slot)
    }

    /// Body name of a key part inside a bit component.
    pub fn part_name(&self, part: KeyPart) -> String {
        match part {
            KeyPart::TopBit(slot) => self.top_bit_name(slot),
            KeyPart::BottomBit(slot) => self.bottom_bit_name(slot),
            KeyPart::LeftTopConcavity => self.concavity_bodies[0].clone(),
            KeyPart::RightTopConcavity => self.concavity_bodies[1].clone(),
            KeyPart::LeftBottomConcavity => self.concavity_bodies[2].clone(),
            KeyPart::RightBottomConcavity => self.concavity_bodies[3].clone(),
        }
    }
}

/// Bodies for one canonical side slot.
#[derive(Debug, Clone)]
struct SlotAssets<B> {
    bits: HashMap<KeyPart, B>,
    male: Vec<B>,
    female: Vec<B>,
}

/// Every template asset looked up once, ahead of the traversal.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate<B> {
    pub digits: usize,
    pub side_parameters: [String; 3],
    frame: B,
    face_frames: HashMap<FaceId, B>,
    slots: Vec<SlotAssets<B>>,
}

fn lookup<K: PanelKernel>(kernel: &K, container: Option<&str>, name: &str) -> PanelResult<K::Body> {
    kernel.lookup_named_body(container, name).ok_or_else(|| {
        PanelError::MissingAsset(match container {
            Some(c) => format!("body '{}' in component '{}'", name, c),
            None => format!("body '{}'", name),
        })
    })
}

fn component<K: PanelKernel>(kernel: &K, name: &str) -> PanelResult<Vec<K::Body>> {
    kernel
        .component_bodies(name)
        .ok_or_else(|| PanelError::MissingAsset(format!("component '{}'", name)))
}

fn digits_value<K: PanelKernel>(kernel: &K, name: &str) -> PanelResult<usize> {
    let value = kernel
        .parameter_value(name)
        .ok_or_else(|| PanelError::MissingAsset(format!("parameter '{}'", name)))?;
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(PanelError::InvalidParameter { name: name.to_string(), value });
    }
    Ok(value as usize)
}

impl<B: Clone> ResolvedTemplate<B> {
    /// Resolve `config` and `overrides` against the kernel's template document.
    pub fn resolve<K>(kernel: &K, config: &TemplateConfig, overrides: &CoreOverrides) -> PanelResult<Self>
    where
        K: PanelKernel<Body = B>,
    {
        let digits = digits_value(kernel, &config.digits_parameter)?;
        for name in &config.side_parameters {
            if kernel.parameter_value(name).is_none() {
                return Err(PanelError::MissingAsset(format!("parameter '{}'", name)));
            }
        }

        let frame = lookup(kernel, None, &config.frame_body)?;

        let mut face_frames = HashMap::new();
        for (body, faces) in overrides.iter() {
            let resolved = lookup(kernel, None, body)?;
            for &face in faces {
                if face_frames.contains_key(&face) {
                    warn!("{} is listed under more than one core override; keeping the first", face);
                    continue;
                }
                face_frames.insert(face, resolved.clone());
            }
        }

        let mut slots = Vec::with_capacity(3);
        for slot in 0..3 {
            let bit_component = config.bit_components[slot].as_str();
            let parts = (1..=digits)
                .flat_map(|i| [KeyPart::TopBit(i), KeyPart::BottomBit(i)])
                .chain([
                    KeyPart::LeftTopConcavity,
                    KeyPart::RightTopConcavity,
                    KeyPart::LeftBottomConcavity,
                    KeyPart::RightBottomConcavity,
                ]);
            let mut bits = HashMap::new();
            for part in parts {
                bits.insert(part, lookup(kernel, Some(bit_component), &config.part_name(part))?);
            }

            let male = component(kernel, &config.male_components[slot])?;
            let mut female = component(kernel, &config.female_components[slot])?;
            let (left, right) = &config.female_side_bodies[slot];
            female.push(lookup(kernel, None, left)?);
            female.push(lookup(kernel, None, right)?);

            slots.push(SlotAssets { bits, male, female });
        }

        debug!(
            "Resolved template: {} binary digits, {} overridden faces",
            digits,
            face_frames.len()
        );

        Ok(Self {
            digits,
            side_parameters: config.side_parameters.clone(),
            frame,
            face_frames,
            slots,
        })
    }

    /// Body the panel for `face` is combined onto.
    pub fn frame_for(&self, face: FaceId) -> &B {
        self.face_frames.get(&face).unwrap_or(&self.frame)
    }

    /// Bit and concavity bodies for `parts` on side slot `slot` (0-based).
    pub fn key_bodies(&self, slot: usize, parts: &[KeyPart]) -> PanelResult<Vec<B>> {
        let assets = self
            .slots
            .get(slot)
            .ok_or_else(|| PanelError::MissingAsset(format!("side slot {}", slot + 1)))?;
        parts
            .iter()
            .map(|part| {
                assets
                    .bits
                    .get(part)
                    .cloned()
                    .ok_or_else(|| PanelError::MissingAsset(format!("key body '{}' on side {}", part, slot + 1)))
            })
            .collect()
    }

    /// Hinge bodies for a side's role on side slot `slot` (0-based).
    pub fn hinge_bodies(&self, slot: usize, role: HingeRole) -> &[B] {
        match (self.slots.get(slot), role) {
            (Some(assets), HingeRole::Male) => &assets.male,
            (Some(assets), HingeRole::Female) => &assets.female,
            _ => &[],
        }
    }
}
