//! Binary key encoding.
//!
//! Every hinged edge carries a strip of `total_digits` key positions. A raised position
//! (bottom and top bit body) is a one, a lowered position (neither) is a zero; positions
//! outside the centred window always get a bottom filler bit. Reading the strip lets a
//! builder find the one other panel whose edge carries the same index.

use super::error::{PanelError, PanelResult};
use super::side::{HingeRole, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical key body. Bit slots are 1-based, matching the template's body names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPart {
    TopBit(usize),
    BottomBit(usize),
    LeftTopConcavity,
    RightTopConcavity,
    LeftBottomConcavity,
    RightBottomConcavity,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::TopBit(slot) => write!(f, "{}t", slot),
            KeyPart::BottomBit(slot) => write!(f, "{}b", slot),
            KeyPart::LeftTopConcavity => write!(f, "lConcavet"),
            KeyPart::RightTopConcavity => write!(f, "rConcavet"),
            KeyPart::LeftBottomConcavity => write!(f, "lConcaveb"),
            KeyPart::RightBottomConcavity => write!(f, "rConcaveb"),
        }
    }
}

/// Key bodies to combine onto one edge of one panel, in combine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBitPattern {
    pub total_digits: usize,
    /// Female edges read their strip mirrored.
    pub reversed: bool,
    pub parts: Vec<KeyPart>,
}

impl KeyBitPattern {
    /// Physical slot used for strip position `i`.
    fn slot(&self, i: usize) -> usize {
        if self.reversed { self.total_digits - i } else { i + 1 }
    }

    /// Strip positions carrying a top bit.
    pub fn raised_positions(&self) -> Vec<usize> {
        (0..self.total_digits)
            .filter(|&i| self.parts.contains(&KeyPart::TopBit(self.slot(i))))
            .collect()
    }

    /// The strip as read position by position: '1' raised, '0' not.
    pub fn readout(&self) -> String {
        let raised = self.raised_positions();
        (0..self.total_digits)
            .map(|i| if raised.contains(&i) { '1' } else { '0' })
            .collect()
    }
}

/// Number of binary digits in `n`; zero for zero.
pub fn bit_length(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}

/// Smallest strip width, at least one, that numbers `unique_edges` edges.
pub fn required_digits(unique_edges: usize) -> usize {
    let mut exp = 1;
    while (1usize << exp) < unique_edges {
        exp += 1;
    }
    exp
}

/// Encode a side's index, hinge role and convexity as key bodies.
pub fn encode(side: &Side, total_digits: usize) -> PanelResult<KeyBitPattern> {
    let digits = bit_length(side.index);
    if digits > total_digits {
        return Err(PanelError::IndexTooWide {
            index: side.index,
            needed: digits,
            available: total_digits,
        });
    }
    let binary = format!("{:b}", side.index).into_bytes();
    let offset = (total_digits - digits) / 2;

    let mut pattern = KeyBitPattern {
        total_digits,
        reversed: side.hinge == HingeRole::Female,
        parts: Vec::with_capacity(2 * total_digits + 3),
    };

    if pattern.reversed {
        pattern.parts.push(KeyPart::LeftBottomConcavity);
        if side.convex {
            pattern.parts.push(KeyPart::RightTopConcavity);
            pattern.parts.push(KeyPart::RightBottomConcavity);
        }
    } else {
        pattern.parts.push(KeyPart::RightBottomConcavity);
        if side.convex {
            pattern.parts.push(KeyPart::LeftTopConcavity);
            pattern.parts.push(KeyPart::LeftBottomConcavity);
        }
    }

    for i in 0..total_digits {
        let slot = pattern.slot(i);
        if i < offset || i >= total_digits - offset {
            pattern.parts.push(KeyPart::BottomBit(slot));
            continue;
        }
        // Even-width indices start one position late inside the window.
        let str_index = if digits % 2 == 1 {
            i as isize - offset as isize
        } else {
            i as isize - offset as isize - 1
        };
        let raised = usize::try_from(str_index)
            .ok()
            .and_then(|s| binary.get(s))
            .is_some_and(|&c| c == b'1');
        if raised {
            pattern.parts.push(KeyPart::BottomBit(slot));
            pattern.parts.push(KeyPart::TopBit(slot));
        }
    }

    Ok(pattern)
}
