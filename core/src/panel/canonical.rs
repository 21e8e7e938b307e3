use super::side::{Side, Triangle};

/// Rotate a face's sides so the longest comes first.
///
/// The first side (in face order) that neither other side exceeds becomes `side1`; the
/// rotation is cyclic so the face's winding is preserved.
pub fn canonicalize(sides: [Side; 3]) -> Triangle {
    let first = (0..3)
        .find(|&i| sides.iter().all(|s| s.length <= sides[i].length))
        .unwrap_or(0);

    let mut sides = sides;
    sides.rotate_left(first);
    Triangle { sides }
}
