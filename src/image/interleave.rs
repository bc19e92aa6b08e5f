/// Physical interleave (sector skip) analysis
///
/// The model: with the logical ids of a track sorted ascending, physical
/// position `p` holds the id at ring offset `base + p * S (mod N)` for a
/// skip factor `S` and sector count `N`.

use std::fmt;

/// Result of interleave analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// The sector map follows the skip model with this factor
    Known(u8),
    /// No skip factor reproduces the sector map
    Unknown,
}

impl Interleave {
    /// Skip factor, if known
    pub fn factor(self) -> Option<u8> {
        match self {
            Interleave::Known(s) => Some(s),
            Interleave::Unknown => None,
        }
    }
}

impl fmt::Display for Interleave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interleave::Known(s) => write!(f, "{}:1", s),
            Interleave::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Sector ordering requested for raw binary output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterleaveMode {
    /// Physical order, exactly as recorded
    #[default]
    AsRead,
    /// Use the factor detected on each track
    BestGuess,
    /// Use a fixed factor (1 = logical sector order)
    Factor(u8),
}

/// Infer the skip factor of a sector map
///
/// Every candidate from 1 to N-1 is tried in order, starting from the
/// position of the lowest id; the first one that reproduces the whole map
/// wins. Maps with repeated ids are never explained by the model.
pub fn calculate_best_interleave(smap: &[u8]) -> Interleave {
    let n = smap.len();
    if n <= 1 {
        return Interleave::Known(1);
    }

    // rank[id] = index of id in ascending order
    let mut present = [false; 256];
    for &id in smap {
        if present[id as usize] {
            return Interleave::Unknown;
        }
        present[id as usize] = true;
    }
    let mut rank = [0usize; 256];
    let mut next = 0;
    for (id, &p) in present.iter().enumerate() {
        if p {
            rank[id] = next;
            next += 1;
        }
    }

    let start = match smap.iter().position(|&id| rank[id as usize] == 0) {
        Some(p) => p,
        None => return Interleave::Unknown,
    };

    for skip in 1..n {
        let matches = (0..n).all(|j| rank[smap[(start + j) % n] as usize] == (j * skip) % n);
        if matches {
            return Interleave::Known(skip as u8);
        }
    }
    Interleave::Unknown
}

/// Logical index (rank in ascending id order) to emit at each output slot
///
/// Slot `k` takes index `k * skip (mod n)`; when that index is already
/// taken (skip and n share a factor) the next free index is used.
pub fn emission_order(n: usize, skip: usize) -> Vec<usize> {
    let mut used = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for k in 0..n {
        let mut idx = (k * skip) % n;
        while used[idx] {
            idx = (idx + 1) % n;
        }
        used[idx] = true;
        order.push(idx);
    }
    order
}

/// Physical positions of a track in the order they should be emitted
pub fn physical_order(smap: &[u8], mode: InterleaveMode) -> Vec<usize> {
    let n = smap.len();
    let skip = match mode {
        InterleaveMode::AsRead => None,
        InterleaveMode::BestGuess => calculate_best_interleave(smap).factor(),
        InterleaveMode::Factor(s) => Some(s),
    };
    let skip = match skip {
        Some(s) if n > 1 && s > 0 => s as usize,
        _ => return (0..n).collect(),
    };

    let mut by_id: Vec<usize> = (0..n).collect();
    by_id.sort_by_key(|&p| smap[p]);
    emission_order(n, skip)
        .into_iter()
        .map(|logical| by_id[logical])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_tracks() {
        assert_eq!(calculate_best_interleave(&[]), Interleave::Known(1));
        assert_eq!(calculate_best_interleave(&[7]), Interleave::Known(1));
    }

    #[test]
    fn test_sequential() {
        let smap: Vec<u8> = (1..=9).collect();
        assert_eq!(calculate_best_interleave(&smap), Interleave::Known(1));
    }

    #[test]
    fn test_rotated_sequential() {
        assert_eq!(calculate_best_interleave(&[4, 5, 1, 2, 3]), Interleave::Known(1));
    }

    #[test]
    fn test_skip_model() {
        // position p holds sorted[(p * 2) mod 9]
        let smap = [1, 3, 5, 7, 9, 2, 4, 6, 8];
        assert_eq!(calculate_best_interleave(&smap), Interleave::Known(2));

        // same layout rotated
        let smap = [7, 9, 2, 4, 6, 8, 1, 3, 5];
        assert_eq!(calculate_best_interleave(&smap), Interleave::Known(2));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(calculate_best_interleave(&[1, 3, 2, 5, 4]), Interleave::Unknown);
        assert_eq!(calculate_best_interleave(&[1, 2, 2, 4]), Interleave::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(Interleave::Known(3).to_string(), "3:1");
        assert_eq!(Interleave::Unknown.to_string(), "Unknown");
        assert_eq!(Interleave::Unknown.factor(), None);
    }

    #[test]
    fn test_emission_order() {
        assert_eq!(emission_order(5, 1), vec![0, 1, 2, 3, 4]);
        assert_eq!(emission_order(5, 2), vec![0, 2, 4, 1, 3]);
        // 2 and 4 share a factor: probe to the next free index
        assert_eq!(emission_order(4, 2), vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_physical_order() {
        let smap = [3, 1, 4, 2];
        assert_eq!(physical_order(&smap, InterleaveMode::AsRead), vec![0, 1, 2, 3]);
        // factor 1 emits in logical id order
        assert_eq!(physical_order(&smap, InterleaveMode::Factor(1)), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_physical_order_best_guess() {
        let smap = [7, 9, 2, 4, 6, 8, 1, 3, 5];
        // detected skip 2 reproduces the recorded order starting at the lowest id
        assert_eq!(
            physical_order(&smap, InterleaveMode::BestGuess),
            vec![6, 7, 8, 0, 1, 2, 3, 4, 5]
        );

        // unknown layout falls back to recorded order
        let smap = [1, 3, 2, 5, 4];
        assert_eq!(
            physical_order(&smap, InterleaveMode::BestGuess),
            vec![0, 1, 2, 3, 4]
        );
    }
}
