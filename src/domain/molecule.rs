// ============================================================
// Layer 3 — Molecule Domain Type
// ============================================================
// A molecule as a plain graph: atoms are nodes, bonds are
// edges between atom indices. Nothing in here knows about
// SMILES text or tensors — the parser builds these values
// and the featurizer reads them.
//
// Hydrogens written in brackets ([nH], [NH4+]) are folded
// into the owning atom's hydrogen count; only heavy atoms
// and explicit [H] atoms become graph nodes.
//
// Reference: OpenSMILES specification §3 (Atoms, Bonds)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element symbol: '{0}'")]
pub struct ParseElementError(pub String);

/// Chemical elements the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    H, He, Li, Be, B, C, N, O, F, Ne,
    Na, Mg, Al, Si, P, S, Cl, Ar,
    K, Ca, Ti, V, Cr, Mn, Fe, Co, Ni, Cu, Zn, Ga, Ge, As, Se, Br, Kr,
    Rb, Sr, Zr, Mo, Ru, Rh, Pd, Ag, Cd, In, Sn, Sb, Te, I, Xe,
    Cs, Ba, Gd, Yb, W, Os, Ir, Pt, Au, Hg, Tl, Pb, Bi,
}

const ALL_ELEMENTS: [Element; 63] = [
    Element::H, Element::He, Element::Li, Element::Be, Element::B, Element::C,
    Element::N, Element::O, Element::F, Element::Ne, Element::Na, Element::Mg,
    Element::Al, Element::Si, Element::P, Element::S, Element::Cl, Element::Ar,
    Element::K, Element::Ca, Element::Ti, Element::V, Element::Cr, Element::Mn,
    Element::Fe, Element::Co, Element::Ni, Element::Cu, Element::Zn, Element::Ga,
    Element::Ge, Element::As, Element::Se, Element::Br, Element::Kr, Element::Rb,
    Element::Sr, Element::Zr, Element::Mo, Element::Ru, Element::Rh, Element::Pd,
    Element::Ag, Element::Cd, Element::In, Element::Sn, Element::Sb, Element::Te,
    Element::I, Element::Xe, Element::Cs, Element::Ba, Element::Gd, Element::Yb,
    Element::W, Element::Os, Element::Ir, Element::Pt, Element::Au, Element::Hg,
    Element::Tl, Element::Pb, Element::Bi,
];

impl Element {
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::H => "H", Element::He => "He", Element::Li => "Li",
            Element::Be => "Be", Element::B => "B", Element::C => "C",
            Element::N => "N", Element::O => "O", Element::F => "F",
            Element::Ne => "Ne", Element::Na => "Na", Element::Mg => "Mg",
            Element::Al => "Al", Element::Si => "Si", Element::P => "P",
            Element::S => "S", Element::Cl => "Cl", Element::Ar => "Ar",
            Element::K => "K", Element::Ca => "Ca", Element::Ti => "Ti",
            Element::V => "V", Element::Cr => "Cr", Element::Mn => "Mn",
            Element::Fe => "Fe", Element::Co => "Co", Element::Ni => "Ni",
            Element::Cu => "Cu", Element::Zn => "Zn", Element::Ga => "Ga",
            Element::Ge => "Ge", Element::As => "As", Element::Se => "Se",
            Element::Br => "Br", Element::Kr => "Kr", Element::Rb => "Rb",
            Element::Sr => "Sr", Element::Zr => "Zr", Element::Mo => "Mo",
            Element::Ru => "Ru", Element::Rh => "Rh", Element::Pd => "Pd",
            Element::Ag => "Ag", Element::Cd => "Cd", Element::In => "In",
            Element::Sn => "Sn", Element::Sb => "Sb", Element::Te => "Te",
            Element::I => "I", Element::Xe => "Xe", Element::Cs => "Cs",
            Element::Ba => "Ba", Element::Gd => "Gd", Element::Yb => "Yb",
            Element::W => "W", Element::Os => "Os", Element::Ir => "Ir",
            Element::Pt => "Pt", Element::Au => "Au", Element::Hg => "Hg",
            Element::Tl => "Tl", Element::Pb => "Pb", Element::Bi => "Bi",
        }
    }

    /// Normal valences, lowest first. Empty for elements whose
    /// valence the parser does not police (metals, noble gases).
    pub fn default_valences(&self) -> &'static [u8] {
        match self {
            Element::H | Element::F | Element::Cl | Element::Br | Element::I => &[1],
            Element::B | Element::Al => &[3],
            Element::C | Element::Si | Element::Ge => &[4],
            Element::N => &[3, 5],
            Element::P | Element::As => &[3, 5],
            Element::O => &[2],
            Element::S | Element::Se | Element::Te => &[2, 4, 6],
            _ => &[],
        }
    }

    /// Atoms that may be written without brackets.
    pub fn is_organic_subset(&self) -> bool {
        matches!(
            self,
            Element::B | Element::C | Element::N | Element::O | Element::P
                | Element::S | Element::F | Element::Cl | Element::Br | Element::I
        )
    }

    /// Elements allowed in lowercase (aromatic) form.
    pub fn can_be_aromatic(&self) -> bool {
        matches!(
            self,
            Element::B | Element::C | Element::N | Element::O | Element::P
                | Element::S | Element::Se | Element::As | Element::Te
        )
    }

    /// Number of valence electrons for main-group elements, used to
    /// adjust the allowed valence of charged atoms.
    fn valence_electrons(&self) -> Option<u8> {
        match self {
            Element::H | Element::Li | Element::Na | Element::K => Some(1),
            Element::B | Element::Al => Some(3),
            Element::C | Element::Si | Element::Ge => Some(4),
            Element::N | Element::P | Element::As => Some(5),
            Element::O | Element::S | Element::Se | Element::Te => Some(6),
            Element::F | Element::Cl | Element::Br | Element::I => Some(7),
            _ => None,
        }
    }

    /// Move a neutral valence to the given formal charge: N+ and O+
    /// gain a bond, O- and N- lose one, B- gains one, C± loses one.
    fn shift_for_charge(&self, valence: u8, charge: i8) -> Option<i16> {
        let (v, c) = (valence as i16, charge as i16);
        Some(match self.valence_electrons()? {
            e if e >= 5 => v + c,
            3 => v - c,
            _ => v - c.abs(),
        })
    }

    /// Largest bond count (explicit bonds + hydrogens) allowed for this
    /// element at the given formal charge, or None if unchecked.
    pub fn max_valence(&self, charge: i8) -> Option<u8> {
        let valences = self.default_valences();
        let (lowest, highest) = (*valences.first()?, *valences.last()?);
        let max = if charge > 0 && self.valence_electrons()? >= 5 {
            self.shift_for_charge(lowest, charge)?.max(highest as i16)
        } else {
            self.shift_for_charge(highest, charge)?
        };
        Some(max.max(0) as u8)
    }

    /// Smallest normal bond count at the given charge; anything below
    /// it leaves unpaired electrons.
    pub fn min_valence(&self, charge: i8) -> Option<u8> {
        let lowest = *self.default_valences().first()?;
        Some(self.shift_for_charge(lowest, charge)?.max(0) as u8)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ELEMENTS
            .iter()
            .copied()
            .find(|e| e.symbol() == s)
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Contribution to an atom's valence. Aromatic bonds count as one;
    /// the extra pi electron is accounted for per atom.
    pub fn valence(&self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    /// Explicit bracket hydrogens plus implicit organic-subset hydrogens
    pub hydrogens: u8,
    pub isotope: Option<u16>,
    /// Unpaired electrons left after bonding; only non-zero for
    /// bracket atoms with fewer bonds than their lowest valence.
    pub radical_electrons: u8,
    /// Written in brackets, so the hydrogen count is explicit
    pub bracket: bool,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            charge: 0,
            hydrogens: 0,
            isotope: None,
            radical_electrons: 0,
            bracket: false,
        }
    }

    /// Hydrogens the parser had to infer (organic-subset atoms only).
    pub fn implicit_hydrogens(&self) -> u8 {
        if self.bracket { 0 } else { self.hydrogens }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub i: usize,
    pub j: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn new(idx1: usize, idx2: usize, order: BondOrder) -> Self {
        if idx1 <= idx2 {
            Self { i: idx1, j: idx2, order }
        } else {
            Self { i: idx2, j: idx1, order }
        }
    }

    pub fn other(&self, idx: usize) -> usize {
        if self.i == idx { self.j } else { self.i }
    }
}

/// A validated molecular graph.
///
/// Only the SMILES parser constructs these, so every Molecule
/// in the system came from a string that parsed cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    pub(crate) fn from_parts(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        Self { atoms, bonds }
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Neighbour lists indexed by atom, in bond insertion order.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adj[bond.i].push(bond.j);
            adj[bond.j].push(bond.i);
        }
        adj
    }

    /// Bonds touching the given atom.
    pub fn bonds_of(&self, idx: usize) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(move |b| b.i == idx || b.j == idx)
    }
}

/// A Molecule paired with the input row it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMolecule {
    pub row:      usize,
    pub smiles:   String,
    pub molecule: Molecule,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_round_trips_symbol() {
        assert_eq!("Cl".parse::<Element>().unwrap(), Element::Cl);
        assert_eq!(Element::Br.to_string(), "Br");
        assert!("Xx".parse::<Element>().is_err());
    }

    #[test]
    fn test_charged_valence_limits() {
        assert_eq!(Element::N.max_valence(0), Some(5));
        assert_eq!(Element::N.max_valence(1), Some(5));
        assert_eq!(Element::O.max_valence(1), Some(3));
        assert_eq!(Element::O.max_valence(-1), Some(1));
        assert_eq!(Element::C.max_valence(-1), Some(3));
        assert_eq!(Element::B.max_valence(-1), Some(4));
        assert_eq!(Element::Fe.max_valence(2), None);
        assert_eq!(Element::N.min_valence(1), Some(4));
        assert_eq!(Element::C.min_valence(0), Some(4));
    }

    #[test]
    fn test_bond_normalises_endpoints() {
        let b = Bond::new(3, 1, BondOrder::Double);
        assert_eq!((b.i, b.j), (1, 3));
        assert_eq!(b.other(1), 3);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let atoms = vec![Atom::new(Element::C), Atom::new(Element::C), Atom::new(Element::O)];
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(1, 2, BondOrder::Single),
        ];
        let mol = Molecule::from_parts(atoms, bonds);
        let adj = mol.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1], vec![0, 2]);
        assert_eq!(adj[2], vec![1]);
        assert_eq!(mol.bonds_of(1).count(), 2);
    }
}
