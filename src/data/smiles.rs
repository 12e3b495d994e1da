// ============================================================
// Layer 4 — SMILES Molecule Parser
// ============================================================
// Turns one SMILES string into a Molecule, or a ParseFailure
// that carries the original string and the reason.
//
// A single left-to-right pass builds the graph:
//
//   atom        → new node, bonded to the previous atom
//   ( ... )     → branch: remember the atom before '('
//                 and return to it at ')'
//   digit / %nn → ring bond: open on first sight, close
//                 (add the bond) on the second
//   - = # $ :   → order of the next bond
//   .           → start a disconnected component
//
// After the pass, implicit hydrogens are filled in from the
// default valences and every atom is valence-checked. An atom
// with more bonds than its element allows is rejected, as is
// a lowercase (aromatic) atom that is not part of a ring.
//
// Stereo marks (/ \ @) are accepted and ignored; the models
// do not read them.
//
// Reference: OpenSMILES specification
//            Rust Book §8 (Strings), §9 (Error Handling)

use std::collections::{BTreeMap, VecDeque};

use crate::domain::error::{ParseFailure, SmilesError};
use crate::domain::molecule::{Atom, Bond, BondOrder, Element, Molecule};

/// Stateless SMILES parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoleculeParser;

impl MoleculeParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a SMILES string. Never panics on bad input; every failure
    /// comes back as a ParseFailure.
    pub fn parse(&self, smiles: &str) -> Result<Molecule, ParseFailure> {
        parse_smiles(smiles).map_err(|reason| ParseFailure {
            smiles: smiles.to_string(),
            reason,
        })
    }
}

fn parse_smiles(smiles: &str) -> Result<Molecule, SmilesError> {
    let text = smiles.trim();
    if text.is_empty() {
        return Err(SmilesError::Empty);
    }
    let mut state = ParseState::new(text.as_bytes());
    state.run()?;
    state.finish()
}

/// Largest formal charge magnitude a bracket atom may carry.
const MAX_CHARGE: i8 = 15;

/// A ring bond seen once, waiting for its partner.
struct OpenRing {
    atom:  usize,
    order: Option<BondOrder>,
}

struct ParseState<'a> {
    input:        &'a [u8],
    pos:          usize,
    atoms:        Vec<Atom>,
    bonds:        Vec<Bond>,
    prev:         Option<usize>,
    pending_bond: Option<(BondOrder, usize)>,
    branches:     Vec<(Option<usize>, usize)>,
    rings:        BTreeMap<u16, OpenRing>,
}

impl<'a> ParseState<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            pending_bond: None,
            branches: Vec::new(),
            rings: BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn unexpected(&self, at: usize) -> SmilesError {
        SmilesError::UnexpectedChar { ch: self.input[at] as char, pos: at }
    }

    fn run(&mut self) -> Result<(), SmilesError> {
        while let Some(c) = self.peek() {
            let at = self.pos;
            match c {
                b'(' => {
                    if self.prev.is_none() || self.pending_bond.is_some() {
                        return Err(self.unexpected(at));
                    }
                    self.branches.push((self.prev, at));
                    self.pos += 1;
                }
                b')' => {
                    if let Some((_, bond_at)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(bond_at));
                    }
                    if matches!(self.branches.last(), Some(&(_, open)) if open + 1 == at) {
                        return Err(self.unexpected(at));
                    }
                    let (resume, _) = self.branches.pop().ok_or(SmilesError::UnbalancedParen(at))?;
                    self.prev = resume;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.prev.is_none() {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    if self.pending_bond.is_some() {
                        return Err(self.unexpected(at));
                    }
                    let order = match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _    => BondOrder::Single,
                    };
                    self.pending_bond = Some((order, at));
                    self.pos += 1;
                }
                b'.' => {
                    if self.prev.is_none() {
                        return Err(self.unexpected(at));
                    }
                    if let Some((_, bond_at)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(bond_at));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => self.ring_bond()?,
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom);
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.push_atom(atom);
                }
            }
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: Atom) {
        let idx = self.atoms.len();
        let aromatic = atom.aromatic;
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            let order = match self.pending_bond.take() {
                Some((order, _)) => order,
                None => self.default_order(prev, aromatic),
            };
            self.bonds.push(Bond::new(prev, idx, order));
        }
        self.prev = Some(idx);
    }

    fn default_order(&self, other: usize, aromatic: bool) -> BondOrder {
        if aromatic && self.atoms[other].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    // ── Atoms ─────────────────────────────────────────────────────────────────

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let at = self.pos;
        let c = self.input[at];
        if !c.is_ascii_alphabetic() {
            return Err(self.unexpected(at));
        }

        let (symbol, len) = match (c, self.peek_at(1)) {
            (b'C', Some(b'l')) => ("Cl", 2),
            (b'B', Some(b'r')) => ("Br", 2),
            (b'B', _) => ("B", 1),
            (b'C', _) => ("C", 1),
            (b'N', _) => ("N", 1),
            (b'O', _) => ("O", 1),
            (b'P', _) => ("P", 1),
            (b'S', _) => ("S", 1),
            (b'F', _) => ("F", 1),
            (b'I', _) => ("I", 1),
            (b'b', _) => ("b", 1),
            (b'c', _) => ("c", 1),
            (b'n', _) => ("n", 1),
            (b'o', _) => ("o", 1),
            (b'p', _) => ("p", 1),
            (b's', _) => ("s", 1),
            _ => {
                return Err(SmilesError::UnknownElement {
                    symbol: (c as char).to_string(),
                    pos:    at,
                })
            }
        };

        let aromatic = symbol.chars().all(|ch| ch.is_ascii_lowercase());
        let element = element_for(symbol, at)?;
        self.pos += len;

        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        Ok(atom)
    }

    /// `[` isotope? symbol chiral? hcount? charge? class? `]`
    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let open = self.pos;
        self.pos += 1;

        let isotope = self.read_number().map(|n| n.min(u16::MAX as u32) as u16);

        let sym_at = self.pos;
        let first = self.peek().ok_or(SmilesError::UnclosedBracket(open))?;
        if !first.is_ascii_alphabetic() {
            return Err(self.unexpected(sym_at));
        }
        let aromatic = first.is_ascii_lowercase();

        // Prefer a two-letter symbol when the second letter makes one.
        let two = self
            .peek_at(1)
            .filter(|b| b.is_ascii_lowercase())
            .map(|b| [first, b]);
        let symbol = match two.and_then(|pair| {
            let s = std::str::from_utf8(&pair).ok()?.to_string();
            symbol_to_element(&s).map(|_| s)
        }) {
            Some(s) => s,
            None => (first as char).to_string(),
        };
        let element = element_for(&symbol, sym_at)?;
        self.pos += symbol.len();

        // Chirality: @, @@, @TH1, @AL2, ... — skipped.
        while self.peek() == Some(b'@') {
            self.pos += 1;
            let class = [self.peek(), self.peek_at(1)];
            if matches!(
                class,
                [Some(b'T'), Some(b'H')] | [Some(b'A'), Some(b'L')] | [Some(b'S'), Some(b'P')]
                    | [Some(b'T'), Some(b'B')] | [Some(b'O'), Some(b'H')]
            ) {
                self.pos += 2;
                self.read_number();
            }
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.pos += 1;
            hydrogens = self.read_number().map(|n| n.min(u8::MAX as u32) as u8).unwrap_or(1);
        }

        let mut charge: i8 = 0;
        while let Some(sign @ (b'+' | b'-')) = self.peek() {
            let sign_at = self.pos;
            self.pos += 1;
            let magnitude = self.read_number().unwrap_or(1);
            let step = i8::try_from(magnitude)
                .ok()
                .filter(|m| *m <= MAX_CHARGE)
                .ok_or(SmilesError::ChargeOutOfRange(sign_at))?;
            charge = if sign == b'+' { charge + step } else { charge - step };
            if !(-MAX_CHARGE..=MAX_CHARGE).contains(&charge) {
                return Err(SmilesError::ChargeOutOfRange(sign_at));
            }
        }

        if self.peek() == Some(b':') {
            self.pos += 1;
            if self.read_number().is_none() {
                return Err(self.unexpected(self.pos.min(self.input.len() - 1)));
            }
        }

        match self.peek() {
            Some(b']') => self.pos += 1,
            Some(_) => return Err(self.unexpected(self.pos)),
            None => return Err(SmilesError::UnclosedBracket(open)),
        }

        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        atom.isotope = isotope;
        atom.hydrogens = hydrogens;
        atom.charge = charge;
        atom.bracket = true;
        Ok(atom)
    }

    /// Digits at the cursor; saturates at u32::MAX instead of overflowing.
    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            self.pos += 1;
            let acc = value.unwrap_or(0);
            value = Some(acc.saturating_mul(10).saturating_add((d - b'0') as u32));
        }
        value
    }

    // ── Ring bonds ────────────────────────────────────────────────────────────

    fn ring_bond(&mut self) -> Result<(), SmilesError> {
        let at = self.pos;
        let prev = self.prev.ok_or_else(|| self.unexpected(at))?;

        let label = if self.input[at] == b'%' {
            match (self.peek_at(1), self.peek_at(2)) {
                (Some(a @ b'0'..=b'9'), Some(b @ b'0'..=b'9')) => {
                    self.pos += 3;
                    ((a - b'0') as u16) * 10 + (b - b'0') as u16
                }
                _ => return Err(self.unexpected(at)),
            }
        } else {
            self.pos += 1;
            (self.input[at] - b'0') as u16
        };

        let order = self.pending_bond.take().map(|(order, _)| order);

        match self.rings.remove(&label) {
            None => {
                self.rings.insert(label, OpenRing { atom: prev, order });
            }
            Some(open) => {
                let invalid = SmilesError::InvalidRingClosure { label, pos: at };
                if open.atom == prev {
                    return Err(invalid);
                }
                let order = match (open.order, order) {
                    (Some(a), Some(b)) if a != b => return Err(invalid),
                    (Some(a), _) | (None, Some(a)) => a,
                    (None, None) => self.default_order(open.atom, self.atoms[prev].aromatic),
                };
                let bond = Bond::new(open.atom, prev, order);
                if self.bonds.iter().any(|b| b.i == bond.i && b.j == bond.j) {
                    return Err(invalid);
                }
                self.bonds.push(bond);
            }
        }
        Ok(())
    }

    // ── Completion ────────────────────────────────────────────────────────────

    fn finish(mut self) -> Result<Molecule, SmilesError> {
        if let Some((_, bond_at)) = self.pending_bond {
            return Err(SmilesError::DanglingBond(bond_at));
        }
        if let Some(&(_, paren_at)) = self.branches.last() {
            return Err(SmilesError::UnbalancedParen(paren_at));
        }
        if let Some(&label) = self.rings.keys().next() {
            return Err(SmilesError::UnclosedRing(label));
        }
        if self.atoms.is_empty() {
            return Err(SmilesError::Empty);
        }

        let in_ring = ring_atoms(self.atoms.len(), &self.bonds);
        for (index, atom) in self.atoms.iter().enumerate() {
            if atom.aromatic && !in_ring[index] {
                return Err(SmilesError::AromaticOutsideRing { index, element: atom.element });
            }
        }

        let mut bond_sums = vec![0u8; self.atoms.len()];
        for bond in &self.bonds {
            bond_sums[bond.i] = bond_sums[bond.i].saturating_add(bond.order.valence());
            bond_sums[bond.j] = bond_sums[bond.j].saturating_add(bond.order.valence());
        }

        check_kekule(&self.atoms, &self.bonds, &bond_sums)?;

        for (index, atom) in self.atoms.iter_mut().enumerate() {
            assign_hydrogens(index, atom, bond_sums[index])?;
        }

        Ok(Molecule::from_parts(self.atoms, self.bonds))
    }
}

fn symbol_to_element(symbol: &str) -> Option<Element> {
    let mut chars = symbol.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let canonical: String = std::iter::once(first).chain(chars).collect();
    canonical.parse().ok()
}

fn element_for(symbol: &str, pos: usize) -> Result<Element, SmilesError> {
    let element = symbol_to_element(symbol).ok_or_else(|| SmilesError::UnknownElement {
        symbol: symbol.to_string(),
        pos,
    })?;
    if symbol.starts_with(|c: char| c.is_ascii_lowercase()) && !element.can_be_aromatic() {
        return Err(SmilesError::NotAromatic { symbol: symbol.to_string(), pos });
    }
    Ok(element)
}

/// Fill in hydrogens and check the valence of one atom.
fn assign_hydrogens(index: usize, atom: &mut Atom, bond_sum: u8) -> Result<(), SmilesError> {
    let element = atom.element;
    let unsupported = |valence: u8| SmilesError::UnsupportedValence { index, element, valence };

    if atom.bracket {
        let total = bond_sum.saturating_add(atom.hydrogens);
        if let Some(max) = element.max_valence(atom.charge) {
            if total > max {
                return Err(unsupported(total));
            }
        }
        if !atom.aromatic {
            if let Some(min) = element.min_valence(atom.charge) {
                atom.radical_electrons = min.saturating_sub(total);
            }
        }
        return Ok(());
    }

    let valences = element.default_valences();
    let lowest = valences.first().copied().unwrap_or(0);
    let highest = valences.last().copied().unwrap_or(0);
    if bond_sum > highest {
        return Err(unsupported(bond_sum));
    }

    // An aromatic atom also spends one electron on the pi system,
    // unless it already uses its lowest valence (furan o, thiophene s).
    let used = if atom.aromatic && bond_sum < lowest { bond_sum + 1 } else { bond_sum };
    let target = valences.iter().copied().find(|&v| v >= used).unwrap_or(highest);
    atom.hydrogens = target.saturating_sub(used);
    Ok(())
}

/// Whether an aromatic atom must take one double bond from its ring.
/// Atoms already at their lowest valence (furan o, thiophene s, [nH])
/// give a lone pair instead.
fn needs_double(atom: &Atom, bond_sum: u8) -> bool {
    if !atom.aromatic {
        return false;
    }
    if atom.bracket {
        atom.element
            .min_valence(atom.charge)
            .is_some_and(|min| bond_sum.saturating_add(atom.hydrogens) < min)
    } else {
        atom.element
            .default_valences()
            .first()
            .is_some_and(|&lowest| bond_sum < lowest)
    }
}

/// Every aromatic atom that needs a double bond must get exactly one,
/// over an aromatic bond to another such atom: a perfect matching on
/// each connected aromatic system.
fn check_kekule(atoms: &[Atom], bonds: &[Bond], bond_sums: &[u8]) -> Result<(), SmilesError> {
    let needs: Vec<bool> = atoms
        .iter()
        .zip(bond_sums)
        .map(|(atom, &sum)| needs_double(atom, sum))
        .collect();

    let mut adj = vec![Vec::new(); atoms.len()];
    for bond in bonds {
        if bond.order == BondOrder::Aromatic && needs[bond.i] && needs[bond.j] {
            adj[bond.i].push(bond.j);
            adj[bond.j].push(bond.i);
        }
    }

    let mut mate = vec![None; atoms.len()];
    let mut seen = vec![false; atoms.len()];
    for start in 0..atoms.len() {
        if !needs[start] || seen[start] {
            continue;
        }
        let mut system = vec![start];
        seen[start] = true;
        let mut next = 0;
        while next < system.len() {
            let u = system[next];
            next += 1;
            for &v in &adj[u] {
                if !seen[v] {
                    seen[v] = true;
                    system.push(v);
                }
            }
        }
        if system.len() % 2 == 1 || !match_all(&system, &adj, &mut mate) {
            return Err(SmilesError::Kekulize(start));
        }
    }
    Ok(())
}

/// Backtracking matching; always extends the atom with the fewest free
/// partners, so forced choices are made first.
fn match_all(system: &[usize], adj: &[Vec<usize>], mate: &mut [Option<usize>]) -> bool {
    let free = |v: usize, mate: &[Option<usize>]| adj[v].iter().filter(|&&u| mate[u].is_none()).count();
    let Some(v) = system
        .iter()
        .copied()
        .filter(|&v| mate[v].is_none())
        .min_by_key(|&v| free(v, mate))
    else {
        return true;
    };
    for &u in &adj[v] {
        if mate[u].is_none() {
            mate[v] = Some(u);
            mate[u] = Some(v);
            if match_all(system, adj, mate) {
                return true;
            }
            mate[v] = None;
            mate[u] = None;
        }
    }
    false
}

/// Atoms that belong to at least one cycle. A bond is a ring bond when
/// its endpoints stay connected without it.
fn ring_atoms(n_atoms: usize, bonds: &[Bond]) -> Vec<bool> {
    let mut adj = vec![Vec::new(); n_atoms];
    for (k, bond) in bonds.iter().enumerate() {
        adj[bond.i].push((bond.j, k));
        adj[bond.j].push((bond.i, k));
    }

    let mut in_ring = vec![false; n_atoms];
    for (k, bond) in bonds.iter().enumerate() {
        if in_ring[bond.i] && in_ring[bond.j] {
            continue;
        }
        let mut seen = vec![false; n_atoms];
        let mut queue = VecDeque::from([bond.i]);
        seen[bond.i] = true;
        while let Some(u) = queue.pop_front() {
            for &(v, via) in &adj[u] {
                if via != k && !seen[v] {
                    seen[v] = true;
                    queue.push_back(v);
                }
            }
        }
        if seen[bond.j] {
            in_ring[bond.i] = true;
            in_ring[bond.j] = true;
        }
    }
    in_ring
}
