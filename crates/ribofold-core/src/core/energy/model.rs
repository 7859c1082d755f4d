use super::params::{Energy, EnergyParams, IncompleteModel, Table1, Table2, Table3};
use super::{INF, MAXLOOP};
use crate::core::sequence::alphabet::{BaseCode, NUM_BASES, NUM_PAIR_TYPES, PairType, pair_type};
use serde::Deserialize;
use std::collections::HashMap;

pub const GAS_CONSTANT: f64 = 1.98717;
pub const ZERO_CELSIUS: f64 = 273.15;
const T37: f64 = 310.15;

/// Treatment of unpaired nucleotides adjacent to exterior and multiloop
/// helices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DangleModel {
    /// No dangling-end contributions.
    None,
    /// Only the 3' dangle of each helix end is scored.
    OneSided,
    /// Both 5' and 3' dangles are added independently.
    BothSided,
    /// Terminal mismatch when both neighbours exist, a single dangle otherwise.
    #[default]
    MismatchAware,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelOptions {
    /// Temperature in °C.
    pub temperature: f64,
    pub dangles: DangleModel,
    pub no_lonely_pairs: bool,
    pub allow_gu: bool,
    pub special_hairpins: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 37.0,
            dangles: DangleModel::default(),
            no_lonely_pairs: false,
            allow_gu: true,
            special_hairpins: true,
        }
    }
}

type PairMatrix = [[i32; NUM_PAIR_TYPES]; NUM_PAIR_TYPES];
type LoopArray = [i32; MAXLOOP + 1];
type MismatchArray = [[[i32; NUM_BASES]; NUM_BASES]; NUM_PAIR_TYPES];
type DangleArray = [[i32; NUM_BASES]; NUM_PAIR_TYPES];

/// Temperature-scaled nearest-neighbour energy model.
///
/// All energies are integers in dcal/mol. The model is immutable once built
/// and is shared between fold compounds through an `Arc`.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    options: ModelOptions,
    kt: f64,
    stack: PairMatrix,
    hairpin: LoopArray,
    bulge: LoopArray,
    interior: LoopArray,
    mismatch_hairpin: MismatchArray,
    mismatch_interior: MismatchArray,
    mismatch_multi: MismatchArray,
    mismatch_exterior: MismatchArray,
    dangle5: DangleArray,
    dangle3: DangleArray,
    ml_closing: i32,
    ml_intern: i32,
    ml_base: i32,
    ninio: i32,
    max_ninio: i32,
    terminal_au: i32,
    gapped_hairpin: i32,
    lxc: f64,
    special_hairpins: HashMap<String, i32>,
}

struct Scaler {
    ratio: f64,
}

impl Scaler {
    fn value(&self, g: Energy, h: Option<Energy>) -> i32 {
        if g.is_inf() {
            return INF;
        }
        let h = h.filter(|h| !h.is_inf()).map_or(0.0, |h| h.0 as f64);
        (h - (h - g.0 as f64) * self.ratio).round() as i32
    }

    fn loop_array(&self, g: &Table1, h: Option<&Table1>) -> LoopArray {
        let mut out = [INF; MAXLOOP + 1];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.value(g[idx], h.map(|h| h[idx]));
        }
        out
    }

    fn pair_matrix(&self, g: &Table2, h: Option<&Table2>) -> PairMatrix {
        let mut out = [[INF; NUM_PAIR_TYPES]; NUM_PAIR_TYPES];
        for (t, row) in out.iter_mut().enumerate() {
            for (u, slot) in row.iter_mut().enumerate() {
                *slot = self.value(g[t][u], h.map(|h| h[t][u]));
            }
        }
        out
    }

    fn dangle_array(&self, g: &Table2, h: Option<&Table2>) -> DangleArray {
        let mut out = [[0; NUM_BASES]; NUM_PAIR_TYPES];
        for (t, row) in out.iter_mut().enumerate() {
            for (b, slot) in row.iter_mut().enumerate() {
                *slot = self.value(g[t][b], h.map(|h| h[t][b]));
            }
        }
        out
    }

    fn mismatch_array(&self, g: &Table3, h: Option<&Table3>) -> MismatchArray {
        let mut out = [[[0; NUM_BASES]; NUM_BASES]; NUM_PAIR_TYPES];
        for (t, plane) in out.iter_mut().enumerate() {
            for (a, row) in plane.iter_mut().enumerate() {
                for (b, slot) in row.iter_mut().enumerate() {
                    *slot = self.value(g[t][a][b], h.map(|h| h[t][a][b]));
                }
            }
        }
        out
    }
}

impl EnergyModel {
    pub fn new(params: &EnergyParams, options: &ModelOptions) -> Result<Self, IncompleteModel> {
        params.validate()?;

        let scaler = Scaler {
            ratio: (options.temperature + ZERO_CELSIUS) / T37,
        };
        let h = &params.enthalpies;

        let special_hairpins = params
            .special_hairpins
            .iter()
            .map(|(seq, entry)| {
                (
                    seq.to_ascii_uppercase().replace('T', "U"),
                    scaler.value(entry.energy, entry.enthalpy),
                )
            })
            .collect();

        Ok(Self {
            options: options.clone(),
            kt: (options.temperature + ZERO_CELSIUS) * GAS_CONSTANT,
            stack: scaler.pair_matrix(&params.stack, h.stack.as_ref()),
            hairpin: scaler.loop_array(&params.hairpin, h.hairpin.as_ref()),
            bulge: scaler.loop_array(&params.bulge, h.bulge.as_ref()),
            interior: scaler.loop_array(&params.interior, h.interior.as_ref()),
            mismatch_hairpin: scaler
                .mismatch_array(&params.mismatch_hairpin, h.mismatch_hairpin.as_ref()),
            mismatch_interior: scaler
                .mismatch_array(&params.mismatch_interior, h.mismatch_interior.as_ref()),
            mismatch_multi: scaler.mismatch_array(&params.mismatch_multi, h.mismatch_multi.as_ref()),
            mismatch_exterior: scaler
                .mismatch_array(&params.mismatch_exterior, h.mismatch_exterior.as_ref()),
            dangle5: scaler.dangle_array(&params.dangle5, h.dangle5.as_ref()),
            dangle3: scaler.dangle_array(&params.dangle3, h.dangle3.as_ref()),
            ml_closing: scaler.value(params.ml_closing, h.ml_closing),
            ml_intern: scaler.value(params.ml_intern, h.ml_intern),
            ml_base: scaler.value(params.ml_base, h.ml_base),
            ninio: scaler.value(params.ninio, h.ninio),
            max_ninio: scaler.value(params.max_ninio, None),
            terminal_au: scaler.value(params.terminal_au, h.terminal_au),
            gapped_hairpin: scaler.value(params.gapped_hairpin, None),
            lxc: params.lxc * scaler.ratio,
            special_hairpins,
        })
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Thermal energy `RT` in cal/mol.
    pub fn kt(&self) -> f64 {
        self.kt
    }

    pub fn pair_type(&self, a: BaseCode, b: BaseCode) -> PairType {
        pair_type(a, b, self.options.allow_gu)
    }

    #[inline]
    fn terminal(&self, pair: PairType) -> i32 {
        if pair > 2 { self.terminal_au } else { 0 }
    }

    fn extrapolate(&self, table: &LoopArray, size: usize) -> i32 {
        if size <= MAXLOOP {
            table[size]
        } else {
            table[MAXLOOP] + (self.lxc * (size as f64 / MAXLOOP as f64).ln()) as i32
        }
    }

    /// Hairpin loop of `size` unpaired bases closed by `pair`.
    ///
    /// `si1`/`sj1` are the bases adjacent to the closing pair inside the
    /// loop. `loop_seq` (closing pair included) enables the special
    /// tri-, tetra- and hexaloop lookups.
    pub fn hairpin(
        &self,
        size: usize,
        pair: PairType,
        si1: BaseCode,
        sj1: BaseCode,
        loop_seq: Option<&str>,
    ) -> i32 {
        if size < super::TURN {
            return INF;
        }

        let mut energy = self.extrapolate(&self.hairpin, size);

        if self.options.special_hairpins && matches!(size, 3 | 4 | 6) {
            if let Some(special) = loop_seq.and_then(|s| self.special_hairpins.get(s)) {
                return *special;
            }
        }

        if size == 3 {
            return energy + self.terminal(pair);
        }
        energy += self.mismatch_hairpin[pair][si1 as usize][sj1 as usize];
        energy
    }

    /// Generic interior loop between the outer pair of type `pair` and the
    /// inner pair read from its inner side (`inner`, already reversed).
    ///
    /// `si1`, `sj1` are the bases 3' of `i` and 5' of `j`; `sp1`, `sq1` the
    /// bases 5' of `k` and 3' of `l`.
    #[allow(clippy::too_many_arguments)]
    pub fn interior(
        &self,
        u1: usize,
        u2: usize,
        pair: PairType,
        inner: PairType,
        si1: BaseCode,
        sj1: BaseCode,
        sp1: BaseCode,
        sq1: BaseCode,
    ) -> i32 {
        let (ns, nl) = if u1 < u2 { (u1, u2) } else { (u2, u1) };

        if nl == 0 {
            return self.stack[pair][inner];
        }

        if ns == 0 {
            let mut energy = self.extrapolate(&self.bulge, nl);
            if nl == 1 {
                energy += self.stack[pair][inner];
            } else {
                energy += self.terminal(pair) + self.terminal(inner);
            }
            return energy;
        }

        let init = self.extrapolate(&self.interior, nl + ns);
        let asymmetry = ((nl - ns) as i32 * self.ninio).min(self.max_ninio);

        if ns == 1 {
            return init + asymmetry + self.terminal(pair) + self.terminal(inner);
        }

        init + asymmetry
            + self.mismatch_interior[pair][si1 as usize][sj1 as usize]
            + self.mismatch_interior[inner][sq1 as usize][sp1 as usize]
    }

    fn stem_dangles(
        &self,
        mismatch: &MismatchArray,
        pair: PairType,
        n5: Option<BaseCode>,
        n3: Option<BaseCode>,
    ) -> i32 {
        match self.options.dangles {
            DangleModel::None => 0,
            DangleModel::OneSided => n3.map_or(0, |b| self.dangle3[pair][b as usize]),
            DangleModel::BothSided => {
                n5.map_or(0, |b| self.dangle5[pair][b as usize])
                    + n3.map_or(0, |b| self.dangle3[pair][b as usize])
            }
            DangleModel::MismatchAware => match (n5, n3) {
                (Some(a), Some(b)) => mismatch[pair][a as usize][b as usize],
                (Some(a), None) => self.dangle5[pair][a as usize],
                (None, Some(b)) => self.dangle3[pair][b as usize],
                (None, None) => 0,
            },
        }
    }

    /// Helix end in the exterior loop. `n5`/`n3` are the neighbours 5' of
    /// the opening and 3' of the closing base, if any.
    pub fn ext_stem(&self, pair: PairType, n5: Option<BaseCode>, n3: Option<BaseCode>) -> i32 {
        self.terminal(pair) + self.stem_dangles(&self.mismatch_exterior, pair, n5, n3)
    }

    /// Helix end inside a multiloop, including the per-branch penalty.
    pub fn ml_stem(&self, pair: PairType, n5: Option<BaseCode>, n3: Option<BaseCode>) -> i32 {
        self.ml_intern + self.terminal(pair) + self.stem_dangles(&self.mismatch_multi, pair, n5, n3)
    }

    /// Multiloop closing penalty, without the closing pair's stem term.
    pub fn ml_closing(&self) -> i32 {
        self.ml_closing
    }

    pub fn ml_base(&self) -> i32 {
        self.ml_base
    }

    pub fn gapped_hairpin(&self) -> i32 {
        self.gapped_hairpin
    }
}

/// Boltzmann weight of `energy` (dcal/mol) at thermal energy `kt` (cal/mol).
#[inline]
pub fn boltzmann(energy: i32, kt: f64) -> f64 {
    if energy >= INF {
        0.0
    } else {
        (-(energy as f64) * 10.0 / kt).exp()
    }
}
