//! Built-in nearest-neighbour parameter set.
//!
//! A simplified Turner 2004 set: stacking, loop initiation, dangles and the
//! special hairpin loops follow the published free energies; terminal
//! mismatch tables are derived from the dangles plus first-mismatch bonuses
//! instead of being tabulated for every sequence combination.

use super::INF;
use super::params::{Energy, EnergyParams, Enthalpies, SpecialHairpin, Table1, Table2, Table3};
use crate::core::sequence::alphabet::{NUM_BASES, NUM_PAIR_TYPES};
use phf::{Map, phf_map};

const A: usize = 1;
const G: usize = 3;
const U: usize = 4;

/// Tetraloops keyed by the closing pair plus loop, as (dG, dH).
#[rustfmt::skip]
pub static TETRALOOPS: Map<&'static str, (i32, i32)> = phf_map! {
    "CAACGG" => (550, 690),   "CCAAGG" => (330, -1030), "CCACGG" => (370, -330),
    "CCCAGG" => (340, -890),  "CCGAGG" => (350, -660),  "CCGCGG" => (360, -750),
    "CCUAGG" => (370, -350),  "CCUCGG" => (250, -1390), "CUAAGG" => (360, -760),
    "CUACGG" => (280, -1070), "CUCAGG" => (370, -660),  "CUCCGG" => (270, -1290),
    "CUGCGG" => (280, -1070), "CUUAGG" => (350, -620),  "CUUCGG" => (370, -1530),
    "CUUUGG" => (370, -680),
};

#[rustfmt::skip]
pub static TRILOOPS: Map<&'static str, (i32, i32)> = phf_map! {
    "CAACG" => (680, 2370),
    "GUUAC" => (690, 1080),
};

#[rustfmt::skip]
pub static HEXALOOPS: Map<&'static str, (i32, i32)> = phf_map! {
    "ACAGUACU" => (280, -1680),
    "ACAGUGAU" => (360, -1140),
    "ACAGUGCU" => (290, -1280),
    "ACAGUGUU" => (180, -1540),
};

// Rows and columns: CG GC GU UG AU UA.
#[rustfmt::skip]
const STACK_37: [[i32; 6]; 6] = [
    [-240, -330, -210, -140, -210, -210],
    [-330, -340, -250, -150, -220, -240],
    [-210, -250,  130,  -50, -140, -130],
    [-140, -150,  -50,   30,  -60, -100],
    [-210, -220, -140,  -60, -110,  -90],
    [-210, -240, -130, -100,  -90, -130],
];

#[rustfmt::skip]
const STACK_H: [[i32; 6]; 6] = [
    [-1060, -1340, -1210,  -560, -1050, -1040],
    [-1340, -1490, -1260,  -830, -1140, -1240],
    [-1210, -1260, -1460, -1350,  -880, -1280],
    [ -560,  -830, -1350,  -930,  -320,  -700],
    [-1050, -1140,  -880,  -320,  -940,  -680],
    [-1040, -1240, -1280,  -700,  -680,  -770],
];

#[rustfmt::skip]
const HAIRPIN_37: [i32; 31] = [
    INF, INF, INF, 540, 560, 570, 540, 600, 550, 640,
    650, 660, 670, 678, 686, 694, 701, 707, 713, 719,
    725, 730, 735, 740, 744, 749, 753, 757, 761, 765,
    769,
];

#[rustfmt::skip]
const HAIRPIN_H: [i32; 31] = [
    INF, INF, INF, 130, 480, 360, -290, 130, -290, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500,
];

#[rustfmt::skip]
const BULGE_37: [i32; 31] = [
    INF, 380, 280, 320, 360, 400, 440, 459, 470, 480,
    490, 500, 510, 519, 527, 534, 541, 548, 554, 560,
    565, 571, 576, 580, 585, 589, 594, 598, 602, 605,
    609,
];

#[rustfmt::skip]
const BULGE_H: [i32; 31] = [
    INF, 1060, 710, 710, 710, 710, 710, 710, 710, 710,
    710,  710, 710, 710, 710, 710, 710, 710, 710, 710,
    710,  710, 710, 710, 710, 710, 710, 710, 710, 710,
    710,
];

#[rustfmt::skip]
const INTERIOR_37: [i32; 31] = [
    INF, INF, 100, 160, 110, 200, 200, 210, 230, 240,
    250, 260, 270, 280, 290, 290, 300, 310, 310, 320,
    330, 330, 340, 340, 350, 350, 350, 360, 360, 370,
    370,
];

#[rustfmt::skip]
const INTERIOR_H: [i32; 31] = [
    INF,  INF, -720, -680, -130, -130, -130, -130, -130, -130,
    -130, -130, -130, -130, -130, -130, -130, -130, -130, -130,
    -130, -130, -130, -130, -130, -130, -130, -130, -130, -130,
    -130,
];

// Rows: CG GC GU UG AU UA; columns: unknown A C G U.
#[rustfmt::skip]
const DANGLE5_37: [[i32; 5]; 6] = [
    [-10, -50, -30, -20, -10],
    [  0, -20, -30,   0,   0],
    [-20, -30, -30, -40, -20],
    [-10, -30, -10, -20, -20],
    [-20, -30, -30, -40, -20],
    [-10, -30, -10, -20, -20],
];

#[rustfmt::skip]
const DANGLE3_37: [[i32; 5]; 6] = [
    [-40, -110, -40, -130,  -60],
    [-80, -170, -80, -170, -120],
    [-10,  -70, -10,  -70,  -10],
    [-50,  -80, -50,  -80,  -60],
    [-10,  -70, -10,  -70,  -10],
    [-50,  -80, -50,  -80,  -60],
];

fn pair_table(canonical: &[[i32; 6]; 6]) -> Table2 {
    let mut table = vec![vec![Energy(0); NUM_PAIR_TYPES]; NUM_PAIR_TYPES];
    table[0] = vec![Energy::INF; NUM_PAIR_TYPES];
    for t in 1..=6 {
        for u in 1..=6 {
            table[t][u] = Energy(canonical[t - 1][u - 1]);
        }
    }
    table
}

fn loop_table(values: &[i32; 31]) -> Table1 {
    values.iter().map(|&v| Energy(v)).collect()
}

fn dangle_table(canonical: &[[i32; 5]; 6]) -> Table2 {
    let mut table = vec![vec![Energy(0); NUM_BASES]; NUM_PAIR_TYPES];
    for t in 1..=6 {
        table[t] = canonical[t - 1].iter().map(|&v| Energy(v)).collect();
    }
    table
}

fn mismatch_table(entry: impl Fn(usize, usize, usize) -> i32) -> Table3 {
    let mut table = vec![vec![vec![Energy(0); NUM_BASES]; NUM_BASES]; NUM_PAIR_TYPES];
    for (t, plane) in table.iter_mut().enumerate().take(7).skip(1) {
        for (a, row) in plane.iter_mut().enumerate() {
            for (b, cell) in row.iter_mut().enumerate() {
                *cell = Energy(entry(t, a, b));
            }
        }
    }
    table
}

fn dangle_sum(t: usize, a: usize, b: usize) -> i32 {
    DANGLE5_37[t - 1][a] + DANGLE3_37[t - 1][b]
}

fn hairpin_mismatch(t: usize, a: usize, b: usize) -> i32 {
    let bonus = match (a, b) {
        (G, A) => -80,
        (U, U) => -90,
        (G, G) => -80,
        _ => 0,
    };
    dangle_sum(t, a, b) + bonus
}

fn interior_mismatch(t: usize, a: usize, b: usize) -> i32 {
    let terminal = if t > 2 { 70 } else { 0 };
    let bonus = match (a, b) {
        (G, A) => -110,
        (A, G) => -80,
        (G, G) => -100,
        (U, U) => -70,
        _ => 0,
    };
    terminal + bonus
}

fn special_hairpins() -> std::collections::BTreeMap<String, SpecialHairpin> {
    TETRALOOPS
        .entries()
        .chain(TRILOOPS.entries())
        .chain(HEXALOOPS.entries())
        .map(|(&seq, &(dg, dh))| {
            (
                seq.to_string(),
                SpecialHairpin {
                    energy: Energy(dg),
                    enthalpy: Some(Energy(dh)),
                },
            )
        })
        .collect()
}

impl Default for EnergyParams {
    fn default() -> Self {
        Self {
            stack: pair_table(&STACK_37),
            hairpin: loop_table(&HAIRPIN_37),
            bulge: loop_table(&BULGE_37),
            interior: loop_table(&INTERIOR_37),
            mismatch_hairpin: mismatch_table(hairpin_mismatch),
            mismatch_interior: mismatch_table(interior_mismatch),
            mismatch_multi: mismatch_table(dangle_sum),
            mismatch_exterior: mismatch_table(dangle_sum),
            dangle5: dangle_table(&DANGLE5_37),
            dangle3: dangle_table(&DANGLE3_37),
            ml_closing: Energy(930),
            ml_intern: Energy(-90),
            ml_base: Energy(0),
            ninio: Energy(60),
            max_ninio: Energy(300),
            terminal_au: Energy(50),
            lxc: 107.856,
            gapped_hairpin: Energy(600),
            special_hairpins: special_hairpins(),
            enthalpies: Enthalpies {
                stack: Some(pair_table(&STACK_H)),
                hairpin: Some(loop_table(&HAIRPIN_H)),
                bulge: Some(loop_table(&BULGE_H)),
                interior: Some(loop_table(&INTERIOR_H)),
                ml_closing: Some(Energy(3000)),
                ml_intern: Some(Energy(-220)),
                ml_base: Some(Energy(0)),
                ninio: Some(Energy(320)),
                terminal_au: Some(Energy(370)),
                ..Enthalpies::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_table_is_symmetric_under_strand_swap() {
        let stack = pair_table(&STACK_37);
        // stack[p][q] describes the same stack as stack[q][p] read from the other strand.
        for t in 1..=6 {
            for u in 1..=6 {
                assert_eq!(stack[t][u], stack[u][t], "stack[{t}][{u}]");
            }
        }
    }

    #[test]
    fn special_hairpin_keys_have_expected_lengths() {
        assert!(TETRALOOPS.keys().all(|k| k.len() == 6));
        assert!(TRILOOPS.keys().all(|k| k.len() == 5));
        assert!(HEXALOOPS.keys().all(|k| k.len() == 8));
        assert_eq!(special_hairpins().len(), 22);
    }

    #[test]
    fn hairpin_mismatch_rewards_ga_first_mismatch() {
        let gc = 2;
        assert!(hairpin_mismatch(gc, G, A) < dangle_sum(gc, G, A));
    }

    #[test]
    fn interior_mismatch_carries_terminal_penalty_for_au_pairs() {
        let (cg, au) = (1, 5);
        assert_eq!(interior_mismatch(cg, 2, 2), 0);
        assert_eq!(interior_mismatch(au, 2, 2), 70);
    }
}
