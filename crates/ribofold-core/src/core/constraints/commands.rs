use super::ConstraintError;
use super::context::LoopContext;
use super::soft::MAX_PSEUDO_ENERGY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairDirection {
    Any,
    /// Partner lies 3' of the position.
    Downstream,
    /// Partner lies 5' of the position.
    Upstream,
}

/// A single constraint directive, hard or soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ForcePair {
        i: usize,
        j: usize,
        context: LoopContext,
    },
    ForcePaired {
        i: usize,
        direction: PairDirection,
    },
    ForceUnpaired {
        i: usize,
        context: LoopContext,
    },
    ProhibitPair {
        i: usize,
        j: usize,
        context: LoopContext,
    },
    ProhibitPairing {
        i: usize,
    },
    AllowPair {
        i: usize,
        j: usize,
        context: LoopContext,
    },
    /// Pseudo-energy in dcal/mol added whenever `(i, j)` forms.
    PairBonus {
        i: usize,
        j: usize,
        energy: i32,
    },
    /// Pseudo-energy in dcal/mol added whenever `i` stays unpaired.
    UnpairedBonus {
        i: usize,
        energy: i32,
    },
}

impl Command {
    pub fn is_soft(&self) -> bool {
        matches!(self, Command::PairBonus { .. } | Command::UnpairedBonus { .. })
    }
}

/// Parses a constraint string in the pseudo dot-bracket notation.
///
/// | symbol | meaning                                   |
/// |--------|-------------------------------------------|
/// | `.`    | no constraint                             |
/// | `\|`   | paired, partner unknown                   |
/// | `x`    | unpaired                                  |
/// | `<`    | pairs with a partner downstream           |
/// | `>`    | pairs with a partner upstream             |
/// | `( )`  | forced pair                               |
/// | `i`    | intramolecular pairs only (no effect here)|
/// | `e`    | intermolecular pairs only                 |
pub fn parse_structure_constraint(text: &str, len: usize) -> Result<Vec<Command>, ConstraintError> {
    let symbols: Vec<char> = text.trim().chars().collect();
    if symbols.len() != len {
        return Err(ConstraintError::LengthMismatch {
            expected: len,
            found: symbols.len(),
        });
    }

    let mut commands = Vec::new();
    let mut open = Vec::new();
    for (idx, &symbol) in symbols.iter().enumerate() {
        let i = idx + 1;
        match symbol {
            '.' | 'i' => {}
            '|' => commands.push(Command::ForcePaired {
                i,
                direction: PairDirection::Any,
            }),
            'x' => commands.push(Command::ForceUnpaired {
                i,
                context: LoopContext::ALL,
            }),
            '<' => commands.push(Command::ForcePaired {
                i,
                direction: PairDirection::Downstream,
            }),
            '>' => commands.push(Command::ForcePaired {
                i,
                direction: PairDirection::Upstream,
            }),
            'e' => commands.push(Command::ProhibitPairing { i }),
            '(' => open.push(i),
            ')' => {
                let start = open
                    .pop()
                    .ok_or(ConstraintError::Unbalanced { position: i })?;
                commands.push(Command::ForcePair {
                    i: start,
                    j: i,
                    context: LoopContext::ALL,
                });
            }
            _ => return Err(ConstraintError::UnknownSymbol { symbol, position: i }),
        }
    }

    if let Some(&position) = open.last() {
        return Err(ConstraintError::Unbalanced { position });
    }
    Ok(commands)
}

/// Parses a constraint command file.
///
/// One directive per line, `#` starts a comment:
///
/// ```text
/// F i j k [ctx]   force pairs (i,j), (i+1,j-1), ... (k of them)
/// F i 0 k         force i..i+k-1 to pair
/// P i j k [ctx]   prohibit k stacked pairs starting at (i,j)
/// P i 0 k [ctx]   force i..i+k-1 unpaired
/// A i j k [ctx]   allow k stacked (possibly non-canonical) pairs
/// E i j k e       add e kcal/mol per pair, or per unpaired base if j = 0
/// ```
///
/// Positions are checked against the sequence length `len` before a
/// directive is expanded.
pub fn parse_command_file(text: &str, len: usize) -> Result<Vec<Command>, ConstraintError> {
    let mut commands = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        parse_directive(content, line, len, &mut commands)?;
    }
    Ok(commands)
}

fn parse_directive(content: &str, line: usize, len: usize, out: &mut Vec<Command>) -> Result<(), ConstraintError> {
    let fail = |message: String| ConstraintError::Command { line, message };
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(fail(format!("expected at least 4 fields, found {}", tokens.len())));
    }

    let number = |token: &str, name: &str| -> Result<usize, ConstraintError> {
        token
            .parse::<usize>()
            .map_err(|_| fail(format!("invalid {name} '{token}'")))
    };
    let i = number(tokens[1], "position i")?;
    let j = number(tokens[2], "position j")?;
    let k = number(tokens[3], "count k")?;
    if i == 0 {
        return Err(fail("position i must be at least 1".to_string()));
    }
    if k == 0 {
        return Err(fail("count k must be at least 1".to_string()));
    }
    if j > 0 {
        if j > len {
            return Err(fail(format!("position {j} exceeds the sequence length {len}")));
        }
        if j < i || k.checked_mul(2).is_none_or(|width| j - i + 1 < width) {
            return Err(fail(format!("{k} stacked pairs do not fit between {i} and {j}")));
        }
    } else if i.checked_add(k - 1).is_none_or(|last| last > len) {
        return Err(fail(format!(
            "stretch of {k} positions from {i} exceeds the sequence length {len}"
        )));
    }

    let context = |token: Option<&&str>| -> Result<LoopContext, ConstraintError> {
        match token {
            None => Ok(LoopContext::ALL),
            Some(letters) => LoopContext::parse_letters(letters)
                .map_err(|c| fail(format!("unknown loop context '{c}'"))),
        }
    };

    let pairs = (0..k).map(|t| (i + t, j.saturating_sub(t)));
    let stretch = (0..k).map(|t| i + t);

    match tokens[0] {
        "F" if j > 0 => {
            let context = context(tokens.get(4))?;
            out.extend(pairs.map(|(i, j)| Command::ForcePair { i, j, context }));
        }
        "F" => out.extend(stretch.map(|i| Command::ForcePaired {
            i,
            direction: PairDirection::Any,
        })),
        "P" if j > 0 => {
            let context = context(tokens.get(4))?;
            out.extend(pairs.map(|(i, j)| Command::ProhibitPair { i, j, context }));
        }
        "P" => {
            let context = context(tokens.get(4))?;
            out.extend(stretch.map(|i| Command::ForceUnpaired { i, context }));
        }
        "A" if j > 0 => {
            let context = context(tokens.get(4))?;
            out.extend(pairs.map(|(i, j)| Command::AllowPair { i, j, context }));
        }
        "A" => return Err(fail("'A' requires a pair partner j > 0".to_string())),
        "E" => {
            let value = tokens
                .get(4)
                .ok_or_else(|| fail("'E' requires a pseudo-energy".to_string()))?;
            let kcal: f64 = value
                .parse()
                .map_err(|_| fail(format!("invalid pseudo-energy '{value}'")))?;
            let dcal = (kcal * 100.0).round();
            if !dcal.is_finite() || dcal.abs() > MAX_PSEUDO_ENERGY as f64 {
                return Err(fail(format!(
                    "pseudo-energy '{value}' is not a finite value within ±{} kcal/mol",
                    MAX_PSEUDO_ENERGY / 100
                )));
            }
            let energy = dcal as i32;
            if j > 0 {
                out.extend(pairs.map(|(i, j)| Command::PairBonus { i, j, energy }));
            } else {
                out.extend(stretch.map(|i| Command::UnpairedBonus { i, energy }));
            }
        }
        other => return Err(fail(format!("unknown directive '{other}'"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_constraint_maps_every_symbol() {
        let commands = parse_structure_constraint("(|x<>ie.)", 9).unwrap();
        assert_eq!(
            commands,
            vec![
                Command::ForcePaired {
                    i: 2,
                    direction: PairDirection::Any
                },
                Command::ForceUnpaired {
                    i: 3,
                    context: LoopContext::ALL
                },
                Command::ForcePaired {
                    i: 4,
                    direction: PairDirection::Downstream
                },
                Command::ForcePaired {
                    i: 5,
                    direction: PairDirection::Upstream
                },
                Command::ProhibitPairing { i: 7 },
                Command::ForcePair {
                    i: 1,
                    j: 9,
                    context: LoopContext::ALL
                },
            ]
        );
    }

    #[test]
    fn structure_constraint_rejects_length_mismatch() {
        assert_eq!(
            parse_structure_constraint("...", 4),
            Err(ConstraintError::LengthMismatch {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn structure_constraint_rejects_unbalanced_and_unknown_symbols() {
        assert_eq!(
            parse_structure_constraint("..)", 3),
            Err(ConstraintError::Unbalanced { position: 3 })
        );
        assert_eq!(
            parse_structure_constraint("(..", 3),
            Err(ConstraintError::Unbalanced { position: 1 })
        );
        assert_eq!(
            parse_structure_constraint(".?.", 3),
            Err(ConstraintError::UnknownSymbol {
                symbol: '?',
                position: 2
            })
        );
    }

    #[test]
    fn command_file_expands_stacked_directives() {
        let text = "\
# force a helix
F 1 20 3
P 5 0 2 H
A 8 14 1 E
E 2 0 1 -1.5
E 3 18 1 0.25
";
        let commands = parse_command_file(text, 20).unwrap();
        assert_eq!(commands.len(), 8);
        assert_eq!(
            commands[2],
            Command::ForcePair {
                i: 3,
                j: 18,
                context: LoopContext::ALL
            }
        );
        assert_eq!(
            commands[3],
            Command::ForceUnpaired {
                i: 5,
                context: LoopContext::HAIRPIN
            }
        );
        assert_eq!(
            commands[5],
            Command::AllowPair {
                i: 8,
                j: 14,
                context: LoopContext::EXTERIOR
            }
        );
        assert_eq!(commands[6], Command::UnpairedBonus { i: 2, energy: -150 });
        assert_eq!(
            commands[7],
            Command::PairBonus {
                i: 3,
                j: 18,
                energy: 25
            }
        );
        assert!(commands[7].is_soft());
    }

    #[test]
    fn command_file_reports_line_of_malformed_directive() {
        let err = parse_command_file("F 1 20 1\nX 1 2 3\n", 20).unwrap_err();
        assert!(matches!(err, ConstraintError::Command { line: 2, .. }));

        let err = parse_command_file("F 1 20\n", 20).unwrap_err();
        assert!(matches!(err, ConstraintError::Command { line: 1, .. }));

        let err = parse_command_file("F 1 20 1 Z\n", 20).unwrap_err();
        assert!(matches!(err, ConstraintError::Command { line: 1, .. }));
    }

    #[test]
    fn command_file_rejects_helix_that_does_not_fit() {
        let err = parse_command_file("F 1 4 3\n", 20).unwrap_err();
        assert!(matches!(err, ConstraintError::Command { line: 1, .. }));
    }

    #[test]
    fn command_file_rejects_counts_that_overflow_or_overrun() {
        for text in [
            "F 1 9 9999999999999999999\n",
            "F 1 9 18446744073709551615\n",
            "F 3 0 18446744073709551615\n",
            "P 2 0 9\n",
            "F 1 12 1\n",
            "E 10 0 1 -1.0\n",
        ] {
            let err = parse_command_file(text, 9).unwrap_err();
            assert!(matches!(err, ConstraintError::Command { line: 1, .. }), "{text}");
        }
        assert_eq!(parse_command_file("P 2 0 8\n", 9).unwrap().len(), 8);
    }

    #[test]
    fn command_file_rejects_unbounded_pseudo_energies() {
        for value in ["inf", "-inf", "NaN", "1e300", "100.01"] {
            let text = format!("E 1 9 1 {value}\n");
            let err = parse_command_file(&text, 9).unwrap_err();
            assert!(matches!(err, ConstraintError::Command { line: 1, .. }), "{value}");
        }
        let commands = parse_command_file("E 1 9 1 -100\n", 9).unwrap();
        assert_eq!(
            commands,
            vec![Command::PairBonus {
                i: 1,
                j: 9,
                energy: -MAX_PSEUDO_ENERGY
            }]
        );
    }
}
