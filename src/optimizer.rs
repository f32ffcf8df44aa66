//! Peephole passes over the instruction list.

use crate::instructions::{Instr, Piece};

/// Append `piece` to `pieces`, joining adjacent texts.
fn push_piece(pieces: &mut Vec<Piece>, piece: Piece) {
    if let Piece::Text(t) = &piece {
        if t.is_empty() {
            return
        }
        if let Some(Piece::Text(last)) = pieces.last_mut() {
            last.push_str(t);
            return
        }
    }
    pieces.push(piece);
}

fn extend(pieces: &mut Vec<Piece>, more: Vec<Piece>) {
    for piece in more {
        push_piece(pieces, piece);
    }
}

fn is_text_only(pieces: &[Piece]) -> bool {
    pieces.iter().all(|p| matches!(p, Piece::Text(_)))
}

/// Pass 1: runs of text-only appends become one.
fn merge_texts(instructions: Vec<Instr>) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(instructions.len());
    for instr in instructions {
        match instr {
            Instr::Append(pieces) => match out.last_mut() {
                Some(Instr::Append(last)) if is_text_only(last) && is_text_only(&pieces) =>
                    extend(last, pieces),
                _ => out.push(Instr::Append(pieces)),
            },
            instr => out.push(instr),
        }
    }
    out
}

/// Pass 2: runs of appends of any kind become one concatenation.
fn merge_appends(instructions: Vec<Instr>) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(instructions.len());
    for instr in instructions {
        match instr {
            Instr::Append(pieces) => match out.last_mut() {
                Some(Instr::Append(last)) => extend(last, pieces),
                _ => {
                    let mut joined = Vec::with_capacity(pieces.len());
                    extend(&mut joined, pieces);
                    out.push(Instr::Append(joined));
                }
            },
            instr => out.push(instr),
        }
    }
    out.retain(|instr| !matches!(instr, Instr::Append(pieces) if pieces.is_empty()));
    out
}

pub fn optimize(instructions: Vec<Instr>) -> Vec<Instr> {
    merge_appends(merge_texts(instructions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::Variable;

    fn var(expr: &str) -> Piece {
        Piece::Variable(Variable { expr: expr.into(), handlers: vec![] })
    }

    #[test]
    fn t_merges() {
        let instrs = vec![
            Instr::text("a"),
            Instr::text("b"),
            Instr::Append(vec![var("x")]),
            Instr::text("c"),
            Instr::IfOpen { expr: "y".into() },
            Instr::text(""),
            Instr::IfClose,
            Instr::Append(vec![var("x"), Piece::Text("d".into())]),
            Instr::Append(vec![Piece::Text("e".into()), var("z")]),
        ];
        assert_eq!(optimize(instrs), [
            Instr::Append(vec![Piece::Text("ab".into()), var("x"), Piece::Text("c".into())]),
            Instr::IfOpen { expr: "y".into() },
            Instr::IfClose,
            Instr::Append(vec![var("x"), Piece::Text("de".into()), var("z")]),
        ]);
    }
}
