//! Dice expressions such as `1d20`, `4d6K3` or `2 * (1d8 + 1)`.
//!
//! A dice term is `NdM` followed by any number of keep/drop modifiers:
//! `K`/`k` keep the highest/lowest dice, `X`/`x` drop the highest/lowest.
//! Terms combine with `+ - * /` and parentheses.

use std::fmt::Write as _;

use rand::Rng;
use thiserror::Error;

const MAX_DICE: u32 = 1000;
const MAX_SIDES: u32 = 10_000;
/// Parentheses and unary minus nest at most this deep.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("empty dice expression")]
    Empty,
    #[error("unexpected '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("too many dice ({0}), the limit is 1000")]
    TooManyDice(u32),
    #[error("invalid number of sides ({0})")]
    InvalidSides(u32),
    #[error("cannot keep or drop {0} of {1} dice")]
    InvalidSelection(u32, u32),
    #[error("division by zero")]
    DivisionByZero,
    #[error("number too large")]
    Overflow,
    #[error("expression nested too deeply, the limit is 64")]
    TooDeep,
}

/// The outcome of rolling an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    pub total: i64,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    KeepHighest(u32),
    KeepLowest(u32),
    DropHighest(u32),
    DropLowest(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DiceTerm {
    count: u32,
    sides: u32,
    selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(i64),
    Dice(DiceTerm),
    Neg(Box<Expr>),
    Group(Box<Expr>),
    Binary(Box<Expr>, char, Box<Expr>),
}

/// Rolls `expr` with the given random source.
pub fn roll<R: Rng + ?Sized>(expr: &str, rng: &mut R) -> Result<Roll, DiceError> {
    let parsed = Parser::new(expr).parse()?;
    let mut explanation = String::new();
    let total = eval(&parsed, rng, &mut explanation)?;
    Ok(Roll { total, explanation })
}

/// Checks that `expr` parses without rolling it.
pub fn validate(expr: &str) -> Result<(), DiceError> {
    Parser::new(expr).parse().map(|_| ())
}

fn eval<R: Rng + ?Sized>(expr: &Expr, rng: &mut R, out: &mut String) -> Result<i64, DiceError> {
    match expr {
        Expr::Number(n) => {
            let _ = write!(out, "{n}");
            Ok(*n)
        }
        Expr::Dice(term) => roll_term(term, rng, out),
        Expr::Neg(inner) => {
            out.push('-');
            let value = eval(inner, rng, out)?;
            value.checked_neg().ok_or(DiceError::Overflow)
        }
        Expr::Group(inner) => {
            out.push('(');
            let value = eval(inner, rng, out)?;
            out.push(')');
            Ok(value)
        }
        Expr::Binary(lhs, op, rhs) => {
            let left = eval(lhs, rng, out)?;
            let _ = write!(out, " {op} ");
            let right = eval(rhs, rng, out)?;
            let value = match op {
                '+' => left.checked_add(right),
                '-' => left.checked_sub(right),
                '*' => left.checked_mul(right),
                _ => {
                    if right == 0 {
                        return Err(DiceError::DivisionByZero);
                    }
                    left.checked_div(right)
                }
            };
            value.ok_or(DiceError::Overflow)
        }
    }
}

fn roll_term<R: Rng + ?Sized>(term: &DiceTerm, rng: &mut R, out: &mut String) -> Result<i64, DiceError> {
    let rolls: Vec<u32> = (0..term.count)
        .map(|_| rng.gen_range(1..=term.sides))
        .collect();

    let mut kept = vec![true; rolls.len()];
    for selection in &term.selections {
        apply_selection(&rolls, &mut kept, *selection)?;
    }

    out.push('[');
    let mut total = 0i64;
    for (i, (value, keep)) in rolls.iter().zip(&kept).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if *keep {
            total += i64::from(*value);
            let _ = write!(out, "{value}");
        } else {
            let _ = write!(out, "~~{value}~~");
        }
    }
    out.push(']');

    Ok(total)
}

fn apply_selection(rolls: &[u32], kept: &mut [bool], selection: Selection) -> Result<(), DiceError> {
    // indices of the dice still in play, lowest value first
    let mut live: Vec<usize> = (0..rolls.len()).filter(|&i| kept[i]).collect();
    live.sort_by_key(|&i| rolls[i]);
    let available = live.len() as u32;

    let (n, drop_low) = match selection {
        Selection::KeepHighest(n) => (available.checked_sub(n), true),
        Selection::KeepLowest(n) => (available.checked_sub(n), false),
        Selection::DropHighest(n) => (Some(n).filter(|&n| n <= available), false),
        Selection::DropLowest(n) => (Some(n).filter(|&n| n <= available), true),
    };
    let requested = match selection {
        Selection::KeepHighest(n)
        | Selection::KeepLowest(n)
        | Selection::DropHighest(n)
        | Selection::DropLowest(n) => n,
    };
    let n = n.ok_or(DiceError::InvalidSelection(requested, available))? as usize;

    if drop_low {
        live.iter().take(n).for_each(|&i| kept[i] = false);
    } else {
        live.iter().rev().take(n).for_each(|&i| kept[i] = false);
    }
    Ok(())
}

struct Parser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source
                .char_indices()
                .filter(|(_, c)| !c.is_whitespace())
                .collect(),
            pos: 0,
            depth: 0,
            source,
        }
    }

    fn parse(mut self) -> Result<Expr, DiceError> {
        if self.source.trim().is_empty() {
            return Err(DiceError::Empty);
        }
        let expr = self.expr()?;
        match self.peek() {
            Some(c) => Err(self.unexpected(c)),
            None => Ok(expr),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn unexpected(&self, c: char) -> DiceError {
        let at = self.chars.get(self.pos).map_or(self.source.len(), |(i, _)| *i);
        DiceError::UnexpectedChar(c, at)
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, DiceError>) -> Result<T, DiceError> {
        if self.depth >= MAX_DEPTH {
            return Err(DiceError::TooDeep);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<Expr, DiceError> {
        let mut lhs = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, DiceError> {
        let mut lhs = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.bump();
            let rhs = self.factor()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, DiceError> {
        match self.peek() {
            None => Err(DiceError::UnexpectedEnd),
            Some('-') => {
                self.bump();
                let inner = self.nested(Self::factor)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some('(') => {
                self.bump();
                let inner = self.nested(Self::expr)?;
                match self.bump() {
                    Some(')') => Ok(Expr::Group(Box::new(inner))),
                    Some(c) => {
                        self.pos -= 1;
                        Err(self.unexpected(c))
                    }
                    None => Err(DiceError::UnexpectedEnd),
                }
            }
            Some('d' | 'D') => self.dice(1),
            Some(c) if c.is_ascii_digit() => {
                let n = self.number()?;
                if matches!(self.peek(), Some('d' | 'D')) {
                    let count = u32::try_from(n).map_err(|_| DiceError::Overflow)?;
                    self.dice(count)
                } else {
                    Ok(Expr::Number(n))
                }
            }
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn number(&mut self) -> Result<i64, DiceError> {
        let mut value: i64 = 0;
        let mut digits = 0;
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            self.bump();
            digits += 1;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(c as u8 - b'0')))
                .ok_or(DiceError::Overflow)?;
        }
        if digits == 0 {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(DiceError::UnexpectedEnd),
            };
        }
        Ok(value)
    }

    fn small_number(&mut self) -> Result<u32, DiceError> {
        let n = self.number()?;
        u32::try_from(n).map_err(|_| DiceError::Overflow)
    }

    fn dice(&mut self, count: u32) -> Result<Expr, DiceError> {
        // consume the 'd'
        self.bump();
        let sides = if self.peek() == Some('%') {
            self.bump();
            100
        } else {
            self.small_number()?
        };

        if count > MAX_DICE {
            return Err(DiceError::TooManyDice(count));
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::InvalidSides(sides));
        }

        let mut selections = Vec::new();
        while let Some(c @ ('K' | 'k' | 'X' | 'x')) = self.peek() {
            self.bump();
            let n = if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.small_number()?
            } else {
                1
            };
            selections.push(match c {
                'K' => Selection::KeepHighest(n),
                'k' => Selection::KeepLowest(n),
                'X' => Selection::DropHighest(n),
                _ => Selection::DropLowest(n),
            });
        }

        Ok(Expr::Dice(DiceTerm {
            count,
            sides,
            selections,
        }))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn test_constant_arithmetic() {
        let roll = roll("2 + 3 * 4", &mut rng()).unwrap();
        assert_eq!(roll.total, 14);
        assert_eq!(roll.explanation, "2 + 3 * 4");

        let roll = super::roll("(2+3)*4 - -1", &mut rng()).unwrap();
        assert_eq!(roll.total, 21);
        assert_eq!(roll.explanation, "(2 + 3) * 4 - -1");

        assert_eq!(super::roll("7/2", &mut rng()).unwrap().total, 3);
    }

    #[test]
    fn test_dice_stay_in_range() {
        let mut rng = rng();
        for _ in 0..200 {
            let roll = roll("3d6", &mut rng).unwrap();
            assert!((3..=18).contains(&roll.total), "{roll:?}");
            assert!(roll.explanation.starts_with('[') && roll.explanation.ends_with(']'));
            assert_eq!(roll.explanation.matches(", ").count(), 2);
        }
    }

    #[test]
    fn test_implicit_count_and_percentile() {
        let mut rng = rng();
        for _ in 0..100 {
            assert!((1..=20).contains(&roll("d20", &mut rng).unwrap().total));
            assert!((1..=100).contains(&roll("1d%", &mut rng).unwrap().total));
        }
    }

    #[test]
    fn test_keep_highest_strikes_the_rest() {
        let mut rng = rng();
        for _ in 0..100 {
            let roll = roll("4d6K3", &mut rng).unwrap();
            assert_eq!(roll.explanation.matches("~~").count(), 2, "{roll:?}");
            assert!((3..=18).contains(&roll.total));

            let kept: i64 = roll
                .explanation
                .trim_matches(|c| c == '[' || c == ']')
                .split(", ")
                .filter(|s| !s.starts_with("~~"))
                .map(|s| s.parse::<i64>().unwrap())
                .sum();
            assert_eq!(kept, roll.total);
        }
    }

    #[test]
    fn test_drop_lowest_and_keep_lowest() {
        let mut rng = rng();
        for _ in 0..50 {
            let dropped = roll("4d6x", &mut rng).unwrap();
            assert_eq!(dropped.explanation.matches("~~").count(), 2);

            let lowest = roll("2d20k", &mut rng).unwrap();
            let values: Vec<i64> = lowest
                .explanation
                .trim_matches(|c| c == '[' || c == ']')
                .split(", ")
                .map(|s| s.trim_matches('~').parse().unwrap())
                .collect();
            assert_eq!(lowest.total, *values.iter().min().unwrap());
        }
    }

    #[test]
    fn test_multiplied_hit_dice() {
        let mut rng = rng();
        for _ in 0..100 {
            let roll = roll("3 * 1d8", &mut rng).unwrap();
            assert_eq!(roll.total % 3, 0);
            assert!((3..=24).contains(&roll.total));
            assert!(roll.explanation.starts_with("3 * ["));
        }
    }

    #[test]
    fn test_errors() {
        let mut rng = rng();
        assert_eq!(roll("", &mut rng), Err(DiceError::Empty));
        assert_eq!(roll("   ", &mut rng), Err(DiceError::Empty));
        assert_eq!(roll("1d", &mut rng), Err(DiceError::UnexpectedEnd));
        assert_eq!(roll("1d6+", &mut rng), Err(DiceError::UnexpectedEnd));
        assert_eq!(roll("1d0", &mut rng), Err(DiceError::InvalidSides(0)));
        assert_eq!(roll("5000d6", &mut rng), Err(DiceError::TooManyDice(5000)));
        assert_eq!(roll("2d6K3", &mut rng), Err(DiceError::InvalidSelection(3, 2)));
        assert_eq!(roll("6/0", &mut rng), Err(DiceError::DivisionByZero));
        assert_eq!(roll("1d6 foo", &mut rng), Err(DiceError::UnexpectedChar('f', 4)));
        assert_eq!(roll("(1d6", &mut rng), Err(DiceError::UnexpectedEnd));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let mut rng = rng();

        let allowed = format!("{}7{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(roll(&allowed, &mut rng).unwrap().total, 7);

        let groups = format!("{}1{}", "(".repeat(999), ")".repeat(999));
        assert_eq!(roll(&groups, &mut rng), Err(DiceError::TooDeep));

        let negations = format!("{}1", "-".repeat(1999));
        assert_eq!(roll(&negations, &mut rng), Err(DiceError::TooDeep));
        assert_eq!(roll("--1d1", &mut rng).unwrap().total, 1);
    }

    #[test]
    fn test_validate() {
        assert!(validate("1d6+2").is_ok());
        assert!(validate("d").is_err());
    }
}
